use async_trait::async_trait;
use reqwest::{header, Method};
use serde_json::Value;

use super::{ClientConfig, ClientError};

#[derive(Debug, Clone)]
pub struct OutgoingRequest {
    pub method: Method,
    /// Path relative to the configured base URL.
    pub path: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl OutgoingRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct TransportReply {
    pub status: u16,
    /// Parsed JSON body; `Null` when the body was empty.
    pub body: Value,
    pub set_cookies: Vec<String>,
}

impl TransportReply {
    pub fn envelope_code(&self) -> Option<u16> {
        self.body
            .get("code")
            .and_then(Value::as_u64)
            .and_then(|c| u16::try_from(c).ok())
    }

    pub fn is_success_status(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Transport 401, or a 2xx whose envelope carries code 401. Any other
    /// transport status is never an authentication failure.
    pub fn is_auth_failure(&self) -> bool {
        self.status == 401 || (self.is_success_status() && self.envelope_code() == Some(401))
    }

    /// Value of a cookie set by this reply. A cleared cookie yields `Some("")`.
    pub fn cookie(&self, name: &str) -> Option<&str> {
        let prefix = format!("{name}=");
        self.set_cookies
            .iter()
            .find_map(|c| c.strip_prefix(prefix.as_str()))
            .map(|rest| rest.split(';').next().unwrap_or_default().trim())
    }
}

/// Raw request execution. Implementations never refresh or retry.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn execute(&self, request: OutgoingRequest) -> Result<TransportReply, ClientError>;
}

pub struct HttpTransport {
    http: reqwest::Client,
    base_url: String,
}

impl HttpTransport {
    pub fn new(config: &ClientConfig) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn execute(&self, request: OutgoingRequest) -> Result<TransportReply, ClientError> {
        let url = format!("{}{}", self.base_url, request.path);
        let mut builder = self.http.request(request.method, url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let set_cookies = response
            .headers()
            .get_all(header::SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .map(String::from)
            .collect();

        let bytes = response.bytes().await?;
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)
                .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
        };

        Ok(TransportReply {
            status,
            body,
            set_cookies,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn reply(status: u16, body: Value) -> TransportReply {
        TransportReply {
            status,
            body,
            set_cookies: Vec::new(),
        }
    }

    #[test]
    fn auth_failure_signals() {
        assert!(reply(401, Value::Null).is_auth_failure());
        assert!(reply(401, json!({ "code": 0 })).is_auth_failure());
        assert!(reply(200, json!({ "code": 401, "message": "x", "data": null })).is_auth_failure());
        assert!(!reply(200, json!({ "code": 0 })).is_auth_failure());
        // Only 2xx transports are inspected for a wrapped 401.
        assert!(!reply(500, json!({ "code": 401 })).is_auth_failure());
        assert!(!reply(403, json!({ "code": 403 })).is_auth_failure());
    }

    #[test]
    fn reads_cookie_from_set_cookie_values() {
        let mut r = reply(200, Value::Null);
        r.set_cookies = vec![
            "refreshToken=r; HttpOnly; Path=/api/v1/auth/refresh".into(),
            "csrfToken=abc; SameSite=Lax; Path=/".into(),
        ];
        assert_eq!(r.cookie("csrfToken"), Some("abc"));
        assert_eq!(r.cookie("refreshToken"), Some("r"));
        assert_eq!(r.cookie("session"), None);

        r.set_cookies = vec!["csrfToken=; Path=/; Max-Age=0".into()];
        assert_eq!(r.cookie("csrfToken"), Some(""));
    }
}
