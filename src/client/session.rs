use std::sync::Arc;

use futures_util::future::{BoxFuture, FutureExt, Shared};
use reqwest::Method;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::{broadcast, Mutex};

use super::{ClientConfig, ClientError, OutgoingRequest, TokenSet, TokenStorage, Transport, TransportReply};
use crate::{
    models::envelope::ApiResponse,
    services::csrf::{CSRF_COOKIE_NAME, CSRF_HEADER_NAME},
};

const LOGIN_PATH: &str = "/auth/login";
const REFRESH_PATH: &str = "/auth/refresh";
const LOGOUT_PATH: &str = "/auth/logout";

type PendingRefresh = Shared<BoxFuture<'static, Result<String, ClientError>>>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// A new token pair was stored.
    Refreshed,
    /// Local tokens were cleared; the UI should navigate to `redirect_to`.
    LoggedOut { redirect_to: String },
}

#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub body: Option<Value>,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            body: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>, body: Value) -> Self {
        Self::new(Method::POST, path).with_body(body)
    }

    pub fn put(path: impl Into<String>, body: Value) -> Self {
        Self::new(Method::PUT, path).with_body(body)
    }

    pub fn patch(path: impl Into<String>, body: Value) -> Self {
        Self::new(Method::PATCH, path).with_body(body)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    fn is_refresh_call(&self) -> bool {
        self.path.split('?').next() == Some(REFRESH_PATH)
    }
}

/// Token fields of a login/refresh reply; `token` is the older name of `accessToken`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IssuedTokens {
    access_token: Option<String>,
    token: Option<String>,
    refresh_token: Option<String>,
}

fn issued_pair(reply: &TransportReply) -> Result<(String, String), ClientError> {
    let data = reply.body.get("data").cloned().unwrap_or(Value::Null);
    let issued: IssuedTokens = serde_json::from_value(data)
        .map_err(|e| ClientError::InvalidResponse(format!("token pair: {e}")))?;

    match (issued.access_token.or(issued.token), issued.refresh_token) {
        (Some(access), Some(refresh)) if !access.is_empty() && !refresh.is_empty() => {
            Ok((access, refresh))
        }
        _ => Err(ClientError::InvalidResponse(
            "token pair missing from response".to_string(),
        )),
    }
}

/// Success only for a 2xx carrying envelope code 0.
fn expect_ok(reply: &TransportReply) -> Result<ApiResponse, ClientError> {
    match serde_json::from_value::<ApiResponse>(reply.body.clone()) {
        Ok(envelope) if reply.is_success_status() && envelope.code == 0 => Ok(envelope),
        Ok(envelope) => Err(ClientError::Api {
            status: reply.status,
            code: envelope.code,
            message: envelope.message,
        }),
        Err(_) if reply.is_success_status() => Err(ClientError::InvalidResponse(
            "response is not an envelope".to_string(),
        )),
        Err(_) => Err(ClientError::Api {
            status: reply.status,
            code: reply.status,
            message: format!("request failed with status {}", reply.status),
        }),
    }
}

fn is_safe_method(method: &Method) -> bool {
    matches!(*method, Method::GET | Method::HEAD | Method::OPTIONS)
}

/// Holds the session tokens and routes every API call through the refresh
/// interceptor. Cheap to clone; clones share one session.
#[derive(Clone)]
pub struct SessionManager {
    inner: Arc<Inner>,
}

struct Inner {
    config: ClientConfig,
    transport: Arc<dyn Transport>,
    storage: Arc<dyn TokenStorage>,
    /// At most one refresh in flight; the refresh future empties this slot itself.
    pending: Mutex<Option<PendingRefresh>>,
    events: broadcast::Sender<SessionEvent>,
}

impl SessionManager {
    pub fn new(
        config: ClientConfig,
        transport: Arc<dyn Transport>,
        storage: Arc<dyn TokenStorage>,
    ) -> Self {
        let (events, _) = broadcast::channel(16);
        Self {
            inner: Arc::new(Inner {
                config,
                transport,
                storage,
                pending: Mutex::new(None),
                events,
            }),
        }
    }

    pub fn events(&self) -> broadcast::Receiver<SessionEvent> {
        self.inner.events.subscribe()
    }

    pub async fn tokens(&self) -> Result<TokenSet, ClientError> {
        self.inner.storage.load().await
    }

    /// Stores the issued pair. A rejected login surfaces the server message verbatim.
    pub async fn login(&self, username: &str, password: &str) -> Result<(), ClientError> {
        let reply = self
            .inner
            .transport
            .execute(OutgoingRequest {
                method: Method::POST,
                path: LOGIN_PATH.to_string(),
                headers: Vec::new(),
                body: Some(json!({ "username": username, "password": password })),
            })
            .await?;
        expect_ok(&reply)?;

        let (access, refresh) = issued_pair(&reply)?;
        self.inner
            .storage
            .save(&TokenSet {
                access_token: Some(access),
                refresh_token: Some(refresh),
                csrf_token: reply.cookie(CSRF_COOKIE_NAME).map(String::from),
            })
            .await?;

        tracing::debug!(username, "logged in");
        Ok(())
    }

    /// Revokes the refresh token server-side, then clears local state.
    pub async fn logout(&self) -> Result<(), ClientError> {
        let tokens = self.inner.storage.load().await?;
        let result = if tokens.access_token.is_some() {
            self.send(ApiRequest::new(Method::POST, LOGOUT_PATH))
                .await
                .map(|_| ())
        } else {
            Ok(())
        };

        self.inner.deauthenticate().await?;
        match result {
            // The server had already dropped the session.
            Err(ClientError::RefreshFailed(_)) => Ok(()),
            other => other,
        }
    }

    /// Sends `request` with the current access token. An authentication
    /// failure triggers one shared refresh and a single replay.
    pub async fn send(&self, request: ApiRequest) -> Result<ApiResponse, ClientError> {
        let (reply, used) = self.inner.dispatch(&request, None).await?;
        if !reply.is_auth_failure() || request.is_refresh_call() {
            return expect_ok(&reply);
        }

        tracing::debug!(path = %request.path, "access token rejected, refreshing");
        let access = self.inner.clone().refreshed_access_token(used).await?;

        let (replay, _) = self.inner.dispatch(&request, Some(access)).await?;
        expect_ok(&replay)
    }
}

impl Inner {
    async fn dispatch(
        &self,
        request: &ApiRequest,
        access_token: Option<String>,
    ) -> Result<(TransportReply, Option<String>), ClientError> {
        let tokens = self.storage.load().await?;
        let access = access_token.or(tokens.access_token);

        let mut headers = Vec::new();
        if let Some(token) = &access {
            headers.push(("authorization".to_string(), format!("Bearer {token}")));
        }
        if !is_safe_method(&request.method) {
            if let Some(csrf) = tokens.csrf_token.filter(|c| !c.is_empty()) {
                headers.push(("cookie".to_string(), format!("{CSRF_COOKIE_NAME}={csrf}")));
                headers.push((CSRF_HEADER_NAME.to_string(), csrf));
            }
        }

        let reply = self
            .transport
            .execute(OutgoingRequest {
                method: request.method.clone(),
                path: request.path.clone(),
                headers,
                body: request.body.clone(),
            })
            .await?;
        Ok((reply, access))
    }

    /// Joins the in-flight refresh or starts one. `rejected` is the access
    /// token the server just refused.
    async fn refreshed_access_token(
        self: Arc<Self>,
        rejected: Option<String>,
    ) -> Result<String, ClientError> {
        let pending = {
            let mut slot = self.pending.lock().await;
            match slot.clone() {
                Some(pending) => pending,
                None => {
                    // A refresh completed after this request went out.
                    let current = self.storage.load().await?.access_token;
                    if let Some(current) = current.filter(|c| Some(c) != rejected.as_ref()) {
                        return Ok(current);
                    }

                    let inner = self.clone();
                    let refresh = async move {
                        let result = inner.refresh().await;
                        inner.pending.lock().await.take();
                        result
                    }
                    .boxed()
                    .shared();
                    *slot = Some(refresh.clone());
                    refresh
                }
            }
        };
        pending.await
    }

    async fn refresh(&self) -> Result<String, ClientError> {
        match self.exchange_refresh_token().await {
            Ok(access) => {
                tracing::debug!("token pair refreshed");
                let _ = self.events.send(SessionEvent::Refreshed);
                Ok(access)
            }
            Err(e) => {
                tracing::warn!("token refresh failed: {e}");
                if let Err(clear) = self.storage.clear().await {
                    tracing::error!("failed to clear tokens after refresh failure: {clear}");
                }
                tracing::info!(redirect_to = %self.config.login_path, "session cleared");
                let _ = self.events.send(SessionEvent::LoggedOut {
                    redirect_to: self.config.login_path.clone(),
                });
                Err(ClientError::RefreshFailed(e.to_string()))
            }
        }
    }

    /// Calls the refresh endpoint on the bare transport, bypassing `send`.
    async fn exchange_refresh_token(&self) -> Result<String, ClientError> {
        let tokens = self.storage.load().await?;
        let refresh_token = tokens.refresh_token.ok_or(ClientError::NotAuthenticated)?;

        let reply = self
            .transport
            .execute(OutgoingRequest {
                method: Method::POST,
                path: REFRESH_PATH.to_string(),
                headers: Vec::new(),
                body: Some(json!({ "refreshToken": refresh_token })),
            })
            .await?;
        expect_ok(&reply)?;

        let (access, refresh) = issued_pair(&reply)?;
        self.storage
            .save(&TokenSet {
                access_token: Some(access.clone()),
                refresh_token: Some(refresh),
                csrf_token: reply
                    .cookie(CSRF_COOKIE_NAME)
                    .map(String::from)
                    .or(tokens.csrf_token),
            })
            .await?;
        Ok(access)
    }

    async fn deauthenticate(&self) -> Result<(), ClientError> {
        let had_session = self.storage.load().await? != TokenSet::default();
        self.storage.clear().await?;
        if had_session {
            tracing::info!(redirect_to = %self.config.login_path, "session cleared");
            let _ = self.events.send(SessionEvent::LoggedOut {
                redirect_to: self.config.login_path.clone(),
            });
        }
        Ok(())
    }
}
