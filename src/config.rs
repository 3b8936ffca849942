use std::env;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub access_ttl_seconds: u64,
    pub refresh_ttl_days: u64,
    pub bcrypt_cost: u32,
    pub host: String,
    pub port: u16,
    pub api_prefix: String,
    pub cors_origins: Vec<String>,
    pub cookie_secure: bool,
    /// Carry the refresh token in an httpOnly cookie instead of the response body only.
    pub refresh_token_cookie: bool,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Self {
            database_url: required("DATABASE_URL")?,
            jwt_secret: required("JWT_SECRET")?,
            access_ttl_seconds: env::var("ACCESS_TOKEN_TTL_SECONDS")
                .unwrap_or_else(|_| "900".into())
                .parse()?,
            refresh_ttl_days: env::var("REFRESH_TOKEN_TTL_DAYS")
                .unwrap_or_else(|_| "7".into())
                .parse()?,
            bcrypt_cost: env::var("BCRYPT_COST")
                .unwrap_or_else(|_| "10".into())
                .parse()?,
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "3100".into())
                .parse()?,
            api_prefix: normalize_prefix(
                &env::var("API_PREFIX").unwrap_or_else(|_| "/api/v1".into()),
            ),
            cors_origins: parse_origins(&env::var("CORS_ORIGIN").unwrap_or_default()),
            cookie_secure: flag("COOKIE_SECURE"),
            refresh_token_cookie: flag("REFRESH_TOKEN_COOKIE"),
        })
    }

    /// Path the refresh-token cookie is scoped to.
    pub fn refresh_cookie_path(&self) -> String {
        format!("{}/auth/refresh", self.api_prefix)
    }
}

fn required(key: &str) -> anyhow::Result<String> {
    env::var(key).map_err(|_| anyhow::anyhow!("Missing required env var: {}", key))
}

fn flag(key: &str) -> bool {
    env::var(key)
        .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
        .unwrap_or(false)
}

fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|o| !o.is_empty())
        .map(String::from)
        .collect()
}

/// "/api/v1/" and "api/v1" both become "/api/v1"; "/" and "" become "".
fn normalize_prefix(raw: &str) -> String {
    let trimmed = raw.trim().trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("/{trimmed}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefix_is_normalized() {
        assert_eq!(normalize_prefix("/api/v1/"), "/api/v1");
        assert_eq!(normalize_prefix("api/v1"), "/api/v1");
        assert_eq!(normalize_prefix("/"), "");
        assert_eq!(normalize_prefix(""), "");
    }

    #[test]
    fn origins_skip_blank_entries() {
        let origins = parse_origins(" http://a.test, ,http://b.test ");
        assert_eq!(origins, vec!["http://a.test", "http://b.test"]);
    }
}
