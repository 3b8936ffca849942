use std::sync::Arc;

use crate::{config::Config, db::CredentialStore, AppState};

pub fn test_config() -> Config {
    Config {
        database_url: "postgres://unused".into(),
        jwt_secret: "test-secret".into(),
        access_ttl_seconds: 900,
        refresh_ttl_days: 7,
        bcrypt_cost: 4,
        host: "127.0.0.1".into(),
        port: 0,
        api_prefix: "/api/v1".into(),
        cors_origins: Vec::new(),
        cookie_secure: false,
        refresh_token_cookie: false,
    }
}

pub fn test_state<S: CredentialStore + 'static>(store: Arc<S>) -> AppState {
    AppState::new(test_config(), store)
}
