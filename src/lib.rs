// Library exports for binary tools and tests
pub mod client;
pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;

#[cfg(test)]
pub(crate) mod test_support;

use std::sync::Arc;

use config::Config;
use db::CredentialStore;
use services::{
    auth::{AuthService, SessionSettings},
    token::TokenCodec,
};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub auth: Arc<AuthService>,
    pub codec: Arc<TokenCodec>,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(config: Config, store: Arc<dyn CredentialStore>) -> Self {
        let codec = Arc::new(TokenCodec::new(&config.jwt_secret));
        let auth = Arc::new(AuthService::new(
            store,
            codec.clone(),
            SessionSettings {
                access_ttl_seconds: config.access_ttl_seconds,
                refresh_ttl_days: config.refresh_ttl_days,
                bcrypt_cost: config.bcrypt_cost,
            },
        ));
        Self {
            auth,
            codec,
            config: Arc::new(config),
        }
    }
}
