//! Client side of the session: keeps the token pair, attaches the bearer
//! header, refreshes once for any number of concurrent 401s and replays each
//! rejected request a single time.

mod error;
mod session;
mod storage;
mod transport;

use std::{env, time::Duration};

pub use error::ClientError;
pub use session::{ApiRequest, SessionEvent, SessionManager};
pub use storage::{FileTokenStorage, MemoryTokenStorage, TokenSet, TokenStorage};
pub use transport::{HttpTransport, OutgoingRequest, Transport, TransportReply};

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL including the API prefix, e.g. `http://localhost:3100/api/v1`.
    pub base_url: String,
    pub timeout: Duration,
    /// Where the UI should go once the session is gone.
    pub login_path: String,
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout: Duration::from_secs(10),
            login_path: "/login".to_string(),
        }
    }

    pub fn from_env() -> Self {
        Self::new(env::var("API_BASE").unwrap_or_else(|_| "http://localhost:3100/api/v1".into()))
    }
}
