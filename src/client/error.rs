/// Errors surfaced by the client session. `Clone` because a single refresh
/// result is handed to every request waiting on it.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ClientError {
    #[error("transport error: {0}")]
    Transport(String),
    /// Failure envelope or failure status; `message` is the server's, verbatim.
    #[error("{message}")]
    Api {
        status: u16,
        code: u16,
        message: String,
    },
    #[error("not logged in")]
    NotAuthenticated,
    #[error("session expired: {0}")]
    RefreshFailed(String),
    #[error("unexpected response: {0}")]
    InvalidResponse(String),
    #[error("token storage error: {0}")]
    Storage(String),
}

impl ClientError {
    pub fn is_unauthorized(&self) -> bool {
        match self {
            ClientError::Api { status, code, .. } => *status == 401 || *code == 401,
            ClientError::NotAuthenticated | ClientError::RefreshFailed(_) => true,
            _ => false,
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(e: reqwest::Error) -> Self {
        ClientError::Transport(e.to_string())
    }
}

impl From<std::io::Error> for ClientError {
    fn from(e: std::io::Error) -> Self {
        ClientError::Storage(e.to_string())
    }
}
