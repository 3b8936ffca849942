use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::models::{auth::TokenType, envelope::ApiResponse};

/// Authentication and authorization failures raised by the guards and the
/// session service. Every variant is terminal for the current request.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// Unknown username and wrong password share this variant and its message.
    #[error("username or password is incorrect")]
    InvalidCredentials,
    #[error("invalid {0} token")]
    InvalidToken(TokenType),
    /// Well-formed refresh token whose hash no longer matches the stored one.
    #[error("invalid refresh token")]
    RefreshReuseDetected,
    #[error("invalid csrf token")]
    CsrfMismatch,
    #[error("forbidden")]
    Forbidden,
    #[error("{0}")]
    Validation(String),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AuthError {
    pub fn status(&self) -> StatusCode {
        match self {
            AuthError::InvalidCredentials
            | AuthError::InvalidToken(_)
            | AuthError::RefreshReuseDetected => StatusCode::UNAUTHORIZED,
            AuthError::CsrfMismatch | AuthError::Forbidden => StatusCode::FORBIDDEN,
            AuthError::Validation(_) => StatusCode::BAD_REQUEST,
            AuthError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            AuthError::Internal(e) => {
                tracing::error!("internal error: {e:#}");
                "internal error".to_string()
            }
            other => other.to_string(),
        };
        ApiResponse::error(status, message).into_response()
    }
}
