use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::principal::Role;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

impl std::fmt::Display for TokenType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TokenType::Access => write!(f, "access"),
            TokenType::Refresh => write!(f, "refresh"),
        }
    }
}

/// What the caller asks the codec to sign; `iat`/`exp` are added at signing time.
#[derive(Debug, Clone)]
pub struct TokenPayload {
    pub subject_id: Uuid,
    pub username: String,
    pub role: Role,
    pub token_type: TokenType,
    pub token_id: Uuid,
}

/// Claims embedded in both access and refresh JWTs
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenClaims {
    pub sub: String, // principal UUID
    pub username: String,
    pub role: Role,
    pub token_type: TokenType,
    pub token_id: String,
    pub iat: usize,
    pub exp: usize,
}

/// Attached to the request by the access-token guard.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticatedPrincipal {
    pub subject_id: Uuid,
    pub username: String,
    pub role: Role,
}

#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

// Request/Response DTOs
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshTokenRequest {
    pub refresh_token: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenResponse {
    /// Mirrors `access_token` for clients that predate the token pair.
    pub token: String,
    pub access_token: String,
    pub refresh_token: String,
}

impl From<TokenPair> for TokenResponse {
    fn from(pair: TokenPair) -> Self {
        Self {
            token: pair.access_token.clone(),
            access_token: pair.access_token,
            refresh_token: pair.refresh_token,
        }
    }
}
