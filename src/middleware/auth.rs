use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts, HeaderMap},
};

use crate::{
    error::AuthError,
    models::auth::{AuthenticatedPrincipal, TokenType},
    services::token::TokenCodec,
};

/// Access-token guard: bearer token present, valid, unexpired and of class `access`.
pub fn authenticate(
    headers: &HeaderMap,
    codec: &TokenCodec,
) -> Result<AuthenticatedPrincipal, AuthError> {
    let invalid = || AuthError::InvalidToken(TokenType::Access);

    let token = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().split_once(' '))
        .filter(|(scheme, _)| scheme.eq_ignore_ascii_case("bearer"))
        .map(|(_, token)| token.trim())
        .filter(|t| !t.is_empty())
        .ok_or_else(invalid)?;

    let claims = codec.verify(token, TokenType::Access)?;
    // A refresh token must never open a protected route.
    if claims.token_type != TokenType::Access {
        return Err(invalid());
    }

    Ok(AuthenticatedPrincipal {
        subject_id: claims.sub.parse().map_err(|_| invalid())?,
        username: claims.username,
        role: claims.role,
    })
}

/// Reads the principal the guard chain attached to the request.
impl<S> FromRequestParts<S> for AuthenticatedPrincipal
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthenticatedPrincipal>()
            .cloned()
            .ok_or(AuthError::InvalidToken(TokenType::Access))
    }
}
