use axum::{
    body::Bytes,
    extract::{rejection::JsonRejection, State},
    http::{header, HeaderMap},
    response::{AppendHeaders, IntoResponse, Response},
    Json,
};
use serde_json::Value;

use crate::{
    error::AuthError,
    middleware::cookies::{
        clear_csrf_cookie, clear_refresh_cookie, csrf_cookie, get_cookie, refresh_cookie,
        REFRESH_COOKIE_NAME,
    },
    models::{
        auth::{
            AuthenticatedPrincipal, LoginRequest, RefreshTokenRequest, TokenPair, TokenResponse,
            TokenType,
        },
        envelope::ApiResponse,
    },
    services::csrf::generate_csrf_token,
    AppState,
};

/// Token body plus a fresh CSRF cookie (and the refresh cookie in cookie mode).
fn token_response(state: &AppState, pair: TokenPair) -> Response {
    let config = &state.config;
    let max_age = config.refresh_ttl_days * 86400;

    let mut cookies = vec![(
        header::SET_COOKIE,
        csrf_cookie(&generate_csrf_token(), max_age, config.cookie_secure),
    )];
    if config.refresh_token_cookie {
        cookies.push((
            header::SET_COOKIE,
            refresh_cookie(
                &pair.refresh_token,
                &config.refresh_cookie_path(),
                max_age,
                config.cookie_secure,
            ),
        ));
    }

    (
        AppendHeaders(cookies),
        ApiResponse::ok(TokenResponse::from(pair)),
    )
        .into_response()
}

pub async fn login(
    State(state): State<AppState>,
    body: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Response, AuthError> {
    let Json(body) = body.map_err(|e| AuthError::Validation(format!("validation error: {}", e.body_text())))?;
    if body.username.trim().is_empty() || body.password.is_empty() {
        return Err(AuthError::Validation(
            "validation error: username and password are required".to_string(),
        ));
    }

    let pair = state.auth.login(&body.username, &body.password).await?;
    Ok(token_response(&state, pair))
}

/// Refresh token comes from the JSON body, falling back to the httpOnly cookie.
pub async fn refresh_token(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, AuthError> {
    let from_body = if body.is_empty() {
        None
    } else {
        serde_json::from_slice::<RefreshTokenRequest>(&body)
            .map_err(|e| AuthError::Validation(format!("validation error: {e}")))?
            .refresh_token
    };

    let presented = from_body
        .filter(|t| !t.trim().is_empty())
        .or_else(|| get_cookie(&headers, REFRESH_COOKIE_NAME))
        .ok_or(AuthError::InvalidToken(TokenType::Refresh))?;

    let pair = state.auth.refresh(presented.trim()).await?;
    Ok(token_response(&state, pair))
}

pub async fn logout(
    State(state): State<AppState>,
    principal: AuthenticatedPrincipal,
) -> Result<Response, AuthError> {
    state.auth.logout(principal.subject_id).await?;

    Ok((
        AppendHeaders([
            (header::SET_COOKIE, clear_csrf_cookie()),
            (
                header::SET_COOKIE,
                clear_refresh_cookie(&state.config.refresh_cookie_path()),
            ),
        ]),
        ApiResponse::ok(Value::Null),
    )
        .into_response())
}

pub async fn me(principal: AuthenticatedPrincipal) -> ApiResponse<AuthenticatedPrincipal> {
    ApiResponse::ok(principal)
}
