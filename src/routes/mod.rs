pub mod auth;
pub mod health;

use axum::{
    http::{header, HeaderValue, Method, StatusCode},
    routing::{get, post},
    Router,
};
use tower_http::cors::{AllowHeaders, AllowOrigin, CorsLayer};

use crate::{
    middleware::guard::{GuardedRouter, RoutePolicy},
    models::envelope::ApiResponse,
    services::csrf::CSRF_HEADER_NAME,
    AppState,
};

/// All routes under `config.api_prefix`. Every route passes the guard chain;
/// anything not marked otherwise requires an access token and, on unsafe
/// methods, the CSRF pair.
pub fn router(state: AppState) -> Router {
    GuardedRouter::new(&state.config.api_prefix)
        .route_with("/health", get(health::health_check), RoutePolicy::public())
        // Auth
        .route_with("/auth/login", post(auth::login), RoutePolicy::credential_exchange())
        .route_with(
            "/auth/refresh",
            post(auth::refresh_token),
            RoutePolicy::credential_exchange(),
        )
        .route("/auth/logout", post(auth::logout))
        .route("/auth/me", get(auth::me))
        .build(&state)
        .fallback(not_found)
        .with_state(state)
}

async fn not_found() -> ApiResponse {
    ApiResponse::error(StatusCode::NOT_FOUND, "not found")
}

/// Credentialed CORS for the configured origins. With none configured only
/// localhost is allowed, for local development.
pub fn cors_layer(origins: &[String]) -> CorsLayer {
    let allowed: Vec<String> = origins.to_vec();
    let origin = AllowOrigin::predicate(move |origin: &HeaderValue, _| {
        let Ok(o) = origin.to_str() else {
            return false;
        };
        if allowed.is_empty() {
            return o.starts_with("http://localhost") || o.starts_with("http://127.0.0.1");
        }
        allowed.iter().any(|a| a == o)
    });

    CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(AllowHeaders::list([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            header::ACCEPT,
            header::HeaderName::from_static(CSRF_HEADER_NAME),
        ]))
        .allow_credentials(true)
        .allow_origin(origin)
}
