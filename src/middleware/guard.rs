//! Guard chain for every route: access token, then CSRF, then role.
//!
//! Routes are registered through [`GuardedRouter`], which records each route's
//! [`RoutePolicy`] and installs the chain once over all of them. A route that
//! declares nothing gets [`RoutePolicy::authenticated`].

use std::{collections::HashMap, sync::Arc};

use axum::{
    extract::{MatchedPath, Request, State},
    http::{HeaderMap, Method},
    middleware::{self, Next},
    response::Response,
    routing::MethodRouter,
    Router,
};

use crate::{
    error::AuthError,
    middleware::{auth::authenticate, cookies::get_cookie},
    models::{auth::AuthenticatedPrincipal, principal::Role},
    services::{
        csrf::{tokens_match, CSRF_COOKIE_NAME, CSRF_HEADER_NAME},
        token::TokenCodec,
    },
    AppState,
};

#[derive(Debug, Clone, Default)]
pub struct RoutePolicy {
    /// Skip the access-token guard.
    pub public: bool,
    /// Skip the CSRF guard (credential-presenting endpoints only).
    pub csrf_exempt: bool,
    /// Empty means any authenticated principal.
    pub roles: Vec<Role>,
}

impl RoutePolicy {
    pub fn authenticated() -> Self {
        Self::default()
    }

    /// Login and refresh: no bearer token yet, no CSRF cookie yet.
    pub fn credential_exchange() -> Self {
        Self {
            public: true,
            csrf_exempt: true,
            roles: Vec::new(),
        }
    }

    pub fn public() -> Self {
        Self {
            public: true,
            ..Self::default()
        }
    }

    pub fn with_roles(mut self, roles: impl IntoIterator<Item = Role>) -> Self {
        self.roles = roles.into_iter().collect();
        self
    }
}

/// Route table whose every entry sits behind the guard chain.
pub struct GuardedRouter {
    prefix: String,
    router: Router<AppState>,
    policies: HashMap<String, RoutePolicy>,
}

impl GuardedRouter {
    /// `prefix` is prepended to every path; use `""` for none.
    pub fn new(prefix: &str) -> Self {
        Self {
            prefix: prefix.to_string(),
            router: Router::new(),
            policies: HashMap::new(),
        }
    }

    /// Register a route with the default policy (authenticated, CSRF-checked).
    pub fn route(self, path: &str, method_router: MethodRouter<AppState>) -> Self {
        self.route_with(path, method_router, RoutePolicy::authenticated())
    }

    pub fn route_with(
        mut self,
        path: &str,
        method_router: MethodRouter<AppState>,
        policy: RoutePolicy,
    ) -> Self {
        let full = format!("{}{}", self.prefix, path);
        self.router = self.router.route(&full, method_router);
        self.policies.insert(full, policy);
        self
    }

    /// Install the guard chain over every registered route.
    pub fn build(self, state: &AppState) -> Router<AppState> {
        let guard = GuardState {
            codec: state.codec.clone(),
            policies: Arc::new(self.policies),
        };
        self.router
            .route_layer(middleware::from_fn_with_state(guard, guard_chain))
    }
}

#[derive(Clone)]
struct GuardState {
    codec: Arc<TokenCodec>,
    policies: Arc<HashMap<String, RoutePolicy>>,
}

impl GuardState {
    fn policy_for(&self, request: &Request) -> RoutePolicy {
        request
            .extensions()
            .get::<MatchedPath>()
            .and_then(|path| self.policies.get(path.as_str()))
            .cloned()
            .unwrap_or_default()
    }
}

async fn guard_chain(
    State(guard): State<GuardState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let policy = guard.policy_for(&request);

    let principal = if policy.public {
        None
    } else {
        Some(authenticate(request.headers(), &guard.codec)?)
    };

    check_csrf(request.method(), request.headers(), &policy)?;
    check_roles(principal.as_ref(), &policy)?;

    if let Some(principal) = principal {
        request.extensions_mut().insert(principal);
    }
    Ok(next.run(request).await)
}

fn is_safe_method(method: &Method) -> bool {
    matches!(*method, Method::GET | Method::HEAD | Method::OPTIONS)
}

pub fn check_csrf(method: &Method, headers: &HeaderMap, policy: &RoutePolicy) -> Result<(), AuthError> {
    if is_safe_method(method) || policy.csrf_exempt {
        return Ok(());
    }

    let cookie = get_cookie(headers, CSRF_COOKIE_NAME);
    let header = headers
        .get(CSRF_HEADER_NAME)
        .and_then(|v| v.to_str().ok());

    if tokens_match(cookie.as_deref(), header) {
        Ok(())
    } else {
        Err(AuthError::CsrfMismatch)
    }
}

pub fn check_roles(
    principal: Option<&AuthenticatedPrincipal>,
    policy: &RoutePolicy,
) -> Result<(), AuthError> {
    if policy.roles.is_empty() {
        return Ok(());
    }
    match principal {
        Some(p) if policy.roles.contains(&p.role) => Ok(()),
        _ => Err(AuthError::Forbidden),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        db::MemoryCredentialStore,
        models::{
            auth::{TokenPayload, TokenType},
            envelope::ApiResponse,
        },
        test_support::test_state,
    };
    use axum::{
        body::Body,
        http::{header, StatusCode},
        routing::{get, post},
        Router,
    };
    use tower::ServiceExt;
    use uuid::Uuid;

    async fn ok() -> &'static str {
        "ok"
    }

    fn app(state: &AppState) -> Router {
        GuardedRouter::new("")
            .route("/open", get(ok).post(ok))
            .route_with(
                "/super",
                get(ok),
                RoutePolicy::authenticated().with_roles([Role::Super]),
            )
            .route_with("/exchange", post(ok), RoutePolicy::credential_exchange())
            .route_with("/public", post(ok), RoutePolicy::public())
            .build(state)
            .with_state(state.clone())
    }

    fn token(state: &AppState, role: Role, token_type: TokenType) -> String {
        state
            .codec
            .sign(
                &TokenPayload {
                    subject_id: Uuid::new_v4(),
                    username: "u".into(),
                    role,
                    token_type,
                    token_id: Uuid::new_v4(),
                },
                60,
            )
            .unwrap()
    }

    async fn call(app: Router, request: axum::http::Request<Body>) -> (StatusCode, Option<ApiResponse>) {
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&body).ok())
    }

    fn request(method: Method, uri: &str, bearer: Option<&str>) -> axum::http::request::Builder {
        let mut builder = axum::http::Request::builder().method(method).uri(uri);
        if let Some(t) = bearer {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {t}"));
        }
        builder
    }

    #[tokio::test]
    async fn get_passes_without_csrf() {
        let state = test_state(Arc::new(MemoryCredentialStore::new()));
        let access = token(&state, Role::Normal, TokenType::Access);
        let (status, _) = call(
            app(&state),
            request(Method::GET, "/open", Some(&access)).body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn missing_token_is_unauthorized_envelope() {
        let state = test_state(Arc::new(MemoryCredentialStore::new()));
        let (status, body) = call(
            app(&state),
            request(Method::GET, "/open", None).body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        let body = body.unwrap();
        assert_eq!(body.code, 401);
        assert_eq!(body.message, "invalid access token");
    }

    #[tokio::test]
    async fn refresh_token_cannot_be_used_as_bearer() {
        let state = test_state(Arc::new(MemoryCredentialStore::new()));
        let refresh = token(&state, Role::Super, TokenType::Refresh);
        let (status, _) = call(
            app(&state),
            request(Method::GET, "/open", Some(&refresh)).body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn unsafe_method_requires_matching_csrf_pair() {
        let state = test_state(Arc::new(MemoryCredentialStore::new()));
        let access = token(&state, Role::Normal, TokenType::Access);

        let no_pair = request(Method::POST, "/open", Some(&access)).body(Body::empty()).unwrap();
        let cookie_only = request(Method::POST, "/open", Some(&access))
            .header(header::COOKIE, "csrfToken=abc")
            .body(Body::empty())
            .unwrap();
        let mismatch = request(Method::POST, "/open", Some(&access))
            .header(header::COOKIE, "csrfToken=abc")
            .header(CSRF_HEADER_NAME, "abd")
            .body(Body::empty())
            .unwrap();
        for req in [no_pair, cookie_only, mismatch] {
            let (status, body) = call(app(&state), req).await;
            assert_eq!(status, StatusCode::FORBIDDEN);
            assert_eq!(body.unwrap().message, "invalid csrf token");
        }

        let matching = request(Method::POST, "/open", Some(&access))
            .header(header::COOKIE, "csrfToken=abc")
            .header(CSRF_HEADER_NAME, "abc")
            .body(Body::empty())
            .unwrap();
        let (status, _) = call(app(&state), matching).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn access_guard_runs_before_csrf() {
        let state = test_state(Arc::new(MemoryCredentialStore::new()));
        let (status, _) = call(
            app(&state),
            request(Method::POST, "/open", None).body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn credential_exchange_skips_token_and_csrf() {
        let state = test_state(Arc::new(MemoryCredentialStore::new()));
        let (status, _) = call(
            app(&state),
            request(Method::POST, "/exchange", None).body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn role_guard_checks_declared_roles() {
        let state = test_state(Arc::new(MemoryCredentialStore::new()));
        let normal = token(&state, Role::Normal, TokenType::Access);
        let superuser = token(&state, Role::Super, TokenType::Access);

        let (status, body) = call(
            app(&state),
            request(Method::GET, "/super", Some(&normal)).body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body.unwrap().message, "forbidden");

        let (status, _) = call(
            app(&state),
            request(Method::GET, "/super", Some(&superuser)).body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        // Same NORMAL principal on a route with no declared roles.
        let (status, _) = call(
            app(&state),
            request(Method::GET, "/open", Some(&normal)).body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn route_without_declared_policy_requires_a_bearer_token() {
        let state = test_state(Arc::new(MemoryCredentialStore::new()));
        let app = GuardedRouter::new("/api/v1")
            .route("/undeclared", post(ok).get(ok))
            .build(&state)
            .with_state(state.clone());

        for method in [Method::GET, Method::POST] {
            let (status, body) = call(
                app.clone(),
                request(method, "/api/v1/undeclared", None).body(Body::empty()).unwrap(),
            )
            .await;
            assert_eq!(status, StatusCode::UNAUTHORIZED);
            assert_eq!(body.unwrap().message, "invalid access token");
        }

        // Authenticated but no CSRF pair: still refused on an unsafe method.
        let access = token(&state, Role::Normal, TokenType::Access);
        let (status, _) = call(
            app,
            request(Method::POST, "/api/v1/undeclared", Some(&access)).body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn public_route_still_checks_csrf_on_unsafe_methods() {
        let state = test_state(Arc::new(MemoryCredentialStore::new()));
        let (status, _) = call(
            app(&state),
            request(Method::POST, "/public", None).body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[test]
    fn declared_roles_reject_anonymous() {
        let policy = RoutePolicy::public().with_roles([Role::Normal]);
        assert!(matches!(check_roles(None, &policy), Err(AuthError::Forbidden)));
        assert!(check_roles(None, &RoutePolicy::public()).is_ok());
    }
}
