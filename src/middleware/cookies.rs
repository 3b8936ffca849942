use axum::http::{header, HeaderMap};

use crate::services::csrf::CSRF_COOKIE_NAME;

pub const REFRESH_COOKIE_NAME: &str = "refreshToken";

/// Extract a named cookie value from request headers.
pub fn get_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    let prefix = format!("{name}=");
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .find_map(|part| part.trim().strip_prefix(&prefix).map(String::from))
}

fn secure_attr(secure: bool) -> &'static str {
    if secure {
        "; Secure"
    } else {
        ""
    }
}

/// Script-readable on purpose: the client echoes it back in `X-CSRF-Token`.
pub fn csrf_cookie(token: &str, max_age_secs: u64, secure: bool) -> String {
    format!(
        "{CSRF_COOKIE_NAME}={token}; SameSite=Lax; Path=/; Max-Age={max_age_secs}{}",
        secure_attr(secure)
    )
}

pub fn refresh_cookie(token: &str, path: &str, max_age_secs: u64, secure: bool) -> String {
    format!(
        "{REFRESH_COOKIE_NAME}={token}; HttpOnly; SameSite=Strict; Path={path}; Max-Age={max_age_secs}{}",
        secure_attr(secure)
    )
}

pub fn clear_csrf_cookie() -> String {
    format!("{CSRF_COOKIE_NAME}=; SameSite=Lax; Path=/; Max-Age=0")
}

pub fn clear_refresh_cookie(path: &str) -> String {
    format!("{REFRESH_COOKIE_NAME}=; HttpOnly; SameSite=Strict; Path={path}; Max-Age=0")
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn finds_cookie_among_several() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; csrfToken=abc123; other=1"),
        );
        assert_eq!(get_cookie(&headers, "csrfToken").as_deref(), Some("abc123"));
        assert_eq!(get_cookie(&headers, "missing"), None);
        // Prefix of another cookie's name must not match.
        assert_eq!(get_cookie(&headers, "csrf"), None);
    }

    #[test]
    fn refresh_cookie_is_http_only_and_path_scoped() {
        let cookie = refresh_cookie("tok", "/api/v1/auth/refresh", 60, true);
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("Path=/api/v1/auth/refresh"));
        assert!(cookie.ends_with("; Secure"));
        assert!(!csrf_cookie("tok", 60, false).contains("HttpOnly"));
    }
}
