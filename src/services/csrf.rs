use rand::RngCore;
use subtle::ConstantTimeEq;

pub const CSRF_COOKIE_NAME: &str = "csrfToken";
pub const CSRF_HEADER_NAME: &str = "x-csrf-token";

/// Fresh random value for the script-readable CSRF cookie.
pub fn generate_csrf_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Double-submit check: both values present, non-empty and byte-equal.
pub fn tokens_match(cookie: Option<&str>, header: Option<&str>) -> bool {
    match (cookie.map(str::trim), header.map(str::trim)) {
        (Some(c), Some(h)) if !c.is_empty() && !h.is_empty() => c.as_bytes().ct_eq(h.as_bytes()).into(),
        _ => false,
    }
}
