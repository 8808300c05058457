use axum::http::{header, HeaderMap};

const BEARER: &str = "Bearer";

/// Extract the token from `Authorization: Bearer <token>`.
///
/// Returns `None` when the header is absent, not valid UTF-8, uses another
/// scheme, or carries an empty or multi-part token.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case(BEARER) {
        return None;
    }
    let token = token.trim();
    if token.is_empty() || token.contains(char::is_whitespace) {
        return None;
    }
    Some(token)
}
