use axum::http::{HeaderMap, header};

/// Header carrying the token id on authenticated requests.
pub const TOKEN_HEADER: &str = "token";

/// Token id from the `token` header, falling back to `Authorization: Bearer`.
/// Missing or unreadable headers yield an empty string, which never verifies.
pub fn request_token(headers: &HeaderMap) -> String {
    headers
        .get(TOKEN_HEADER)
        .and_then(|v| v.to_str().ok())
        .or_else(|| {
            headers
                .get(header::AUTHORIZATION)
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.strip_prefix("Bearer "))
        })
        .map(|s| s.trim().to_string())
        .unwrap_or_default()
}
