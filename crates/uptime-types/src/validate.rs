//! Field validation shared by request handling and the probe worker.
//!
//! The worker re-validates every stored check with the same rules that gate
//! creation, so a record edited on disk cannot smuggle in a wider timeout or
//! an unparseable target.

use thiserror::Error;
use url::Url;

use crate::models::Protocol;

pub const PHONE_LEN: usize = 10;
pub const MIN_TIMEOUT_SECS: u64 = 1;
pub const MAX_TIMEOUT_SECS: u64 = 5;

/// A rejected input field. The message is safe to return to callers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct ValidationError(pub String);

impl ValidationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Trimmed phone number; exactly ten ASCII digits.
pub fn phone(raw: &str) -> Result<String, ValidationError> {
    let phone = raw.trim();
    if phone.len() == PHONE_LEN && phone.bytes().all(|b| b.is_ascii_digit()) {
        Ok(phone.to_string())
    } else {
        Err(ValidationError::new("phone must be exactly 10 digits"))
    }
}

/// Trimmed, non-empty text field.
pub fn required(field: &str, raw: &str) -> Result<String, ValidationError> {
    let value = raw.trim();
    if value.is_empty() {
        Err(ValidationError(format!("missing required field: {field}")))
    } else {
        Ok(value.to_string())
    }
}

pub fn timeout_seconds(secs: u64) -> Result<u64, ValidationError> {
    if (MIN_TIMEOUT_SECS..=MAX_TIMEOUT_SECS).contains(&secs) {
        Ok(secs)
    } else {
        Err(ValidationError(format!(
            "timeoutSeconds must be between {MIN_TIMEOUT_SECS} and {MAX_TIMEOUT_SECS}"
        )))
    }
}

pub fn success_codes(codes: &[u16]) -> Result<(), ValidationError> {
    if codes.is_empty() {
        return Err(ValidationError::new("successCodes must not be empty"));
    }
    if let Some(bad) = codes.iter().find(|c| !(100..=599).contains(*c)) {
        return Err(ValidationError(format!("{bad} is not an HTTP status code")));
    }
    Ok(())
}

/// Parse the probe target `{protocol}://{url}`. The url is stored without a
/// scheme, so one that already carries `://` is rejected.
pub fn target(protocol: Protocol, url: &str) -> Result<Url, ValidationError> {
    let url = url.trim();
    if url.is_empty() {
        return Err(ValidationError::new("missing required field: url"));
    }
    if url.contains("://") {
        return Err(ValidationError::new("url must not include a scheme"));
    }
    let parsed = Url::parse(&format!("{protocol}://{url}"))
        .map_err(|e| ValidationError(format!("url is not valid: {e}")))?;
    match parsed.host_str() {
        Some(host) if !host.is_empty() => Ok(parsed),
        _ => Err(ValidationError::new("url has no hostname")),
    }
}
