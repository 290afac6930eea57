use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::ids;
use crate::validate::{self, ValidationError};

// -- Users --

/// Stored user record, keyed by phone number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub firstname: String,
    pub lastname: String,
    pub phone: String,
    pub hashed_password: String,
    pub tos_agreement: bool,
    #[serde(default)]
    pub checks: Vec<String>,
}

// -- Tokens --

/// Stored bearer token, keyed by its random id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Token {
    pub id: String,
    pub phone: String,
    pub expires: DateTime<Utc>,
}

impl Token {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires <= now
    }

    /// A token authorizes `phone` only while it has not expired.
    pub fn grants(&self, phone: &str, now: DateTime<Utc>) -> bool {
        self.phone == phone && !self.is_expired(now)
    }
}

// -- Checks --

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Http,
    Https,
}

impl Protocol {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Http => "http",
            Self::Https => "https",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
}

impl HttpMethod {
    /// Upper-case wire name, as sent on the request line.
    pub fn as_upper(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckState {
    Up,
    #[default]
    Down,
}

impl fmt::Display for CheckState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Up => "up",
            Self::Down => "down",
        })
    }
}

/// A monitored URL and the result of its most recent probe.
///
/// `last_checked` is absent until the worker has probed the check once; the
/// first observed state never raises an alert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Check {
    pub id: String,
    pub user_phone: String,
    pub protocol: Protocol,
    pub url: String,
    pub method: HttpMethod,
    pub success_codes: Vec<u16>,
    pub timeout_seconds: u64,
    #[serde(default)]
    pub state: CheckState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_checked: Option<DateTime<Utc>>,
}

impl Check {
    /// Re-apply the creation-time constraints to a stored record.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if !ids::is_generated_id(&self.id) {
            return Err(ValidationError(format!("malformed check id {:?}", self.id)));
        }
        validate::phone(&self.user_phone)?;
        validate::success_codes(&self.success_codes)?;
        validate::timeout_seconds(self.timeout_seconds)?;
        self.target()?;
        Ok(())
    }

    /// Full probe URL, `{protocol}://{url}`.
    pub fn target(&self) -> Result<Url, ValidationError> {
        validate::target(self.protocol, &self.url)
    }

    /// Human-readable description used in alert messages.
    pub fn describe(&self) -> String {
        format!("{} {}://{}", self.method.as_upper(), self.protocol, self.url)
    }
}
