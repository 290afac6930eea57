//! Request and response bodies of the JSON API.

use serde::{Deserialize, Serialize};

use crate::models::{HttpMethod, Protocol, User};

// -- Users --

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct NewUser {
    pub firstname: String,
    pub lastname: String,
    pub phone: String,
    pub password: String,
    pub tos_agreement: bool,
}

/// Partial user edit; at least one optional field must be present.
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct UserUpdate {
    pub phone: String,
    pub firstname: Option<String>,
    pub lastname: Option<String>,
    pub password: Option<String>,
}

/// A user as returned to its owner. Never carries the password hash.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserView {
    pub firstname: String,
    pub lastname: String,
    pub phone: String,
    pub tos_agreement: bool,
    pub checks: Vec<String>,
}

impl From<User> for UserView {
    fn from(user: User) -> Self {
        Self {
            firstname: user.firstname,
            lastname: user.lastname,
            phone: user.phone,
            tos_agreement: user.tos_agreement,
            checks: user.checks,
        }
    }
}

// -- Tokens --

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Credentials {
    pub phone: String,
    pub password: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ExtendRequest {
    pub id: String,
    pub extend: bool,
}

// -- Checks --

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckSpec {
    pub protocol: Protocol,
    pub url: String,
    pub method: HttpMethod,
    pub success_codes: Vec<u16>,
    pub timeout_seconds: u64,
}

/// Fields of a check that may be edited after creation.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CheckUpdate {
    pub protocol: Option<Protocol>,
    pub url: Option<String>,
    pub method: Option<HttpMethod>,
    pub success_codes: Option<Vec<u16>>,
    pub timeout_seconds: Option<u64>,
}

impl CheckUpdate {
    pub fn is_empty(&self) -> bool {
        self.protocol.is_none()
            && self.url.is_none()
            && self.method.is_none()
            && self.success_codes.is_none()
            && self.timeout_seconds.is_none()
    }
}

#[derive(Debug, Deserialize)]
pub struct CheckUpdateRequest {
    pub id: String,
    #[serde(flatten)]
    pub fields: CheckUpdate,
}

// -- Query strings --

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct IdQuery {
    pub id: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct PhoneQuery {
    pub phone: String,
}
