use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{Check, CheckState};

/// Why a probe produced no usable response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeError {
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub timeout: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ProbeError {
    pub fn timeout() -> Self {
        Self { timeout: true, message: None }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self { timeout: false, message: Some(message.into()) }
    }
}

/// Result of one probe. Absent fields are written as `false`, so a plain
/// non-matching response reads `{"error":false,"responseCode":500}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProbeOutcome {
    #[serde(default, with = "false_or")]
    pub error: Option<ProbeError>,
    #[serde(default, with = "false_or")]
    pub response_code: Option<u16>,
}

impl ProbeOutcome {
    pub fn responded(code: u16) -> Self {
        Self { error: None, response_code: Some(code) }
    }

    pub fn failed(error: ProbeError) -> Self {
        Self { error: Some(error), response_code: None }
    }

    /// Up iff the request completed and its status is an accepted code.
    pub fn state(&self, success_codes: &[u16]) -> CheckState {
        match (&self.error, self.response_code) {
            (None, Some(code)) if success_codes.contains(&code) => CheckState::Up,
            _ => CheckState::Down,
        }
    }
}

/// One NDJSON line in a check's log file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    pub check: Check,
    pub outcome: ProbeOutcome,
    pub state: CheckState,
    pub alert: bool,
    pub alert_delivered: bool,
    pub time: DateTime<Utc>,
}

mod false_or {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<T, S>(value: &Option<T>, serializer: S) -> Result<S::Ok, S::Error>
    where
        T: Serialize,
        S: Serializer,
    {
        match value {
            Some(v) => v.serialize(serializer),
            None => serializer.serialize_bool(false),
        }
    }

    pub fn deserialize<'de, T, D>(deserializer: D) -> Result<Option<T>, D::Error>
    where
        T: Deserialize<'de>,
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr<T> {
            Flag(bool),
            Value(T),
        }

        Ok(match Option::<Repr<T>>::deserialize(deserializer)? {
            Some(Repr::Value(v)) => Some(v),
            Some(Repr::Flag(_)) | None => None,
        })
    }
}
