use thiserror::Error;

use uptime_store::StoreError;
use uptime_types::ValidationError;

/// Failure to hand an alert to the notification provider.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("invalid recipient: {0}")]
    InvalidRecipient(String),

    #[error("invalid message: {0}")]
    InvalidMessage(String),

    #[error("request failed: {0}")]
    Request(String),

    #[error("provider answered with status {status}")]
    Status { status: u16 },
}

/// Failure while processing a single check. Never aborts a sweep.
#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("stored check is invalid: {0}")]
    Invalid(#[from] ValidationError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("could not save probe result: {0}")]
    Persist(StoreError),

    #[error("HTTP client setup failed: {0}")]
    Client(String),
}
