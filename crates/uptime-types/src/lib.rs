//! Domain types shared by the store, the API services and the worker.

pub mod api;
pub mod ids;
pub mod models;
pub mod outcome;
pub mod validate;

pub use models::{Check, CheckState, HttpMethod, Protocol, Token, User};
pub use outcome::{LogEntry, ProbeError, ProbeOutcome};
pub use validate::ValidationError;
