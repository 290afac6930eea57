//! Flat-file persistence: JSON records grouped by collection, and
//! append-only per-check log files with compressed snapshots.

pub mod error;
mod locks;
pub mod logs;
pub mod records;

pub use error::{Result, StoreError};
pub use logs::LogStore;
pub use records::{Collection, RecordStore};
