use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::records::Collection;

pub type Result<T> = std::result::Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{collection}/{id} not found")]
    NotFound { collection: Collection, id: String },

    #[error("{collection}/{id} already exists")]
    Conflict { collection: Collection, id: String },

    #[error("invalid record id {id:?}")]
    InvalidId { id: String },

    #[error("could not decode {collection}/{id}: {source}")]
    Decode {
        collection: Collection,
        id: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("could not encode record: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("log {id} not found")]
    LogNotFound { id: String },

    #[error("corrupt log snapshot {id}: {details}")]
    Snapshot { id: String, details: String },

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl StoreError {
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. } | Self::LogNotFound { .. })
    }
}
