use std::io::{ErrorKind, Read, Write};
use std::path::PathBuf;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use serde::Serialize;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use crate::error::{Result, StoreError};
use crate::locks::KeyedLocks;

const LOG_EXT: &str = ".log";
const SNAPSHOT_EXT: &str = ".gz.b64";

/// Append-only log files, one per check, plus compressed snapshots.
///
/// Active logs are `{dir}/{id}.log` (newline-delimited JSON). Rotation writes
/// the gzip of a log, base64-encoded, to `{dir}/{new_id}.gz.b64` and then
/// empties the active file. Appends and rotation of the same log are
/// serialized so no line is lost between the snapshot and the truncate.
pub struct LogStore {
    dir: PathBuf,
    locks: KeyedLocks<String>,
}

impl LogStore {
    pub async fn new(dir: PathBuf) -> Result<Self> {
        fs::create_dir_all(&dir)
            .await
            .map_err(|e| StoreError::io(&dir, e))?;
        info!("Log directory: {}", dir.display());
        Ok(Self {
            dir,
            locks: KeyedLocks::new(),
        })
    }

    fn log_path(&self, id: &str) -> Result<PathBuf> {
        Ok(self.dir.join(format!("{}{LOG_EXT}", checked_id(id)?)))
    }

    fn snapshot_path(&self, id: &str) -> Result<PathBuf> {
        Ok(self.dir.join(format!("{}{SNAPSHOT_EXT}", checked_id(id)?)))
    }

    /// Append one line, creating the log if it does not exist yet.
    pub async fn append(&self, log_id: &str, line: &str) -> Result<()> {
        let path = self.log_path(log_id)?;
        let _guard = self.locks.lock(&log_id.to_string()).await;
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(|e| StoreError::io(&path, e))?;
        let mut buf = Vec::with_capacity(line.len() + 1);
        buf.extend_from_slice(line.as_bytes());
        buf.push(b'\n');
        file.write_all(&buf)
            .await
            .map_err(|e| StoreError::io(&path, e))?;
        file.flush().await.map_err(|e| StoreError::io(&path, e))?;
        Ok(())
    }

    /// Serialize `entry` as one JSON line and append it.
    pub async fn append_json<T: Serialize>(&self, log_id: &str, entry: &T) -> Result<()> {
        let line = serde_json::to_string(entry).map_err(StoreError::Encode)?;
        self.append(log_id, &line).await
    }

    /// Names of active logs, plus snapshots when `include_compressed` is set.
    pub async fn list(&self, include_compressed: bool) -> Result<Vec<String>> {
        let mut entries = fs::read_dir(&self.dir)
            .await
            .map_err(|e| StoreError::io(&self.dir, e))?;
        let mut names = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| StoreError::io(&self.dir, e))?
        {
            let file_name = entry.file_name();
            let Some(file_name) = file_name.to_str() else { continue };
            if let Some(id) = file_name.strip_suffix(LOG_EXT) {
                names.push(id.to_string());
            } else if include_compressed {
                if let Some(id) = file_name.strip_suffix(SNAPSHOT_EXT) {
                    names.push(id.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }

    /// Write a compressed copy of `log_id` to the snapshot `new_id`.
    pub async fn compress(&self, log_id: &str, new_id: &str) -> Result<()> {
        let _guard = self.locks.lock(&log_id.to_string()).await;
        self.compress_locked(log_id, new_id).await
    }

    pub async fn truncate(&self, log_id: &str) -> Result<()> {
        let _guard = self.locks.lock(&log_id.to_string()).await;
        self.truncate_locked(log_id).await
    }

    /// Compress then truncate, holding the log's lock across both steps.
    /// A failed compression leaves the active log untouched.
    pub async fn rotate(&self, log_id: &str, new_id: &str) -> Result<()> {
        let _guard = self.locks.lock(&log_id.to_string()).await;
        self.compress_locked(log_id, new_id).await?;
        self.truncate_locked(log_id).await
    }

    /// Text of a snapshot written by `compress`.
    pub async fn decompress(&self, snapshot_id: &str) -> Result<String> {
        let path = self.snapshot_path(snapshot_id)?;
        let encoded = match fs::read_to_string(&path).await {
            Ok(s) => s,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(StoreError::LogNotFound {
                    id: snapshot_id.to_string(),
                });
            }
            Err(e) => return Err(StoreError::io(&path, e)),
        };

        let id = snapshot_id.to_string();
        tokio::task::spawn_blocking(move || gunzip_base64(&encoded))
            .await
            .map_err(|e| StoreError::Snapshot {
                id: id.clone(),
                details: format!("decompression task failed: {e}"),
            })?
            .map_err(|details| StoreError::Snapshot { id, details })
    }

    async fn compress_locked(&self, log_id: &str, new_id: &str) -> Result<()> {
        let source = self.log_path(log_id)?;
        let target = self.snapshot_path(new_id)?;
        let data = match fs::read(&source).await {
            Ok(d) => d,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(StoreError::LogNotFound {
                    id: log_id.to_string(),
                });
            }
            Err(e) => return Err(StoreError::io(&source, e)),
        };

        let encoded = tokio::task::spawn_blocking(move || gzip_base64(&data))
            .await
            .map_err(|e| StoreError::io(&source, std::io::Error::other(e)))?
            .map_err(|e| StoreError::io(&source, e))?;

        fs::write(&target, encoded)
            .await
            .map_err(|e| StoreError::io(&target, e))?;
        debug!(log_id, new_id, "Log compressed");
        Ok(())
    }

    async fn truncate_locked(&self, log_id: &str) -> Result<()> {
        let path = self.log_path(log_id)?;
        match fs::OpenOptions::new()
            .write(true)
            .truncate(true)
            .open(&path)
            .await
        {
            Ok(_) => {
                debug!(log_id, "Log truncated");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Err(StoreError::LogNotFound {
                id: log_id.to_string(),
            }),
            Err(e) => Err(StoreError::io(&path, e)),
        }
    }
}

fn checked_id(id: &str) -> Result<&str> {
    let ok = !id.is_empty()
        && id
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_');
    if ok {
        Ok(id)
    } else {
        Err(StoreError::InvalidId { id: id.to_string() })
    }
}

fn gzip_base64(data: &[u8]) -> std::io::Result<String> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    Ok(BASE64.encode(encoder.finish()?))
}

fn gunzip_base64(encoded: &str) -> std::result::Result<String, String> {
    let compressed = BASE64
        .decode(encoded.trim())
        .map_err(|e| format!("invalid base64: {e}"))?;
    let mut text = String::new();
    GzDecoder::new(compressed.as_slice())
        .read_to_string(&mut text)
        .map_err(|e| format!("invalid gzip: {e}"))?;
    Ok(text)
}
