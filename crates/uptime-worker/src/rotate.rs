use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{error, info};

use uptime_store::LogStore;

use crate::error::WorkerError;

/// Outcome of one rotation pass, by log id.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RotationReport {
    pub rotated: Vec<String>,
    pub failed: Vec<String>,
}

/// Snapshots every active check log and starts it afresh.
pub struct LogRotator {
    logs: Arc<LogStore>,
}

impl LogRotator {
    pub fn new(logs: Arc<LogStore>) -> Self {
        Self { logs }
    }

    /// Compress each active log to `{id}-{now in epoch millis}` and truncate
    /// it. A log whose snapshot cannot be written keeps its contents; the
    /// remaining logs are still rotated.
    pub async fn rotate_all(&self, now: DateTime<Utc>) -> Result<RotationReport, WorkerError> {
        let stamp = now.timestamp_millis();
        let mut report = RotationReport::default();

        for log_id in self.logs.list(false).await? {
            let snapshot_id = format!("{log_id}-{stamp}");
            match self.logs.rotate(&log_id, &snapshot_id).await {
                Ok(()) => report.rotated.push(log_id),
                Err(e) => {
                    error!(log_id = %log_id, error = %e, "Log rotation failed");
                    report.failed.push(log_id);
                }
            }
        }

        info!(
            rotated = report.rotated.len(),
            failed = report.failed.len(),
            "Log rotation finished"
        );
        Ok(report)
    }
}
