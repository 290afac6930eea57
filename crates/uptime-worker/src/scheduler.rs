use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::rotate::LogRotator;
use crate::worker::CheckWorker;

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub check_interval: Duration,
    pub rotate_interval: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            check_interval: Duration::from_secs(60),
            rotate_interval: Duration::from_secs(24 * 60 * 60),
        }
    }
}

/// Drives the probe sweep and the log rotation on independent timers.
///
/// Both fire once immediately. A sweep that outlasts its period delays the
/// next one instead of overlapping it. Cancellation is observed between
/// runs, so a sweep in progress completes.
pub struct Scheduler {
    worker: Arc<CheckWorker>,
    rotator: Arc<LogRotator>,
    config: SchedulerConfig,
}

impl Scheduler {
    pub fn new(worker: Arc<CheckWorker>, rotator: Arc<LogRotator>, config: SchedulerConfig) -> Self {
        Self {
            worker,
            rotator,
            config,
        }
    }

    pub fn spawn(self, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            tokio::join!(
                sweep_loop(self.worker, self.config.check_interval, cancel.clone()),
                rotate_loop(self.rotator, self.config.rotate_interval, cancel),
            );
            info!("Scheduler stopped");
        })
    }
}

async fn sweep_loop(worker: Arc<CheckWorker>, period: Duration, cancel: CancellationToken) {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                match worker.run_sweep().await {
                    Ok(report) => info!(
                        probed = report.probed,
                        skipped = report.skipped,
                        failed = report.failed,
                        alerts = report.alerts,
                        "Sweep finished"
                    ),
                    Err(e) => error!(error = %e, "Sweep failed"),
                }
            }
        }
    }
}

async fn rotate_loop(rotator: Arc<LogRotator>, period: Duration, cancel: CancellationToken) {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                if let Err(e) = rotator.rotate_all(Utc::now()).await {
                    error!(error = %e, "Log rotation failed");
                }
            }
        }
    }
}
