use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use uptime_store::{Collection, LogStore, RecordStore, StoreError};
use uptime_types::{Check, LogEntry};

use crate::error::WorkerError;
use crate::notify::Notifier;
use crate::probe::Prober;

pub const DEFAULT_PROBE_CONCURRENCY: usize = 32;

/// Tally of one pass over every stored check.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepReport {
    pub probed: usize,
    pub skipped: usize,
    pub failed: usize,
    pub alerts: usize,
}

/// Probes every check, records its new state and alerts on transitions.
pub struct CheckWorker {
    store: Arc<RecordStore>,
    logs: Arc<LogStore>,
    prober: Prober,
    notifier: Arc<dyn Notifier>,
    concurrency: usize,
}

impl CheckWorker {
    pub fn new(
        store: Arc<RecordStore>,
        logs: Arc<LogStore>,
        prober: Prober,
        notifier: Arc<dyn Notifier>,
        concurrency: usize,
    ) -> Self {
        Self {
            store,
            logs,
            prober,
            notifier,
            concurrency: concurrency.max(1),
        }
    }

    /// Process every stored check once, at most `concurrency` at a time.
    /// Returns after the last probe has finished.
    pub async fn run_sweep(self: &Arc<Self>) -> Result<SweepReport, WorkerError> {
        let ids = self.store.list(Collection::Checks).await?;
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut tasks = JoinSet::new();

        for id in ids {
            let Ok(permit) = semaphore.clone().acquire_owned().await else {
                break;
            };
            let worker = Arc::clone(self);
            tasks.spawn(async move {
                let _permit = permit;
                let result = worker.process_check(&id).await;
                (id, result)
            });
        }

        let mut report = SweepReport::default();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((_, Ok(entry))) => {
                    report.probed += 1;
                    if entry.alert {
                        report.alerts += 1;
                    }
                }
                Ok((id, Err(e))) if is_skippable(&e) => {
                    warn!(check_id = %id, error = %e, "Skipping check");
                    report.skipped += 1;
                }
                Ok((id, Err(e))) => {
                    error!(check_id = %id, error = %e, "Check processing failed");
                    report.failed += 1;
                }
                Err(e) => {
                    error!("Probe task panicked: {}", e);
                    report.failed += 1;
                }
            }
        }
        Ok(report)
    }

    /// Probe one check and record the result.
    ///
    /// The new state is persisted before any alert goes out; a failed
    /// delivery is logged and never undoes the state change. A log entry is
    /// appended whether or not an alert was sent, unless the check was
    /// deleted while it was being probed.
    pub async fn process_check(&self, id: &str) -> Result<LogEntry, WorkerError> {
        let check: Check = self.store.read(Collection::Checks, id).await?;
        check.validate()?;

        let outcome = self.prober.probe(&check).await;
        let state = outcome.state(&check.success_codes);
        let now = Utc::now();

        // Only state and lastChecked are written, over the freshest record.
        let persisted = self
            .store
            .modify(Collection::Checks, id, |stored: &mut Check| {
                let transition = stored.last_checked.is_some() && stored.state != state;
                stored.state = state;
                stored.last_checked = Some(now);
                Ok::<_, StoreError>(transition)
            })
            .await;

        let (alert, persist_error) = match persisted {
            Ok(transition) => (transition, None),
            Err(e) if e.is_not_found() => {
                // Deleted mid-probe: no alert and no log for a check that is gone.
                info!(check_id = %id, "Check deleted during probe, result dropped");
                return Err(WorkerError::Persist(e));
            }
            Err(e) => (false, Some(e)),
        };

        let mut alert_delivered = false;
        if alert {
            let message = format!(
                "Alert: Your check for {} is currently {}",
                check.describe(),
                state
            );
            match self.notifier.send(&check.user_phone, &message).await {
                Ok(()) => {
                    alert_delivered = true;
                    info!(check_id = %id, %state, "Alert sent");
                }
                Err(e) => warn!(check_id = %id, error = %e, "Alert delivery failed"),
            }
        } else {
            debug!(check_id = %id, %state, "No state change");
        }

        // The snapshot is the record as loaded, before this probe changed it.
        let entry = LogEntry {
            check,
            outcome,
            state,
            alert,
            alert_delivered,
            time: now,
        };
        self.logs.append_json(id, &entry).await?;

        match persist_error {
            Some(e) => Err(WorkerError::Persist(e)),
            None => Ok(entry),
        }
    }
}

/// Records that cannot be processed this sweep but are not worker faults.
fn is_skippable(error: &WorkerError) -> bool {
    match error {
        WorkerError::Invalid(_) => true,
        WorkerError::Store(e) => {
            matches!(e, StoreError::Decode { .. } | StoreError::NotFound { .. })
        }
        WorkerError::Persist(_) | WorkerError::Client(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use std::net::SocketAddr;
    use std::time::Duration;

    use chrono::DateTime;
    use tempfile::TempDir;

    use super::*;
    use crate::testing::{RecordingNotifier, check_for, serve, slow_router, status_router};
    use uptime_types::{CheckState, ProbeError, ProbeOutcome};

    struct Fixture {
        tmp: TempDir,
        store: Arc<RecordStore>,
        notifier: Arc<RecordingNotifier>,
        worker: Arc<CheckWorker>,
    }

    impl Fixture {
        async fn new(notifier: RecordingNotifier) -> Self {
            let tmp = TempDir::new().unwrap();
            let store = Arc::new(RecordStore::new(tmp.path().join("data")).await.unwrap());
            let logs = Arc::new(LogStore::new(tmp.path().join("logs")).await.unwrap());
            let notifier = Arc::new(notifier);
            let worker = Arc::new(CheckWorker::new(
                store.clone(),
                logs,
                Prober::new().unwrap(),
                notifier.clone(),
                4,
            ));
            Self {
                tmp,
                store,
                notifier,
                worker,
            }
        }

        async fn add(&self, check: &Check) {
            self.store
                .create(Collection::Checks, &check.id, check)
                .await
                .unwrap();
        }

        async fn stored(&self, id: &str) -> Check {
            self.store.read(Collection::Checks, id).await.unwrap()
        }

        async fn log_entries(&self, id: &str) -> Vec<LogEntry> {
            let path = self.tmp.path().join("logs").join(format!("{id}.log"));
            let text = tokio::fs::read_to_string(path).await.unwrap_or_default();
            text.lines()
                .map(|l| serde_json::from_str(l).unwrap())
                .collect()
        }
    }

    fn probed_before(addr: SocketAddr, state: CheckState) -> Check {
        let mut check = check_for(addr, "/", 2);
        check.state = state;
        check.last_checked = Some(DateTime::from_timestamp(1_700_000_000, 0).unwrap());
        check
    }

    #[tokio::test]
    async fn first_probe_never_alerts() {
        let f = Fixture::new(RecordingNotifier::default()).await;
        let addr = serve(status_router(200)).await;
        let check = check_for(addr, "/", 2);
        f.add(&check).await;

        let report = f.worker.run_sweep().await.unwrap();
        assert_eq!(report, SweepReport { probed: 1, alerts: 0, ..Default::default() });
        assert!(f.notifier.sent().is_empty());

        let stored = f.stored(&check.id).await;
        assert_eq!(stored.state, CheckState::Up);
        assert!(stored.last_checked.is_some());

        let entries = f.log_entries(&check.id).await;
        assert_eq!(entries.len(), 1);
        assert!(!entries[0].alert);
        assert_eq!(entries[0].state, CheckState::Up);
    }

    #[tokio::test]
    async fn transition_alerts_after_persisting() {
        let f = Fixture::new(RecordingNotifier::default()).await;
        let addr = serve(status_router(500)).await;
        let check = probed_before(addr, CheckState::Up);
        f.add(&check).await;

        let report = f.worker.run_sweep().await.unwrap();
        assert_eq!(report.alerts, 1);

        let sent = f.notifier.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "5551234567");
        assert_eq!(
            sent[0].1,
            format!("Alert: Your check for GET http://{addr}/ is currently down")
        );

        let stored = f.stored(&check.id).await;
        assert_eq!(stored.state, CheckState::Down);
        assert!(stored.last_checked > check.last_checked);

        let entries = f.log_entries(&check.id).await;
        assert_eq!(entries.len(), 1);
        assert!(entries[0].alert);
        assert!(entries[0].alert_delivered);
        assert_eq!(entries[0].outcome, ProbeOutcome::responded(500));
        assert_eq!(entries[0].state, CheckState::Down);
        assert_eq!(entries[0].check.state, CheckState::Up);
        assert_eq!(entries[0].check.last_checked, check.last_checked);
    }

    #[tokio::test]
    async fn unchanged_state_does_not_alert() {
        let f = Fixture::new(RecordingNotifier::default()).await;
        let addr = serve(status_router(500)).await;
        let check = probed_before(addr, CheckState::Down);
        f.add(&check).await;

        f.worker.run_sweep().await.unwrap();
        assert!(f.notifier.sent().is_empty());
        assert_eq!(f.log_entries(&check.id).await.len(), 1);
    }

    #[tokio::test]
    async fn failed_delivery_keeps_new_state() {
        let f = Fixture::new(RecordingNotifier::failing()).await;
        let addr = serve(status_router(200)).await;
        let check = probed_before(addr, CheckState::Down);
        f.add(&check).await;

        let report = f.worker.run_sweep().await.unwrap();
        assert_eq!(report.probed, 1);
        assert_eq!(f.notifier.sent().len(), 1);
        assert_eq!(f.stored(&check.id).await.state, CheckState::Up);

        let entries = f.log_entries(&check.id).await;
        assert!(entries[0].alert);
        assert!(!entries[0].alert_delivered);
    }

    #[tokio::test]
    async fn timeout_logs_exactly_one_outcome() {
        let f = Fixture::new(RecordingNotifier::default()).await;
        let addr = serve(slow_router(Duration::from_secs(2))).await;
        let check = check_for(addr, "/", 1);
        f.add(&check).await;

        f.worker.run_sweep().await.unwrap();
        // Let the straggling response arrive; it must not be recorded.
        tokio::time::sleep(Duration::from_millis(2500)).await;

        let entries = f.log_entries(&check.id).await;
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].outcome, ProbeOutcome::failed(ProbeError::timeout()));
        assert_eq!(entries[0].state, CheckState::Down);
    }

    #[tokio::test]
    async fn invalid_records_are_skipped() {
        let f = Fixture::new(RecordingNotifier::default()).await;
        let addr = serve(status_router(200)).await;

        let good = check_for(addr, "/", 2);
        f.add(&good).await;
        let mut wide = check_for(addr, "/", 2);
        wide.timeout_seconds = 30;
        f.add(&wide).await;
        f.store
            .create(
                Collection::Checks,
                "abcdefghij0123456789",
                &serde_json::json!({"id": "abcdefghij0123456789", "url": 7}),
            )
            .await
            .unwrap();

        let report = f.worker.run_sweep().await.unwrap();
        assert_eq!(report.probed, 1);
        assert_eq!(report.skipped, 2);
        assert_eq!(report.failed, 0);
        assert!(f.log_entries(&wide.id).await.is_empty());
        assert_eq!(f.stored(&wide.id).await.last_checked, None);
    }

    #[tokio::test]
    async fn edit_during_probe_is_preserved() {
        let f = Fixture::new(RecordingNotifier::default()).await;
        let addr = serve(slow_router(Duration::from_millis(500))).await;
        let check = check_for(addr, "/", 3);
        f.add(&check).await;

        let worker = f.worker.clone();
        let sweep = tokio::spawn(async move { worker.run_sweep().await });
        tokio::time::sleep(Duration::from_millis(150)).await;
        f.store
            .modify(Collection::Checks, &check.id, |c: &mut Check| {
                c.success_codes = vec![200, 204];
                Ok::<_, StoreError>(())
            })
            .await
            .unwrap();
        sweep.await.unwrap().unwrap();

        let stored = f.stored(&check.id).await;
        assert_eq!(stored.success_codes, vec![200, 204]);
        assert!(stored.last_checked.is_some());
    }

    #[tokio::test]
    async fn check_deleted_during_probe_is_dropped() {
        let f = Fixture::new(RecordingNotifier::default()).await;
        let addr = serve(slow_router(Duration::from_millis(500))).await;
        let mut check = probed_before(addr, CheckState::Up);
        check.success_codes = vec![201];
        f.add(&check).await;

        let worker = f.worker.clone();
        let sweep = tokio::spawn(async move { worker.run_sweep().await });
        tokio::time::sleep(Duration::from_millis(150)).await;
        f.store.delete(Collection::Checks, &check.id).await.unwrap();
        let report = sweep.await.unwrap().unwrap();

        assert_eq!(report, SweepReport { failed: 1, ..Default::default() });
        assert!(f.notifier.sent().is_empty());
        let log = f.tmp.path().join("logs").join(format!("{}.log", check.id));
        assert!(!tokio::fs::try_exists(&log).await.unwrap());
    }

    #[tokio::test]
    async fn sweep_covers_every_check_with_bounded_concurrency() {
        let f = Fixture::new(RecordingNotifier::default()).await;
        let addr = serve(slow_router(Duration::from_millis(100))).await;
        let mut ids = Vec::new();
        for _ in 0..10 {
            let check = check_for(addr, "/", 2);
            f.add(&check).await;
            ids.push(check.id);
        }

        let report = f.worker.run_sweep().await.unwrap();
        assert_eq!(report.probed, 10);
        for id in ids {
            assert_eq!(f.log_entries(&id).await.len(), 1);
        }
    }
}
