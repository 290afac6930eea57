//! Background side of the monitor: the probe sweep, alert delivery and log
//! rotation, plus the timers that drive them.

pub mod error;
pub mod notify;
pub mod probe;
pub mod rotate;
pub mod scheduler;
pub mod worker;

#[cfg(test)]
mod testing;

pub use error::{TransportError, WorkerError};
pub use notify::{Notifier, SmsConfig, SmsNotifier, TracingNotifier};
pub use probe::Prober;
pub use rotate::{LogRotator, RotationReport};
pub use scheduler::{Scheduler, SchedulerConfig};
pub use worker::{CheckWorker, DEFAULT_PROBE_CONCURRENCY, SweepReport};
