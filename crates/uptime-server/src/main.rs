mod config;

use std::net::SocketAddr;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use uptime_api::{AppStateInner, SystemResolver, routes};
use uptime_store::{LogStore, RecordStore};
use uptime_worker::{
    CheckWorker, LogRotator, Notifier, Prober, Scheduler, SmsNotifier, TracingNotifier,
};

use crate::config::Config;

const DEFAULT_LOG_FILTER: &str = "uptime=debug,uptime_worker=info,uptime_api=info,uptime_store=info,tower_http=debug";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    let config = Config::from_env()?;
    init_tracing(config.log_json);
    info!("Starting uptime monitor ({} environment)", config.environment);

    // Storage
    let store = Arc::new(RecordStore::new(config.data_dir.clone()).await?);
    let logs = Arc::new(LogStore::new(config.log_dir.clone()).await?);

    // Background work
    let notifier: Arc<dyn Notifier> = match config.sms.clone() {
        Some(sms) => Arc::new(SmsNotifier::new(sms)?),
        None => {
            warn!("SMS credentials not set; alerts will only be logged");
            Arc::new(TracingNotifier)
        }
    };
    let worker = Arc::new(CheckWorker::new(
        store.clone(),
        logs.clone(),
        Prober::new()?,
        notifier,
        config.probe_concurrency,
    ));
    let rotator = Arc::new(LogRotator::new(logs));
    let cancel = CancellationToken::new();
    let scheduler = Scheduler::new(worker, rotator, config.schedule.clone()).spawn(cancel.clone());

    // HTTP
    let state = Arc::new(AppStateInner::new(
        store,
        Arc::new(SystemResolver),
        config.max_checks,
    ));
    let app = routes::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!("Uptime monitor listening on {}", addr);
    info!(
        "Probing every {}s, rotating logs every {}s, max {} checks per user",
        config.schedule.check_interval.as_secs(),
        config.schedule.rotate_interval.as_secs(),
        config.max_checks
    );

    let listener = tokio::net::TcpListener::bind(addr).await?;
    let stop = cancel.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            stop.cancel();
        })
        .await?;

    // Let an in-flight sweep finish.
    cancel.cancel();
    scheduler.await?;
    info!("Shutdown complete");
    Ok(())
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_LOG_FILTER.into());
    if json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
                    _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
                }
            }
            Err(e) => {
                warn!("Could not install SIGTERM handler: {}", e);
                ctrl_c.await.ok();
                info!("Received Ctrl+C, shutting down...");
            }
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received Ctrl+C, shutting down...");
    }
}
