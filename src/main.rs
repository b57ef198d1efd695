//! Spreadwatch entry point
//!
//! Wires configuration, exchange adapters and sinks into the poll
//! driver, then runs until Ctrl+C or until the monitor halts.

use anyhow::Result;
use spreadwatch::config::AppConfig;
use spreadwatch::exchange::{build_candidates, build_http_client};
use spreadwatch::monitor::{BroadcastSink, LogSink, PollDriver, SnapshotSink};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("🚀 Starting spreadwatch...");

    let config = AppConfig::load()?;
    info!("✅ Configuration loaded: {}", config.digest());

    let client = build_http_client(config.monitor.request_timeout())?;
    let candidates = build_candidates(&config.exchanges, &client)?;

    let broadcaster = BroadcastSink::default();
    #[cfg_attr(not(feature = "dashboard"), allow(unused_mut))]
    let mut sinks: Vec<Arc<dyn SnapshotSink>> =
        vec![Arc::new(LogSink), Arc::new(broadcaster.clone())];

    #[cfg(feature = "dashboard")]
    if config.dashboard.enabled {
        use spreadwatch::dashboard::{start_server, DashboardMemory, DashboardSink};

        let memory = Arc::new(DashboardMemory::new());
        sinks.push(Arc::new(DashboardSink::new(memory.clone())));

        let port = config.dashboard.port;
        let feed = broadcaster.clone();
        tokio::spawn(async move {
            if let Err(error) = start_server(memory, feed, port).await {
                warn!(%error, "Dashboard server stopped");
            }
        });
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Ctrl+C received, shutting down..."),
            Err(error) => warn!(%error, "Failed to listen for the shutdown signal"),
        }
        let _ = shutdown_tx.send(true);
    });

    let driver = PollDriver::new(candidates, config.monitor, sinks, shutdown_rx);
    driver.run().await
}
