//! Dashboard Module
//!
//! HTTP/WebSocket API for watching the spread monitor live. Only
//! compiled when the `dashboard` feature is enabled.

mod api;

pub use api::create_router;

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;

use crate::monitor::{BroadcastSink, MonitorSnapshot, Notice, SnapshotSink};

const MAX_NOTICES: usize = 50;

/// In-memory state for the dashboard API
#[derive(Debug)]
pub struct DashboardMemory {
    /// Latest published cycle, if any cycle has completed yet
    snapshot: RwLock<Option<MonitorSnapshot>>,
    /// Recent lifecycle notices, newest first
    notices: RwLock<VecDeque<Notice>>,
    /// Construction time, surfaced as uptime
    started_at: Instant,
}

/// Complete dashboard state shared with the frontend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardState {
    pub snapshot: Option<MonitorSnapshot>,
    pub notices: Vec<Notice>,
    pub uptime_secs: u64,
    pub timestamp: i64,
}

impl Default for DashboardMemory {
    fn default() -> Self {
        Self::new()
    }
}

impl DashboardMemory {
    pub fn new() -> Self {
        Self {
            snapshot: RwLock::new(None),
            notices: RwLock::new(VecDeque::new()),
            started_at: Instant::now(),
        }
    }

    /// Replace the latest snapshot
    pub async fn set_snapshot(&self, snapshot: MonitorSnapshot) {
        *self.snapshot.write().await = Some(snapshot);
    }

    /// Record a notice, keeping only the most recent ones
    pub async fn add_notice(&self, notice: Notice) {
        let mut notices = self.notices.write().await;
        notices.push_front(notice);
        notices.truncate(MAX_NOTICES);
    }

    /// Get complete dashboard state
    pub async fn get_state(&self) -> DashboardState {
        DashboardState {
            snapshot: self.snapshot.read().await.clone(),
            notices: self.notices.read().await.iter().cloned().collect(),
            uptime_secs: self.started_at.elapsed().as_secs(),
            timestamp: Utc::now().timestamp_millis(),
        }
    }

    pub async fn latest_snapshot(&self) -> Option<MonitorSnapshot> {
        self.snapshot.read().await.clone()
    }
}

/// Sink that mirrors every cycle and notice into [`DashboardMemory`]
pub struct DashboardSink {
    memory: Arc<DashboardMemory>,
}

impl DashboardSink {
    pub fn new(memory: Arc<DashboardMemory>) -> Self {
        Self { memory }
    }
}

#[async_trait]
impl SnapshotSink for DashboardSink {
    async fn on_snapshot(&self, snapshot: &MonitorSnapshot) {
        self.memory.set_snapshot(snapshot.clone()).await;
    }

    async fn on_notice(&self, notice: &Notice) {
        self.memory.add_notice(notice.clone()).await;
    }
}

/// Start the dashboard server
pub async fn start_server(
    memory: Arc<DashboardMemory>,
    broadcaster: BroadcastSink,
    port: u16,
) -> anyhow::Result<()> {
    let app = create_router(memory, broadcaster);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));

    tracing::info!("🖥️ Dashboard API starting on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{FundingBias, FundingObservation, Quote};

    fn make_snapshot(cycle: u64) -> MonitorSnapshot {
        let quote = Quote::new(61_000.0, Some(61_040.0));
        MonitorSnapshot {
            cycle,
            exchange: "binance".to_string(),
            quote: quote.clone(),
            funding: FundingObservation::new(Some(0.0001)),
            spread_state: None,
            funding_bias: FundingBias::LongsPayShorts,
            quote_history: vec![quote],
            funding_history: Vec::new(),
            generated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn state_reflects_latest_snapshot() {
        let memory = DashboardMemory::new();
        assert!(memory.get_state().await.snapshot.is_none());

        memory.set_snapshot(make_snapshot(1)).await;
        memory.set_snapshot(make_snapshot(2)).await;

        let state = memory.get_state().await;
        assert_eq!(state.snapshot.unwrap().cycle, 2);
    }

    #[tokio::test]
    async fn notices_are_bounded_and_newest_first() {
        let memory = DashboardMemory::new();
        for i in 0..60 {
            memory.add_notice(Notice::info(format!("notice {}", i))).await;
        }

        let state = memory.get_state().await;
        assert_eq!(state.notices.len(), MAX_NOTICES);
        assert_eq!(state.notices[0].message, "notice 59");
    }

    #[tokio::test]
    async fn state_reports_uptime_since_start() {
        let memory = DashboardMemory::new();

        let earlier = memory.get_state().await;
        assert!(earlier.uptime_secs < 60);

        let later = memory.get_state().await;
        assert!(later.uptime_secs >= earlier.uptime_secs);
    }

    #[tokio::test]
    async fn sink_mirrors_snapshots_into_memory() {
        let memory = Arc::new(DashboardMemory::new());
        let sink = DashboardSink::new(memory.clone());

        sink.on_snapshot(&make_snapshot(7)).await;
        sink.on_notice(&Notice::warning("failover")).await;

        assert_eq!(memory.latest_snapshot().await.unwrap().cycle, 7);
        assert_eq!(memory.get_state().await.notices.len(), 1);
    }
}
