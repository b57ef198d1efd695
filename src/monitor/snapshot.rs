//! Published cycle state and sinks
//!
//! Every successful cycle produces a fresh [`MonitorSnapshot`] that is
//! handed to each registered sink. Sinks are the only way cycle results
//! leave the driver.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{error, info, warn};

use crate::types::{FundingBias, FundingObservation, Quote, SpreadState};

/// Complete result of one monitoring cycle
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorSnapshot {
    /// Count of published cycles since startup
    pub cycle: u64,
    /// Exchange the cycle was served from
    pub exchange: String,
    /// Prices observed this cycle
    pub quote: Quote,
    /// Funding rate observed this cycle
    pub funding: FundingObservation,
    /// Spread classification, absent on spot-only exchanges
    pub spread_state: Option<SpreadState>,
    /// Funding direction label
    pub funding_bias: FundingBias,
    /// Recent quotes, newest first
    pub quote_history: Vec<Quote>,
    /// Recent resolved funding rates, newest first
    pub funding_history: Vec<FundingObservation>,
    /// When the snapshot was assembled
    pub generated_at: DateTime<Utc>,
}

impl MonitorSnapshot {
    /// Display label for the spread state, "n/a" without a futures leg
    pub fn spread_label(&self) -> String {
        match self.spread_state {
            Some(state) => state.to_string(),
            None => "n/a".to_string(),
        }
    }
}

/// Severity of an out-of-band notice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeSeverity {
    Info,
    Warning,
    Error,
}

/// Out-of-band lifecycle message: selections, rebinds, failures
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notice {
    pub severity: NoticeSeverity,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl Notice {
    pub fn info(message: impl Into<String>) -> Self {
        Self::with_severity(NoticeSeverity::Info, message)
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::with_severity(NoticeSeverity::Warning, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::with_severity(NoticeSeverity::Error, message)
    }

    fn with_severity(severity: NoticeSeverity, message: impl Into<String>) -> Self {
        Self {
            severity,
            message: message.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Wire envelope for everything the monitor emits
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum MonitorEvent {
    Snapshot(MonitorSnapshot),
    Notice(Notice),
}

/// Receiver of cycle results and lifecycle notices
#[async_trait]
pub trait SnapshotSink: Send + Sync {
    async fn on_snapshot(&self, snapshot: &MonitorSnapshot);
    async fn on_notice(&self, notice: &Notice);
}

/// Sink that renders cycles into the structured log
pub struct LogSink;

#[async_trait]
impl SnapshotSink for LogSink {
    async fn on_snapshot(&self, snapshot: &MonitorSnapshot) {
        info!(
            cycle = snapshot.cycle,
            exchange = %snapshot.exchange,
            spot = snapshot.quote.spot_price,
            futures = ?snapshot.quote.futures_price,
            spread = ?snapshot.quote.spread,
            spread_state = %snapshot.spread_label(),
            funding_rate = ?snapshot.funding.funding_rate,
            funding_bias = %snapshot.funding_bias,
            "🎯 Cycle published"
        );

        if snapshot.spread_state.is_some_and(|state| state.is_alert()) {
            warn!(
                exchange = %snapshot.exchange,
                spread = ?snapshot.quote.spread,
                spread_state = %snapshot.spread_label(),
                "⚠️ Spread outside configured band"
            );
        }
    }

    async fn on_notice(&self, notice: &Notice) {
        match notice.severity {
            NoticeSeverity::Info => info!("{}", notice.message),
            NoticeSeverity::Warning => warn!("{}", notice.message),
            NoticeSeverity::Error => error!("{}", notice.message),
        }
    }
}

/// Sink that fans events out to broadcast subscribers as JSON.
///
/// Send errors are ignored: no subscriber just means nobody is
/// listening right now.
#[derive(Clone)]
pub struct BroadcastSink {
    tx: broadcast::Sender<String>,
}

impl BroadcastSink {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<String> {
        self.tx.subscribe()
    }

    fn send(&self, event: &MonitorEvent) {
        if let Ok(json) = serde_json::to_string(event) {
            let _ = self.tx.send(json);
        }
    }
}

impl Default for BroadcastSink {
    fn default() -> Self {
        Self::new(100)
    }
}

#[async_trait]
impl SnapshotSink for BroadcastSink {
    async fn on_snapshot(&self, snapshot: &MonitorSnapshot) {
        self.send(&MonitorEvent::Snapshot(snapshot.clone()));
    }

    async fn on_notice(&self, notice: &Notice) {
        self.send(&MonitorEvent::Notice(notice.clone()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_snapshot(exchange: &str, spot: f64, futures: Option<f64>) -> MonitorSnapshot {
        let quote = Quote::new(spot, futures);
        MonitorSnapshot {
            cycle: 1,
            exchange: exchange.to_string(),
            quote: quote.clone(),
            funding: FundingObservation::new(Some(0.0001)),
            spread_state: quote.spread.map(|_| SpreadState::Within),
            funding_bias: FundingBias::LongsPayShorts,
            quote_history: vec![quote],
            funding_history: vec![FundingObservation::new(Some(0.0001))],
            generated_at: Utc::now(),
        }
    }

    #[test]
    fn test_event_wire_format_is_tagged() {
        let event = MonitorEvent::Notice(Notice::warning("rebinding"));
        let json = serde_json::to_string(&event).unwrap();

        assert!(json.contains("\"type\":\"Notice\""));
        assert!(json.contains("\"severity\":\"warning\""));
        assert!(json.contains("rebinding"));
    }

    #[test]
    fn test_spread_label_without_futures_leg() {
        let snapshot = make_snapshot("coinbase", 61_000.0, None);
        assert_eq!(snapshot.spread_label(), "n/a");

        let snapshot = make_snapshot("binance", 61_000.0, Some(61_010.0));
        assert_eq!(snapshot.spread_label(), "WITHIN");
    }

    #[tokio::test]
    async fn test_broadcast_reaches_subscriber() {
        let sink = BroadcastSink::new(8);
        let mut rx = sink.subscribe();

        sink.on_snapshot(&make_snapshot("binance", 61_000.0, Some(61_010.0)))
            .await;

        let json = rx.recv().await.unwrap();
        assert!(json.contains("\"type\":\"Snapshot\""));
        assert!(json.contains("binance"));
    }

    #[tokio::test]
    async fn test_broadcast_without_subscribers_is_quiet() {
        let sink = BroadcastSink::default();
        sink.on_notice(&Notice::info("exchange selected")).await;
    }
}
