//! Poll driver
//!
//! Owns the monitoring loop: bind an exchange, then fetch, classify and
//! publish on a fixed cadence. Transient errors back off exponentially
//! and trip a failover once enough pile up in a row; a region block
//! fails over immediately. When no candidate accepts a probe the driver
//! halts with an error.

use anyhow::{bail, Context, Result};
use chrono::Utc;
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::config::MonitorConfig;
use crate::exchange::{select_exchange, Candidate, ExchangeBinding, ExchangeError, SelectionError};
use crate::monitor::evaluate::{classify_funding, classify_spread};
use crate::monitor::funding::resolve_funding;
use crate::monitor::history::HistoryWindow;
use crate::monitor::quotes::fetch_quote;
use crate::monitor::snapshot::{MonitorSnapshot, Notice, SnapshotSink};
use crate::types::{FundingObservation, Quote, SpreadThresholds};

/// Exponential backoff for the given failure streak, starting at
/// `base_secs` and capped at `max_secs`
fn backoff_delay(attempt: u32, base_secs: u64, max_secs: u64) -> Duration {
    let shift = attempt.saturating_sub(1).min(6);
    let secs = base_secs.saturating_mul(1u64 << shift).min(max_secs);
    Duration::from_secs(secs)
}

/// Add up to 20% random jitter on top of a backoff delay
fn with_jitter(delay: Duration) -> Duration {
    let jitter_cap = ((delay.as_secs() as f64) * 0.20).round() as u64;
    let jitter_secs = if jitter_cap > 0 {
        rand::thread_rng().gen_range(0..=jitter_cap)
    } else {
        0
    };
    delay + Duration::from_secs(jitter_secs)
}

/// Drives the monitoring loop over an ordered candidate list.
///
/// All mutable cycle state lives here; sinks only ever see immutable
/// snapshots. Histories persist across failovers so a fresh exchange
/// continues the same rolling window.
pub struct PollDriver {
    candidates: Vec<Candidate>,
    config: MonitorConfig,
    thresholds: SpreadThresholds,
    sinks: Vec<Arc<dyn SnapshotSink>>,
    shutdown: watch::Receiver<bool>,
    quote_history: HistoryWindow<Quote>,
    funding_history: HistoryWindow<FundingObservation>,
    cycle: u64,
    failure_streak: u32,
}

impl PollDriver {
    pub fn new(
        candidates: Vec<Candidate>,
        config: MonitorConfig,
        sinks: Vec<Arc<dyn SnapshotSink>>,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        let thresholds = config.thresholds();
        Self {
            candidates,
            config,
            thresholds,
            sinks,
            shutdown,
            quote_history: HistoryWindow::default(),
            funding_history: HistoryWindow::default(),
            cycle: 0,
            failure_streak: 0,
        }
    }

    /// Run until cancelled or halted. Cancellation resolves to `Ok`;
    /// running out of usable exchanges resolves to the error that
    /// halted the monitor.
    pub async fn run(mut self) -> Result<()> {
        info!(
            candidates = self.candidates.len(),
            refresh_secs = self.config.refresh_interval_secs,
            "Starting spread monitor"
        );

        let mut binding = match self.try_select().await {
            Ok(binding) => binding,
            Err(error) => {
                self.notify(Notice::error(format!(
                    "Exchange selection failed: {}",
                    error
                )))
                .await;
                return Err(error).context("no exchange accepted the initial probe");
            }
        };
        self.notify(Notice::info(format!(
            "Monitoring {} through {}",
            binding.spot_symbol, binding.name
        )))
        .await;

        loop {
            if self.cancelled() {
                info!("Shutdown requested, monitor stopping");
                return Ok(());
            }

            match self.run_cycle(&binding).await {
                Ok(()) => {
                    self.failure_streak = 0;
                    if self.sleep_or_cancel(self.config.refresh_interval()).await {
                        info!("Shutdown requested, monitor stopping");
                        return Ok(());
                    }
                }
                Err(error) if error.is_region_block() => {
                    warn!(exchange = %binding.name, "Exchange became region blocked mid-run");
                    self.notify(Notice::warning(format!(
                        "{} is unavailable from this region, selecting a fallback exchange",
                        binding.name
                    )))
                    .await;
                    binding = match self.rebind().await? {
                        Some(next) => next,
                        None => return Ok(()),
                    };
                }
                Err(error) => {
                    self.failure_streak += 1;
                    self.notify(Notice::warning(format!(
                        "Fetch failed on {} ({}/{}): {}",
                        binding.name,
                        self.failure_streak,
                        self.config.max_consecutive_failures,
                        error
                    )))
                    .await;

                    if self.failure_streak >= self.config.max_consecutive_failures {
                        self.notify(Notice::warning(format!(
                            "{} consecutive failures on {}, selecting a fallback exchange",
                            self.failure_streak, binding.name
                        )))
                        .await;
                        binding = match self.rebind().await? {
                            Some(next) => next,
                            None => return Ok(()),
                        };
                    } else {
                        let delay = with_jitter(backoff_delay(
                            self.failure_streak,
                            self.config.backoff_base_secs,
                            self.config.backoff_max_secs,
                        ));
                        warn!(
                            delay_secs = delay.as_secs(),
                            streak = self.failure_streak,
                            "Backing off before the next attempt"
                        );
                        if self.sleep_or_cancel(delay).await {
                            info!("Shutdown requested, monitor stopping");
                            return Ok(());
                        }
                    }
                }
            }
        }
    }

    /// One fetch → classify → publish pass against the bound exchange
    async fn run_cycle(&mut self, binding: &ExchangeBinding) -> Result<(), ExchangeError> {
        let quote = fetch_quote(binding).await?;
        let funding = resolve_funding(binding).await;

        let spread_state = quote
            .spread
            .map(|spread| classify_spread(spread, &self.thresholds));
        let funding_bias = classify_funding(funding.funding_rate);

        self.quote_history.push(quote.clone());
        if funding.funding_rate.is_some() {
            self.funding_history.push(funding.clone());
        }

        self.cycle += 1;
        let snapshot = MonitorSnapshot {
            cycle: self.cycle,
            exchange: binding.name.clone(),
            quote,
            funding,
            spread_state,
            funding_bias,
            quote_history: self.quote_history.to_display_vec(),
            funding_history: self.funding_history.to_display_vec(),
            generated_at: Utc::now(),
        };

        for sink in &self.sinks {
            sink.on_snapshot(&snapshot).await;
        }
        Ok(())
    }

    /// Walk the candidate list once, reporting every skip as a notice
    async fn try_select(&self) -> Result<ExchangeBinding, SelectionError> {
        let selection = select_exchange(&self.candidates).await?;
        for skipped in &selection.skipped {
            self.notify(Notice::warning(format!(
                "Skipped {}: {}",
                skipped.name, skipped.error
            )))
            .await;
        }
        Ok(selection.binding)
    }

    /// Re-run selection with backoff between attempts.
    ///
    /// `Ok(Some)` carries the new binding, `Ok(None)` means shutdown
    /// interrupted the wait, `Err` means every attempt was exhausted
    /// and the monitor must halt.
    async fn rebind(&mut self) -> Result<Option<ExchangeBinding>> {
        self.failure_streak = 0;
        for attempt in 1..=self.config.rebind_max_attempts {
            if self.cancelled() {
                return Ok(None);
            }
            info!(
                attempt,
                max_attempts = self.config.rebind_max_attempts,
                "🔄 Selecting fallback exchange..."
            );
            match self.try_select().await {
                Ok(binding) => {
                    self.notify(Notice::info(format!(
                        "Monitoring {} through {}",
                        binding.spot_symbol, binding.name
                    )))
                    .await;
                    return Ok(Some(binding));
                }
                Err(error) => {
                    self.notify(Notice::warning(format!(
                        "Failover attempt {}/{} found no usable exchange: {}",
                        attempt, self.config.rebind_max_attempts, error
                    )))
                    .await;
                    if attempt < self.config.rebind_max_attempts {
                        let delay = with_jitter(backoff_delay(
                            attempt,
                            self.config.backoff_base_secs,
                            self.config.backoff_max_secs,
                        ));
                        if self.sleep_or_cancel(delay).await {
                            return Ok(None);
                        }
                    }
                }
            }
        }

        self.notify(Notice::error(
            "No exchange reachable after repeated failover attempts, monitor halted",
        ))
        .await;
        bail!(
            "no exchange candidate usable after {} failover attempts",
            self.config.rebind_max_attempts
        );
    }

    async fn notify(&self, notice: Notice) {
        for sink in &self.sinks {
            sink.on_notice(&notice).await;
        }
    }

    fn cancelled(&self) -> bool {
        *self.shutdown.borrow()
    }

    /// Sleep for `delay`, waking early on shutdown. Returns true when
    /// shutdown fired.
    async fn sleep_or_cancel(&mut self, delay: Duration) -> bool {
        if delay.is_zero() {
            return self.cancelled();
        }
        tokio::select! {
            _ = tokio::time::sleep(delay) => false,
            _ = self.shutdown.changed() => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exchange::MockSpotApi;
    use crate::monitor::snapshot::NoticeSeverity;
    use async_trait::async_trait;
    use tokio::sync::mpsc;

    fn test_config() -> MonitorConfig {
        MonitorConfig {
            upper_threshold: 50.0,
            lower_threshold: -50.0,
            refresh_interval_secs: 0,
            request_timeout_secs: 1,
            max_consecutive_failures: 2,
            backoff_base_secs: 0,
            backoff_max_secs: 0,
            rebind_max_attempts: 2,
        }
    }

    fn candidate(name: &str, spot: MockSpotApi) -> Candidate {
        Candidate {
            name: name.to_string(),
            spot_symbol: "BTCUSDT".to_string(),
            futures_symbol: None,
            funding_supported: false,
            spot: Arc::new(spot),
            futures: None,
        }
    }

    struct CapturingSink {
        snapshots: mpsc::UnboundedSender<MonitorSnapshot>,
        notices: mpsc::UnboundedSender<Notice>,
    }

    #[async_trait]
    impl SnapshotSink for CapturingSink {
        async fn on_snapshot(&self, snapshot: &MonitorSnapshot) {
            let _ = self.snapshots.send(snapshot.clone());
        }

        async fn on_notice(&self, notice: &Notice) {
            let _ = self.notices.send(notice.clone());
        }
    }

    fn capture() -> (
        Arc<dyn SnapshotSink>,
        mpsc::UnboundedReceiver<MonitorSnapshot>,
        mpsc::UnboundedReceiver<Notice>,
    ) {
        let (snapshot_tx, snapshot_rx) = mpsc::unbounded_channel();
        let (notice_tx, notice_rx) = mpsc::unbounded_channel();
        let sink = Arc::new(CapturingSink {
            snapshots: snapshot_tx,
            notices: notice_tx,
        }) as Arc<dyn SnapshotSink>;
        (sink, snapshot_rx, notice_rx)
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        assert_eq!(backoff_delay(1, 2, 30), Duration::from_secs(2));
        assert_eq!(backoff_delay(2, 2, 30), Duration::from_secs(4));
        assert_eq!(backoff_delay(3, 2, 30), Duration::from_secs(8));
        assert_eq!(backoff_delay(5, 2, 30), Duration::from_secs(30));
        assert_eq!(backoff_delay(40, 2, 30), Duration::from_secs(30));
        assert_eq!(backoff_delay(3, 0, 30), Duration::ZERO);
    }

    #[test]
    fn test_jitter_stays_within_twenty_percent() {
        for _ in 0..50 {
            let delayed = with_jitter(Duration::from_secs(10));
            assert!(delayed >= Duration::from_secs(10));
            assert!(delayed <= Duration::from_secs(12));
        }
        assert_eq!(with_jitter(Duration::ZERO), Duration::ZERO);
    }

    #[tokio::test]
    async fn test_halts_when_no_candidate_accepts_probe() {
        let mut spot = MockSpotApi::new();
        spot.expect_ticker().returning(|_| {
            Err(ExchangeError::RegionBlocked {
                exchange: "primary",
            })
        });

        let (sink, _snapshots, _notices) = capture();
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        let driver = PollDriver::new(
            vec![candidate("primary", spot)],
            test_config(),
            vec![sink],
            shutdown_rx,
        );

        let result = tokio::time::timeout(Duration::from_secs(5), driver.run())
            .await
            .unwrap();
        assert!(result.is_err());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_breaker_fails_over_to_next_candidate() {
        // Healthy at probe time, then every fetch misses
        let mut primary = MockSpotApi::new();
        primary
            .expect_ticker()
            .times(1)
            .returning(|_| Ok(61_000.0));
        primary
            .expect_ticker()
            .returning(|_| Err(ExchangeError::Timeout { exchange: "primary" }));

        let mut backup = MockSpotApi::new();
        backup.expect_ticker().returning(|_| Ok(61_200.0));

        let (sink, mut snapshots, _notices) = capture();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let driver = PollDriver::new(
            vec![candidate("primary", primary), candidate("backup", backup)],
            test_config(),
            vec![sink],
            shutdown_rx,
        );
        let handle = tokio::spawn(driver.run());

        let snapshot = tokio::time::timeout(Duration::from_secs(5), snapshots.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(snapshot.exchange, "backup");
        assert_eq!(snapshot.cycle, 1);
        assert_eq!(snapshot.quote.spot_price, 61_200.0);

        shutdown_tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_rebind_exhaustion_halts_with_notice() {
        // Probe succeeds once, every later call is region blocked
        let mut primary = MockSpotApi::new();
        primary
            .expect_ticker()
            .times(1)
            .returning(|_| Ok(61_000.0));
        primary.expect_ticker().returning(|_| {
            Err(ExchangeError::RegionBlocked {
                exchange: "primary",
            })
        });

        let (sink, _snapshots, mut notices) = capture();
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        let driver = PollDriver::new(
            vec![candidate("primary", primary)],
            test_config(),
            vec![sink],
            shutdown_rx,
        );

        let result = tokio::time::timeout(Duration::from_secs(5), driver.run())
            .await
            .unwrap();
        assert!(result.is_err());

        let mut saw_halt = false;
        while let Ok(notice) = notices.try_recv() {
            if notice.severity == NoticeSeverity::Error && notice.message.contains("halted") {
                saw_halt = true;
            }
        }
        assert!(saw_halt);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_shutdown_interrupts_refresh_sleep() {
        let mut spot = MockSpotApi::new();
        spot.expect_ticker().returning(|_| Ok(61_000.0));

        let (sink, mut snapshots, _notices) = capture();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let config = MonitorConfig {
            refresh_interval_secs: 3600,
            ..test_config()
        };
        let driver = PollDriver::new(
            vec![candidate("primary", spot)],
            config,
            vec![sink],
            shutdown_rx,
        );
        let handle = tokio::spawn(driver.run());

        tokio::time::timeout(Duration::from_secs(5), snapshots.recv())
            .await
            .unwrap()
            .unwrap();

        shutdown_tx.send(true).unwrap();
        let result = tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();
        assert!(result.is_ok());
    }
}
