//! Configuration management for spreadwatch
//!
//! Loads from YAML files + environment variables via .env

use anyhow::{bail, Context, Result};
use config::{Config, Environment, File};
use serde::Deserialize;
use std::time::Duration;

use crate::types::SpreadThresholds;

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub monitor: MonitorConfig,
    /// Candidate exchanges in selection priority order
    #[serde(default = "default_exchanges")]
    pub exchanges: Vec<CandidateConfig>,
    pub dashboard: DashboardConfig,
    pub sentiment: SentimentConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MonitorConfig {
    /// Spread above this value raises an alert
    pub upper_threshold: f64,
    /// Spread below this value raises an alert
    pub lower_threshold: f64,
    /// Seconds between successful polling cycles
    pub refresh_interval_secs: u64,
    /// Per-request timeout in seconds, must stay below the refresh interval
    pub request_timeout_secs: u64,
    /// Consecutive transient failures before the breaker forces reselection
    pub max_consecutive_failures: u32,
    /// Base delay for failure backoff in seconds
    pub backoff_base_secs: u64,
    /// Cap for failure backoff in seconds
    pub backoff_max_secs: u64,
    /// Selection attempts while rebinding before the monitor halts
    pub rebind_max_attempts: u32,
}

impl MonitorConfig {
    pub fn thresholds(&self) -> SpreadThresholds {
        SpreadThresholds {
            upper: self.upper_threshold,
            lower: self.lower_threshold,
        }
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// One entry of the ordered exchange candidate list
#[derive(Debug, Clone, Deserialize)]
pub struct CandidateConfig {
    /// Adapter name: binance, bybit, okx or coinbase
    pub name: String,
    /// Spot market symbol in the exchange's own notation
    pub spot_symbol: String,
    /// Perpetual futures symbol, absent on spot-only exchanges
    #[serde(default)]
    pub futures_symbol: Option<String>,
    /// Whether funding-rate queries should be attempted
    #[serde(default)]
    pub funding_supported: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DashboardConfig {
    /// Serve the local dashboard API (requires the `dashboard` feature)
    pub enabled: bool,
    /// TCP port for the dashboard server
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SentimentConfig {
    /// Fear & greed index endpoint
    pub endpoint: String,
    /// Number of daily entries to request
    pub limit: u32,
    /// Where the CSV export is written
    pub output_path: String,
}

fn default_exchanges() -> Vec<CandidateConfig> {
    vec![
        CandidateConfig {
            name: "binance".to_string(),
            spot_symbol: "BTCUSDT".to_string(),
            futures_symbol: Some("BTCUSDT".to_string()),
            funding_supported: true,
        },
        CandidateConfig {
            name: "bybit".to_string(),
            spot_symbol: "BTCUSDT".to_string(),
            futures_symbol: Some("BTCUSDT".to_string()),
            funding_supported: true,
        },
        CandidateConfig {
            name: "okx".to_string(),
            spot_symbol: "BTC-USDT".to_string(),
            futures_symbol: Some("BTC-USDT-SWAP".to_string()),
            funding_supported: true,
        },
        CandidateConfig {
            name: "coinbase".to_string(),
            spot_symbol: "BTC-USD".to_string(),
            futures_symbol: None,
            funding_supported: false,
        },
    ]
}

impl AppConfig {
    /// Load configuration from file and environment
    pub fn load() -> Result<Self> {
        // Load .env file first
        dotenvy::dotenv().ok();

        let config = Config::builder()
            // Monitor defaults
            .set_default("monitor.upper_threshold", 50.0)?
            .set_default("monitor.lower_threshold", -50.0)?
            .set_default("monitor.refresh_interval_secs", 60)?
            .set_default("monitor.request_timeout_secs", 10)?
            .set_default("monitor.max_consecutive_failures", 5)?
            .set_default("monitor.backoff_base_secs", 2)?
            .set_default("monitor.backoff_max_secs", 30)?
            .set_default("monitor.rebind_max_attempts", 3)?
            // Dashboard defaults
            .set_default("dashboard.enabled", true)?
            .set_default("dashboard.port", 8080)?
            // Sentiment defaults
            .set_default("sentiment.endpoint", "https://api.alternative.me/fng/")?
            .set_default("sentiment.limit", 30)?
            .set_default("sentiment.output_path", "data/fear_greed.csv")?
            // Load config file if exists
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            // Override with environment variables (SPREADWATCH_*)
            .add_source(Environment::with_prefix("SPREADWATCH").separator("__"))
            .build()
            .context("Failed to build configuration")?;

        let app_config: AppConfig = config
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        app_config.validate()?;

        Ok(app_config)
    }

    /// Reject configurations the monitor cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.monitor.upper_threshold <= self.monitor.lower_threshold {
            bail!(
                "monitor.upper_threshold ({}) must be greater than monitor.lower_threshold ({})",
                self.monitor.upper_threshold,
                self.monitor.lower_threshold
            );
        }

        if self.monitor.request_timeout_secs >= self.monitor.refresh_interval_secs {
            bail!(
                "monitor.request_timeout_secs ({}) must be shorter than monitor.refresh_interval_secs ({})",
                self.monitor.request_timeout_secs,
                self.monitor.refresh_interval_secs
            );
        }

        if self.monitor.backoff_base_secs > self.monitor.backoff_max_secs {
            bail!("monitor.backoff_base_secs must not exceed monitor.backoff_max_secs");
        }

        if self.monitor.max_consecutive_failures == 0 {
            bail!("monitor.max_consecutive_failures must be at least 1");
        }

        if self.monitor.rebind_max_attempts == 0 {
            bail!("monitor.rebind_max_attempts must be at least 1");
        }

        if self.exchanges.is_empty() {
            bail!("at least one exchange candidate must be configured");
        }

        if self.sentiment.limit == 0 {
            bail!("sentiment.limit must be at least 1");
        }

        Ok(())
    }

    /// Generate a digest of the config for logging
    pub fn digest(&self) -> String {
        let names: Vec<&str> = self.exchanges.iter().map(|e| e.name.as_str()).collect();
        format!(
            "exchanges={:?} thresholds=[{}, {}] refresh={}s timeout={}s dashboard={}",
            names,
            self.monitor.lower_threshold,
            self.monitor.upper_threshold,
            self.monitor.refresh_interval_secs,
            self.monitor.request_timeout_secs,
            self.dashboard.enabled
        )
    }
}

impl std::fmt::Display for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.digest())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> AppConfig {
        AppConfig {
            monitor: MonitorConfig {
                upper_threshold: 50.0,
                lower_threshold: -50.0,
                refresh_interval_secs: 60,
                request_timeout_secs: 10,
                max_consecutive_failures: 5,
                backoff_base_secs: 2,
                backoff_max_secs: 30,
                rebind_max_attempts: 3,
            },
            exchanges: default_exchanges(),
            dashboard: DashboardConfig {
                enabled: false,
                port: 8080,
            },
            sentiment: SentimentConfig {
                endpoint: "https://api.alternative.me/fng/".to_string(),
                limit: 30,
                output_path: "data/fear_greed.csv".to_string(),
            },
        }
    }

    #[test]
    fn default_candidates_cover_all_adapters() {
        let exchanges = default_exchanges();
        assert_eq!(exchanges.len(), 4);
        assert_eq!(exchanges[0].name, "binance");

        let coinbase = exchanges.iter().find(|e| e.name == "coinbase").unwrap();
        assert!(coinbase.futures_symbol.is_none());
        assert!(!coinbase.funding_supported);
    }

    #[test]
    fn validate_accepts_defaults() {
        assert!(base_config().validate().is_ok());
    }

    #[test]
    fn validate_rejects_inverted_thresholds() {
        let mut cfg = base_config();
        cfg.monitor.upper_threshold = -50.0;
        cfg.monitor.lower_threshold = 50.0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn validate_rejects_timeout_at_or_above_refresh() {
        let mut cfg = base_config();
        cfg.monitor.request_timeout_secs = 60;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn validate_rejects_empty_candidate_list() {
        let mut cfg = base_config();
        cfg.exchanges.clear();
        assert!(cfg.validate().is_err());
    }
}
