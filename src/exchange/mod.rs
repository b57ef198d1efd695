//! Exchange REST adapters (Binance, Bybit, OKX, Coinbase)
//!
//! Every adapter converts HTTP, transport and payload failures into the
//! typed [`ExchangeError`] at its own boundary; region-block detection
//! happens here and nowhere else.

mod binance;
mod bybit;
mod coinbase;
mod okx;
pub mod selector;

pub use binance::BinanceApi;
pub use bybit::BybitApi;
pub use coinbase::CoinbaseApi;
pub use okx::OkxApi;
pub use selector::{select_exchange, Selection, SelectionError, SkippedCandidate};

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::config::CandidateConfig;

/// Failure classification for exchange calls.
///
/// The driver only branches on [`ExchangeError::RegionBlocked`]; everything
/// else is treated as transient.
#[derive(Debug, Error)]
pub enum ExchangeError {
    /// HTTP 451 or a "restricted location" marker in the response
    #[error("{exchange} rejected the request from a restricted region")]
    RegionBlocked { exchange: &'static str },

    /// The per-request timeout elapsed
    #[error("{exchange} request timed out")]
    Timeout { exchange: &'static str },

    /// Connection-level failure before a response arrived
    #[error("{exchange} transport error: {source}")]
    Transport {
        exchange: &'static str,
        #[source]
        source: reqwest::Error,
    },

    /// Non-success response that is not a region block, or an error
    /// envelope inside a 200 response
    #[error("{exchange} API error (HTTP {status}): {message}")]
    Api {
        exchange: &'static str,
        status: u16,
        message: String,
    },

    /// Response body did not match the documented shape
    #[error("{exchange} returned a malformed response: {detail}")]
    Malformed {
        exchange: &'static str,
        detail: String,
    },
}

impl ExchangeError {
    pub fn is_region_block(&self) -> bool {
        matches!(self, ExchangeError::RegionBlocked { .. })
    }

    pub(crate) fn from_reqwest(exchange: &'static str, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ExchangeError::Timeout { exchange }
        } else {
            ExchangeError::Transport {
                exchange,
                source: err,
            }
        }
    }

    /// Classify a non-success response or an exchange error envelope.
    pub(crate) fn from_response_parts(exchange: &'static str, status: u16, body: &str) -> Self {
        if status == 451 || region_marker(body) {
            ExchangeError::RegionBlocked { exchange }
        } else {
            ExchangeError::Api {
                exchange,
                status,
                message: snippet(body),
            }
        }
    }

    /// Classify an error envelope delivered inside a 200 response.
    pub(crate) fn envelope(exchange: &'static str, message: String) -> Self {
        if region_marker(&message) {
            ExchangeError::RegionBlocked { exchange }
        } else {
            ExchangeError::Api {
                exchange,
                status: 200,
                message,
            }
        }
    }

    pub(crate) fn malformed(exchange: &'static str, detail: impl Into<String>) -> Self {
        ExchangeError::Malformed {
            exchange,
            detail: detail.into(),
        }
    }
}

fn region_marker(text: &str) -> bool {
    text.to_ascii_lowercase().contains("restricted location")
}

/// First line of a body, capped for log-friendly error messages
fn snippet(body: &str) -> String {
    let line = body.lines().next().unwrap_or("").trim();
    if line.len() <= 200 {
        return line.to_string();
    }
    let capped: String = line.chars().take(200).collect();
    format!("{}...", capped)
}

/// Spot market API of one exchange
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SpotApi: Send + Sync {
    /// Adapter name
    fn name(&self) -> &'static str;

    /// Last traded spot price for a symbol
    async fn ticker(&self, symbol: &str) -> Result<f64, ExchangeError>;
}

/// Perpetual futures API of one exchange
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait FuturesApi: Send + Sync {
    /// Adapter name
    fn name(&self) -> &'static str;

    /// Last traded futures price for a symbol
    async fn ticker(&self, symbol: &str) -> Result<f64, ExchangeError>;

    /// Current funding rate (primary query)
    async fn funding_rate(&self, symbol: &str) -> Result<f64, ExchangeError>;

    /// Last settled funding rate from the history endpoint (secondary query)
    async fn funding_rate_history(&self, symbol: &str) -> Result<f64, ExchangeError>;
}

/// A configured exchange that has not been probed yet
#[derive(Clone)]
pub struct Candidate {
    pub name: String,
    pub spot_symbol: String,
    pub futures_symbol: Option<String>,
    pub funding_supported: bool,
    pub spot: Arc<dyn SpotApi>,
    pub futures: Option<Arc<dyn FuturesApi>>,
}

/// A candidate that passed its liveness probe.
///
/// Replaced wholesale on failover, never partially mutated.
#[derive(Clone)]
pub struct ExchangeBinding {
    pub name: String,
    pub spot_symbol: String,
    pub futures_symbol: Option<String>,
    pub funding_supported: bool,
    pub spot: Arc<dyn SpotApi>,
    pub futures: Option<Arc<dyn FuturesApi>>,
}

impl ExchangeBinding {
    pub fn from_candidate(candidate: &Candidate) -> Self {
        Self {
            name: candidate.name.clone(),
            spot_symbol: candidate.spot_symbol.clone(),
            futures_symbol: candidate.futures_symbol.clone(),
            funding_supported: candidate.funding_supported,
            spot: Arc::clone(&candidate.spot),
            futures: candidate.futures.clone(),
        }
    }

    /// Futures handle and symbol, present together or not at all
    pub fn futures_pair(&self) -> Option<(&Arc<dyn FuturesApi>, &str)> {
        match (&self.futures, &self.futures_symbol) {
            (Some(api), Some(symbol)) => Some((api, symbol.as_str())),
            _ => None,
        }
    }
}

/// Shared HTTP client for all adapters, with the per-request timeout the
/// polling loop relies on
pub fn build_http_client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(concat!("spreadwatch/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("Failed to create HTTP client")
}

/// Instantiate adapters for every configured candidate, preserving order
pub fn build_candidates(
    configs: &[CandidateConfig],
    client: &reqwest::Client,
) -> Result<Vec<Candidate>> {
    configs
        .iter()
        .map(|cfg| build_candidate(cfg, client))
        .collect()
}

fn build_candidate(cfg: &CandidateConfig, client: &reqwest::Client) -> Result<Candidate> {
    let (spot, futures_api): (Arc<dyn SpotApi>, Option<Arc<dyn FuturesApi>>) =
        match cfg.name.to_lowercase().as_str() {
            "binance" => {
                let api = Arc::new(BinanceApi::new(client.clone()));
                (api.clone() as Arc<dyn SpotApi>, Some(api))
            }
            "bybit" => {
                let api = Arc::new(BybitApi::new(client.clone()));
                (api.clone() as Arc<dyn SpotApi>, Some(api))
            }
            "okx" => {
                let api = Arc::new(OkxApi::new(client.clone()));
                (api.clone() as Arc<dyn SpotApi>, Some(api))
            }
            "coinbase" => {
                let api = Arc::new(CoinbaseApi::new(client.clone()));
                (api as Arc<dyn SpotApi>, None)
            }
            other => bail!("Unknown exchange adapter: {}", other),
        };

    let futures = match (&cfg.futures_symbol, futures_api) {
        (Some(_), Some(api)) => Some(api),
        (None, _) => None,
        (Some(_), None) => bail!("{} has no futures market support", cfg.name),
    };

    if cfg.funding_supported && futures.is_none() {
        bail!(
            "{} is marked funding_supported but has no futures symbol configured",
            cfg.name
        );
    }

    Ok(Candidate {
        name: cfg.name.clone(),
        spot_symbol: cfg.spot_symbol.clone(),
        futures_symbol: cfg.futures_symbol.clone(),
        funding_supported: cfg.funding_supported,
        spot,
        futures,
    })
}

/// Read a response body, mapping non-success statuses to [`ExchangeError`]
pub(crate) async fn read_success_body(
    exchange: &'static str,
    response: reqwest::Response,
) -> Result<String, ExchangeError> {
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| ExchangeError::from_reqwest(exchange, e))?;

    if !status.is_success() {
        return Err(ExchangeError::from_response_parts(
            exchange,
            status.as_u16(),
            &body,
        ));
    }

    Ok(body)
}

/// Deserialize an exchange payload, mapping failures to [`ExchangeError`]
pub(crate) fn decode<T: DeserializeOwned>(
    exchange: &'static str,
    body: &str,
) -> Result<T, ExchangeError> {
    serde_json::from_str(body).map_err(|e| ExchangeError::malformed(exchange, e.to_string()))
}

/// Parse a string-typed numeric field, common to every exchange payload
pub(crate) fn parse_numeric(
    exchange: &'static str,
    field: &str,
    raw: &str,
) -> Result<f64, ExchangeError> {
    raw.trim().parse::<f64>().map_err(|_| {
        ExchangeError::malformed(exchange, format!("{} is not numeric: {:?}", field, raw))
    })
}
