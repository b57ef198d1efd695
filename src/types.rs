//! Core types used throughout spreadwatch
//!
//! Defines the observation values and classification labels shared by the
//! monitor, the sinks and the dashboard.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Position of the spot/futures spread relative to the alert thresholds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SpreadState {
    /// Spread strictly above the upper threshold
    Above,
    /// Spread between the thresholds (boundaries included)
    Within,
    /// Spread strictly below the lower threshold
    Below,
}

impl SpreadState {
    /// Whether this state should be surfaced as an alert
    pub fn is_alert(&self) -> bool {
        !matches!(self, SpreadState::Within)
    }
}

impl fmt::Display for SpreadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpreadState::Above => write!(f, "ABOVE"),
            SpreadState::Within => write!(f, "WITHIN"),
            SpreadState::Below => write!(f, "BELOW"),
        }
    }
}

/// Which side of the perpetual market pays funding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FundingBias {
    /// Positive rate: long positions pay short positions
    LongsPayShorts,
    /// Negative rate: short positions pay long positions
    ShortsPayLongs,
    /// Rate is exactly zero
    Neutral,
    /// No rate could be resolved this cycle
    NoData,
}

impl fmt::Display for FundingBias {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FundingBias::LongsPayShorts => write!(f, "longs pay shorts"),
            FundingBias::ShortsPayLongs => write!(f, "shorts pay longs"),
            FundingBias::Neutral => write!(f, "neutral"),
            FundingBias::NoData => write!(f, "no data"),
        }
    }
}

/// Alert thresholds for the spread, in quote-currency units
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpreadThresholds {
    /// Spread above this value is an alert
    pub upper: f64,
    /// Spread below this value is an alert
    pub lower: f64,
}

impl Default for SpreadThresholds {
    fn default() -> Self {
        Self {
            upper: 50.0,
            lower: -50.0,
        }
    }
}

/// One cycle's price observation, immutable once produced
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Quote {
    /// When the observation was taken
    pub timestamp: DateTime<Utc>,
    /// Last spot price
    pub spot_price: f64,
    /// Last futures price, absent on spot-only exchanges
    pub futures_price: Option<f64>,
    /// futures minus spot, defined only when both prices are
    pub spread: Option<f64>,
}

impl Quote {
    pub fn new(spot_price: f64, futures_price: Option<f64>) -> Self {
        Self {
            timestamp: Utc::now(),
            spot_price,
            futures_price,
            spread: futures_price.map(|futures| futures - spot_price),
        }
    }
}

/// One cycle's funding observation, immutable once produced
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FundingObservation {
    /// When the observation was taken
    pub timestamp: DateTime<Utc>,
    /// Resolved funding rate, absent when both queries failed
    pub funding_rate: Option<f64>,
}

impl FundingObservation {
    pub fn new(funding_rate: Option<f64>) -> Self {
        Self {
            timestamp: Utc::now(),
            funding_rate,
        }
    }
}
