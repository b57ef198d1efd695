//! Spread and funding classification
//!
//! Pure helpers mapping raw numbers onto display states. Threshold
//! comparisons are strict, so a spread sitting exactly on a bound is
//! still WITHIN.

use crate::types::{FundingBias, SpreadState, SpreadThresholds};

/// Classify a spread against the configured band
pub fn classify_spread(spread: f64, thresholds: &SpreadThresholds) -> SpreadState {
    if spread > thresholds.upper {
        SpreadState::Above
    } else if spread < thresholds.lower {
        SpreadState::Below
    } else {
        SpreadState::Within
    }
}

/// Classify a funding rate by sign, or report missing data
pub fn classify_funding(funding_rate: Option<f64>) -> FundingBias {
    match funding_rate {
        Some(rate) if rate > 0.0 => FundingBias::LongsPayShorts,
        Some(rate) if rate < 0.0 => FundingBias::ShortsPayLongs,
        Some(_) => FundingBias::Neutral,
        None => FundingBias::NoData,
    }
}
