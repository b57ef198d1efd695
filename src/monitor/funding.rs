//! Funding rate resolution with fallback
//!
//! The live funding endpoint is authoritative; when it fails the most
//! recent settled rate from the history endpoint stands in. When both
//! fail the observation carries no rate, which downstream reports as
//! "no data" instead of failing the cycle.

use tracing::{debug, warn};

use crate::exchange::ExchangeBinding;
use crate::types::FundingObservation;

/// Resolve the current funding rate for a binding, degrading to an
/// empty observation when the exchange cannot supply one.
pub async fn resolve_funding(binding: &ExchangeBinding) -> FundingObservation {
    let (futures, symbol) = match binding.futures_pair() {
        Some(pair) if binding.funding_supported => pair,
        _ => return FundingObservation::new(None),
    };

    match futures.funding_rate(symbol).await {
        Ok(rate) => FundingObservation::new(Some(rate)),
        Err(primary_error) => {
            debug!(
                exchange = %binding.name,
                error = %primary_error,
                "Live funding query failed, falling back to settled history"
            );
            match futures.funding_rate_history(symbol).await {
                Ok(rate) => FundingObservation::new(Some(rate)),
                Err(fallback_error) => {
                    warn!(
                        exchange = %binding.name,
                        primary = %primary_error,
                        fallback = %fallback_error,
                        "Funding rate unavailable from both endpoints"
                    );
                    FundingObservation::new(None)
                }
            }
        }
    }
}
