//! Ordered-candidate exchange selection
//!
//! Walks the configured candidate list, probes each exchange with one live
//! ticker fetch per configured market, and binds the first that answers.
//! Region-blocked candidates are skipped with a warning distinguishable from
//! ordinary failures, and every skip is recorded for the caller to surface.

use thiserror::Error;
use tracing::{debug, info, warn};

use super::{Candidate, ExchangeBinding, ExchangeError};

/// A candidate that failed its probe, with the classified reason
#[derive(Debug)]
pub struct SkippedCandidate {
    pub name: String,
    pub error: ExchangeError,
}

/// Outcome of a successful selection
pub struct Selection {
    pub binding: ExchangeBinding,
    /// Candidates that were tried and skipped before the binding, in order
    pub skipped: Vec<SkippedCandidate>,
}

#[derive(Debug, Error)]
pub enum SelectionError {
    #[error("all {} exchange candidates failed", .skipped.len())]
    Exhausted { skipped: Vec<SkippedCandidate> },
}

/// Try candidates in order and bind the first fully working one
pub async fn select_exchange(candidates: &[Candidate]) -> Result<Selection, SelectionError> {
    let mut skipped = Vec::new();

    for candidate in candidates {
        match probe(candidate).await {
            Ok((spot, futures)) => {
                info!(
                    exchange = %candidate.name,
                    spot,
                    futures = ?futures,
                    "✅ Exchange selected"
                );
                return Ok(Selection {
                    binding: ExchangeBinding::from_candidate(candidate),
                    skipped,
                });
            }
            Err(error) => {
                if error.is_region_block() {
                    warn!(
                        exchange = %candidate.name,
                        "Exchange unavailable from this region, trying next candidate"
                    );
                } else {
                    warn!(
                        exchange = %candidate.name,
                        error = %error,
                        "Exchange probe failed, trying next candidate"
                    );
                }
                skipped.push(SkippedCandidate {
                    name: candidate.name.clone(),
                    error,
                });
            }
        }
    }

    Err(SelectionError::Exhausted { skipped })
}

/// Liveness probe: one spot ticker, plus one futures ticker when configured.
/// Funding is not probed since its unavailability is tolerated per cycle.
async fn probe(candidate: &Candidate) -> Result<(f64, Option<f64>), ExchangeError> {
    let spot = candidate.spot.ticker(&candidate.spot_symbol).await?;
    debug!(exchange = %candidate.name, price = spot, "Spot probe answered");

    let futures = match (&candidate.futures, &candidate.futures_symbol) {
        (Some(api), Some(symbol)) => {
            let price = api.ticker(symbol).await?;
            debug!(exchange = %candidate.name, price, "Futures probe answered");
            Some(price)
        }
        _ => None,
    };

    Ok((spot, futures))
}
