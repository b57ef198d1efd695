//! Per-cycle price quote assembly

use tracing::debug;

use crate::exchange::{ExchangeBinding, ExchangeError};
use crate::types::Quote;

/// Fetch spot and, when the binding has one, futures price in one pass.
///
/// The spot leg is mandatory and any failure there aborts the cycle.
/// A missing futures market yields a quote without a spread rather
/// than an error.
pub async fn fetch_quote(binding: &ExchangeBinding) -> Result<Quote, ExchangeError> {
    let spot_price = binding.spot.ticker(&binding.spot_symbol).await?;

    let futures_price = match binding.futures_pair() {
        Some((futures, symbol)) => Some(futures.ticker(symbol).await?),
        None => {
            debug!(
                exchange = %binding.name,
                "No futures market bound, publishing spot only"
            );
            None
        }
    };

    Ok(Quote::new(spot_price, futures_price))
}
