//! Binance REST adapter
//!
//! Spot prices come from the main API, futures prices and funding rates
//! from the USDT-margined futures API. Region blocks surface as HTTP 451.

use async_trait::async_trait;
use serde::Deserialize;

use super::{decode, parse_numeric, read_success_body, ExchangeError, FuturesApi, SpotApi};

const SPOT_TICKER_URL: &str = "https://api.binance.com/api/v3/ticker/price";
const FUTURES_TICKER_URL: &str = "https://fapi.binance.com/fapi/v1/ticker/price";
const PREMIUM_INDEX_URL: &str = "https://fapi.binance.com/fapi/v1/premiumIndex";
const FUNDING_HISTORY_URL: &str = "https://fapi.binance.com/fapi/v1/fundingRate";

const NAME: &str = "binance";

#[derive(Debug, Clone)]
pub struct BinanceApi {
    client: reqwest::Client,
}

impl BinanceApi {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    async fn get(&self, url: &str, query: &[(&str, &str)]) -> Result<String, ExchangeError> {
        let response = self
            .client
            .get(url)
            .query(query)
            .send()
            .await
            .map_err(|e| ExchangeError::from_reqwest(NAME, e))?;

        read_success_body(NAME, response).await
    }
}

#[async_trait]
impl SpotApi for BinanceApi {
    fn name(&self) -> &'static str {
        NAME
    }

    async fn ticker(&self, symbol: &str) -> Result<f64, ExchangeError> {
        let body = self.get(SPOT_TICKER_URL, &[("symbol", symbol)]).await?;
        parse_price_ticker(&body)
    }
}

#[async_trait]
impl FuturesApi for BinanceApi {
    fn name(&self) -> &'static str {
        NAME
    }

    async fn ticker(&self, symbol: &str) -> Result<f64, ExchangeError> {
        let body = self.get(FUTURES_TICKER_URL, &[("symbol", symbol)]).await?;
        parse_price_ticker(&body)
    }

    async fn funding_rate(&self, symbol: &str) -> Result<f64, ExchangeError> {
        let body = self.get(PREMIUM_INDEX_URL, &[("symbol", symbol)]).await?;
        parse_premium_index(&body)
    }

    async fn funding_rate_history(&self, symbol: &str) -> Result<f64, ExchangeError> {
        let body = self
            .get(FUNDING_HISTORY_URL, &[("symbol", symbol), ("limit", "1")])
            .await?;
        parse_funding_history(&body)
    }
}

// Both ticker endpoints share the same shape: {"symbol":"BTCUSDT","price":"96224.31"}
#[derive(Debug, Deserialize)]
struct PriceTicker {
    price: String,
}

fn parse_price_ticker(body: &str) -> Result<f64, ExchangeError> {
    let ticker: PriceTicker = decode(NAME, body)?;
    parse_numeric(NAME, "price", &ticker.price)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PremiumIndex {
    last_funding_rate: String,
}

fn parse_premium_index(body: &str) -> Result<f64, ExchangeError> {
    let index: PremiumIndex = decode(NAME, body)?;
    parse_numeric(NAME, "lastFundingRate", &index.last_funding_rate)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FundingEntry {
    funding_rate: String,
}

// History is ordered oldest first, the last entry is the latest settlement
fn parse_funding_history(body: &str) -> Result<f64, ExchangeError> {
    let entries: Vec<FundingEntry> = decode(NAME, body)?;
    let last = entries
        .last()
        .ok_or_else(|| ExchangeError::malformed(NAME, "funding history is empty"))?;
    parse_numeric(NAME, "fundingRate", &last.funding_rate)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_spot_ticker() {
        let body = r#"{"symbol":"BTCUSDT","price":"96224.31000000"}"#;
        assert_eq!(parse_price_ticker(body).unwrap(), 96224.31);
    }

    #[test]
    fn parses_futures_ticker() {
        let body = r#"{"symbol":"BTCUSDT","price":"96250.10","time":1724310000000}"#;
        assert_eq!(parse_price_ticker(body).unwrap(), 96250.10);
    }

    #[test]
    fn parses_premium_index_funding_rate() {
        let body = r#"{"symbol":"BTCUSDT","markPrice":"96251.00000000","indexPrice":"96230.52000000","estimatedSettlePrice":"96240.00000000","lastFundingRate":"0.00010000","interestRate":"0.00010000","nextFundingTime":1724313600000,"time":1724310000000}"#;
        assert_eq!(parse_premium_index(body).unwrap(), 0.0001);
    }

    #[test]
    fn parses_latest_funding_history_entry() {
        let body = r#"[{"symbol":"BTCUSDT","fundingTime":1724256000000,"fundingRate":"0.00005000","markPrice":"95900.00"},{"symbol":"BTCUSDT","fundingTime":1724284800000,"fundingRate":"-0.00008123","markPrice":"96000.00"}]"#;
        assert_eq!(parse_funding_history(body).unwrap(), -0.00008123);
    }

    #[test]
    fn empty_funding_history_is_malformed() {
        assert!(matches!(
            parse_funding_history("[]"),
            Err(ExchangeError::Malformed { .. })
        ));
    }

    #[test]
    fn non_numeric_price_is_malformed() {
        let body = r#"{"symbol":"BTCUSDT","price":"not-a-price"}"#;
        assert!(matches!(
            parse_price_ticker(body),
            Err(ExchangeError::Malformed { .. })
        ));
    }
}
