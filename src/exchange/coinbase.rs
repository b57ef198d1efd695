//! Coinbase Exchange REST adapter
//!
//! Spot-only candidate: Coinbase Exchange lists no perpetual futures, so it
//! backs the monitor with a price but no spread and no funding data.

use async_trait::async_trait;
use serde::Deserialize;

use super::{decode, parse_numeric, read_success_body, ExchangeError, SpotApi};

const PRODUCTS_URL: &str = "https://api.exchange.coinbase.com/products";

const NAME: &str = "coinbase";

#[derive(Debug, Clone)]
pub struct CoinbaseApi {
    client: reqwest::Client,
}

impl CoinbaseApi {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl SpotApi for CoinbaseApi {
    fn name(&self) -> &'static str {
        NAME
    }

    async fn ticker(&self, symbol: &str) -> Result<f64, ExchangeError> {
        let url = format!("{}/{}/ticker", PRODUCTS_URL, symbol);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| ExchangeError::from_reqwest(NAME, e))?;

        let body = read_success_body(NAME, response).await?;
        parse_ticker(&body)
    }
}

#[derive(Debug, Deserialize)]
struct Ticker {
    price: String,
}

fn parse_ticker(body: &str) -> Result<f64, ExchangeError> {
    let ticker: Ticker = decode(NAME, body)?;
    parse_numeric(NAME, "price", &ticker.price)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_ticker() {
        let body = r#"{"trade_id":521399115,"price":"96224.31","size":"0.00125","time":"2025-08-22T02:00:00.000000Z","bid":"96224.30","ask":"96224.32","volume":"10482.551"}"#;
        assert_eq!(parse_ticker(body).unwrap(), 96224.31);
    }

    #[test]
    fn missing_price_is_malformed() {
        let body = r#"{"message":"NotFound"}"#;
        assert!(matches!(
            parse_ticker(body),
            Err(ExchangeError::Malformed { .. })
        ));
    }
}
