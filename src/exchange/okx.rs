//! OKX v5 REST adapter
//!
//! Spot and swap tickers share one endpoint keyed by instrument id. Payloads
//! arrive in a code/msg/data envelope with a string-typed code, "0" meaning
//! success.

use async_trait::async_trait;
use serde::Deserialize;

use super::{decode, parse_numeric, read_success_body, ExchangeError, FuturesApi, SpotApi};

const TICKER_URL: &str = "https://www.okx.com/api/v5/market/ticker";
const FUNDING_RATE_URL: &str = "https://www.okx.com/api/v5/public/funding-rate";
const FUNDING_HISTORY_URL: &str = "https://www.okx.com/api/v5/public/funding-rate-history";

const NAME: &str = "okx";

#[derive(Debug, Clone)]
pub struct OkxApi {
    client: reqwest::Client,
}

impl OkxApi {
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
impl SpotApi for OkxApi {
    fn name(&self) -> &'static str {
        NAME
    }

    async fn ticker(&self, symbol: &str) -> Result<f64, ExchangeError> {
        let body = self.get(TICKER_URL, &[("instId", symbol)]).await?;
        parse_ticker(&body)
    }
}

#[async_trait]
impl FuturesApi for OkxApi {
    fn name(&self) -> &'static str {
        NAME
    }

    async fn ticker(&self, symbol: &str) -> Result<f64, ExchangeError> {
        let body = self.get(TICKER_URL, &[("instId", symbol)]).await?;
        parse_ticker(&body)
    }

    async fn funding_rate(&self, symbol: &str) -> Result<f64, ExchangeError> {
        let body = self.get(FUNDING_RATE_URL, &[("instId", symbol)]).await?;
        parse_funding(&body)
    }

    async fn funding_rate_history(&self, symbol: &str) -> Result<f64, ExchangeError> {
        let body = self
            .get(FUNDING_HISTORY_URL, &[("instId", symbol), ("limit", "1")])
            .await?;
        parse_funding(&body)
    }
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    code: String,
    #[serde(default)]
    msg: String,
    #[serde(default = "Vec::new")]
    data: Vec<T>,
}

fn first_entry<T: serde::de::DeserializeOwned>(body: &str) -> Result<T, ExchangeError> {
    let envelope: Envelope<T> = decode(NAME, body)?;
    if envelope.code != "0" {
        return Err(ExchangeError::envelope(
            NAME,
            format!("code {}: {}", envelope.code, envelope.msg),
        ));
    }
    envelope
        .data
        .into_iter()
        .next()
        .ok_or_else(|| ExchangeError::malformed(NAME, "data array is empty"))
}

#[derive(Debug, Deserialize)]
struct TickerEntry {
    last: String,
}

fn parse_ticker(body: &str) -> Result<f64, ExchangeError> {
    let entry: TickerEntry = first_entry(body)?;
    parse_numeric(NAME, "last", &entry.last)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FundingEntry {
    funding_rate: String,
}

// The history endpoint is ordered newest first, so the first entry works
// for both the current-rate and the history query
fn parse_funding(body: &str) -> Result<f64, ExchangeError> {
    let entry: FundingEntry = first_entry(body)?;
    parse_numeric(NAME, "fundingRate", &entry.funding_rate)
}
