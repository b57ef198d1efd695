//! Bybit v5 REST adapter
//!
//! Every endpoint wraps its payload in a retCode/retMsg envelope; retCode 0
//! is success, anything else is surfaced as an API error. The linear ticker
//! already carries the current funding rate, so it doubles as the primary
//! funding query.

use async_trait::async_trait;
use serde::Deserialize;

use super::{decode, parse_numeric, read_success_body, ExchangeError, FuturesApi, SpotApi};

const TICKERS_URL: &str = "https://api.bybit.com/v5/market/tickers";
const FUNDING_HISTORY_URL: &str = "https://api.bybit.com/v5/market/funding/history";

const NAME: &str = "bybit";

#[derive(Debug, Clone)]
pub struct BybitApi {
    client: reqwest::Client,
}

impl BybitApi {
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
impl SpotApi for BybitApi {
    fn name(&self) -> &'static str {
        NAME
    }

    async fn ticker(&self, symbol: &str) -> Result<f64, ExchangeError> {
        let body = self
            .get(TICKERS_URL, &[("category", "spot"), ("symbol", symbol)])
            .await?;
        parse_ticker_price(&body)
    }
}

#[async_trait]
impl FuturesApi for BybitApi {
    fn name(&self) -> &'static str {
        NAME
    }

    async fn ticker(&self, symbol: &str) -> Result<f64, ExchangeError> {
        let body = self
            .get(TICKERS_URL, &[("category", "linear"), ("symbol", symbol)])
            .await?;
        parse_ticker_price(&body)
    }

    async fn funding_rate(&self, symbol: &str) -> Result<f64, ExchangeError> {
        let body = self
            .get(TICKERS_URL, &[("category", "linear"), ("symbol", symbol)])
            .await?;
        parse_ticker_funding(&body)
    }

    async fn funding_rate_history(&self, symbol: &str) -> Result<f64, ExchangeError> {
        let body = self
            .get(
                FUNDING_HISTORY_URL,
                &[("category", "linear"), ("symbol", symbol), ("limit", "1")],
            )
            .await?;
        parse_funding_history(&body)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Status {
    ret_code: i64,
    ret_msg: String,
}

fn check_envelope(body: &str) -> Result<(), ExchangeError> {
    let status: Status = decode(NAME, body)?;
    if status.ret_code != 0 {
        return Err(ExchangeError::envelope(
            NAME,
            format!("retCode {}: {}", status.ret_code, status.ret_msg),
        ));
    }
    Ok(())
}

#[derive(Debug, Deserialize)]
struct TickerEnvelope {
    result: TickerResult,
}

#[derive(Debug, Deserialize)]
struct TickerResult {
    list: Vec<TickerEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TickerEntry {
    last_price: String,
    #[serde(default)]
    funding_rate: Option<String>,
}

fn first_ticker(body: &str) -> Result<TickerEntry, ExchangeError> {
    check_envelope(body)?;
    let envelope: TickerEnvelope = decode(NAME, body)?;
    envelope
        .result
        .list
        .into_iter()
        .next()
        .ok_or_else(|| ExchangeError::malformed(NAME, "ticker list is empty"))
}

fn parse_ticker_price(body: &str) -> Result<f64, ExchangeError> {
    let entry = first_ticker(body)?;
    parse_numeric(NAME, "lastPrice", &entry.last_price)
}

fn parse_ticker_funding(body: &str) -> Result<f64, ExchangeError> {
    let entry = first_ticker(body)?;
    // Spot tickers omit the field, expiring futures may leave it blank
    let raw = entry
        .funding_rate
        .as_deref()
        .filter(|raw| !raw.trim().is_empty())
        .ok_or_else(|| ExchangeError::malformed(NAME, "ticker has no fundingRate"))?;
    parse_numeric(NAME, "fundingRate", raw)
}

#[derive(Debug, Deserialize)]
struct FundingEnvelope {
    result: FundingResult,
}

#[derive(Debug, Deserialize)]
struct FundingResult {
    list: Vec<FundingEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FundingEntry {
    funding_rate: String,
}

// Funding history is ordered newest first
fn parse_funding_history(body: &str) -> Result<f64, ExchangeError> {
    check_envelope(body)?;
    let envelope: FundingEnvelope = decode(NAME, body)?;
    let entry = envelope
        .result
        .list
        .first()
        .ok_or_else(|| ExchangeError::malformed(NAME, "funding history is empty"))?;
    parse_numeric(NAME, "fundingRate", &entry.funding_rate)
}
