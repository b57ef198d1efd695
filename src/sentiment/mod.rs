//! Fear & Greed index export
//!
//! One-shot fetch of the alternative.me crypto sentiment index,
//! flattened into a dated CSV. Runs from its own binary, independent of
//! the spread monitor.

use anyhow::{anyhow, bail, Context, Result};
use chrono::DateTime;
use csv::WriterBuilder;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::info;

use crate::config::SentimentConfig;

/// One day of the index, ready for CSV serialization
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SentimentRecord {
    pub date: String,
    pub value: u32,
    pub classification: String,
}

#[derive(Debug, Deserialize)]
struct IndexResponse {
    data: Vec<IndexEntry>,
}

/// Raw API entry: every field arrives as a string
#[derive(Debug, Deserialize)]
struct IndexEntry {
    value: String,
    value_classification: String,
    timestamp: String,
}

/// Fetch the most recent `limit` index readings, newest first
pub async fn fetch_index(client: &Client, config: &SentimentConfig) -> Result<Vec<SentimentRecord>> {
    info!(
        endpoint = %config.endpoint,
        limit = config.limit,
        "Fetching fear & greed index"
    );

    let response = client
        .get(&config.endpoint)
        .query(&[("limit", config.limit)])
        .send()
        .await
        .context("Failed to query the sentiment API")?;

    if !response.status().is_success() {
        bail!("sentiment API returned HTTP {}", response.status());
    }

    let body = response
        .text()
        .await
        .context("Failed to read the sentiment API response")?;
    parse_index(&body)
}

/// Write records as CSV with a header row, creating parent directories
/// as needed. An existing file is replaced.
pub fn write_csv(records: &[SentimentRecord], path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).context("Failed to create the output directory")?;
        }
    }

    let mut writer = WriterBuilder::new()
        .has_headers(true)
        .from_path(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;

    for record in records {
        writer
            .serialize(record)
            .context("Failed to write sentiment record")?;
    }
    writer.flush().context("Failed to flush sentiment output")?;

    info!(rows = records.len(), path = %path.display(), "Sentiment export written");
    Ok(())
}

fn parse_index(body: &str) -> Result<Vec<SentimentRecord>> {
    let response: IndexResponse =
        serde_json::from_str(body).context("Unexpected sentiment API payload")?;
    if response.data.is_empty() {
        bail!("sentiment API returned no data entries");
    }

    response.data.into_iter().map(to_record).collect()
}

fn to_record(entry: IndexEntry) -> Result<SentimentRecord> {
    let value: u32 = entry
        .value
        .parse()
        .with_context(|| format!("Bad index value: {}", entry.value))?;
    let unix: i64 = entry
        .timestamp
        .parse()
        .with_context(|| format!("Bad index timestamp: {}", entry.timestamp))?;
    let date = DateTime::from_timestamp(unix, 0)
        .ok_or_else(|| anyhow!("Timestamp out of range: {}", unix))?
        .format("%Y-%m-%d")
        .to_string();

    Ok(SentimentRecord {
        date,
        value,
        classification: entry.value_classification,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_index_converts_strings() {
        let body = r#"{
            "name": "Fear and Greed Index",
            "data": [
                {
                    "value": "39",
                    "value_classification": "Fear",
                    "timestamp": "1692748800",
                    "time_until_update": "3600"
                },
                {
                    "value": "72",
                    "value_classification": "Greed",
                    "timestamp": "1692662400"
                }
            ],
            "metadata": {"error": null}
        }"#;

        let records = parse_index(body).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].value, 39);
        assert_eq!(records[0].classification, "Fear");
        assert_eq!(records[0].date, "2023-08-23");
        assert_eq!(records[1].value, 72);
        assert_eq!(records[1].date, "2023-08-22");
    }

    #[test]
    fn test_parse_index_rejects_empty_data() {
        let body = r#"{"name": "Fear and Greed Index", "data": [], "metadata": {"error": null}}"#;
        assert!(parse_index(body).is_err());
    }

    #[test]
    fn test_parse_index_rejects_non_numeric_value() {
        let body = r#"{"data": [{"value": "n/a", "value_classification": "Fear", "timestamp": "1692748800"}]}"#;
        assert!(parse_index(body).is_err());
    }

    #[test]
    fn test_write_csv_emits_header_and_rows() {
        let records = vec![
            SentimentRecord {
                date: "2023-08-23".to_string(),
                value: 39,
                classification: "Fear".to_string(),
            },
            SentimentRecord {
                date: "2023-08-22".to_string(),
                value: 72,
                classification: "Greed".to_string(),
            },
        ];

        let dir = std::env::temp_dir().join("spreadwatch_sentiment_test");
        let path = dir.join("fear_greed.csv");
        write_csv(&records, &path).unwrap();

        let contents = fs::read_to_string(&path).unwrap();
        let mut lines = contents.lines();
        assert_eq!(lines.next(), Some("date,value,classification"));
        assert_eq!(lines.next(), Some("2023-08-23,39,Fear"));
        assert_eq!(lines.next(), Some("2023-08-22,72,Greed"));

        fs::remove_dir_all(&dir).ok();
    }
}
