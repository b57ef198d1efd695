//! Fear & greed export script
//!
//! Usage: cargo run --bin fear_greed
//!
//! Fetches the recent crypto fear & greed index readings from
//! alternative.me and writes them to a dated CSV. Independent of the
//! spread monitor loop.

use spreadwatch::config::AppConfig;
use spreadwatch::exchange::build_http_client;
use spreadwatch::sentiment::{fetch_index, write_csv};
use std::path::Path;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    info!("🔄 Starting fear & greed export...");

    // 1. Load configuration
    let config = AppConfig::load()?;
    info!("✅ Configuration loaded");

    // 2. Fetch the index readings
    let client = build_http_client(config.monitor.request_timeout())?;
    let records = fetch_index(&client, &config.sentiment).await?;
    info!("✅ Fetched {} readings", records.len());

    // 3. Write the CSV export
    let path = Path::new(&config.sentiment.output_path);
    write_csv(&records, path)?;
    info!("💾 Export saved to {}", path.display());

    Ok(())
}
