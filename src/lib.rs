//! Spreadwatch Library
//!
//! BTC spot/futures spread monitor with exchange failover

pub mod config;
pub mod exchange;
pub mod monitor;
pub mod sentiment;
pub mod types;

#[cfg(feature = "dashboard")]
pub mod dashboard;
