//! Spread monitoring core
//!
//! The poll driver walks fetch → evaluate → publish cycles over a bound
//! exchange; the rolling histories, classification helpers and snapshot
//! sinks live beside it.

pub mod driver;
pub mod evaluate;
pub mod funding;
pub mod history;
pub mod quotes;
pub mod snapshot;

pub use driver::PollDriver;
pub use evaluate::{classify_funding, classify_spread};
pub use funding::resolve_funding;
pub use history::{HistoryWindow, HISTORY_DEPTH};
pub use quotes::fetch_quote;
pub use snapshot::{
    BroadcastSink, LogSink, MonitorEvent, MonitorSnapshot, Notice, NoticeSeverity, SnapshotSink,
};
