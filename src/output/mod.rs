//! Output module for crawl results
//!
//! This module handles:
//! - Per-run and per-source counts returned to callers
//! - Store statistics shown by the CLI

pub mod stats;
mod summary;

pub use stats::{load_statistics, print_statistics, HarvestStatistics};
pub use summary::{RunSummary, SourceCounts, SourceOutcome};
