//! Per-run and per-source crawl counts

use serde::Serialize;
use std::collections::BTreeMap;

/// How a source's crawl ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SourceOutcome {
    /// Ran out of pages or reached the page limit
    Completed,

    /// Stopped early: empty first page or too many consecutive errors
    Aborted { reason: String },

    /// Stopped by the operator; results so far are kept
    Cancelled,

    /// The source could not be set up or its worker crashed
    Failed { error: String },
}

/// Counts for one source
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceCounts {
    pub source_name: String,
    pub pages_requested: u64,
    pub new: u64,
    pub duplicate: u64,
    pub errors: u64,
    /// Fragments that were not listings or were excluded
    pub skipped: u64,
    pub outcome: SourceOutcome,
}

impl SourceCounts {
    pub fn new(source_name: &str) -> Self {
        Self {
            source_name: source_name.to_string(),
            pages_requested: 0,
            new: 0,
            duplicate: 0,
            errors: 0,
            skipped: 0,
            outcome: SourceOutcome::Completed,
        }
    }

    /// Counts for a source that failed before crawling anything
    pub fn failed(source_name: &str, error: impl ToString) -> Self {
        Self {
            errors: 1,
            outcome: SourceOutcome::Failed {
                error: error.to_string(),
            },
            ..Self::new(source_name)
        }
    }
}

/// Result of a whole crawl
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub new_count: u64,
    pub duplicate_count: u64,
    pub error_count: u64,
    pub skipped_count: u64,
    pub per_source: BTreeMap<String, SourceCounts>,
    /// True when the operator stopped the run
    pub cancelled: bool,
}

impl RunSummary {
    /// Folds one source's counts into the totals
    pub fn add_source(&mut self, counts: SourceCounts) {
        self.new_count += counts.new;
        self.duplicate_count += counts.duplicate;
        self.error_count += counts.errors;
        self.skipped_count += counts.skipped;
        if counts.outcome == SourceOutcome::Cancelled {
            self.cancelled = true;
        }
        self.per_source.insert(counts.source_name.clone(), counts);
    }

    pub fn source(&self, name: &str) -> Option<&SourceCounts> {
        self.per_source.get(name)
    }
}
