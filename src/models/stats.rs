//! Per-run statistics.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::SourceName;

/// Counters for one pipeline execution. Never persisted.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct RunStatistics {
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,

    /// Raw postings returned, per source
    pub fetched_by_source: BTreeMap<SourceName, usize>,

    /// Raw entries that could not be decoded
    pub dropped_malformed: usize,

    /// Postings without a usable URL
    pub dropped_unresolvable: usize,

    /// Postings rejected by the keyword filter
    pub rejected_by_filter: usize,

    /// Filter rejections keyed by reason
    pub rejections: BTreeMap<String, usize>,

    /// Postings already in the store
    pub duplicates: usize,

    /// Postings newly recorded in the store
    pub admitted: usize,

    /// Admitted postings whose batch was delivered
    pub notified: usize,

    /// Admitted postings whose batch failed to deliver
    pub unannounced: usize,

    /// Per-source problems that did not fail the run
    pub source_warnings: Vec<String>,

    /// The run summary was attempted and could not be delivered
    pub summary_failed: bool,
}

impl RunStatistics {
    pub fn new(started_at: DateTime<Utc>) -> Self {
        Self {
            started_at,
            finished_at: None,
            fetched_by_source: BTreeMap::new(),
            dropped_malformed: 0,
            dropped_unresolvable: 0,
            rejected_by_filter: 0,
            rejections: BTreeMap::new(),
            duplicates: 0,
            admitted: 0,
            notified: 0,
            unannounced: 0,
            source_warnings: Vec::new(),
            summary_failed: false,
        }
    }

    /// Total raw postings across sources.
    pub fn total_fetched(&self) -> usize {
        self.fetched_by_source.values().sum()
    }

    pub fn record_fetched(&mut self, source: SourceName, count: usize) {
        *self.fetched_by_source.entry(source).or_default() += count;
    }

    pub fn record_rejection(&mut self, reason: &str) {
        self.rejected_by_filter += 1;
        *self.rejections.entry(reason.to_string()).or_default() += 1;
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        self.source_warnings.push(message.into());
    }

    /// Key/value pairs for summary output.
    pub fn summary_items(&self) -> Vec<(&'static str, String)> {
        vec![
            ("Total scanned", self.total_fetched().to_string()),
            ("Rejected by filter", self.rejected_by_filter.to_string()),
            ("Duplicates", self.duplicates.to_string()),
            ("New postings", self.admitted.to_string()),
            ("Notified", self.notified.to_string()),
            ("Unannounced", self.unannounced.to_string()),
            (
                "Dropped",
                (self.dropped_malformed + self.dropped_unresolvable).to_string(),
            ),
            ("Warnings", self.source_warnings.len().to_string()),
        ]
    }
}
