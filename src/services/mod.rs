//! Service layer for the sentinel application.
//!
//! This module contains the I/O-facing components:
//! - Structured job-board fetching (`BoardFetcher`)
//! - Search-derived discovery (`SearchFetcher`)
//! - Notification delivery (`Notifier`)

mod boards;
pub mod notifier;
pub mod search;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::models::RawPosting;

pub use boards::{BoardFetcher, GREENHOUSE_API, LEVER_API};
pub use notifier::{BatchReport, Channel, LogChannel, Notifier, WebhookChannel};
pub use search::SearchFetcher;

/// Per-run information handed to every fetcher.
#[derive(Debug, Clone, Copy)]
pub struct QueryContext {
    pub run_started_at: DateTime<Utc>,
}

impl QueryContext {
    pub fn new(run_started_at: DateTime<Utc>) -> Self {
        Self { run_started_at }
    }
}

/// Everything one fetcher produced in a run.
#[derive(Debug, Default)]
pub struct FetchBatch {
    pub postings: Vec<RawPosting>,
    /// Entries that could not be decoded
    pub malformed: usize,
    /// Per-identifier failures that did not stop the fetcher
    pub warnings: Vec<String>,
}

impl FetchBatch {
    pub fn extend(&mut self, other: FetchBatch) {
        self.postings.extend(other.postings);
        self.malformed += other.malformed;
        self.warnings.extend(other.warnings);
    }
}

/// A source of raw postings.
#[async_trait]
pub trait SourceFetcher: Send + Sync {
    /// Label used in logs and warnings.
    fn name(&self) -> &str;

    /// Fetch everything this source currently lists.
    ///
    /// Failures for individual identifiers are reported in
    /// [`FetchBatch::warnings`]; an `Err` means the whole source failed.
    async fn fetch_postings(&self, context: &QueryContext) -> Result<FetchBatch>;
}

/// Decode a JSON array entry by entry, counting the ones that do not fit.
pub(crate) fn decode_entries<T: serde::de::DeserializeOwned>(
    entries: Vec<serde_json::Value>,
    origin: &str,
) -> (Vec<T>, usize) {
    let mut decoded = Vec::with_capacity(entries.len());
    let mut malformed = 0;
    for entry in entries {
        match serde_json::from_value(entry) {
            Ok(item) => decoded.push(item),
            Err(e) => {
                malformed += 1;
                log::debug!("Skipping malformed entry from {}: {}", origin, e);
            }
        }
    }
    (decoded, malformed)
}
