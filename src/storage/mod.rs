//! Persistence for postings that have already been reported.
//!
//! A single SQLite file records every admitted posting's identity key. A key
//! is written once, before any notification, and never changes afterwards.
//!
//! ```text
//! data/
//! └── seen.db     # seen_postings(identity_key PK, url_key, url, source_name,
//!                 #               title, company, first_seen)
//! ```

pub mod sqlite;

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

pub use sqlite::SeenStore;

/// Result of offering a posting to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// First sighting; the posting is now recorded
    Admitted,
    /// Already recorded under its identity or URL key
    Duplicate,
}

/// One persisted row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SeenRecord {
    pub identity_key: String,
    pub url_key: String,
    pub url: String,
    pub source_name: String,
    pub title: String,
    pub company: String,
    pub first_seen: DateTime<Utc>,
}

/// Aggregate counts over the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    pub total_seen: u64,
    /// Records first seen within the last `window_days`
    pub seen_in_window: u64,
    pub window_days: u32,
    pub by_source: BTreeMap<String, u64>,
}
