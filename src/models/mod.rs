// src/models/mod.rs

//! Domain models for the sentinel pipeline.
//!
//! This module contains all data structures used throughout the application,
//! organized by their primary purpose.

mod config;
mod posting;
mod stats;

// Re-export all public types
pub use config::{
    BoardsConfig, Config, FilterConfig, HttpConfig, LoggingConfig, MAX_BATCH_SIZE, NotifyConfig,
    RetryConfig, SearchConfig, StoreConfig,
};
pub use posting::{
    CanonicalPosting, GreenhouseJob, LeverCategories, LeverJob, NamedLocation, RawPosting,
    SearchHit, SourceName,
};
pub use stats::RunStatistics;
