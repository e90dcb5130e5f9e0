// src/services/boards.rs

//! Structured job-board fetcher.
//!
//! Queries the public Greenhouse board API per organization and falls back to
//! the Lever postings API when Greenhouse has no board of that name.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use super::{FetchBatch, QueryContext, SourceFetcher, decode_entries};
use crate::error::{FetchError, Result};
use crate::models::{BoardsConfig, GreenhouseJob, LeverJob, RawPosting};
use crate::utils::http::{FetchRequest, HttpFetch};

pub const GREENHOUSE_API: &str = "https://boards-api.greenhouse.io/v1/boards";
pub const LEVER_API: &str = "https://api.lever.co/v0/postings";

/// Fetcher for Greenhouse and Lever organizations.
pub struct BoardFetcher {
    http: Arc<dyn HttpFetch>,
    organizations: Vec<String>,
    lever_organizations: Vec<String>,
}

impl BoardFetcher {
    pub fn new(http: Arc<dyn HttpFetch>, config: &BoardsConfig) -> Self {
        let clean = |list: &[String]| -> Vec<String> {
            list.iter()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        };
        Self {
            http,
            organizations: clean(&config.organizations),
            lever_organizations: clean(&config.lever_organizations),
        }
    }

    async fn fetch_greenhouse(&self, board: &str) -> std::result::Result<FetchBatch, FetchError> {
        let url = format!("{GREENHOUSE_API}/{board}/jobs");
        let response = self.http.fetch(&FetchRequest::get(&url)).await?;
        let body: Value = response.json()?;

        // The board API wraps jobs in an object; tolerate a bare array too.
        let entries = match body {
            Value::Object(mut map) => match map.remove("jobs") {
                Some(Value::Array(items)) => items,
                _ => return Err(FetchError::malformed(&url, "missing `jobs` array")),
            },
            Value::Array(items) => items,
            _ => return Err(FetchError::malformed(&url, "unexpected response shape")),
        };

        let (jobs, malformed) = decode_entries::<GreenhouseJob>(entries, &url);
        log::info!("Found {} jobs on Greenhouse ({})", jobs.len(), board);

        Ok(FetchBatch {
            postings: jobs
                .into_iter()
                .map(|job| RawPosting::Greenhouse {
                    board: board.to_string(),
                    job,
                })
                .collect(),
            malformed,
            warnings: Vec::new(),
        })
    }

    async fn fetch_lever(&self, company: &str) -> std::result::Result<FetchBatch, FetchError> {
        let url = format!("{LEVER_API}/{company}");
        let request = FetchRequest::get(&url).query("mode", "json");
        let response = self.http.fetch(&request).await?;

        let entries = match response.json::<Value>()? {
            Value::Array(items) => items,
            _ => return Err(FetchError::malformed(&url, "expected a JSON array")),
        };

        let (jobs, malformed) = decode_entries::<LeverJob>(entries, &url);
        log::info!("Found {} jobs on Lever ({})", jobs.len(), company);

        Ok(FetchBatch {
            postings: jobs
                .into_iter()
                .map(|job| RawPosting::Lever {
                    company: company.to_string(),
                    job,
                })
                .collect(),
            malformed,
            warnings: Vec::new(),
        })
    }

    /// Greenhouse first; Lever only when Greenhouse reports the board missing.
    async fn fetch_with_fallback(&self, org: &str) -> std::result::Result<FetchBatch, FetchError> {
        match self.fetch_greenhouse(org).await {
            Err(e) if e.is_not_found() => {
                log::info!("No Greenhouse board for {}, trying Lever", org);
                self.fetch_lever(org).await
            }
            other => other,
        }
    }

    fn record_failure(batch: &mut FetchBatch, org: &str, error: &FetchError) {
        let message = if error.is_not_found() {
            format!("{org}: no board found")
        } else {
            format!("{org}: {error}")
        };
        log::warn!("Skipping organization {}", message);
        batch.warnings.push(message);
    }
}

#[async_trait]
impl SourceFetcher for BoardFetcher {
    fn name(&self) -> &str {
        "boards"
    }

    async fn fetch_postings(&self, _context: &QueryContext) -> Result<FetchBatch> {
        let mut batch = FetchBatch::default();

        for org in &self.organizations {
            match self.fetch_with_fallback(org).await {
                Ok(found) => batch.extend(found),
                Err(e) => Self::record_failure(&mut batch, org, &e),
            }
        }

        for company in &self.lever_organizations {
            match self.fetch_lever(company).await {
                Ok(found) => batch.extend(found),
                Err(e) => Self::record_failure(&mut batch, company, &e),
            }
        }

        log::info!(
            "Board fetch complete: {} postings, {} malformed, {} warnings",
            batch.postings.len(),
            batch.malformed,
            batch.warnings.len()
        );
        Ok(batch)
    }
}
