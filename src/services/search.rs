// src/services/search.rs

//! Search-derived discovery via the Serper API.
//!
//! Builds a bounded set of domain-scoped queries, sends each one to the search
//! endpoint and returns the organic results as raw postings. The parsing
//! helpers at the bottom turn a search hit into title, company and location;
//! they are best-effort and never fail.

use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use chrono::Duration;
use regex::Regex;
use serde_json::{Value, json};

use super::{FetchBatch, QueryContext, SourceFetcher, decode_entries};
use crate::error::{FetchError, Result};
use crate::models::{RawPosting, SearchConfig, SearchHit, SourceName};
use crate::utils::http::{FetchRequest, HttpFetch};
use crate::utils::url::{first_path_segment, get_domain, slug_to_display_name};

const WORKDAY_DOMAIN: &str = "myworkdayjobs.com";
const GREENHOUSE_BOARDS: &str = "boards.greenhouse.io";
const LEVER_BOARDS: &str = "jobs.lever.co";

const GREENHOUSE_DISCOVERY: &str = "greenhouse-discovery";
const LEVER_DISCOVERY: &str = "lever-discovery";

/// Board family a discovery query searched, by query label.
pub fn discovery_board(label: &str) -> Option<SourceName> {
    match label {
        GREENHOUSE_DISCOVERY => Some(SourceName::Greenhouse),
        LEVER_DISCOVERY => Some(SourceName::Lever),
        _ => None,
    }
}

/// One query sent to the search API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    /// Short label for logs and raw postings
    pub label: String,
    pub q: String,
}

/// Fetcher over the search API.
pub struct SearchFetcher {
    http: Arc<dyn HttpFetch>,
    config: SearchConfig,
}

impl SearchFetcher {
    pub fn new(http: Arc<dyn HttpFetch>, config: SearchConfig) -> Self {
        Self { http, config }
    }

    fn api_key(&self) -> Option<&str> {
        self.config
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
    }

    /// Pre-built domain queries followed by custom ones, capped at `max_queries`.
    pub fn build_queries(&self, context: &QueryContext) -> Vec<SearchQuery> {
        let mut domains = vec![("workday", WORKDAY_DOMAIN)];
        if self.config.discovery {
            domains.push((GREENHOUSE_DISCOVERY, GREENHOUSE_BOARDS));
            domains.push((LEVER_DISCOVERY, LEVER_BOARDS));
        }

        let titles = self
            .config
            .title_terms
            .iter()
            .map(|t| t.trim())
            .filter(|t| !t.is_empty())
            .map(|t| format!("\"{t}\""))
            .collect::<Vec<_>>()
            .join(" OR ");

        let mut suffix = String::new();
        for term in &self.config.excluded_terms {
            let term = term.trim();
            if !term.is_empty() {
                suffix.push_str(&format!(" -{term}"));
            }
        }
        if let Some(days) = self.config.posted_within_days {
            let after = context.run_started_at - Duration::days(i64::from(days));
            suffix.push_str(&format!(" after:{}", after.format("%Y-%m-%d")));
        }

        let mut queries: Vec<SearchQuery> = Vec::new();
        if !titles.is_empty() {
            queries.extend(domains.into_iter().map(|(label, domain)| SearchQuery {
                label: label.to_string(),
                q: format!("site:{domain} ({titles}){suffix}"),
            }));
        }
        queries.extend(
            self.config
                .custom_queries
                .iter()
                .map(|q| q.trim())
                .filter(|q| !q.is_empty())
                .enumerate()
                .map(|(i, q)| SearchQuery {
                    label: format!("custom-{}", i + 1),
                    q: q.to_string(),
                }),
        );

        if queries.len() > self.config.max_queries {
            log::warn!(
                "Limiting search to {} of {} queries",
                self.config.max_queries,
                queries.len()
            );
            queries.truncate(self.config.max_queries);
        }
        queries
    }

    async fn run_query(
        &self,
        api_key: &str,
        query: &SearchQuery,
    ) -> std::result::Result<FetchBatch, FetchError> {
        let payload = json!({
            "q": query.q,
            "num": self.config.results_per_query,
            "gl": self.config.country,
            "hl": self.config.language,
        });
        let request =
            FetchRequest::post_json(&self.config.endpoint, payload).header("X-API-KEY", api_key);

        let body: Value = self.http.fetch(&request).await?.json()?;
        let entries = match body.get("organic") {
            Some(Value::Array(items)) => items.clone(),
            Some(_) => {
                return Err(FetchError::malformed(
                    &self.config.endpoint,
                    "`organic` is not an array",
                ));
            }
            // No results
            None => Vec::new(),
        };

        let (hits, malformed) = decode_entries::<SearchHit>(entries, &query.label);
        log::info!("Search `{}` returned {} results", query.label, hits.len());

        Ok(FetchBatch {
            postings: hits
                .into_iter()
                .map(|hit| RawPosting::Search {
                    query: query.label.clone(),
                    hit,
                })
                .collect(),
            malformed,
            warnings: Vec::new(),
        })
    }
}

#[async_trait]
impl SourceFetcher for SearchFetcher {
    fn name(&self) -> &str {
        "search"
    }

    async fn fetch_postings(&self, context: &QueryContext) -> Result<FetchBatch> {
        let Some(api_key) = self.api_key() else {
            log::info!("No search API key configured, skipping search discovery");
            return Ok(FetchBatch::default());
        };

        let mut batch = FetchBatch::default();
        for query in self.build_queries(context) {
            log::debug!("Searching: {}", query.q);
            match self.run_query(api_key, &query).await {
                Ok(found) => batch.extend(found),
                Err(e) => {
                    log::warn!("Search query `{}` failed: {}", query.label, e);
                    batch.warnings.push(format!("search {}: {}", query.label, e));
                }
            }
        }
        Ok(batch)
    }
}

// ---------------------------------------------------------------------------
// Hit parsing
// ---------------------------------------------------------------------------

/// Display fields recovered from a search hit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedHit {
    pub title: String,
    pub company: String,
    pub location: String,
}

static APPLICATION_TITLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*job application for\s+(.+?)\s+at\s+(.+?)\s*$").expect("valid regex")
});

static WORK_MODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(?:Remote|Hybrid|On-site)\b").expect("valid regex"));

static CITY_STATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b[A-Z][a-z]+(?:\s+[A-Z][a-z]+)*,\s*[A-Z]{2}\b").expect("valid regex")
});

/// Extract title, company and location from a search hit.
pub fn parse_hit(hit: &SearchHit) -> ParsedHit {
    let raw_title = hit.title.as_deref().unwrap_or_default();
    let link = hit.link.as_deref().unwrap_or_default();

    let (title, title_company) = match APPLICATION_TITLE.captures(raw_title) {
        Some(caps) => (caps[1].to_string(), Some(caps[2].to_string())),
        None => (raw_title.to_string(), None),
    };

    let company = company_from_url(link)
        .or(title_company)
        .unwrap_or_default();

    ParsedHit {
        title: strip_title_suffixes(&title, &company),
        company,
        location: location_from_text(hit.snippet.as_deref().unwrap_or_default()),
    }
}

/// Drop ` | Site` tails and a trailing ` - <company>`.
fn strip_title_suffixes(title: &str, company: &str) -> String {
    let mut title = title.split(" | ").next().unwrap_or_default().trim();
    if !company.is_empty() {
        if let Some((head, tail)) = title.rsplit_once(" - ") {
            if tail.trim().eq_ignore_ascii_case(company) {
                title = head.trim();
            }
        }
    }
    title.to_string()
}

/// Company implied by where the listing is hosted.
pub fn company_from_url(link: &str) -> Option<String> {
    let host = get_domain(link)?;

    let slug = if host.ends_with(WORKDAY_DOMAIN) {
        host.split('.').next().map(str::to_string)
    } else if host.ends_with("greenhouse.io") || host == LEVER_BOARDS {
        first_path_segment(link)
    } else {
        None
    }?;

    let name = slug_to_display_name(&slug);
    (!name.is_empty()).then_some(name)
}

/// Work mode or `City, ST` from free text; empty when neither is present.
pub fn location_from_text(text: &str) -> String {
    WORK_MODE
        .find(text)
        .or_else(|| CITY_STATE.find(text))
        .map(|m| m.as_str().to_string())
        .unwrap_or_default()
}
