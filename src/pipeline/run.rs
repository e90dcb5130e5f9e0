// src/pipeline/run.rs

//! One discovery → notification run.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use thiserror::Error;

use super::filter::{FilterPolicy, KeywordFilter, tally};
use super::normalize::normalize;
use crate::error::{AppError, Result};
use crate::models::{CanonicalPosting, Config, RawPosting, RunStatistics, StoreConfig};
use crate::services::{BoardFetcher, Notifier, QueryContext, SearchFetcher, SourceFetcher};
use crate::storage::{Admission, SeenStore};
use crate::utils::http::{HttpFetch, RateLimitedClient};
use crate::utils::retry::RetryPolicy;

/// A run that stopped before completing, with the counters gathered so far.
#[derive(Error, Debug)]
#[error("run aborted: {source}")]
pub struct RunAborted {
    pub source: AppError,
    pub stats: RunStatistics,
}

/// Sequences fetch, normalize, filter, admit and notify.
pub struct Pipeline {
    fetchers: Vec<Box<dyn SourceFetcher>>,
    filter: KeywordFilter,
    store: StoreConfig,
    notifier: Notifier,
    send_summary: bool,
}

impl Pipeline {
    /// Fetchers run in the given order.
    pub fn new(
        fetchers: Vec<Box<dyn SourceFetcher>>,
        filter: KeywordFilter,
        store: StoreConfig,
        notifier: Notifier,
    ) -> Self {
        Self {
            fetchers,
            filter,
            store,
            notifier,
            send_summary: true,
        }
    }

    pub fn with_summary(mut self, send_summary: bool) -> Self {
        self.send_summary = send_summary;
        self
    }

    /// Wire the real HTTP client, fetchers and channel from configuration.
    pub fn from_config(config: &Config) -> Result<Self> {
        let http: Arc<dyn HttpFetch> = Arc::new(RateLimitedClient::new(
            &config.http,
            RetryPolicy::from_config(&config.retry),
        )?);

        let fetchers: Vec<Box<dyn SourceFetcher>> = vec![
            Box::new(BoardFetcher::new(Arc::clone(&http), &config.boards)),
            Box::new(SearchFetcher::new(http, config.search.clone())),
        ];
        let filter = KeywordFilter::compile(&FilterPolicy::from(&config.filter))?;
        let notifier = Notifier::from_config(&config.notify)?;

        Ok(Self::new(fetchers, filter, config.store.clone(), notifier)
            .with_summary(config.notify.send_summary))
    }

    pub fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    pub async fn run(&self) -> std::result::Result<RunStatistics, RunAborted> {
        self.run_at(Utc::now()).await
    }

    /// Execute one run, stamping postings with `started_at`.
    pub async fn run_at(
        &self,
        started_at: DateTime<Utc>,
    ) -> std::result::Result<RunStatistics, RunAborted> {
        let mut stats = RunStatistics::new(started_at);

        let store = match SeenStore::open(
            &self.store.path,
            Duration::from_millis(self.store.busy_timeout_ms),
        ) {
            Ok(store) => store,
            Err(e) => {
                log::error!("Cannot open seen-postings store: {}", e);
                return Err(abort(e, stats));
            }
        };

        // Stage 1: fetch
        let raw = self.fetch_all(&QueryContext::new(started_at), &mut stats).await;
        log::info!("Fetched {} raw postings", raw.len());

        // Stage 2: normalize and filter
        let mut classifications = Vec::with_capacity(raw.len());
        let mut accepted: Vec<CanonicalPosting> = Vec::new();
        for item in &raw {
            let Some(posting) = normalize(item, started_at) else {
                stats.dropped_unresolvable += 1;
                continue;
            };
            let classification = self.filter.classify(&posting);
            if classification.is_accepted() {
                accepted.push(posting);
            } else {
                log::debug!("Rejected `{}`: {:?}", posting.title, classification);
            }
            classifications.push(classification);
        }
        tally(&classifications, &mut stats);
        log::info!(
            "{} postings passed the filter, {} rejected",
            accepted.len(),
            stats.rejected_by_filter
        );

        // Stage 3: admit before announcing anything
        let mut admitted: Vec<CanonicalPosting> = Vec::new();
        for posting in accepted {
            match store.admit(&posting) {
                Ok(Admission::Admitted) => admitted.push(posting),
                Ok(Admission::Duplicate) => stats.duplicates += 1,
                Err(e) => {
                    log::error!("Store failed while admitting {}: {}", posting.url, e);
                    stats.admitted = admitted.len();
                    stats.unannounced = admitted.len();
                    return Err(abort(e, stats));
                }
            }
        }
        stats.admitted = admitted.len();
        log::info!(
            "{} new postings, {} duplicates",
            stats.admitted,
            stats.duplicates
        );

        // Stage 4: notify
        if admitted.is_empty() {
            log::info!("No new postings to notify");
        } else {
            let report = self.notifier.notify_batch(&admitted).await;
            stats.notified = report.delivered;
            stats.unannounced = report.undelivered;
        }

        stats.finished_at = Some(Utc::now());
        if self.send_summary && !self.notifier.notify_summary(&stats).await {
            log::warn!("Run summary was not delivered");
            stats.summary_failed = true;
        }

        match store.stats(self.store.stats_window_days) {
            Ok(totals) => log::info!(
                "Store holds {} postings ({} in the last {} days)",
                totals.total_seen,
                totals.seen_in_window,
                totals.window_days
            ),
            Err(e) => log::warn!("Could not read store totals: {}", e),
        }

        Ok(stats)
    }

    async fn fetch_all(&self, context: &QueryContext, stats: &mut RunStatistics) -> Vec<RawPosting> {
        let mut raw = Vec::new();
        for fetcher in &self.fetchers {
            log::info!("Fetching from {}", fetcher.name());
            match fetcher.fetch_postings(context).await {
                Ok(batch) => {
                    for posting in &batch.postings {
                        stats.record_fetched(posting.source_name(), 1);
                    }
                    stats.dropped_malformed += batch.malformed;
                    for warning in batch.warnings {
                        stats.warn(warning);
                    }
                    raw.extend(batch.postings);
                }
                Err(e) => {
                    log::warn!("Source {} failed: {}", fetcher.name(), e);
                    stats.warn(format!("{}: {}", fetcher.name(), e));
                }
            }
        }
        raw
    }
}

fn abort(source: AppError, mut stats: RunStatistics) -> RunAborted {
    stats.finished_at = Some(Utc::now());
    RunAborted { source, stats }
}
