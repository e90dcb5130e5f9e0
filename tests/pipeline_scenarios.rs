//! End-to-end runs with stub sources and a recording channel.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use tempfile::TempDir;

use sentinel::error::{AppError, Result};
use sentinel::models::{CanonicalPosting, RawPosting, RunStatistics, SearchHit, StoreConfig};
use sentinel::pipeline::{FilterPolicy, KeywordFilter, Pipeline};
use sentinel::services::{Channel, FetchBatch, Notifier, QueryContext, SourceFetcher};

/// Returns the same raw postings every run.
struct StaticSource(Vec<RawPosting>);

#[async_trait]
impl SourceFetcher for StaticSource {
    fn name(&self) -> &str {
        "static"
    }

    async fn fetch_postings(&self, _context: &QueryContext) -> Result<FetchBatch> {
        Ok(FetchBatch {
            postings: self.0.clone(),
            ..FetchBatch::default()
        })
    }
}

/// Fails like an organization that returned a permanent error.
struct FailingSource;

#[async_trait]
impl SourceFetcher for FailingSource {
    fn name(&self) -> &str {
        "acme"
    }

    async fn fetch_postings(&self, _context: &QueryContext) -> Result<FetchBatch> {
        Err(AppError::Fetch(sentinel::error::FetchError::Permanent {
            url: "https://boards-api.greenhouse.io/v1/boards/acme/jobs".into(),
            status: 403,
        }))
    }
}

#[derive(Default)]
struct Outbox {
    postings: Mutex<Vec<String>>,
    calls: Mutex<usize>,
}

#[async_trait]
impl Channel for Outbox {
    fn name(&self) -> &str {
        "outbox"
    }

    async fn send_postings(&self, postings: &[&CanonicalPosting]) -> Result<()> {
        *self.calls.lock().unwrap() += 1;
        self.postings
            .lock()
            .unwrap()
            .extend(postings.iter().map(|p| p.url.clone()));
        Ok(())
    }

    async fn send_summary(&self, _stats: &RunStatistics) -> Result<()> {
        *self.calls.lock().unwrap() += 1;
        Ok(())
    }

    async fn send_error(&self, _message: &str) -> Result<()> {
        *self.calls.lock().unwrap() += 1;
        Ok(())
    }
}

fn hit(title: &str, link: &str) -> RawPosting {
    RawPosting::Search {
        query: "custom-1".into(),
        hit: SearchHit {
            title: Some(title.into()),
            link: Some(link.into()),
            snippet: None,
        },
    }
}

fn store_config(dir: &TempDir) -> StoreConfig {
    StoreConfig {
        path: dir.path().join("seen.db").to_string_lossy().into_owned(),
        ..StoreConfig::default()
    }
}

fn build(store: StoreConfig, sources: Vec<Box<dyn SourceFetcher>>, outbox: Arc<Outbox>) -> Pipeline {
    let filter = KeywordFilter::compile(&FilterPolicy {
        required: vec!["gis".into()],
        forbidden: vec!["senior".into(), "manager".into()],
    })
    .unwrap();
    Pipeline::new(sources, filter, store, Notifier::new(outbox, 10))
}

fn source(postings: Vec<RawPosting>) -> Box<dyn SourceFetcher> {
    Box::new(StaticSource(postings))
}

fn run_time(day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 6, day, 7, 0, 0).unwrap()
}

#[tokio::test]
async fn accepted_posting_is_announced_once_across_runs() {
    let dir = TempDir::new().unwrap();
    let outbox = Arc::new(Outbox::default());
    let raw = vec![hit("GIS Analyst I", "https://boards.example/esri/123")];

    let first = build(store_config(&dir), vec![source(raw.clone())], outbox.clone())
        .run_at(run_time(1))
        .await
        .unwrap();
    let second = build(store_config(&dir), vec![source(raw)], outbox.clone())
        .run_at(run_time(2))
        .await
        .unwrap();

    assert_eq!(first.admitted, 1);
    assert_eq!(first.notified, 1);
    assert_eq!(second.admitted, 0);
    assert_eq!(second.duplicates, 1);
    assert_eq!(
        *outbox.postings.lock().unwrap(),
        vec!["https://boards.example/esri/123".to_string()]
    );
}

#[tokio::test]
async fn forbidden_title_never_reaches_the_store() {
    let dir = TempDir::new().unwrap();
    let outbox = Arc::new(Outbox::default());

    let stats = build(
        store_config(&dir),
        vec![source(vec![hit("Senior GIS Manager", "https://boards.example/esri/9")])],
        outbox.clone(),
    )
    .run_at(run_time(1))
    .await
    .unwrap();

    assert_eq!(stats.rejected_by_filter, 1);
    assert!(stats.rejections.keys().any(|reason| reason.contains("senior")));
    assert_eq!(stats.admitted + stats.duplicates, 0);

    let totals = sentinel::storage::SeenStore::open(
        &store_config(&dir).path,
        std::time::Duration::from_millis(500),
    )
    .unwrap()
    .stats(7)
    .unwrap();
    assert_eq!(totals.total_seen, 0);
}

#[tokio::test]
async fn query_string_variants_are_one_posting() {
    let dir = TempDir::new().unwrap();
    let outbox = Arc::new(Outbox::default());
    let raw = vec![
        hit("GIS Analyst", "https://boards.example/esri/123?utm_source=a"),
        hit("GIS Analyst", "https://boards.example/esri/123?utm_source=b"),
    ];

    let stats = build(store_config(&dir), vec![source(raw)], outbox.clone())
        .run_at(run_time(1))
        .await
        .unwrap();

    assert_eq!(stats.admitted, 1);
    assert_eq!(stats.duplicates, 1);
    assert_eq!(outbox.postings.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn unusable_store_aborts_before_any_notification() {
    let dir = TempDir::new().unwrap();
    let store = store_config(&dir);
    std::fs::write(&store.path, vec![0xff_u8; 2048]).unwrap();
    let outbox = Arc::new(Outbox::default());

    let aborted = build(
        store,
        vec![source(vec![hit("GIS Analyst", "https://boards.example/esri/1")])],
        outbox.clone(),
    )
    .run_at(run_time(1))
    .await
    .unwrap_err();

    assert!(matches!(aborted.source, AppError::StoreUnavailable(_)));
    assert_eq!(aborted.stats.admitted, 0);
    assert_eq!(aborted.stats.notified, 0);
    assert_eq!(*outbox.calls.lock().unwrap(), 0);
}

#[tokio::test]
async fn failing_source_does_not_stop_the_next_one() {
    let dir = TempDir::new().unwrap();
    let outbox = Arc::new(Outbox::default());

    let stats = build(
        store_config(&dir),
        vec![
            Box::new(FailingSource) as Box<dyn SourceFetcher>,
            source(vec![hit("GIS Technician", "https://boards.example/globex/7")]),
        ],
        outbox.clone(),
    )
    .run_at(run_time(1))
    .await
    .unwrap();

    assert_eq!(stats.source_warnings.len(), 1);
    assert!(stats.source_warnings[0].starts_with("acme:"));
    assert_eq!(stats.admitted, 1);
    assert_eq!(stats.notified, 1);
}
