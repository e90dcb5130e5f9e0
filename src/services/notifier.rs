// src/services/notifier.rs

//! Notification delivery.
//!
//! The [`Notifier`] owns ordering, batching and failure isolation; a
//! [`Channel`] only knows how to deliver one message.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{Value, json};

use crate::error::{AppError, Result};
use crate::models::{CanonicalPosting, MAX_BATCH_SIZE, NotifyConfig, RunStatistics, SourceName};

const COLOR_INFO: u32 = 3_447_003;
const COLOR_ERROR: u32 = 15_158_332;
const COLOR_DISCOVERY: u32 = 16_766_720;
const FIELD_LIMIT: usize = 1000;
const SNIPPET_LIMIT: usize = 200;
const FOOTER: &str = "job-sentinel";

/// Delivery target for notifications.
#[async_trait]
pub trait Channel: Send + Sync {
    fn name(&self) -> &str;

    /// Deliver one message carrying the given postings.
    async fn send_postings(&self, postings: &[&CanonicalPosting]) -> Result<()>;

    async fn send_summary(&self, stats: &RunStatistics) -> Result<()>;

    async fn send_error(&self, message: &str) -> Result<()>;
}

/// Outcome of [`Notifier::notify_batch`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchReport {
    /// Postings in batches that were delivered
    pub delivered: usize,
    /// Postings in batches that failed
    pub undelivered: usize,
    pub batches_sent: usize,
    pub batches_failed: usize,
}

/// Batches postings and hands them to a channel.
pub struct Notifier {
    channel: Arc<dyn Channel>,
    batch_size: usize,
}

impl Notifier {
    /// `batch_size` is clamped to `1..=MAX_BATCH_SIZE`.
    pub fn new(channel: Arc<dyn Channel>, batch_size: usize) -> Self {
        Self {
            channel,
            batch_size: batch_size.clamp(1, MAX_BATCH_SIZE),
        }
    }

    /// Webhook channel when a URL is configured, log-only otherwise.
    pub fn from_config(config: &NotifyConfig) -> Result<Self> {
        let channel: Arc<dyn Channel> = match config.webhook_url.as_deref().map(str::trim) {
            Some(url) if !url.is_empty() => Arc::new(WebhookChannel::new(
                url,
                Duration::from_secs(config.timeout_secs),
            )?),
            _ => {
                log::info!("No webhook configured, notifications go to the log");
                Arc::new(LogChannel)
            }
        };
        Ok(Self::new(channel, config.batch_size))
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Send postings oldest-discovered first, one message per chunk.
    ///
    /// A failed chunk is logged and counted; later chunks are still attempted.
    pub async fn notify_batch(&self, postings: &[CanonicalPosting]) -> BatchReport {
        let mut ordered: Vec<&CanonicalPosting> = postings.iter().collect();
        ordered.sort_by_key(|p| p.discovered_at);

        let mut report = BatchReport::default();
        for chunk in ordered.chunks(self.batch_size) {
            match self.channel.send_postings(chunk).await {
                Ok(()) => {
                    report.delivered += chunk.len();
                    report.batches_sent += 1;
                    log::info!("Sent batch of {} postings via {}", chunk.len(), self.channel.name());
                }
                Err(e) => {
                    report.undelivered += chunk.len();
                    report.batches_failed += 1;
                    log::error!("Failed to send batch of {} postings: {}", chunk.len(), e);
                }
            }
        }
        report
    }

    pub async fn notify_summary(&self, stats: &RunStatistics) -> bool {
        match self.channel.send_summary(stats).await {
            Ok(()) => true,
            Err(e) => {
                log::error!("Failed to send run summary: {}", e);
                false
            }
        }
    }

    pub async fn notify_error(&self, message: &str) -> bool {
        match self.channel.send_error(message).await {
            Ok(()) => true,
            Err(e) => {
                log::error!("Failed to send error notice: {}", e);
                false
            }
        }
    }
}

/// Writes notifications to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogChannel;

#[async_trait]
impl Channel for LogChannel {
    fn name(&self) -> &str {
        "log"
    }

    async fn send_postings(&self, postings: &[&CanonicalPosting]) -> Result<()> {
        for posting in postings {
            log::info!(
                "{}",
                posting.format("[{source}] {title} @ {company} ({location}) {url}")
            );
        }
        Ok(())
    }

    async fn send_summary(&self, stats: &RunStatistics) -> Result<()> {
        for (label, value) in stats.summary_items() {
            log::info!("{label}: {value}");
        }
        Ok(())
    }

    async fn send_error(&self, message: &str) -> Result<()> {
        log::error!("{message}");
        Ok(())
    }
}

/// Posts Discord-style embed messages to a webhook.
pub struct WebhookChannel {
    client: reqwest::Client,
    url: String,
}

impl WebhookChannel {
    pub fn new(url: &str, timeout: Duration) -> Result<Self> {
        url::Url::parse(url)?;
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: url.to_string(),
        })
    }

    async fn post(&self, context: &str, payload: &Value) -> Result<()> {
        let response = self
            .client
            .post(&self.url)
            .json(payload)
            .send()
            .await
            .map_err(|e| AppError::notify(context, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::notify(context, format!("webhook returned {status}")));
        }
        Ok(())
    }
}

#[async_trait]
impl Channel for WebhookChannel {
    fn name(&self) -> &str {
        "webhook"
    }

    async fn send_postings(&self, postings: &[&CanonicalPosting]) -> Result<()> {
        let embeds: Vec<Value> = postings.iter().map(|p| posting_embed(p)).collect();
        self.post("postings", &json!({ "embeds": embeds })).await
    }

    async fn send_summary(&self, stats: &RunStatistics) -> Result<()> {
        self.post("summary", &json!({ "embeds": [summary_embed(stats)] }))
            .await
    }

    async fn send_error(&self, message: &str) -> Result<()> {
        self.post("error", &json!({ "embeds": [error_embed(message)] }))
            .await
    }
}

fn source_color(source: SourceName) -> u32 {
    match source {
        SourceName::Greenhouse => 3_066_993,
        SourceName::Lever => 10_181_046,
        SourceName::Search => 15_844_367,
    }
}

fn or_unknown(value: &str) -> &str {
    if value.is_empty() { "Unknown" } else { value }
}

fn truncate_chars(text: &str, limit: usize) -> String {
    match text.char_indices().nth(limit) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

pub(crate) fn posting_embed(posting: &CanonicalPosting) -> Value {
    let company = or_unknown(&posting.company);
    let (title, company, source, color, footer) = match posting.discovered_on {
        Some(board) => (
            format!("NEW COMPANY! {}", posting.title),
            format!("{company} (Discovered!)"),
            format!("discovery/{board}"),
            COLOR_DISCOVERY,
            format!("{FOOTER} - discovery mode"),
        ),
        None => (
            posting.title.clone(),
            company.to_string(),
            posting.source_name.to_string(),
            source_color(posting.source_name),
            FOOTER.to_string(),
        ),
    };

    let mut embed = json!({
        "title": title,
        "url": posting.url,
        "color": color,
        "fields": [
            { "name": "Company", "value": company, "inline": true },
            { "name": "Location", "value": or_unknown(&posting.location), "inline": true },
            { "name": "Source", "value": source, "inline": true },
        ],
        "footer": { "text": footer },
        "timestamp": posting.discovered_at.to_rfc3339(),
    });
    if let Some(snippet) = posting.snippet.as_deref().filter(|s| !s.trim().is_empty()) {
        embed["description"] = Value::String(truncate_chars(snippet.trim(), SNIPPET_LIMIT));
    }
    embed
}

pub(crate) fn summary_embed(stats: &RunStatistics) -> Value {
    let mut fields: Vec<Value> = stats
        .summary_items()
        .into_iter()
        .map(|(name, value)| json!({ "name": name, "value": value, "inline": true }))
        .collect();

    if !stats.fetched_by_source.is_empty() {
        let by_source = stats
            .fetched_by_source
            .iter()
            .map(|(source, count)| format!("{source}: {count}"))
            .collect::<Vec<_>>()
            .join("\n");
        fields.push(json!({ "name": "By source", "value": by_source, "inline": false }));
    }

    if !stats.source_warnings.is_empty() {
        let warnings = truncate_chars(&stats.source_warnings.join("\n"), FIELD_LIMIT);
        fields.push(json!({ "name": "Source warnings", "value": warnings, "inline": false }));
    }

    json!({
        "title": "Scan summary",
        "color": COLOR_INFO,
        "fields": fields,
        "footer": { "text": FOOTER },
        "timestamp": stats.finished_at.unwrap_or_else(Utc::now).to_rfc3339(),
    })
}

pub(crate) fn error_embed(message: &str) -> Value {
    json!({
        "title": "Run failed",
        "description": message,
        "color": COLOR_ERROR,
        "timestamp": Utc::now().to_rfc3339(),
    })
}
