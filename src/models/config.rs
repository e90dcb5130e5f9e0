//! Application configuration structures.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Upper bound on postings per outbound notification message.
pub const MAX_BATCH_SIZE: usize = 10;

/// Root application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Outbound HTTP behavior for fetchers
    #[serde(default)]
    pub http: HttpConfig,

    /// Retry/backoff policy for fetchers
    #[serde(default)]
    pub retry: RetryConfig,

    /// Structured job-board organizations
    #[serde(default)]
    pub boards: BoardsConfig,

    /// Search-derived discovery
    #[serde(default)]
    pub search: SearchConfig,

    /// Title keyword policy
    #[serde(default)]
    pub filter: FilterConfig,

    /// Seen-postings database
    #[serde(default)]
    pub store: StoreConfig,

    /// Notification channel
    #[serde(default)]
    pub notify: NotifyConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration, falling back to defaults only when the file is missing.
    ///
    /// A file that exists but cannot be read or parsed is an error.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }
        Self::load(path)
    }

    /// Fill secrets from the environment when present.
    pub fn with_env_overrides(mut self) -> Self {
        self.apply_overrides(|key| std::env::var(key).ok());
        self
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(key) = lookup("SERPER_API_KEY").filter(|v| !v.trim().is_empty()) {
            self.search.api_key = Some(key);
        }
        if let Some(url) = lookup("SENTINEL_WEBHOOK_URL").filter(|v| !v.trim().is_empty()) {
            self.notify.webhook_url = Some(url);
        }
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.http.user_agents.iter().all(|ua| ua.trim().is_empty()) {
            return Err(AppError::validation("http.user_agents is empty"));
        }
        if self.http.timeout_secs == 0 {
            return Err(AppError::validation("http.timeout_secs must be > 0"));
        }
        if !(self.http.min_delay_secs >= 0.0 && self.http.min_delay_secs <= self.http.max_delay_secs)
        {
            return Err(AppError::validation(
                "http.min_delay_secs must be >= 0 and <= http.max_delay_secs",
            ));
        }
        if !self.http.max_delay_secs.is_finite() {
            return Err(AppError::validation("http.max_delay_secs must be finite"));
        }
        if self.retry.max_attempts == 0 {
            return Err(AppError::validation("retry.max_attempts must be > 0"));
        }
        if !(self.retry.multiplier >= 1.0 && self.retry.multiplier.is_finite()) {
            return Err(AppError::validation("retry.multiplier must be >= 1.0"));
        }
        if self.filter.required_keywords.iter().all(|k| k.trim().is_empty()) {
            return Err(AppError::validation("filter.required_keywords is empty"));
        }
        if self.notify.batch_size == 0 || self.notify.batch_size > MAX_BATCH_SIZE {
            return Err(AppError::validation(format!(
                "notify.batch_size must be between 1 and {MAX_BATCH_SIZE}"
            )));
        }
        if self.search.max_queries == 0 {
            return Err(AppError::validation("search.max_queries must be > 0"));
        }
        if self.store.path.trim().is_empty() {
            return Err(AppError::validation("store.path is empty"));
        }
        Ok(())
    }
}

/// Outbound HTTP settings shared by every fetcher.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// User-Agent pool; one is picked at random per request
    #[serde(default = "defaults::user_agents")]
    pub user_agents: Vec<String>,

    /// Request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,

    /// Lower bound of the mandatory pre-request delay
    #[serde(default = "defaults::min_delay")]
    pub min_delay_secs: f64,

    /// Upper bound of the mandatory pre-request delay
    #[serde(default = "defaults::max_delay")]
    pub max_delay_secs: f64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agents: defaults::user_agents(),
            timeout_secs: defaults::timeout(),
            min_delay_secs: defaults::min_delay(),
            max_delay_secs: defaults::max_delay(),
        }
    }
}

/// Retry/backoff settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total attempts including the first
    #[serde(default = "defaults::max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "defaults::base_delay_ms")]
    pub base_delay_ms: u64,

    #[serde(default = "defaults::multiplier")]
    pub multiplier: f64,

    /// Backoff cap before jitter
    #[serde(default = "defaults::max_backoff_ms")]
    pub max_delay_ms: u64,

    /// Uniform jitter added on top of each backoff
    #[serde(default = "defaults::jitter_ms")]
    pub jitter_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: defaults::max_attempts(),
            base_delay_ms: defaults::base_delay_ms(),
            multiplier: defaults::multiplier(),
            max_delay_ms: defaults::max_backoff_ms(),
            jitter_ms: defaults::jitter_ms(),
        }
    }
}

/// Organizations queried on the structured job-board APIs.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct BoardsConfig {
    /// Tried on Greenhouse first, Lever when Greenhouse has no such board
    #[serde(default)]
    pub organizations: Vec<String>,

    /// Queried on Lever only
    #[serde(default)]
    pub lever_organizations: Vec<String>,
}

/// Search API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// API key; without one the search fetcher is skipped
    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "defaults::search_endpoint")]
    pub endpoint: String,

    /// Result count requested per query
    #[serde(default = "defaults::results_per_query")]
    pub results_per_query: u32,

    #[serde(default = "defaults::country")]
    pub country: String,

    #[serde(default = "defaults::language")]
    pub language: String,

    /// Quoted title phrases for the pre-built queries
    #[serde(default = "defaults::title_terms")]
    pub title_terms: Vec<String>,

    /// Terms excluded with `-term` in the pre-built queries
    #[serde(default = "defaults::excluded_terms")]
    pub excluded_terms: Vec<String>,

    /// Adds `after:` to pre-built queries
    #[serde(default = "defaults::posted_within_days")]
    pub posted_within_days: Option<u32>,

    /// Also search Greenhouse and Lever hosted boards for unknown companies
    #[serde(default)]
    pub discovery: bool,

    /// Raw queries sent as-is
    #[serde(default)]
    pub custom_queries: Vec<String>,

    /// Hard cap on queries per run
    #[serde(default = "defaults::max_queries")]
    pub max_queries: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            endpoint: defaults::search_endpoint(),
            results_per_query: defaults::results_per_query(),
            country: defaults::country(),
            language: defaults::language(),
            title_terms: defaults::title_terms(),
            excluded_terms: defaults::excluded_terms(),
            posted_within_days: defaults::posted_within_days(),
            discovery: false,
            custom_queries: Vec::new(),
            max_queries: defaults::max_queries(),
        }
    }
}

/// Title keyword policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterConfig {
    /// At least one must appear in the title
    #[serde(default = "defaults::required_keywords")]
    pub required_keywords: Vec<String>,

    /// None may appear in the title
    #[serde(default = "defaults::forbidden_keywords")]
    pub forbidden_keywords: Vec<String>,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            required_keywords: defaults::required_keywords(),
            forbidden_keywords: defaults::forbidden_keywords(),
        }
    }
}

/// Seen-postings database settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "defaults::store_path")]
    pub path: String,

    /// Window for the "recent" count in store stats
    #[serde(default = "defaults::stats_window_days")]
    pub stats_window_days: u32,

    /// How long to wait on a lock held by an overlapping run
    #[serde(default = "defaults::busy_timeout_ms")]
    pub busy_timeout_ms: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: defaults::store_path(),
            stats_window_days: defaults::stats_window_days(),
            busy_timeout_ms: defaults::busy_timeout_ms(),
        }
    }
}

/// Notification settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifyConfig {
    /// Webhook endpoint; postings are only logged when unset
    #[serde(default)]
    pub webhook_url: Option<String>,

    /// Postings per message
    #[serde(default = "defaults::batch_size")]
    pub batch_size: usize,

    #[serde(default = "defaults::notify_timeout")]
    pub timeout_secs: u64,

    /// Send the run summary after the postings
    #[serde(default = "defaults::send_summary")]
    pub send_summary: bool,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            webhook_url: None,
            batch_size: defaults::batch_size(),
            timeout_secs: defaults::notify_timeout(),
            send_summary: defaults::send_summary(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "defaults::log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: defaults::log_level(),
        }
    }
}

mod defaults {
    // HTTP defaults
    pub fn user_agents() -> Vec<String> {
        vec![
            "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36".into(),
            "Mozilla/5.0 (Macintosh; Intel Mac OS X 14_4) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4 Safari/605.1.15".into(),
            "Mozilla/5.0 (X11; Linux x86_64; rv:125.0) Gecko/20100101 Firefox/125.0".into(),
            "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:125.0) Gecko/20100101 Firefox/125.0".into(),
            "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36".into(),
        ]
    }
    pub fn timeout() -> u64 {
        30
    }
    pub fn min_delay() -> f64 {
        10.0
    }
    pub fn max_delay() -> f64 {
        30.0
    }

    // Retry defaults
    pub fn max_attempts() -> u32 {
        3
    }
    pub fn base_delay_ms() -> u64 {
        2_000
    }
    pub fn multiplier() -> f64 {
        2.0
    }
    pub fn max_backoff_ms() -> u64 {
        60_000
    }
    pub fn jitter_ms() -> u64 {
        1_000
    }

    // Search defaults
    pub fn search_endpoint() -> String {
        "https://google.serper.dev/search".into()
    }
    pub fn results_per_query() -> u32 {
        100
    }
    pub fn country() -> String {
        "us".into()
    }
    pub fn language() -> String {
        "en".into()
    }
    pub fn title_terms() -> Vec<String> {
        vec![
            "GIS Specialist".into(),
            "GIS Analyst".into(),
            "Geospatial".into(),
        ]
    }
    pub fn excluded_terms() -> Vec<String> {
        vec!["senior".into(), "lead".into()]
    }
    pub fn posted_within_days() -> Option<u32> {
        Some(60)
    }
    pub fn max_queries() -> usize {
        8
    }

    // Filter defaults
    pub fn required_keywords() -> Vec<String> {
        ["gis", "geospatial", "spatial", "mapping"]
            .into_iter()
            .map(String::from)
            .collect()
    }
    pub fn forbidden_keywords() -> Vec<String> {
        [
            // Seniority
            "senior",
            "sr.",
            "sr",
            "iii",
            "iv",
            "lead",
            "manager",
            "director",
            "principal",
            "chief",
            "head of",
            "vp",
            "vice president",
            "executive",
            "architect",
            // Sales/marketing
            "sales",
            "account executive",
            "account manager",
            "business development",
            "marketing",
            "solutions specialist",
            "customer success",
            // Field work
            "field technician",
            "surveyor",
            "field crew",
            "field data collector",
            "field services",
        ]
        .into_iter()
        .map(String::from)
        .collect()
    }

    // Store defaults
    pub fn store_path() -> String {
        "data/seen.db".into()
    }
    pub fn stats_window_days() -> u32 {
        7
    }
    pub fn busy_timeout_ms() -> u64 {
        5_000
    }

    // Notify defaults
    pub fn batch_size() -> usize {
        super::MAX_BATCH_SIZE
    }
    pub fn notify_timeout() -> u64 {
        10
    }
    pub fn send_summary() -> bool {
        true
    }

    pub fn log_level() -> String {
        "info".into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_default_config_ok() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn default_delay_window_is_ten_to_thirty_seconds() {
        let config = Config::default();
        assert_eq!(config.http.min_delay_secs, 10.0);
        assert_eq!(config.http.max_delay_secs, 30.0);
        assert_eq!(config.notify.batch_size, 10);
    }

    #[test]
    fn validate_rejects_empty_user_agents() {
        let mut config = Config::default();
        config.http.user_agents = vec!["  ".to_string()];
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_inverted_delay_window() {
        let mut config = Config::default();
        config.http.min_delay_secs = 40.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_oversized_batches() {
        let mut config = Config::default();
        config.notify.batch_size = 11;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_empty_required_keywords() {
        let mut config = Config::default();
        config.filter.required_keywords.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn partial_toml_keeps_section_defaults() {
        let config: Config = toml::from_str(
            r#"
            [boards]
            organizations = ["esri", "mapbox"]

            [filter]
            required_keywords = ["gis"]
            "#,
        )
        .unwrap();

        assert_eq!(config.boards.organizations, vec!["esri", "mapbox"]);
        assert_eq!(config.filter.required_keywords, vec!["gis"]);
        assert!(config.filter.forbidden_keywords.contains(&"senior".to_string()));
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.store.path, "data/seen.db");
    }

    #[test]
    fn missing_config_file_uses_defaults() {
        let dir = tempfile::TempDir::new().unwrap();
        let config = Config::load_or_default(dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.store.path, "data/seen.db");
    }

    #[test]
    fn malformed_config_file_is_an_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("broken.toml");
        fs::write(&path, "[filter]\nrequired_keywords = [\"gis\",").unwrap();

        let result = Config::load_or_default(&path);
        assert!(matches!(result, Err(AppError::Toml(_))));
    }

    #[test]
    fn example_config_parses_and_validates() {
        let config: Config = toml::from_str(include_str!("../../config.example.toml")).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.boards.organizations.len(), 3);
        assert!(config.search.api_key.is_none());
    }

    #[test]
    fn env_overrides_fill_secrets() {
        let mut config = Config::default();
        config.apply_overrides(|key| match key {
            "SERPER_API_KEY" => Some("secret".to_string()),
            "SENTINEL_WEBHOOK_URL" => Some("  ".to_string()),
            _ => None,
        });
        assert_eq!(config.search.api_key.as_deref(), Some("secret"));
        assert!(config.notify.webhook_url.is_none());
    }
}
