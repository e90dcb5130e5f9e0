//! Posting data structures, raw and canonical.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::utils::url::url_key;

/// Which fetcher family produced a posting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceName {
    /// Greenhouse board API
    Greenhouse,
    /// Lever postings API
    Lever,
    /// Search-derived discovery
    Search,
}

impl SourceName {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceName::Greenhouse => "greenhouse",
            SourceName::Lever => "lever",
            SourceName::Search => "search",
        }
    }

    /// Whether the upstream guarantees `source_id` uniqueness.
    pub fn has_stable_ids(&self) -> bool {
        matches!(self, SourceName::Greenhouse | SourceName::Lever)
    }
}

impl fmt::Display for SourceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Location object of a Greenhouse job.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedLocation {
    pub name: Option<String>,
}

/// One entry of `GET /v1/boards/{board}/jobs`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GreenhouseJob {
    pub id: Option<u64>,
    pub title: Option<String>,
    pub absolute_url: Option<String>,
    pub location: Option<NamedLocation>,
    pub company_name: Option<String>,
}

/// `categories` object of a Lever posting.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeverCategories {
    pub location: Option<String>,
}

/// One entry of `GET /v0/postings/{company}?mode=json`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeverJob {
    pub id: Option<String>,
    pub text: Option<String>,
    #[serde(rename = "hostedUrl")]
    pub hosted_url: Option<String>,
    pub categories: Option<LeverCategories>,
}

/// One organic search result.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchHit {
    pub title: Option<String>,
    pub link: Option<String>,
    pub snippet: Option<String>,
}

/// A posting as returned by its source, before normalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawPosting {
    Greenhouse { board: String, job: GreenhouseJob },
    Lever { company: String, job: LeverJob },
    Search { query: String, hit: SearchHit },
}

impl RawPosting {
    pub fn source_name(&self) -> SourceName {
        match self {
            RawPosting::Greenhouse { .. } => SourceName::Greenhouse,
            RawPosting::Lever { .. } => SourceName::Lever,
            RawPosting::Search { .. } => SourceName::Search,
        }
    }
}

/// A posting in the common record shape.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CanonicalPosting {
    /// Stable identifier from the origin system, if it has one
    pub source_id: Option<String>,

    /// Job title, whitespace collapsed
    pub title: String,

    /// Hiring company (empty if unknown)
    pub company: String,

    /// Free-text location (empty if unknown)
    pub location: String,

    /// Absolute link to the posting
    pub url: String,

    /// Fetcher family that produced it
    pub source_name: SourceName,

    /// Search result snippet, when discovered via search
    pub snippet: Option<String>,

    /// Hosted board family searched when found by a discovery query
    pub discovered_on: Option<SourceName>,

    /// When this run normalized it
    pub discovered_at: DateTime<Utc>,
}

impl CanonicalPosting {
    /// Key deciding whether two postings are the same listing.
    ///
    /// Uses `source_id` when the source guarantees its uniqueness, otherwise
    /// the URL key.
    pub fn identity_key(&self) -> String {
        match &self.source_id {
            Some(id) if self.source_name.has_stable_ids() && !id.is_empty() => id.clone(),
            _ => self.url_key(),
        }
    }

    /// Hash of the normalized URL (tracking parameters and fragment ignored).
    pub fn url_key(&self) -> String {
        url_key(&self.url)
    }

    /// Format posting for display using a template.
    ///
    /// Supported placeholders:
    /// - `{title}`, `{company}`, `{location}`, `{url}`, `{source}`
    pub fn format(&self, template: &str) -> String {
        template
            .replace("{title}", &self.title)
            .replace("{company}", &self.company)
            .replace("{location}", &self.location)
            .replace("{url}", &self.url)
            .replace("{source}", self.source_name.as_str())
    }
}
