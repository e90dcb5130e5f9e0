// src/pipeline/filter.rs

//! Title keyword policy.
//!
//! Keywords match case-insensitively on whole-word boundaries: a term matches
//! only when it is not directly preceded or followed by a letter, digit or
//! underscore. Forbidden terms are checked first.

use std::fmt;

use regex::{Regex, RegexBuilder};

use crate::error::{AppError, Result};
use crate::models::{CanonicalPosting, FilterConfig, RunStatistics};

/// Keyword lists before compilation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterPolicy {
    pub required: Vec<String>,
    pub forbidden: Vec<String>,
}

impl From<&FilterConfig> for FilterPolicy {
    fn from(config: &FilterConfig) -> Self {
        Self {
            required: config.required_keywords.clone(),
            forbidden: config.forbidden_keywords.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    /// First configured forbidden term found in the title
    ForbiddenKeyword(String),
    NoRequiredKeyword,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::ForbiddenKeyword(term) => write!(f, "forbidden-keyword:{term}"),
            RejectReason::NoRequiredKeyword => f.write_str("no-required-keyword"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    Accepted,
    Rejected(RejectReason),
}

impl Classification {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Classification::Accepted)
    }
}

#[derive(Debug, Clone)]
struct Keyword {
    term: String,
    pattern: Regex,
}

impl Keyword {
    fn compile(term: &str) -> Result<Self> {
        let term = term.trim().to_lowercase();
        let pattern = format!(
            r"(?:^|[^\p{{L}}\p{{N}}_]){}(?:$|[^\p{{L}}\p{{N}}_])",
            regex::escape(&term)
        );
        let pattern = RegexBuilder::new(&pattern)
            .case_insensitive(true)
            .build()
            .map_err(|e| AppError::config(format!("invalid keyword `{term}`: {e}")))?;
        Ok(Self { term, pattern })
    }

    fn matches(&self, text: &str) -> bool {
        self.pattern.is_match(text)
    }
}

/// Compiled keyword policy.
#[derive(Debug, Clone)]
pub struct KeywordFilter {
    required: Vec<Keyword>,
    forbidden: Vec<Keyword>,
}

impl KeywordFilter {
    /// Compile a policy. Blank terms are ignored; an empty required list
    /// rejects every posting.
    pub fn compile(policy: &FilterPolicy) -> Result<Self> {
        let compile_all = |terms: &[String]| -> Result<Vec<Keyword>> {
            terms
                .iter()
                .filter(|t| !t.trim().is_empty())
                .map(|t| Keyword::compile(t))
                .collect()
        };
        Ok(Self {
            required: compile_all(&policy.required)?,
            forbidden: compile_all(&policy.forbidden)?,
        })
    }

    pub fn classify(&self, posting: &CanonicalPosting) -> Classification {
        self.classify_title(&posting.title)
    }

    pub fn classify_title(&self, title: &str) -> Classification {
        if let Some(hit) = self.forbidden.iter().find(|k| k.matches(title)) {
            return Classification::Rejected(RejectReason::ForbiddenKeyword(hit.term.clone()));
        }
        if self.required.iter().any(|k| k.matches(title)) {
            Classification::Accepted
        } else {
            Classification::Rejected(RejectReason::NoRequiredKeyword)
        }
    }
}

/// Fold classifications into run statistics.
pub fn tally<'a>(
    classifications: impl IntoIterator<Item = &'a Classification>,
    stats: &mut RunStatistics,
) {
    for classification in classifications {
        if let Classification::Rejected(reason) = classification {
            stats.record_rejection(&reason.to_string());
        }
    }
}
