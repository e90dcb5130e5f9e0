// src/pipeline/normalize.rs

//! Raw posting → canonical posting.

use chrono::{DateTime, Utc};

use crate::models::{CanonicalPosting, RawPosting};
use crate::services::search::{discovery_board, parse_hit};
use crate::utils::url::{absolute_http_url, slug_to_display_name};

/// Trim and collapse internal whitespace runs to a single space.
fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn clean(text: Option<&str>) -> String {
    text.map(str::trim).unwrap_or_default().to_string()
}

fn resolve_url(raw: Option<&str>) -> Option<String> {
    absolute_http_url(raw?).map(String::from)
}

/// Map a raw posting to the canonical shape.
///
/// Returns `None` when no absolute `http(s)` URL can be derived. The result
/// depends only on the arguments.
pub fn normalize(raw: &RawPosting, discovered_at: DateTime<Utc>) -> Option<CanonicalPosting> {
    let source_name = raw.source_name();

    let posting = match raw {
        RawPosting::Greenhouse { board, job } => CanonicalPosting {
            source_id: job.id.map(|id| format!("greenhouse:{board}:{id}")),
            title: collapse_whitespace(job.title.as_deref().unwrap_or_default()),
            company: job
                .company_name
                .as_deref()
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .map(String::from)
                .unwrap_or_else(|| slug_to_display_name(board)),
            location: clean(job.location.as_ref().and_then(|l| l.name.as_deref())),
            url: resolve_url(job.absolute_url.as_deref())?,
            source_name,
            snippet: None,
            discovered_on: None,
            discovered_at,
        },
        RawPosting::Lever { company, job } => CanonicalPosting {
            source_id: job
                .id
                .as_deref()
                .map(str::trim)
                .filter(|id| !id.is_empty())
                .map(|id| format!("lever:{company}:{id}")),
            title: collapse_whitespace(job.text.as_deref().unwrap_or_default()),
            company: slug_to_display_name(company),
            location: clean(job.categories.as_ref().and_then(|c| c.location.as_deref())),
            url: resolve_url(job.hosted_url.as_deref())?,
            source_name,
            snippet: None,
            discovered_on: None,
            discovered_at,
        },
        RawPosting::Search { query, hit } => {
            let url = resolve_url(hit.link.as_deref())?;
            let parsed = parse_hit(hit);
            CanonicalPosting {
                source_id: None,
                title: collapse_whitespace(&parsed.title),
                company: parsed.company.trim().to_string(),
                location: parsed.location.trim().to_string(),
                url,
                source_name,
                snippet: hit
                    .snippet
                    .as_deref()
                    .map(collapse_whitespace)
                    .filter(|s| !s.is_empty()),
                discovered_on: discovery_board(query),
                discovered_at,
            }
        }
    };

    Some(posting)
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::models::{GreenhouseJob, LeverCategories, LeverJob, NamedLocation, SearchHit, SourceName};

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 4, 2, 15, 0, 0).unwrap()
    }

    fn greenhouse(url: Option<&str>) -> RawPosting {
        RawPosting::Greenhouse {
            board: "acme-corp".to_string(),
            job: GreenhouseJob {
                id: Some(4012),
                title: Some("  GIS   Analyst\tII ".to_string()),
                absolute_url: url.map(str::to_string),
                location: Some(NamedLocation {
                    name: Some(" Denver, CO ".to_string()),
                }),
                company_name: None,
            },
        }
    }

    #[test]
    fn test_greenhouse_posting() {
        let p = normalize(&greenhouse(Some("https://boards.greenhouse.io/acme-corp/jobs/4012")), at())
            .unwrap();

        assert_eq!(p.source_id.as_deref(), Some("greenhouse:acme-corp:4012"));
        assert_eq!(p.title, "GIS Analyst II");
        assert_eq!(p.company, "Acme Corp");
        assert_eq!(p.location, "Denver, CO");
        assert_eq!(p.source_name, SourceName::Greenhouse);
        assert_eq!(p.identity_key(), "greenhouse:acme-corp:4012");
    }

    #[test]
    fn test_missing_or_relative_url_is_dropped() {
        assert!(normalize(&greenhouse(None), at()).is_none());
        assert!(normalize(&greenhouse(Some("/jobs/4012")), at()).is_none());
    }

    #[test]
    fn test_lever_posting_without_location() {
        let raw = RawPosting::Lever {
            company: "mapbox".to_string(),
            job: LeverJob {
                id: Some("a1b2".to_string()),
                text: Some("Spatial Data Engineer".to_string()),
                hosted_url: Some("https://jobs.lever.co/mapbox/a1b2".to_string()),
                categories: Some(LeverCategories::default()),
            },
        };
        let p = normalize(&raw, at()).unwrap();

        assert_eq!(p.source_id.as_deref(), Some("lever:mapbox:a1b2"));
        assert_eq!(p.company, "Mapbox");
        assert_eq!(p.location, "");
    }

    #[test]
    fn test_search_posting_uses_url_identity() {
        let raw = RawPosting::Search {
            query: "workday".to_string(),
            hit: SearchHit {
                title: Some("GIS Specialist".to_string()),
                link: Some("https://county.wd1.myworkdayjobs.com/Careers/job/GIS-Specialist_R9".to_string()),
                snippet: Some("On-site role in Tulsa, OK".to_string()),
            },
        };
        let p = normalize(&raw, at()).unwrap();

        assert_eq!(p.source_id, None);
        assert!(p.identity_key().starts_with("url:"));
        assert_eq!(p.company, "County");
        assert_eq!(p.location, "On-site");
        assert_eq!(p.snippet.as_deref(), Some("On-site role in Tulsa, OK"));
        assert_eq!(p.discovered_on, None);
    }

    #[test]
    fn test_discovery_query_marks_board_family() {
        let raw = RawPosting::Search {
            query: "lever-discovery".to_string(),
            hit: SearchHit {
                title: Some("Geospatial Analyst - Terrafirm".to_string()),
                link: Some("https://jobs.lever.co/terrafirm/9c1e".to_string()),
                snippet: None,
            },
        };
        let p = normalize(&raw, at()).unwrap();

        assert_eq!(p.source_name, SourceName::Search);
        assert_eq!(p.discovered_on, Some(SourceName::Lever));
        assert_eq!(p.company, "Terrafirm");
    }

    #[test]
    fn test_normalize_is_deterministic() {
        let raw = greenhouse(Some("https://boards.greenhouse.io/acme-corp/jobs/4012?gh_src=x"));
        let first = normalize(&raw, at());
        let second = normalize(&raw, at());
        assert_eq!(first, second);
    }

    #[test]
    fn test_title_case_is_preserved() {
        let mut raw = greenhouse(Some("https://boards.greenhouse.io/acme-corp/jobs/1"));
        if let RawPosting::Greenhouse { job, .. } = &mut raw {
            job.title = Some("geoSPATIAL analyst".to_string());
        }
        assert_eq!(normalize(&raw, at()).unwrap().title, "geoSPATIAL analyst");
    }
}
