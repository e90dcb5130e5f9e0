// src/utils/url.rs

//! URL manipulation utilities.

use sha2::{Digest, Sha256};
use url::Url;

/// Parse an absolute `http`/`https` URL, trimming surrounding whitespace.
///
/// Returns `None` for relative, empty or non-web links.
pub fn absolute_http_url(raw: &str) -> Option<Url> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    let parsed = Url::parse(trimmed).ok()?;
    match parsed.scheme() {
        "http" | "https" if parsed.host_str().is_some() => Some(parsed),
        _ => None,
    }
}

/// Query parameters that only record how a visitor arrived.
const TRACKING_PARAMS: &[&str] = &[
    "gh_src", "lever-source", "lever-origin", "ref", "referrer", "source", "src", "fbclid",
    "gclid", "msclkid", "trk",
];

fn is_tracking_param(name: &str) -> bool {
    let name = name.to_ascii_lowercase();
    name.starts_with("utm_") || TRACKING_PARAMS.contains(&name.as_str())
}

/// Reduce a URL to the parts that identify the listing.
///
/// Keeps scheme, host, non-default port, path and any query parameter that
/// may select the job (`gh_jid`, `jobId`, ...), sorted by name. Tracking
/// parameters, the fragment and a trailing slash are dropped. Scheme and host
/// are lower-cased by the parser, path case is preserved.
///
/// # Examples
/// ```
/// use sentinel::utils::url::normalize_for_identity;
///
/// assert_eq!(
///     normalize_for_identity("HTTPS://Boards.Example/esri/123/?gh_src=abc#apply"),
///     "https://boards.example/esri/123"
/// );
/// assert_eq!(
///     normalize_for_identity("https://www.acme.com/careers/?utm_medium=x&gh_jid=1001"),
///     "https://www.acme.com/careers?gh_jid=1001"
/// );
/// ```
pub fn normalize_for_identity(raw: &str) -> String {
    match absolute_http_url(raw) {
        Some(url) => {
            let host = url.host_str().unwrap_or_default();
            let port = url.port().map(|p| format!(":{p}")).unwrap_or_default();
            let path = url.path().trim_end_matches('/');

            let mut kept: Vec<(String, String)> = url
                .query_pairs()
                .filter(|(name, _)| !is_tracking_param(name))
                .map(|(name, value)| (name.into_owned(), value.into_owned()))
                .collect();
            kept.sort();
            let query = if kept.is_empty() {
                String::new()
            } else {
                let encoded = url::form_urlencoded::Serializer::new(String::new())
                    .extend_pairs(kept)
                    .finish();
                format!("?{encoded}")
            };

            format!("{}://{}{}{}{}", url.scheme(), host, port, path, query)
        }
        None => raw.trim().to_string(),
    }
}

/// Deterministic identity key derived from a URL.
pub fn url_key(raw: &str) -> String {
    let normalized = normalize_for_identity(raw);
    let digest = Sha256::digest(normalized.as_bytes());
    format!("url:{}", hex::encode(digest))
}

/// Extract the lower-cased host from a URL string.
pub fn get_domain(url_str: &str) -> Option<String> {
    absolute_http_url(url_str).and_then(|u| u.host_str().map(|s| s.to_lowercase()))
}

/// First path segment of a URL (`https://jobs.lever.co/mapbox/123` → `mapbox`).
pub fn first_path_segment(url_str: &str) -> Option<String> {
    absolute_http_url(url_str)?
        .path_segments()?
        .find(|s| !s.is_empty())
        .map(str::to_string)
}

/// Render an organization slug as a display name (`acme-corp` → `Acme Corp`).
pub fn slug_to_display_name(slug: &str) -> String {
    slug.split(['-', '_'])
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absolute_http_url() {
        assert!(absolute_http_url(" https://example.com/a ").is_some());
        assert!(absolute_http_url("/relative/path").is_none());
        assert!(absolute_http_url("mailto:jobs@example.com").is_none());
        assert!(absolute_http_url("").is_none());
    }

    #[test]
    fn test_tracking_params_do_not_change_key() {
        assert_eq!(
            url_key("https://boards.example/esri/123?utm_source=x"),
            url_key("https://boards.example/esri/123?gh_src=y")
        );
        assert_eq!(
            url_key("https://jobs.lever.co/x/1?lever-source=LinkedIn"),
            url_key("https://jobs.lever.co/x/1")
        );
    }

    #[test]
    fn test_job_selecting_params_change_key() {
        assert_ne!(
            url_key("https://www.acme.com/careers/?gh_jid=1001"),
            url_key("https://www.acme.com/careers/?gh_jid=1002")
        );
        assert_eq!(
            url_key("https://www.acme.com/careers/?gh_jid=1001&utm_source=google"),
            url_key("https://www.acme.com/careers?gh_jid=1001")
        );
    }

    #[test]
    fn test_kept_params_are_order_independent() {
        assert_eq!(
            normalize_for_identity("https://example.com/jobs?b=2&a=1"),
            normalize_for_identity("https://example.com/jobs?a=1&b=2")
        );
    }

    #[test]
    fn test_path_changes_key() {
        assert_ne!(
            url_key("https://boards.example/esri/123"),
            url_key("https://boards.example/esri/124")
        );
    }

    #[test]
    fn test_port_is_kept() {
        assert_eq!(
            normalize_for_identity("http://example.com:8080/x/"),
            "http://example.com:8080/x"
        );
        assert_eq!(
            normalize_for_identity("https://example.com:443/x"),
            "https://example.com/x"
        );
    }

    #[test]
    fn test_get_domain() {
        assert_eq!(
            get_domain("https://Acme.wd1.myworkdayjobs.com/en-US/careers"),
            Some("acme.wd1.myworkdayjobs.com".to_string())
        );
        assert_eq!(get_domain("not a url"), None);
    }

    #[test]
    fn test_first_path_segment() {
        assert_eq!(
            first_path_segment("https://jobs.lever.co/mapbox/123"),
            Some("mapbox".to_string())
        );
        assert_eq!(first_path_segment("https://jobs.lever.co/"), None);
    }

    #[test]
    fn test_slug_to_display_name() {
        assert_eq!(slug_to_display_name("acme-corp"), "Acme Corp");
        assert_eq!(slug_to_display_name("esri"), "Esri");
        assert_eq!(slug_to_display_name("planet_labs"), "Planet Labs");
    }
}
