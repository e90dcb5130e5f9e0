// src/utils/http.rs

//! Rate-limited HTTP client used by every fetcher.
//!
//! Every outbound call:
//! 1. waits a random duration drawn from the configured delay window,
//! 2. picks a `User-Agent` from the rotating pool,
//! 3. classifies the outcome into a [`FetchError`] class,
//! 4. is retried by the [`RetryPolicy`] when the class is retryable.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use rand::seq::SliceRandom;
use reqwest::header::{ACCEPT, HeaderMap, RETRY_AFTER, USER_AGENT};
use serde::de::DeserializeOwned;

use crate::error::{FetchError, Result};
use crate::models::HttpConfig;
use crate::utils::retry::{RetryPolicy, Sleeper, TokioSleeper};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

/// A single outbound request.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchRequest {
    pub method: Method,
    pub url: String,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub json: Option<serde_json::Value>,
}

impl FetchRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: Method::Get,
            url: url.into(),
            query: Vec::new(),
            headers: Vec::new(),
            json: None,
        }
    }

    pub fn post_json(url: impl Into<String>, body: serde_json::Value) -> Self {
        Self {
            method: Method::Post,
            json: Some(body),
            ..Self::get(url)
        }
    }

    pub fn query(mut self, key: &str, value: &str) -> Self {
        self.query.push((key.to_string(), value.to_string()));
        self
    }

    pub fn header(mut self, key: &str, value: &str) -> Self {
        self.headers.push((key.to_string(), value.to_string()));
        self
    }
}

/// A successful (2xx) response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResponse {
    pub url: String,
    pub status: u16,
    pub body: String,
}

impl FetchResponse {
    /// Decode the body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> std::result::Result<T, FetchError> {
        serde_json::from_str(&self.body).map_err(|e| FetchError::malformed(&self.url, e))
    }
}

/// Capability to perform one classified, retried request.
#[async_trait]
pub trait HttpFetch: Send + Sync {
    async fn fetch(&self, request: &FetchRequest) -> std::result::Result<FetchResponse, FetchError>;
}

/// Map a response status to the error taxonomy. `Ok(())` for 2xx.
pub fn classify_status(
    url: &str,
    status: u16,
    retry_after: Option<Duration>,
) -> std::result::Result<(), FetchError> {
    match status {
        200..=299 => Ok(()),
        429 => Err(FetchError::RateLimited {
            url: url.to_string(),
            retry_after,
        }),
        500..=599 => Err(FetchError::transient(url, format!("server returned {status}"))),
        _ => Err(FetchError::Permanent {
            url: url.to_string(),
            status,
        }),
    }
}

/// Map a transport-level failure to the error taxonomy.
///
/// Builder errors (an unusable URL) are permanent with status 0; decode
/// errors are malformed data; everything else is treated as transient.
pub fn classify_transport(url: &str, error: &reqwest::Error) -> FetchError {
    if error.is_builder() {
        FetchError::Permanent {
            url: url.to_string(),
            status: 0,
        }
    } else if error.is_decode() {
        FetchError::malformed(url, error)
    } else {
        FetchError::transient(url, error)
    }
}

fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

/// `reqwest`-backed client with identity rotation, mandatory delay and retries.
pub struct RateLimitedClient {
    client: reqwest::Client,
    user_agents: Vec<String>,
    min_delay: Duration,
    max_delay: Duration,
    retry: RetryPolicy,
    sleeper: Arc<dyn Sleeper>,
}

impl RateLimitedClient {
    /// Create a client from HTTP settings and a retry policy.
    pub fn new(config: &HttpConfig, retry: RetryPolicy) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        let user_agents: Vec<String> = config
            .user_agents
            .iter()
            .map(|ua| ua.trim().to_string())
            .filter(|ua| !ua.is_empty())
            .collect();

        Ok(Self {
            client,
            user_agents,
            min_delay: Duration::from_secs_f64(config.min_delay_secs.max(0.0)),
            max_delay: Duration::from_secs_f64(config.max_delay_secs.max(0.0)),
            retry,
            sleeper: Arc::new(TokioSleeper),
        })
    }

    /// Replace the clock used for delays and backoff.
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    fn pick_user_agent(&self) -> &str {
        self.user_agents
            .choose(&mut rand::thread_rng())
            .map(String::as_str)
            .unwrap_or("Mozilla/5.0")
    }

    fn pre_request_delay(&self) -> Duration {
        if self.max_delay <= self.min_delay {
            return self.min_delay;
        }
        let secs = rand::thread_rng()
            .gen_range(self.min_delay.as_secs_f64()..=self.max_delay.as_secs_f64());
        Duration::from_secs_f64(secs)
    }

    async fn send_once(
        &self,
        request: &FetchRequest,
    ) -> std::result::Result<FetchResponse, FetchError> {
        let delay = self.pre_request_delay();
        log::debug!("Sleeping {:.2}s before {}", delay.as_secs_f64(), request.url);
        self.sleeper.sleep(delay).await;

        let method = match request.method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
        };
        let mut builder = self
            .client
            .request(method, &request.url)
            .header(USER_AGENT, self.pick_user_agent())
            .header(ACCEPT, "application/json");
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        for (key, value) in &request.headers {
            builder = builder.header(key.as_str(), value.as_str());
        }
        if let Some(body) = &request.json {
            builder = builder.json(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| classify_transport(&request.url, &e))?;

        let status = response.status().as_u16();
        let retry_after = parse_retry_after(response.headers());
        classify_status(&request.url, status, retry_after)?;

        let body = response
            .text()
            .await
            .map_err(|e| classify_transport(&request.url, &e))?;

        Ok(FetchResponse {
            url: request.url.clone(),
            status,
            body,
        })
    }
}

#[async_trait]
impl HttpFetch for RateLimitedClient {
    async fn fetch(&self, request: &FetchRequest) -> std::result::Result<FetchResponse, FetchError> {
        self.retry
            .execute(self.sleeper.as_ref(), |_| self.send_once(request))
            .await
    }
}

#[cfg(test)]
mod tests {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    use super::*;
    use crate::utils::retry::testing::RecordingSleeper;

    /// Serve the given `(status, extra headers, body)` responses, one per connection.
    async fn serve(responses: Vec<(u16, &'static str, &'static str)>) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            for (status, headers, body) in responses {
                let (mut socket, _) = listener.accept().await.unwrap();
                let mut buf = vec![0u8; 4096];
                let mut read = Vec::new();
                while !read.windows(4).any(|w| w == b"\r\n\r\n") {
                    let n = socket.read(&mut buf).await.unwrap();
                    if n == 0 {
                        break;
                    }
                    read.extend_from_slice(&buf[..n]);
                }
                let reply = format!(
                    "HTTP/1.1 {status} X\r\nContent-Type: application/json\r\n{headers}Content-Length: {}\r\nConnection: close\r\n\r\n{body}",
                    body.len()
                );
                socket.write_all(reply.as_bytes()).await.unwrap();
                socket.shutdown().await.ok();
            }
        });

        format!("http://{addr}")
    }

    fn fast_config() -> HttpConfig {
        HttpConfig {
            user_agents: vec!["agent-a".into(), "agent-b".into()],
            timeout_secs: 5,
            min_delay_secs: 10.0,
            max_delay_secs: 30.0,
        }
    }

    fn fast_retry() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_secs(2),
            multiplier: 2.0,
            max_delay: Duration::from_secs(60),
            jitter: Duration::ZERO,
        }
    }

    fn client(sleeper: Arc<RecordingSleeper>) -> RateLimitedClient {
        RateLimitedClient::new(&fast_config(), fast_retry())
            .unwrap()
            .with_sleeper(sleeper)
    }

    #[test]
    fn test_classify_status() {
        assert!(classify_status("u", 200, None).is_ok());
        assert!(matches!(
            classify_status("u", 404, None),
            Err(FetchError::Permanent { status: 404, .. })
        ));
        assert!(matches!(
            classify_status("u", 429, Some(Duration::from_secs(5))),
            Err(FetchError::RateLimited {
                retry_after: Some(_),
                ..
            })
        ));
        assert!(matches!(
            classify_status("u", 503, None),
            Err(FetchError::Transient { .. })
        ));
    }

    #[test]
    fn test_pre_request_delay_stays_in_window() {
        let client = client(Arc::new(RecordingSleeper::default()));
        for _ in 0..100 {
            let delay = client.pre_request_delay();
            assert!(delay >= Duration::from_secs(10));
            assert!(delay <= Duration::from_secs(30));
        }
    }

    #[test]
    fn test_user_agent_comes_from_pool() {
        let client = client(Arc::new(RecordingSleeper::default()));
        for _ in 0..20 {
            assert!(["agent-a", "agent-b"].contains(&client.pick_user_agent()));
        }
    }

    #[tokio::test]
    async fn test_every_call_is_delayed() {
        let base = serve(vec![(200, "", "[]")]).await;
        let sleeper = Arc::new(RecordingSleeper::default());
        let client = client(Arc::clone(&sleeper));

        let response = client.fetch(&FetchRequest::get(format!("{base}/ok"))).await.unwrap();

        assert_eq!(response.body, "[]");
        let waits = sleeper.waits();
        assert_eq!(waits.len(), 1);
        assert!(waits[0] >= Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_server_error_is_retried() {
        let base = serve(vec![(503, "", ""), (200, "", r#"{"jobs":[]}"#)]).await;
        let sleeper = Arc::new(RecordingSleeper::default());
        let client = client(Arc::clone(&sleeper));

        let response = client.fetch(&FetchRequest::get(format!("{base}/flaky"))).await.unwrap();

        assert_eq!(response.status, 200);
        // delay, backoff, delay
        let waits = sleeper.waits();
        assert_eq!(waits.len(), 3);
        assert_eq!(waits[1], Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_rate_limit_honors_retry_after() {
        let base = serve(vec![(429, "Retry-After: 7\r\n", ""), (200, "", "[]")]).await;
        let sleeper = Arc::new(RecordingSleeper::default());
        let client = client(Arc::clone(&sleeper));

        client.fetch(&FetchRequest::get(format!("{base}/limited"))).await.unwrap();

        assert_eq!(sleeper.waits()[1], Duration::from_secs(7));
    }

    #[tokio::test]
    async fn test_not_found_is_not_retried() {
        let base = serve(vec![(404, "", "")]).await;
        let sleeper = Arc::new(RecordingSleeper::default());
        let client = client(Arc::clone(&sleeper));

        let error = client
            .fetch(&FetchRequest::get(format!("{base}/missing")))
            .await
            .unwrap_err();

        assert!(error.is_not_found());
        assert_eq!(sleeper.waits().len(), 1);
    }

    #[test]
    fn test_malformed_json_body() {
        let response = FetchResponse {
            url: "u".into(),
            status: 200,
            body: "<html>".into(),
        };
        let decoded: std::result::Result<Vec<u32>, _> = response.json();
        assert!(matches!(decoded, Err(FetchError::Malformed { .. })));
    }
}
