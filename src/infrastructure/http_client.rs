//! HTTP client for manifest and catalog fetching with rate limiting and retry
//!
//! The collector talks to the network only through [`HttpFetcher`], so the
//! scheduler and resolver can be driven by in-memory stubs in tests. The
//! production implementation is [`HttpClient`] (reqwest + governor).

use async_trait::async_trait;
use governor::{
    clock::DefaultClock,
    state::{direct::NotKeyed, InMemoryState},
    Quota, RateLimiter,
};
use reqwest::{
    header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE},
    Client,
};
use std::num::NonZeroU32;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::config::FetchConfig;
use super::retry_policy::{AttemptResult, RetryDecision, RetryPolicy};

/// Network-level failure of a single GET (no HTTP status available)
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("TLS failure: {0}")]
    Tls(String),

    #[error("failed to read response body: {0}")]
    Body(String),

    #[error("request failed: {0}")]
    Request(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        let message = e.to_string();
        if e.is_timeout() {
            Self::Timeout(message)
        } else if looks_like_tls(&e) {
            Self::Tls(message)
        } else if e.is_connect() {
            Self::Connect(message)
        } else if e.is_body() || e.is_decode() {
            Self::Body(message)
        } else {
            Self::Request(message)
        }
    }
}

fn looks_like_tls(e: &reqwest::Error) -> bool {
    let mut source = std::error::Error::source(e);
    while let Some(inner) = source {
        let text = inner.to_string().to_lowercase();
        if text.contains("certificate") || text.contains("tls") || text.contains("ssl") {
            return true;
        }
        source = inner.source();
    }
    false
}

/// Status and body of one completed request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpReply {
    pub status: u16,
    pub body: Vec<u8>,
}

impl HttpReply {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Single GET, no retry. Non-2xx statuses are replies, not errors.
#[async_trait]
pub trait HttpFetcher: Send + Sync {
    async fn get(&self, url: &str) -> Result<HttpReply, TransportError>;
}

/// How a retried GET ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FinalResponse {
    Reply(HttpReply),
    Transport(TransportError),
}

/// Result of [`fetch_with_policy`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyFetch {
    pub attempts: u32,
    pub last: FinalResponse,
}

impl PolicyFetch {
    /// Last HTTP status seen, `None` when the final attempt failed at transport level
    pub fn status(&self) -> Option<u16> {
        match &self.last {
            FinalResponse::Reply(reply) => Some(reply.status),
            FinalResponse::Transport(_) => None,
        }
    }

    /// Body of a 200 reply
    pub fn ok_body(&self) -> Option<&[u8]> {
        match &self.last {
            FinalResponse::Reply(reply) if reply.status == 200 => Some(&reply.body),
            _ => None,
        }
    }
}

/// GET `url`, retrying per `policy` and sleeping between attempts.
///
/// Never fails: the final reply or transport error is handed back for the
/// caller to classify.
pub async fn fetch_with_policy<F>(fetcher: &F, url: &str, policy: &RetryPolicy) -> PolicyFetch
where
    F: HttpFetcher + ?Sized,
{
    let mut attempt = 0;
    loop {
        attempt += 1;
        let result = fetcher.get(url).await;
        let decision = match &result {
            Ok(reply) => policy.decide(attempt, AttemptResult::Status(reply.status)),
            Err(e) => policy.decide(attempt, AttemptResult::Transport(e)),
        };

        match decision {
            RetryDecision::Stop => {
                match &result {
                    Ok(reply) if reply.status != 200 => {
                        debug!("GET {} -> {} (attempt {})", url, reply.status, attempt);
                    }
                    Err(e) if attempt >= policy.max_attempts => {
                        warn!("❌ GET {} failed after {} attempts: {}", url, attempt, e);
                    }
                    _ => {}
                }
                let last = match result {
                    Ok(reply) => FinalResponse::Reply(reply),
                    Err(e) => FinalResponse::Transport(e),
                };
                return PolicyFetch {
                    attempts: attempt,
                    last,
                };
            }
            RetryDecision::RetryAfter(delay) => {
                match &result {
                    Ok(reply) => warn!(
                        "🔄 GET {} -> {}, retrying in {:.2}s (attempt {}/{})",
                        url,
                        reply.status,
                        delay.as_secs_f64(),
                        attempt,
                        policy.max_attempts
                    ),
                    Err(e) => warn!(
                        "🔄 GET {} raised {}, retrying in {:.2}s (attempt {}/{})",
                        url,
                        e,
                        delay.as_secs_f64(),
                        attempt,
                        policy.max_attempts
                    ),
                }
                tokio::time::sleep(delay).await;
            }
        }
    }
}

/// reqwest-backed fetcher with an optional global rate limit
pub struct HttpClient {
    client: Client,
    rate_limiter: Option<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>,
    config: FetchConfig,
}

impl HttpClient {
    /// Create a new HTTP client from the fetch configuration
    pub fn new(config: FetchConfig) -> anyhow::Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("*/*"));
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));

        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .user_agent(&config.user_agent)
            .default_headers(headers)
            .cookie_store(true)
            .gzip(true)
            .danger_accept_invalid_certs(!config.verify_tls)
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to create HTTP client: {}", e))?;

        let rate_limiter = NonZeroU32::new(config.max_requests_per_second)
            .map(|rps| RateLimiter::direct(Quota::per_second(rps)));

        if let Some(rps) = NonZeroU32::new(config.max_requests_per_second) {
            info!("⚖️ HTTP rate limit: {} RPS", rps);
        }
        if !config.verify_tls {
            debug!("TLS certificate verification disabled");
        }

        Ok(Self {
            client,
            rate_limiter,
            config,
        })
    }

    /// Get the configuration
    pub fn config(&self) -> &FetchConfig {
        &self.config
    }
}

#[async_trait]
impl HttpFetcher for HttpClient {
    async fn get(&self, url: &str) -> Result<HttpReply, TransportError> {
        if let Some(limiter) = &self.rate_limiter {
            limiter.until_ready().await;
        }

        debug!("🌐 HTTP GET: {}", url);
        let response = self.client.get(url).send().await?;
        let status = response.status().as_u16();
        let body = response.bytes().await?;
        Ok(HttpReply::new(status, body.to_vec()))
    }
}
