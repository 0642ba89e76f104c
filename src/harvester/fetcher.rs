//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests made by the harvester, including:
//! - Building the shared HTTP client
//! - Passing every attempt through the rate limiter and concurrency gate
//! - Retrying transient failures and HTTP 429 responses
//! - Reporting exhaustion as an absent outcome rather than an error

use crate::harvester::gate::ConcurrencyGate;
use crate::harvester::rate_limiter::RateLimiter;
use crate::harvester::user_agents::UserAgentPool;
use reqwest::header::{HeaderMap, RETRY_AFTER, USER_AGENT};
use reqwest::{Client, StatusCode};
use std::sync::Arc;
use std::time::Duration;
use tracing::{Instrument, Span};

/// Result of one successful HTTP exchange
///
/// Any status other than 429 ends up here; callers decide what a non-2xx
/// status means for them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchOutcome {
    /// Response body
    pub body: Vec<u8>,

    /// HTTP status code
    pub status: u16,
}

impl FetchOutcome {
    /// Returns true for 2xx statuses
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Builds the HTTP client shared by all requests
///
/// User agents are set per request, so the client carries none.
///
/// # Arguments
///
/// * `timeout` - Total per-request timeout
pub fn build_http_client(timeout: Duration) -> Result<Client, reqwest::Error> {
    Client::builder()
        .timeout(timeout)
        .connect_timeout(timeout.min(Duration::from_secs(10)))
        .gzip(true)
        .brotli(true)
        .build()
}

/// GET with rate limiting, concurrency capping and bounded retries
///
/// # Retry Logic
///
/// | Condition                     | Action                                    |
/// |-------------------------------|-------------------------------------------|
/// | HTTP 429                      | Wait `Retry-After` or `2^attempt` s, retry |
/// | Timeout / connection / body   | Log, retry immediately                    |
/// | Any other status              | Returned as-is, not retried               |
/// | Attempts exhausted            | `None`                                    |
///
/// Every attempt, retried or not, consumes one rate-limiter permit and one
/// concurrency-gate slot.
#[derive(Debug, Clone)]
pub struct RetryingFetcher {
    client: Client,
    rate_limiter: Arc<RateLimiter>,
    gate: ConcurrencyGate,
    user_agents: Arc<UserAgentPool>,
    retries: u32,
    span: Span,
}

impl RetryingFetcher {
    /// Creates a fetcher
    ///
    /// # Arguments
    ///
    /// * `client` - HTTP client (its timeout applies to every attempt)
    /// * `rate_limiter` - Limiter shared with every other fetcher of the run
    /// * `gate` - Gate shared with every other fetcher of the run
    /// * `user_agents` - Source of the per-request `User-Agent` header
    /// * `retries` - Attempts per URL (at least one)
    /// * `span` - Span all fetch logs are recorded under
    pub fn new(
        client: Client,
        rate_limiter: Arc<RateLimiter>,
        gate: ConcurrencyGate,
        user_agents: Arc<UserAgentPool>,
        retries: u32,
        span: Span,
    ) -> Self {
        Self {
            client,
            rate_limiter,
            gate,
            user_agents,
            retries: retries.max(1),
            span,
        }
    }

    /// Fetches `url` with the configured number of attempts
    pub async fn fetch(&self, url: &str) -> Option<FetchOutcome> {
        self.fetch_with_retries(url, self.retries).await
    }

    /// Fetches `url` with up to `retries` attempts
    ///
    /// # Returns
    ///
    /// * `Some(FetchOutcome)` - A response other than 429 was received
    /// * `None` - Every attempt failed or was rate limited
    pub async fn fetch_with_retries(&self, url: &str, retries: u32) -> Option<FetchOutcome> {
        self.fetch_inner(url, retries.max(1))
            .instrument(self.span.clone())
            .await
    }

    async fn fetch_inner(&self, url: &str, retries: u32) -> Option<FetchOutcome> {
        for attempt in 1..=retries {
            self.rate_limiter.acquire().await;

            let Some(permit) = self.gate.acquire().await else {
                tracing::error!("Concurrency gate closed; cannot fetch {}", url);
                return None;
            };

            let response = self
                .client
                .get(url)
                .header(USER_AGENT, self.user_agents.pick())
                .send()
                .await;

            let response = match response {
                Ok(response) => response,
                Err(e) => {
                    drop(permit);
                    tracing::warn!(
                        "Error while fetching URL {} (attempt {}/{}): {}",
                        url,
                        attempt,
                        retries,
                        describe_error(&e)
                    );
                    continue;
                }
            };

            let status = response.status();
            tracing::debug!("Fetched URL: {} ({})", url, status.as_u16());

            if status == StatusCode::TOO_MANY_REQUESTS {
                let delay = retry_delay(response.headers(), attempt);
                drop(response);
                drop(permit);

                if attempt == retries {
                    tracing::warn!("429 Too Many Requests for {} on the last attempt", url);
                    break;
                }

                tracing::warn!(
                    "429 Too Many Requests for {}. Retrying in {:.1}s...",
                    url,
                    delay.as_secs_f64()
                );
                tokio::time::sleep(delay).await;
                continue;
            }

            let body = response.bytes().await;
            drop(permit);

            match body {
                Ok(body) => {
                    return Some(FetchOutcome {
                        body: body.to_vec(),
                        status: status.as_u16(),
                    })
                }
                Err(e) => {
                    tracing::warn!(
                        "Error while reading body of {} (attempt {}/{}): {}",
                        url,
                        attempt,
                        retries,
                        describe_error(&e)
                    );
                }
            }
        }

        tracing::error!("Failed to fetch URL after {} attempts: {}", retries, url);
        None
    }
}

/// Longest backoff waited before retrying a 429 response
pub const MAX_RETRY_DELAY: Duration = Duration::from_secs(300);

/// Delay before retrying a 429 response
///
/// Uses `Retry-After` when it holds a (possibly fractional) number of
/// seconds, otherwise `2^attempt` seconds. Never exceeds [`MAX_RETRY_DELAY`].
pub fn retry_delay(headers: &HeaderMap, attempt: u32) -> Duration {
    headers
        .get(RETRY_AFTER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<f64>().ok())
        .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
        .unwrap_or_else(|| Duration::from_secs(2u64.saturating_pow(attempt)))
        .min(MAX_RETRY_DELAY)
}

fn describe_error(e: &reqwest::Error) -> String {
    if e.is_timeout() {
        "request timeout".to_string()
    } else if e.is_connect() {
        format!("connection failed ({})", e)
    } else {
        e.to_string()
    }
}
