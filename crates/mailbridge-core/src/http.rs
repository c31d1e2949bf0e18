//! Shared HTTP client and retry policy for provider calls.

use std::future::Future;
use std::time::Duration;

use reqwest::{IntoUrl, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};
use url::Url;

use crate::config::{Config, RetrySettings};
use crate::{Error, Result};

/// Exponential backoff for provider calls that answer "slow down".
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
    factor: u32,
    retryable: fn(StatusCode) -> bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_settings(&RetrySettings::default())
    }
}

impl RetryPolicy {
    /// Build a policy retrying on `retryable` statuses.
    #[must_use]
    pub fn new(
        max_attempts: u32,
        base_delay: Duration,
        factor: u32,
        retryable: fn(StatusCode) -> bool,
    ) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            factor: factor.max(1),
            retryable,
        }
    }

    /// Policy from configuration, retrying only on HTTP 429.
    #[must_use]
    pub fn from_settings(settings: &RetrySettings) -> Self {
        Self::new(
            settings.max_attempts,
            Duration::from_millis(settings.base_delay_ms),
            settings.factor,
            is_rate_limited,
        )
    }

    /// Total attempts, including the first.
    #[must_use]
    pub const fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay after the given failed attempt (zero-based).
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay
            .saturating_mul(self.factor.saturating_pow(attempt))
    }

    /// Whether a status should be retried.
    #[must_use]
    pub fn is_retryable(&self, status: StatusCode) -> bool {
        (self.retryable)(status)
    }

    /// Run `send` until it yields a non-retryable status or attempts run out.
    ///
    /// The last response is returned either way; callers inspect its status.
    /// Transport errors are not retried.
    ///
    /// # Errors
    ///
    /// Returns the transport error of the failing attempt.
    pub async fn run<F, Fut>(&self, mut send: F) -> Result<Response>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = reqwest::Result<Response>>,
    {
        let mut attempt = 0;
        loop {
            let response = send().await?;
            let status = response.status();
            if !self.is_retryable(status) {
                return Ok(response);
            }
            if attempt + 1 >= self.max_attempts {
                warn!(%status, attempts = self.max_attempts, "Giving up after retries");
                return Ok(response);
            }
            let delay = self.delay_for(attempt);
            debug!(%status, ?delay, attempt, "Retrying provider call");
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}

/// HTTP 429 predicate.
#[must_use]
pub fn is_rate_limited(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS
}

/// Process-wide HTTP client with timeout and retry policy.
///
/// Cheap to clone; clones share one connection pool.
#[derive(Debug, Clone)]
pub struct HttpClient {
    inner: reqwest::Client,
    retry: RetryPolicy,
}

impl HttpClient {
    /// Build the client from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the TLS backend cannot be initialized.
    pub fn new(config: &Config) -> Result<Self> {
        let inner = reqwest::Client::builder()
            .timeout(config.http_timeout())
            .user_agent(concat!("mailbridge/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            inner,
            retry: RetryPolicy::from_settings(&config.retry),
        })
    }

    /// Wrap an existing client.
    #[must_use]
    pub const fn from_parts(inner: reqwest::Client, retry: RetryPolicy) -> Self {
        Self { inner, retry }
    }

    /// Underlying reqwest client.
    #[must_use]
    pub const fn client(&self) -> &reqwest::Client {
        &self.inner
    }

    /// Retry policy for rate-limited calls.
    #[must_use]
    pub const fn retry(&self) -> &RetryPolicy {
        &self.retry
    }

    /// `GET` with a bearer token.
    #[must_use]
    pub fn get<U: IntoUrl>(&self, url: U, token: &str) -> RequestBuilder {
        self.inner.get(url).bearer_auth(token)
    }

    /// `POST` with a bearer token.
    #[must_use]
    pub fn post<U: IntoUrl>(&self, url: U, token: &str) -> RequestBuilder {
        self.inner.post(url).bearer_auth(token)
    }

    /// `DELETE` with a bearer token.
    #[must_use]
    pub fn delete<U: IntoUrl>(&self, url: U, token: &str) -> RequestBuilder {
        self.inner.delete(url).bearer_auth(token)
    }

    /// Send a request and decode a JSON body, failing on non-2xx.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Provider`] for non-success statuses, or the
    /// transport/decoding error.
    pub async fn json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let response = request.send().await?;
        decode_json(response).await
    }

    /// Send a request and report whether the provider answered `expected`.
    ///
    /// Unexpected statuses are logged with their body.
    ///
    /// # Errors
    ///
    /// Returns the transport error if the request could not be sent.
    pub async fn expect_status(&self, request: RequestBuilder, expected: StatusCode) -> Result<bool> {
        let response = request.send().await?;
        let status = response.status();
        if status == expected {
            return Ok(true);
        }
        let body = response.text().await.unwrap_or_default();
        warn!(%status, %expected, body = %truncate(&body, 300), "Unexpected provider status");
        Ok(false)
    }
}

/// Append percent-encoded path segments to an API base URL.
///
/// # Errors
///
/// Returns [`Error::Config`] if `base` is not a usable base URL.
pub fn api_url(base: &str, segments: &[&str]) -> Result<Url> {
    let mut url = Url::parse(base).map_err(|e| Error::Config(format!("invalid API base {base}: {e}")))?;
    url.path_segments_mut()
        .map_err(|()| Error::Config(format!("API base cannot take a path: {base}")))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

/// Decode a JSON body, mapping non-2xx statuses to [`Error::Provider`].
///
/// # Errors
///
/// Returns [`Error::Provider`] or the decoding error.
pub async fn decode_json<T: DeserializeOwned>(response: Response) -> Result<T> {
    let status = response.status();
    let body = response.text().await?;
    if !status.is_success() {
        return Err(Error::Provider {
            status: status.as_u16(),
            body,
        });
    }
    Ok(serde_json::from_str(&body)?)
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
