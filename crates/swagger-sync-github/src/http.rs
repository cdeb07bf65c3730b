//! Retrying HTTP transport shared by the GitHub client and the spec fetcher.
//!
//! Client errors (4xx) are returned on the first attempt. Server errors and
//! transport failures are retried with exponential backoff: after attempt `n`
//! the client sleeps `2^n * base_delay`.

use std::time::Duration;

use tracing::{debug, error, warn};

/// Longest error body excerpt written to the log. The error value keeps the
/// whole body.
pub const LOGGED_BODY_LIMIT: usize = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    pub base_delay: Duration,
    /// Per-attempt timeout.
    pub timeout: Option<Duration>,
}

impl RetryPolicy {
    pub const DEFAULT: Self = Self {
        max_attempts: 3,
        base_delay: Duration::from_secs(1),
        timeout: Some(Duration::from_secs(30)),
    };

    pub fn new(max_attempts: u32, timeout: Option<Duration>) -> Self {
        Self {
            max_attempts,
            timeout,
            ..Self::DEFAULT
        }
    }

    /// Sleep after the given (1-based) failed attempt.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        self.base_delay
            .checked_mul(2u32.saturating_pow(attempt))
            .unwrap_or(Duration::MAX)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::DEFAULT
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HttpError {
    #[error("HTTP {status}: {status_text}")]
    Status {
        status: u16,
        status_text: String,
        body: String,
        url: String,
    },

    #[error("request to {url} failed: {message}")]
    Transport { url: String, message: String },
}

impl HttpError {
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            Self::Transport { .. } => None,
        }
    }

    pub fn is_client_error(&self) -> bool {
        self.status().is_some_and(|s| (400..500).contains(&s))
    }
}

/// First `LOGGED_BODY_LIMIT` characters of `body`.
pub fn truncate_for_log(body: &str) -> &str {
    match body.char_indices().nth(LOGGED_BODY_LIMIT) {
        Some((end, _)) => &body[..end],
        None => body,
    }
}

/// A `reqwest::Client` plus the retry policy applied to every call.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: reqwest::Client,
    policy: RetryPolicy,
}

impl HttpClient {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            client: reqwest::Client::new(),
            policy,
        }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Send the request produced by `build` until it succeeds, fails with a
    /// client error, or the attempts run out. Returns the response body.
    ///
    /// `build` is called once per attempt since a request builder is consumed
    /// by sending it.
    pub async fn call<F>(&self, url: &str, build: F) -> Result<String, HttpError>
    where
        F: Fn(&reqwest::Client) -> reqwest::RequestBuilder + Send + Sync,
    {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            debug!(%url, attempt, max_attempts, "sending request");

            let err = match self.attempt(url, &build).await {
                Ok(body) => {
                    debug!(%url, bytes = body.len(), "request successful");
                    return Ok(body);
                }
                Err(e) => e,
            };

            if err.is_client_error() {
                return Err(err);
            }

            if attempt >= max_attempts {
                error!(%url, attempts = attempt, error = %err, "all retry attempts failed");
                return Err(err);
            }

            let delay = self.policy.delay_for_attempt(attempt);
            warn!(
                %url,
                attempt,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "request failed, retrying"
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }

    async fn attempt<F>(&self, url: &str, build: &F) -> Result<String, HttpError>
    where
        F: Fn(&reqwest::Client) -> reqwest::RequestBuilder + Send + Sync,
    {
        let mut request = build(&self.client);
        if let Some(timeout) = self.policy.timeout {
            request = request.timeout(timeout);
        }

        let transport = |e: reqwest::Error| HttpError::Transport {
            url: url.to_owned(),
            message: e.to_string(),
        };

        let response = request.send().await.map_err(transport)?;
        let status = response.status();
        debug!(%url, status = status.as_u16(), "response received");

        if status.is_success() {
            return response.text().await.map_err(transport);
        }

        let body = response.text().await.unwrap_or_default();
        let status_text = status.canonical_reason().unwrap_or("").to_owned();

        error!(
            %url,
            status = status.as_u16(),
            %status_text,
            body = truncate_for_log(&body),
            "HTTP error"
        );

        Err(HttpError::Status {
            status: status.as_u16(),
            status_text,
            body,
            url: url.to_owned(),
        })
    }
}

impl Default for HttpClient {
    fn default() -> Self {
        Self::new(RetryPolicy::DEFAULT)
    }
}
