//! Bounded retry with exponential backoff for provider HTTP calls.

use std::thread;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use reqwest::blocking::Response;
use reqwest::StatusCode;
use tracing::warn;

/// How many times, and how patiently, a provider request is retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: usize,
    base_delay: Duration,
}

impl RetryPolicy {
    /// Builds a policy; `max_attempts` counts the first try and is at least one.
    pub fn new(max_attempts: usize, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    /// Policy that sends each request exactly once.
    pub fn none() -> Self {
        Self::new(1, Duration::ZERO)
    }

    /// Total attempts allowed, including the first.
    pub fn max_attempts(&self) -> usize {
        self.max_attempts
    }

    /// Delay before retry number `attempt` (1-based), doubling up to 32x the base.
    pub fn backoff(&self, attempt: usize) -> Duration {
        let capped = attempt.min(5) as u32;
        self.base_delay.saturating_mul(1 << capped)
    }

    /// Sends a request via `send` until it succeeds, fails permanently, or
    /// attempts run out. Returns the first successful response.
    pub fn send<F>(&self, what: &str, mut send: F) -> Result<Response>
    where
        F: FnMut() -> reqwest::Result<Response>,
    {
        let mut attempt = 0usize;
        loop {
            match send() {
                Ok(resp) => {
                    let status = resp.status();
                    if status.is_success() {
                        return Ok(resp);
                    }
                    let body = resp
                        .text()
                        .unwrap_or_else(|_| "<body unavailable>".to_string());
                    if should_retry(status) && attempt + 1 < self.max_attempts {
                        attempt += 1;
                        let delay = self.backoff(attempt);
                        warn!(%status, attempt, delay_ms = delay.as_millis() as u64, "{what} failed; retrying");
                        thread::sleep(delay);
                        continue;
                    }
                    bail!("{what} returned {status}: {body}");
                }
                Err(err) => {
                    if is_retryable_error(&err) && attempt + 1 < self.max_attempts {
                        attempt += 1;
                        let delay = self.backoff(attempt);
                        warn!(error = %err, attempt, delay_ms = delay.as_millis() as u64, "{what} failed; retrying");
                        thread::sleep(delay);
                        continue;
                    }
                    return Err(err).with_context(|| format!("failed to call {what}"));
                }
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_millis(500))
    }
}

/// Rate limits and server errors are transient; everything else is final.
pub fn should_retry(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

fn is_retryable_error(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect() || err.is_request() || err.is_body()
}
