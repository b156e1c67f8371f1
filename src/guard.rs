//! Quota / Rate-limit Guard
//!
//! Quota defense in two layers. Proactively, a sliding-window
//! `RateLimiter` paces outbound platform requests below the provider's
//! published limit. Reactively, the classifiers map every
//! external-capability failure onto the three-way taxonomy and the
//! `RetryPolicy` applies it: a quota wall is never retried — the limit
//! will not reset inside the cycle, so the only correct move is to
//! record the event and abort the remainder of the cycle. Transient
//! failures get a bounded number of retries with backoff before
//! surfacing as a per-item skip. Fatal failures propagate untouched.

use std::collections::VecDeque;
use std::future::Future;
use std::time::Duration;

use reqwest::StatusCode;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::errors::ProviderError;

// ─── Request Pacing ──────────────────────────────────────────────

/// Sliding-window limiter for outbound requests. `acquire` waits until a
/// slot is free, so callers stay under the provider's limit instead of
/// discovering it through 429 responses. `max_requests` must be nonzero.
#[derive(Debug)]
pub struct RateLimiter {
    max_requests: usize,
    window: Duration,
    stamps: Mutex<VecDeque<Instant>>,
}

impl RateLimiter {
    pub fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            max_requests,
            window,
            stamps: Mutex::new(VecDeque::with_capacity(max_requests)),
        }
    }

    /// Wait until a request slot is available, then claim it.
    pub async fn acquire(&self) {
        loop {
            let wait = {
                let mut stamps = self.stamps.lock().await;
                let now = Instant::now();
                while stamps
                    .front()
                    .is_some_and(|t| now.duration_since(*t) >= self.window)
                {
                    stamps.pop_front();
                }
                if stamps.len() < self.max_requests {
                    stamps.push_back(now);
                    return;
                }
                match stamps.front() {
                    Some(oldest) => self.window - now.duration_since(*oldest),
                    None => return,
                }
            };
            debug!("request window full, pacing for {wait:?}");
            tokio::time::sleep(wait).await;
        }
    }
}

// ─── Classification ──────────────────────────────────────────────

/// Map an HTTP status and response body onto the three-way taxonomy.
/// Used by both production provider clients.
pub fn classify_status(status: StatusCode, body: &str) -> ProviderError {
    if status == StatusCode::TOO_MANY_REQUESTS || body_signals_quota(body) {
        return ProviderError::quota(format!("{}: {}", status.as_u16(), snippet(body)));
    }
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return ProviderError::fatal(format!("{}: {}", status.as_u16(), snippet(body)));
    }
    // Everything else (5xx, 4xx surprises) is worth one more look later.
    ProviderError::transient(format!("{}: {}", status.as_u16(), snippet(body)))
}

/// Map a reqwest transport error. Timeouts and connection failures are
/// transient; a malformed request URL means misconfiguration.
pub fn classify_request_error(err: reqwest::Error) -> ProviderError {
    if err.is_builder() {
        return ProviderError::fatal(format!("malformed request: {err}"));
    }
    ProviderError::transient(format!("request failed: {err}"))
}

/// Classify an error reported inside a success-status envelope body.
pub fn classify_envelope_error(error: &str) -> ProviderError {
    if body_signals_quota(error) {
        ProviderError::quota(error.to_string())
    } else {
        ProviderError::transient(error.to_string())
    }
}

/// Some providers report quota exhaustion with a 200-adjacent status and an
/// error body. Match the usual phrasings.
fn body_signals_quota(body: &str) -> bool {
    let lower = body.to_lowercase();
    lower.contains("rate limit")
        || lower.contains("rate_limit")
        || lower.contains("quota")
        || lower.contains("too many requests")
}

fn snippet(body: &str) -> String {
    body.chars().take(200).collect()
}

// ─── Retry Policy ────────────────────────────────────────────────

/// Bounded retry with exponential backoff for transient failures only.
#[derive(Clone, Copy, Debug)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    /// Policy with no sleeping, for tests.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            base_delay: Duration::ZERO,
        }
    }

    /// Run `op`, retrying transient failures up to `max_attempts` total
    /// attempts. Quota and fatal failures return on first occurrence.
    pub async fn run<T, F, Fut>(&self, label: &str, mut op: F) -> Result<T, ProviderError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ProviderError>>,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_transient() && attempt < self.max_attempts => {
                    let delay = self.base_delay * 2u32.saturating_pow(attempt - 1);
                    warn!(
                        "{label}: transient failure (attempt {attempt}/{}), retrying in {:?}: {}",
                        self.max_attempts,
                        delay,
                        err.detail()
                    );
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                }
                Err(err) => {
                    debug!("{label}: giving up after attempt {attempt}: {err}");
                    return Err(err);
                }
            }
        }
    }
}
