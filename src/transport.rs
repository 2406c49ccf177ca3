//! HTTP transport with exponential backoff retry logic and run control.
//!
//! # Architecture
//!
//! The module uses a trait-based design so the network can be swapped out:
//! - [`Transport`]: core trait, fetch the body behind a URL
//! - [`HttpTransport`]: `reqwest` implementation used in production
//! - [`RetryTransport`]: decorator that adds retries to any [`Transport`]
//!
//! Retries follow an explicit [`RetryPolicy`], and every attempt first asks a
//! shared [`RunControl`] whether the run is still allowed to issue requests.
//!
//! # Retry Strategy
//!
//! - 3 attempts by default, transient failures only (network, 408, 429, 5xx)
//! - Exponential backoff starting at 500ms, capped at 10 seconds
//! - Random jitter (0-250ms) added to avoid hammering the provider in lockstep

use crate::error::TransportError;
use rand::{Rng, rng};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{debug, error, instrument, warn};
use url::Url;

const USER_AGENT: &str = concat!("mensa_export/", env!("CARGO_PKG_VERSION"));

/// Fetch the body behind a URL.
pub trait Transport {
    async fn get(&self, url: &Url) -> Result<String, TransportError>;
}

/// Production transport backed by a shared `reqwest` client.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(request_timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self { client })
    }
}

impl Transport for HttpTransport {
    #[instrument(level = "debug", skip_all, fields(%url))]
    async fn get(&self, url: &Url) -> Result<String, TransportError> {
        let t0 = Instant::now();
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| TransportError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            debug!(status = status.as_u16(), elapsed_ms = t0.elapsed().as_millis() as u64, "Non-success response");
            return Err(TransportError::Status(status.as_u16()));
        }

        let body = response
            .text()
            .await
            .map_err(|e| TransportError::Network(e.to_string()))?;
        debug!(bytes = body.len(), elapsed_ms = t0.elapsed().as_millis() as u64, "Fetched");
        Ok(body)
    }
}

/// How often and how patiently a failed request is retried.
///
/// The delay before retry `n` (1-based) is
/// ```text
/// delay = min(base_delay * 2^(n-1), max_delay) + random_jitter(0..=jitter)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first one. Zero is treated as one.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
            jitter: Duration::from_millis(250),
        }
    }
}

impl RetryPolicy {
    /// Same attempt budget without any waiting.
    #[cfg(test)]
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            jitter: Duration::ZERO,
        }
    }

    /// Backoff before retry number `retry` (1-based), without jitter.
    pub fn backoff(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1).min(31);
        self.base_delay
            .saturating_mul(1u32 << exponent)
            .min(self.max_delay)
    }

    fn delay_with_jitter(&self, retry: u32) -> Duration {
        let jitter_ms = self.jitter.as_millis() as u64;
        let jitter = if jitter_ms == 0 {
            Duration::ZERO
        } else {
            Duration::from_millis(rng().random_range(0..=jitter_ms))
        };
        self.backoff(retry) + jitter
    }
}

/// Stop signal shared by everything in one run.
///
/// A run stops when its deadline passes or when [`RunControl::cancel`] is
/// called (e.g. on Ctrl-C). Stopping never interrupts a request in flight;
/// it only prevents new ones.
#[derive(Debug, Clone, Default)]
pub struct RunControl {
    cancelled: Arc<AtomicBool>,
    deadline: Option<Instant>,
}

impl RunControl {
    pub fn new(timeout: Option<Duration>) -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
            deadline: timeout.map(|t| Instant::now() + t),
        }
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
            || self.deadline.is_some_and(|deadline| Instant::now() >= deadline)
    }
}

/// Wrapper that adds retry logic to any [`Transport`] implementation.
pub struct RetryTransport<T> {
    inner: T,
    policy: RetryPolicy,
    control: RunControl,
}

impl<T: Transport> RetryTransport<T> {
    /// Wrap `inner` so transient failures are retried.
    ///
    /// # Arguments
    ///
    /// * `inner` - The transport that performs the actual requests
    /// * `policy` - Attempt budget and backoff curve
    /// * `control` - Shared stop signal, checked before every attempt
    ///
    /// # Example
    ///
    /// ```ignore
    /// let http = HttpTransport::new(Duration::from_secs(30))?;
    /// let transport = RetryTransport::new(http, RetryPolicy::default(), RunControl::new(None));
    /// ```
    pub fn new(inner: T, policy: RetryPolicy, control: RunControl) -> Self {
        Self {
            inner,
            policy,
            control,
        }
    }

    pub fn control(&self) -> &RunControl {
        &self.control
    }
}

impl<T> fmt::Debug for RetryTransport<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryTransport")
            .field("policy", &self.policy)
            .field("control", &self.control)
            .finish()
    }
}

impl<T: Transport> Transport for RetryTransport<T> {
    #[instrument(level = "debug", skip_all, fields(%url))]
    async fn get(&self, url: &Url) -> Result<String, TransportError> {
        let total_t0 = Instant::now();
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = 0u32;

        loop {
            if self.control.is_stopped() {
                return Err(TransportError::Cancelled);
            }

            attempt += 1;
            match self.inner.get(url).await {
                Ok(body) => return Ok(body),
                Err(e) if !e.is_transient() => return Err(e),
                Err(e) => {
                    let elapsed_ms_total = total_t0.elapsed().as_millis() as u64;
                    if attempt >= max_attempts {
                        error!(
                            attempt,
                            max = max_attempts,
                            elapsed_ms_total,
                            error = %e,
                            "Request exhausted retries"
                        );
                        return Err(e);
                    }

                    let delay = self.policy.delay_with_jitter(attempt);
                    warn!(
                        attempt,
                        max = max_attempts,
                        elapsed_ms_total,
                        ?delay,
                        error = %e,
                        "Request failed; backing off"
                    );
                    sleep(delay).await;
                }
            }
        }
    }
}
