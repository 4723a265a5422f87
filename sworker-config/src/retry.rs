//! Bounded retry with exponential backoff around a network fetch.
//!
//! Only transport failures are retried. A response with an error status is
//! handed back as-is on the first attempt. After the last retry the
//! original transport error is returned to the caller.
use crate::network::{NetworkClient, NetworkError};
use backoff::backoff::Backoff;
use std::time::Duration;
use sworker_cache::{HttpRequest, HttpResponse};
use tracing::{debug, warn};

/// Retry budget and delay bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            initial_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(5000),
        }
    }
}

impl RetryPolicy {
    /// Worst-case extra latency added by the retries alone.
    pub fn worst_case_delay(&self) -> Duration {
        self.backoff().collect_delays().into_iter().sum()
    }

    pub fn backoff(&self) -> BoundedBackoff {
        BoundedBackoff::new(*self)
    }
}

/// Doubling backoff capped at `max_delay` that gives up after
/// `max_retries` delays. No jitter.
#[derive(Debug, Clone)]
pub struct BoundedBackoff {
    policy: RetryPolicy,
    next_delay: Duration,
    retries: u32,
}

impl BoundedBackoff {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            next_delay: policy.initial_delay.min(policy.max_delay),
            retries: 0,
        }
    }

    fn collect_delays(mut self) -> Vec<Duration> {
        let mut delays = Vec::new();
        while let Some(delay) = self.next_backoff() {
            delays.push(delay);
        }
        delays
    }
}

impl Backoff for BoundedBackoff {
    fn reset(&mut self) {
        self.next_delay = self.policy.initial_delay.min(self.policy.max_delay);
        self.retries = 0;
    }

    fn next_backoff(&mut self) -> Option<Duration> {
        if self.retries >= self.policy.max_retries {
            return None;
        }
        self.retries += 1;
        let delay = self.next_delay;
        self.next_delay = (delay * 2).min(self.policy.max_delay);
        Some(delay)
    }
}

#[derive(Debug, Clone, Default)]
pub struct RetryExecutor {
    policy: RetryPolicy,
}

impl RetryExecutor {
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Fetch `request`, retrying transport failures with backoff.
    pub async fn execute(
        &self,
        client: &dyn NetworkClient,
        request: &HttpRequest,
    ) -> Result<HttpResponse, NetworkError> {
        let operation = move || async move {
            client
                .fetch(request)
                .await
                .map_err(backoff::Error::transient)
        };
        let notify = |err: NetworkError, delay: Duration| {
            warn!(
                url = %request.url,
                error = %err,
                delay_ms = delay.as_millis() as u64,
                "network fetch failed, retrying"
            );
        };

        let result =
            backoff::future::retry_notify(self.policy.backoff(), operation, notify)
                .await;
        if let Err(ref err) = result {
            debug!(url = %request.url, error = %err, "retries exhausted");
        }
        result
    }
}
