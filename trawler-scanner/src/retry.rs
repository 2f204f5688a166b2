use crate::error::ScanError;
use crate::fetcher::{FetchOutcome, PageFetcher};
use crate::proxy::{ProxyEndpoint, ProxyPool};
use crate::throttle::{DomainThrottle, sleep_or_cancel};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: usize,
    pub backoff_min: Duration,
    pub backoff_max: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_min: Duration::from_millis(1000),
            backoff_max: Duration::from_millis(3000),
        }
    }
}

impl RetryPolicy {
    fn backoff(&self) -> Duration {
        let (low, high) = if self.backoff_min <= self.backoff_max {
            (self.backoff_min, self.backoff_max)
        } else {
            (self.backoff_max, self.backoff_min)
        };
        Duration::from_millis(fastrand::u64(low.as_millis() as u64..=high.as_millis() as u64))
    }
}

/// Statuses worth another attempt, possibly through another proxy.
pub fn is_transient_status(status: u16) -> bool {
    matches!(status, 408 | 425 | 429) || (500..600).contains(&status)
}

/// Wraps a [`PageFetcher`] with throttling, proxy diversification and bounded retries.
pub struct RetryOrchestrator {
    fetcher: Arc<dyn PageFetcher>,
    pool: Arc<ProxyPool>,
    throttle: Arc<DomainThrottle>,
    policy: RetryPolicy,
}

impl RetryOrchestrator {
    pub fn new(
        fetcher: Arc<dyn PageFetcher>,
        pool: Arc<ProxyPool>,
        throttle: Arc<DomainThrottle>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            fetcher,
            pool,
            throttle,
            policy,
        }
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    pub async fn fetch_with_retry(&self, url: &str, cancel: &CancellationToken) -> FetchOutcome {
        self.fetch_with_attempts(url, self.policy.max_attempts, cancel)
            .await
    }

    /// Try `url` up to `max_attempts` times. Returns the first success, the
    /// first final HTTP status, or the last failure once the budget is spent.
    pub async fn fetch_with_attempts(
        &self,
        url: &str,
        max_attempts: usize,
        cancel: &CancellationToken,
    ) -> FetchOutcome {
        let max_attempts = max_attempts.max(1);
        let mut tried: HashSet<ProxyEndpoint> = HashSet::new();
        let mut last = None;

        for attempt in 1..=max_attempts {
            if let Err(e) = self.throttle.before_fetch(url, cancel).await {
                return FetchOutcome::Failed(e);
            }

            let proxy = self.pool.select(&tried);
            debug!(
                "Attempt {}/{} for {} via {}",
                attempt,
                max_attempts,
                url,
                proxy
                    .as_ref()
                    .map(|p| p.to_string())
                    .unwrap_or_else(|| "direct".to_string())
            );

            let outcome = self.fetcher.fetch(url, proxy.as_ref()).await;
            let retry = match &outcome {
                FetchOutcome::Success { .. } => false,
                FetchOutcome::HttpError { status } => {
                    let transient = is_transient_status(*status);
                    if transient {
                        warn!("Attempt {}/{} for {} got HTTP {}", attempt, max_attempts, url, status);
                    }
                    transient
                }
                FetchOutcome::Failed(e) => {
                    let retryable = e.is_retryable();
                    if retryable {
                        warn!("Attempt {}/{} for {} failed: {}", attempt, max_attempts, url, e);
                    }
                    retryable
                }
            };
            if !retry {
                return outcome;
            }

            if let Some(proxy) = proxy {
                tried.insert(proxy);
            }
            last = Some(outcome);

            if attempt < max_attempts
                && let Err(e) = sleep_or_cancel(self.policy.backoff(), cancel).await
            {
                return FetchOutcome::Failed(e);
            }
        }

        last.unwrap_or_else(|| FetchOutcome::Failed(ScanError::Other("no attempt was made".into())))
    }
}
