// Per-host pacing

use crate::error::{Result, ScanError};
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{Instant, sleep};
use tokio_util::sync::CancellationToken;
use tracing::debug;
use url::Url;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThrottleConfig {
    /// Minimum gap between two fetches to the same host
    pub cooldown: Duration,
    /// Every fetch also waits a random `[min_delay / 2, min_delay)`
    pub min_delay: Duration,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            cooldown: Duration::from_millis(5000),
            min_delay: Duration::from_millis(1000),
        }
    }
}

#[derive(Debug, Default)]
pub struct DomainState {
    pub last_access_at: Option<Instant>,
    pub request_count: u64,
}

/// Shared by every worker for the lifetime of a crawl.
#[derive(Debug, Default)]
pub struct DomainThrottle {
    config: ThrottleConfig,
    hosts: DashMap<String, Arc<Mutex<DomainState>>>,
}

impl DomainThrottle {
    pub fn new(config: ThrottleConfig) -> Self {
        Self {
            config,
            hosts: DashMap::new(),
        }
    }

    pub fn config(&self) -> ThrottleConfig {
        self.config
    }

    /// Wait until `url`'s host may be fetched again, then mark it as accessed.
    ///
    /// The per-host lock is held for the whole wait so concurrent callers for
    /// the same host are spaced by the full cooldown.
    pub async fn before_fetch(&self, url: &str, cancel: &CancellationToken) -> Result<()> {
        let host = host_key(url);
        let entry = self.hosts.entry(host.clone()).or_default().clone();

        let mut state = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ScanError::Cancelled),
            guard = entry.lock() => guard,
        };

        if let Some(last) = state.last_access_at {
            let elapsed = last.elapsed();
            if elapsed < self.config.cooldown {
                let remaining = self.config.cooldown - elapsed;
                debug!("Cooling down {} for {} ms", host, remaining.as_millis());
                sleep_or_cancel(remaining, cancel).await?;
            }
        }

        let jitter = self.jitter();
        if !jitter.is_zero() {
            sleep_or_cancel(jitter, cancel).await?;
        }

        state.last_access_at = Some(Instant::now());
        state.request_count += 1;
        Ok(())
    }

    pub async fn request_count(&self, host: &str) -> u64 {
        match self.state_for(host) {
            Some(state) => state.lock().await.request_count,
            None => 0,
        }
    }

    pub async fn last_access(&self, host: &str) -> Option<Instant> {
        match self.state_for(host) {
            Some(state) => state.lock().await.last_access_at,
            None => None,
        }
    }

    fn state_for(&self, host: &str) -> Option<Arc<Mutex<DomainState>>> {
        self.hosts.get(&host.to_lowercase()).map(|s| s.value().clone())
    }

    fn jitter(&self) -> Duration {
        let min = self.config.min_delay.as_millis() as u64;
        if min == 0 {
            Duration::ZERO
        } else {
            Duration::from_millis(fastrand::u64(min / 2..min))
        }
    }
}

/// Lowercased host of `url`, or the whole string when it has none.
pub fn host_key(url: &str) -> String {
    Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_lowercase))
        .unwrap_or_else(|| url.to_lowercase())
}

/// Sleep for `duration` unless the token fires first.
pub async fn sleep_or_cancel(duration: Duration, cancel: &CancellationToken) -> Result<()> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(ScanError::Cancelled),
        _ = sleep(duration) => Ok(()),
    }
}
