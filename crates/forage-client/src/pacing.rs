//! Per-host request pacing for polite recurring collection.
//!
//! Wraps any [`Fetcher`] with a minimum delay between consecutive
//! requests to the same host, plus bounded random jitter. Many
//! newsletter sources live on the same origin, and the collector
//! revisits them on every run, so pacing is the baseline politeness
//! measure here.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use forage_core::error::AppError;
use forage_core::traits::Fetcher;
use tokio::sync::Mutex;
use url::Url;

/// Pacing configuration.
#[derive(Debug, Clone)]
pub struct PacingConfig {
    /// Minimum delay between consecutive requests to the same host.
    pub min_delay: Duration,

    /// Maximum random jitter added on top (uniform [0, jitter]).
    pub jitter: Duration,
}

impl PacingConfig {
    pub fn new(min_delay: Duration) -> Self {
        Self {
            min_delay,
            jitter: Duration::ZERO,
        }
    }

    pub fn with_jitter(mut self, jitter: Duration) -> Self {
        self.jitter = jitter;
        self
    }

    fn effective_delay(&self) -> Duration {
        if self.jitter.is_zero() {
            return self.min_delay;
        }
        self.min_delay + Duration::from_millis(jitter_ms(self.jitter.as_millis() as u64))
    }
}

impl Default for PacingConfig {
    /// 1 second between same-host requests, 500ms jitter.
    fn default() -> Self {
        Self {
            min_delay: Duration::from_secs(1),
            jitter: Duration::from_millis(500),
        }
    }
}

/// A [`Fetcher`] wrapper enforcing per-host pacing.
///
/// Tracks the last request instant per host and sleeps before a new
/// request to that host when the minimum delay hasn't elapsed. Requests
/// to different hosts are never delayed against each other.
#[derive(Clone)]
pub struct PacedFetcher<F> {
    inner: F,
    config: PacingConfig,
    last_request: Arc<Mutex<HashMap<String, Instant>>>,
}

impl<F: Fetcher> PacedFetcher<F> {
    pub fn new(inner: F, config: PacingConfig) -> Self {
        Self {
            inner,
            config,
            last_request: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    fn host_key(url: &str) -> Option<String> {
        Url::parse(url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
    }

    async fn pace(&self, host: &str) {
        let mut map = self.last_request.lock().await;
        let wait = map.get(host).and_then(|last| {
            let required = self.config.effective_delay();
            required.checked_sub(last.elapsed())
        });

        if let Some(wait) = wait {
            // Don't hold the lock across the sleep; other hosts proceed.
            drop(map);
            tracing::debug!(%host, wait_ms = wait.as_millis() as u64, "Pacing request");
            tokio::time::sleep(wait).await;
            map = self.last_request.lock().await;
        }
        map.insert(host.to_string(), Instant::now());
    }
}

impl<F: Fetcher> Fetcher for PacedFetcher<F> {
    async fn fetch(&self, url: &str) -> Result<String, AppError> {
        if let Some(host) = Self::host_key(url) {
            self.pace(&host).await;
        }
        self.inner.fetch(url).await
    }
}

// xorshift over the clock — plenty for politeness jitter.
fn jitter_ms(max_ms: u64) -> u64 {
    if max_ms == 0 {
        return 0;
    }
    let mut x = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos() as u64;
    x ^= x << 13;
    x ^= x >> 7;
    x ^= x << 17;
    x % max_ms
}
