//! Randomized pacing between page requests

use crate::config::CrawlerConfig;
use rand::Rng;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Picks inter-page delays uniformly from a closed range
#[derive(Debug, Clone)]
pub struct Pacer {
    min_ms: u64,
    max_ms: u64,
}

impl Pacer {
    pub fn new(min_ms: u64, max_ms: u64) -> Self {
        Self {
            min_ms: min_ms.min(max_ms),
            max_ms: max_ms.max(min_ms),
        }
    }

    pub fn from_config(config: &CrawlerConfig) -> Self {
        Self::new(config.page_delay_min_ms, config.page_delay_max_ms)
    }

    pub fn next_delay(&self) -> Duration {
        let ms = rand::thread_rng().gen_range(self.min_ms..=self.max_ms);
        Duration::from_millis(ms)
    }
}

/// Sleeps for `delay` unless cancelled first
///
/// Returns false if the token was cancelled before the delay elapsed.
pub async fn pause(delay: Duration, cancel: &CancellationToken) -> bool {
    if delay.is_zero() {
        return !cancel.is_cancelled();
    }

    tokio::select! {
        biased;
        _ = cancel.cancelled() => false,
        _ = tokio::time::sleep(delay) => true,
    }
}
