use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::{Arc, RwLock};

/// Point-in-time view of the crawl status
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusSnapshot {
    pub running: bool,
    pub message: String,
    pub updated_at: DateTime<Utc>,
}

/// Shared, thread-safe crawl status
///
/// Cloning gives another handle to the same status. Readers never wait on
/// the crawl: every write holds the lock only long enough to copy a string.
#[derive(Debug, Clone)]
pub struct CrawlStatus {
    inner: Arc<RwLock<StatusSnapshot>>,
}

impl Default for CrawlStatus {
    fn default() -> Self {
        Self::new()
    }
}

impl CrawlStatus {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(StatusSnapshot {
                running: false,
                message: "idle".to_string(),
                updated_at: Utc::now(),
            })),
        }
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        match self.inner.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn is_running(&self) -> bool {
        self.snapshot().running
    }

    /// Marks a crawl as started unless one is already running
    ///
    /// Returns false, leaving the status untouched, if a crawl is in progress.
    pub fn try_begin(&self, message: impl Into<String>) -> bool {
        self.write(|status| {
            if status.running {
                return false;
            }
            status.running = true;
            status.message = message.into();
            true
        })
    }

    /// Replaces the progress message
    pub fn update(&self, message: impl Into<String>) {
        self.write(|status| status.message = message.into());
    }

    /// Marks the crawl as finished with a final message
    pub fn finish(&self, message: impl Into<String>) {
        self.write(|status| {
            status.running = false;
            status.message = message.into();
        });
    }

    fn write<T>(&self, f: impl FnOnce(&mut StatusSnapshot) -> T) -> T {
        let mut guard = match self.inner.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let result = f(&mut guard);
        guard.updated_at = Utc::now();
        result
    }
}
