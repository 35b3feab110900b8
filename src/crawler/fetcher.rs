//! Page fetcher
//!
//! This module loads one page of listings through a session, including:
//! - A bounded page-load timeout
//! - One retry after a cooldown when navigation fails
//! - A settle delay before reading the rendered markup
//! - A single reload when the page looks too small to be complete

use crate::config::FetcherConfig;
use crate::crawler::session::{BrowserSession, SessionError};
use crate::crawler::source::PageDescriptor;
use std::time::Duration;
use thiserror::Error;
use tokio::time::sleep;

/// Why a page could not be fetched
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Timed out loading {url}")]
    Timeout { url: String },

    #[error("Navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },

    #[error("Page {url} has only {bytes} bytes")]
    EmptyContent { url: String, bytes: usize },
}

impl FetchError {
    fn from_session(url: &str, error: SessionError) -> Self {
        match error {
            SessionError::Timeout(_) => Self::Timeout {
                url: url.to_string(),
            },
            other => Self::Navigation {
                url: url.to_string(),
                reason: other.to_string(),
            },
        }
    }
}

/// Timing and size thresholds used by [`PageFetcher`]
#[derive(Debug, Clone)]
pub struct FetchPolicy {
    pub page_load_timeout: Duration,
    pub retry_cooldown: Duration,
    pub settle_delay: Duration,
    pub min_content_bytes: usize,
    pub recheck_delay: Duration,
}

impl From<&FetcherConfig> for FetchPolicy {
    fn from(config: &FetcherConfig) -> Self {
        Self {
            page_load_timeout: Duration::from_millis(config.page_load_timeout_ms),
            retry_cooldown: Duration::from_millis(config.retry_cooldown_ms),
            settle_delay: Duration::from_millis(config.settle_delay_ms),
            min_content_bytes: config.min_content_bytes,
            recheck_delay: Duration::from_millis(config.recheck_delay_ms),
        }
    }
}

/// A fetched page
#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// URL the session ended up on
    pub final_url: String,
    pub markup: String,
}

/// Loads pages through one session
pub struct PageFetcher {
    session: Box<dyn BrowserSession>,
    policy: FetchPolicy,
    /// Loads sent since the last `take_request_count`
    requests: u32,
}

impl PageFetcher {
    pub fn new(session: Box<dyn BrowserSession>, policy: FetchPolicy) -> Self {
        Self {
            session,
            policy,
            requests: 0,
        }
    }

    /// Returns the number of loads sent since the last call, and resets it
    ///
    /// Retries and reloads count, so this can exceed the number of pages.
    pub fn take_request_count(&mut self) -> u32 {
        std::mem::take(&mut self.requests)
    }

    /// Fetches one page
    ///
    /// # Fetch Flow
    ///
    /// 1. Navigate with the page-load timeout
    ///    - On failure wait `retry_cooldown` and navigate once more
    ///    - A second failure is returned as `Timeout` or `Navigation`
    /// 2. Wait `settle_delay`, then read the markup
    /// 3. If the markup is smaller than `min_content_bytes`, wait
    ///    `recheck_delay`, reload the page and read it again; still too
    ///    small is `EmptyContent`
    ///
    /// A page with no listings is not an error here.
    pub async fn fetch(&mut self, page: &PageDescriptor) -> Result<FetchedPage, FetchError> {
        let url = page.url.as_str();
        let timeout = self.policy.page_load_timeout;

        self.requests += 1;
        if let Err(first) = self.session.navigate(url, timeout).await {
            tracing::warn!(
                source = %page.source_name,
                page = page.page_number,
                "Load failed ({}), retrying in {:?}",
                first,
                self.policy.retry_cooldown
            );
            sleep(self.policy.retry_cooldown).await;
            self.requests += 1;
            self.session
                .navigate(url, timeout)
                .await
                .map_err(|e| FetchError::from_session(url, e))?;
        }

        sleep(self.policy.settle_delay).await;
        let mut markup = self.read(url).await?;

        if markup.len() < self.policy.min_content_bytes {
            tracing::debug!(
                source = %page.source_name,
                page = page.page_number,
                bytes = markup.len(),
                "Page looks incomplete, reloading"
            );
            sleep(self.policy.recheck_delay).await;
            self.requests += 1;
            self.session
                .refresh(timeout)
                .await
                .map_err(|e| FetchError::from_session(url, e))?;
            markup = self.read(url).await?;

            if markup.len() < self.policy.min_content_bytes {
                return Err(FetchError::EmptyContent {
                    url: url.to_string(),
                    bytes: markup.len(),
                });
            }
        }

        let final_url = self
            .session
            .current_url()
            .unwrap_or(url)
            .to_string();

        Ok(FetchedPage { final_url, markup })
    }

    async fn read(&mut self, url: &str) -> Result<String, FetchError> {
        self.session
            .page_source()
            .await
            .map_err(|e| FetchError::from_session(url, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{SourceConfig, SourceKind};
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    /// Session that plays back scripted navigation results and page sources
    struct ScriptedSession {
        navigations: VecDeque<Result<(), SessionError>>,
        sources: VecDeque<String>,
        calls: Arc<Mutex<Vec<&'static str>>>,
    }

    #[async_trait]
    impl BrowserSession for ScriptedSession {
        async fn navigate(&mut self, _url: &str, _timeout: Duration) -> Result<(), SessionError> {
            self.calls.lock().unwrap().push("navigate");
            self.navigations.pop_front().unwrap_or(Ok(()))
        }

        async fn refresh(&mut self, _timeout: Duration) -> Result<(), SessionError> {
            self.calls.lock().unwrap().push("refresh");
            Ok(())
        }

        async fn page_source(&mut self) -> Result<String, SessionError> {
            self.calls.lock().unwrap().push("read");
            self.sources.pop_front().ok_or(SessionError::NoPage)
        }

        fn current_url(&self) -> Option<&str> {
            Some("https://example.com/final")
        }
    }

    fn policy(min_content_bytes: usize) -> FetchPolicy {
        FetchPolicy {
            page_load_timeout: Duration::from_secs(30),
            retry_cooldown: Duration::from_secs(5),
            settle_delay: Duration::from_secs(3),
            min_content_bytes,
            recheck_delay: Duration::from_secs(5),
        }
    }

    fn page() -> PageDescriptor {
        let source = SourceConfig::new(
            "board",
            SourceKind::AnnouncementBoard,
            "https://example.com/",
            "https://example.com/list?page={page}",
        );
        PageDescriptor::new(&source, None, 1).unwrap()
    }

    fn fetcher(
        navigations: Vec<Result<(), SessionError>>,
        sources: Vec<&str>,
        min_content_bytes: usize,
    ) -> (PageFetcher, Arc<Mutex<Vec<&'static str>>>) {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let session = ScriptedSession {
            navigations: navigations.into(),
            sources: sources.into_iter().map(str::to_string).collect(),
            calls: Arc::clone(&calls),
        };
        (
            PageFetcher::new(Box::new(session), policy(min_content_bytes)),
            calls,
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_once_after_failed_navigation() {
        let (mut fetcher, calls) = fetcher(
            vec![Err(SessionError::Timeout(Duration::from_secs(30))), Ok(())],
            vec!["<html>ok</html>"],
            0,
        );

        let fetched = fetcher.fetch(&page()).await.unwrap();
        assert_eq!(fetched.markup, "<html>ok</html>");
        assert_eq!(fetched.final_url, "https://example.com/final");
        assert_eq!(*calls.lock().unwrap(), vec!["navigate", "navigate", "read"]);
        assert_eq!(fetcher.take_request_count(), 2);
        assert_eq!(fetcher.take_request_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_failure_surfaces() {
        let (mut fetcher, _) = fetcher(
            vec![
                Err(SessionError::Navigation("HTTP 503".to_string())),
                Err(SessionError::Timeout(Duration::from_secs(30))),
            ],
            vec![],
            0,
        );

        assert!(matches!(
            fetcher.fetch(&page()).await,
            Err(FetchError::Timeout { .. })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_small_page_is_reloaded() {
        let full = "x".repeat(2_000);
        let (mut fetcher, calls) = fetcher(vec![Ok(())], vec!["<html></html>", &full], 1_000);

        let fetched = fetcher.fetch(&page()).await.unwrap();
        assert_eq!(fetched.markup.len(), 2_000);
        assert_eq!(
            *calls.lock().unwrap(),
            vec!["navigate", "read", "refresh", "read"]
        );
        assert_eq!(fetcher.take_request_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_still_small_page_is_empty_content() {
        let (mut fetcher, _) = fetcher(vec![Ok(())], vec!["<p>", "<p>"], 1_000);

        match fetcher.fetch(&page()).await {
            Err(FetchError::EmptyContent { bytes, .. }) => assert_eq!(bytes, 3),
            other => panic!("expected EmptyContent, got {:?}", other.map(|p| p.markup)),
        }
    }
}
