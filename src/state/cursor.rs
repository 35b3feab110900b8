use crate::config::{CrawlerConfig, EmptyPagePolicy, SourceConfig};
use std::fmt;

/// Why a source stopped before running out of pages
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbortReason {
    /// The first page had no listings and the source policy is `abort`
    EmptyFirstPage,

    /// This many pages in a row failed to load
    ConsecutiveErrors(u32),

    /// The operator cancelled the crawl
    Cancelled,
}

impl fmt::Display for AbortReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyFirstPage => write!(f, "first page returned no listings"),
            Self::ConsecutiveErrors(n) => write!(f, "{} consecutive page errors", n),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Lifecycle of one source's crawl
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceState {
    Running,
    Done,
    Aborted(AbortReason),
}

/// What the scheduler does after a page
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// Move on to the next page
    Continue,

    /// Fetch the same page again
    RetrySamePage,

    /// The segment ran out of listings
    Done,

    /// Stop the whole source
    Abort(AbortReason),
}

/// Per-source limits the cursor enforces
#[derive(Debug, Clone)]
pub struct CursorLimits {
    pub max_consecutive_errors: u32,
    pub first_page_retries: u32,
    pub empty_first_page: EmptyPagePolicy,
    /// Requests before a forced break, 0 for none
    pub request_budget: u32,
}

impl CursorLimits {
    pub fn for_source(crawler: &CrawlerConfig, source: &SourceConfig) -> Self {
        Self {
            max_consecutive_errors: crawler.max_consecutive_errors,
            first_page_retries: crawler.first_page_retries,
            empty_first_page: source.empty_first_page,
            request_budget: source.effective_budget(crawler),
        }
    }
}

/// Position and error streaks of one source's crawl
///
/// Owned by the worker crawling that source and never shared.
#[derive(Debug, Clone)]
pub struct CrawlCursor {
    pub source_name: String,

    /// Search term of the current segment, if the source is query-driven
    pub query: Option<String>,

    /// 1-based page within the current segment
    pub page_number: u32,

    pub consecutive_empty_pages: u32,

    pub consecutive_errors: u32,

    /// Requests since the last forced break; spans segments
    pub requests_since_break: u32,

    /// Segments started so far, the current one included
    segments_started: u32,
    first_page_retries_used: u32,
    state: SourceState,
}

impl CrawlCursor {
    pub fn new(source_name: &str) -> Self {
        Self {
            source_name: source_name.to_string(),
            query: None,
            page_number: 1,
            consecutive_empty_pages: 0,
            consecutive_errors: 0,
            requests_since_break: 0,
            segments_started: 0,
            first_page_retries_used: 0,
            state: SourceState::Running,
        }
    }

    pub fn state(&self) -> &SourceState {
        &self.state
    }

    /// Rewinds to page 1 for a new query, keeping the request budget count
    pub fn start_segment(&mut self, query: Option<&str>) {
        self.query = query.map(str::to_string);
        self.segments_started += 1;
        self.page_number = 1;
        self.consecutive_empty_pages = 0;
        self.consecutive_errors = 0;
        self.first_page_retries_used = 0;
        self.state = SourceState::Running;
    }

    /// Counts loads actually sent, retries included
    pub fn record_requests(&mut self, sent: u32) {
        self.requests_since_break += sent;
    }

    pub fn budget_exhausted(&self, limits: &CursorLimits) -> bool {
        limits.request_budget > 0 && self.requests_since_break >= limits.request_budget
    }

    pub fn take_break(&mut self) {
        self.requests_since_break = 0;
    }

    /// A page yielded at least one listing
    pub fn on_page_ok(&mut self) -> Transition {
        self.consecutive_empty_pages = 0;
        self.consecutive_errors = 0;
        self.page_number += 1;
        Transition::Continue
    }

    /// A page loaded but yielded no listings
    ///
    /// Past the first page, or on any later query segment, this is the end of
    /// the segment's results. On the source's very first page it is retried
    /// up to `first_page_retries` times, then the source policy decides
    /// between finishing the segment and aborting the source.
    pub fn on_page_empty(&mut self, limits: &CursorLimits) -> Transition {
        self.consecutive_empty_pages += 1;
        self.consecutive_errors = 0;

        if self.page_number > 1 || self.segments_started > 1 {
            self.state = SourceState::Done;
            return Transition::Done;
        }

        if self.first_page_retries_used < limits.first_page_retries {
            self.first_page_retries_used += 1;
            return Transition::RetrySamePage;
        }

        match limits.empty_first_page {
            EmptyPagePolicy::Done => {
                self.state = SourceState::Done;
                Transition::Done
            }
            EmptyPagePolicy::Abort => self.abort(AbortReason::EmptyFirstPage),
        }
    }

    /// A page could not be fetched; it is skipped unless the streak is too long
    pub fn on_page_error(&mut self, limits: &CursorLimits) -> Transition {
        self.consecutive_errors += 1;

        if self.consecutive_errors >= limits.max_consecutive_errors {
            return self.abort(AbortReason::ConsecutiveErrors(self.consecutive_errors));
        }

        self.page_number += 1;
        Transition::Continue
    }

    pub fn on_cancelled(&mut self) -> Transition {
        self.abort(AbortReason::Cancelled)
    }

    /// The page limit was reached
    pub fn finish(&mut self) {
        if self.state == SourceState::Running {
            self.state = SourceState::Done;
        }
    }

    fn abort(&mut self, reason: AbortReason) -> Transition {
        self.state = SourceState::Aborted(reason.clone());
        Transition::Abort(reason)
    }
}
