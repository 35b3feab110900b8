//! Crawler module for paced, page-by-page listing discovery
//!
//! This module contains the crawl machinery, including:
//! - Sessions that load pages with the operator's identity
//! - Page fetching with timeout, retry and small-page recheck
//! - Page descriptors and randomized pacing
//! - The per-source crawl loop and overall coordination

mod coordinator;
mod fetcher;
mod pacing;
mod scheduler;
mod session;
mod source;

pub use coordinator::{run_crawl, Harvester, PageTally, Pipeline};
pub use fetcher::{FetchError, FetchPolicy, FetchedPage, PageFetcher};
pub use pacing::{pause, Pacer};
pub use scheduler::SourceWorker;
pub use session::{
    build_http_client, BrowserSession, HttpSession, HttpSessionFactory, SessionError,
    SessionFactory,
};
pub use source::{segments, PageDescriptor};
