//! State module for tracking crawl progress
//!
//! # Components
//!
//! - `CrawlCursor`: Per-source position, error streaks and request budget
//! - `CrawlStatus`: Shared running flag and progress message polled by callers

mod cursor;
mod status;

// Re-export main types
pub use cursor::{AbortReason, CrawlCursor, CursorLimits, SourceState, Transition};
pub use status::{CrawlStatus, StatusSnapshot};
