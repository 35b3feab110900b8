//! Listing-Harvester: a paced listing crawler with natural-key deduplication
//!
//! This crate discovers business listings on classified and directory pages,
//! turns each listing fragment into a canonical record, enriches it with
//! contact channels, and persists it at most once per identity key.

pub mod config;
pub mod crawler;
pub mod extract;
pub mod normalize;
pub mod output;
pub mod state;
pub mod storage;

use thiserror::Error;

/// Main error type for Listing-Harvester operations
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("A crawl is already in progress")]
    AlreadyRunning,

    #[error("Unknown source: {0}")]
    UnknownSource(String),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid pattern: {0}")]
    InvalidPattern(String),
}

/// Result type alias for Listing-Harvester operations
pub type Result<T> = std::result::Result<T, HarvestError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{run_crawl, Harvester};
pub use normalize::{Contacts, ListingRecord};
pub use output::{RunSummary, SourceCounts};
pub use state::{CrawlStatus, StatusSnapshot};
