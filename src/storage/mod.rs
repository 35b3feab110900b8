//! Storage module for persisting listings
//!
//! This module handles all database operations, including:
//! - SQLite database initialization and schema management
//! - Natural-key deduplicated listing persistence
//! - Run tracking
//! - The locked store shared by concurrent source workers

mod schema;
mod shared;
mod sqlite;
mod traits;

pub use shared::{Admission, SharedStore};
pub use sqlite::SqliteStorage;
pub use traits::{ListingStore, StorageError, StorageResult};

use crate::normalize::ListingRecord;
use crate::HarvestError;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;

/// Initializes or opens a storage database
///
/// # Arguments
///
/// * `path` - Path to the SQLite database file
///
/// # Returns
///
/// * `Ok(SqliteStorage)` - Successfully initialized storage
/// * `Err(HarvestError)` - Failed to initialize storage
pub fn open_storage(path: &Path) -> Result<SqliteStorage, HarvestError> {
    SqliteStorage::new(path)
}

/// A listing as persisted, with its store-managed columns
#[derive(Debug, Clone, Serialize)]
pub struct StoredListing {
    pub id: i64,
    #[serde(flatten)]
    pub record: ListingRecord,
    pub reviewed: bool,
    /// Insertion timestamp assigned by the database
    pub created_at: String,
}

/// Aggregate counts over the listing table
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StoreStatistics {
    pub total: u64,
    pub reviewed: u64,
    pub unreviewed: u64,
    /// Listings inserted since midnight UTC
    pub today: u64,
    pub by_source: BTreeMap<String, u64>,
}

/// Represents a crawl run
#[derive(Debug, Clone)]
pub struct RunRecord {
    pub id: i64,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub config_hash: String,
    pub status: RunStatus,
    pub new_count: u64,
    pub duplicate_count: u64,
    pub error_count: u64,
    pub skipped_count: u64,
}

/// Status of a crawl run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Running,
    Completed,
    Interrupted,
    Failed,
}

impl RunStatus {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Interrupted => "interrupted",
            Self::Failed => "failed",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "interrupted" => Some(Self::Interrupted),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}
