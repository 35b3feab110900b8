//! Storage traits and error types
//!
//! This module defines the trait interface for listing stores and
//! associated error types.

use crate::normalize::ListingRecord;
use crate::output::RunSummary;
use crate::storage::{RunRecord, RunStatus, StoreStatistics, StoredListing};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Listing not found: {0}")]
    ListingNotFound(String),

    #[error("Run not found: {0}")]
    RunNotFound(i64),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Store lock poisoned")]
    Poisoned,
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Persistent natural-key store for listings
///
/// At most one record is kept per identity key; the first one offered wins.
/// Stored records never change afterwards except for the `reviewed` flag,
/// which only the external review surface toggles.
pub trait ListingStore: Send {
    // ===== Listings =====

    /// Returns true if a listing with this key is stored
    fn exists(&self, identity_key: &str) -> StorageResult<bool>;

    /// Stores the record unless its key is already present
    ///
    /// # Returns
    ///
    /// * `Ok(true)` - The record was inserted
    /// * `Ok(false)` - A record with the same key already existed; nothing changed
    fn insert_if_absent(&mut self, record: &ListingRecord) -> StorageResult<bool>;

    /// Sets the reviewed flag of a stored listing
    fn set_reviewed(&mut self, identity_key: &str, reviewed: bool) -> StorageResult<()>;

    /// Gets a stored listing by key
    fn get(&self, identity_key: &str) -> StorageResult<Option<StoredListing>>;

    /// Loads every stored listing, newest first
    fn load_all(&self) -> StorageResult<Vec<StoredListing>>;

    /// Counts listings overall, by review flag, inserted today and per source
    fn statistics(&self) -> StorageResult<StoreStatistics>;

    // ===== Run Management =====

    /// Records the start of a crawl run and returns its ID
    fn create_run(&mut self, config_hash: &str) -> StorageResult<i64>;

    /// Records the final status and counts of a run
    fn finish_run(&mut self, run_id: i64, status: RunStatus, summary: &RunSummary)
        -> StorageResult<()>;

    /// Gets the most recent run
    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>>;
}
