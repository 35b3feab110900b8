//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the ListingStore trait.

use crate::normalize::{Contacts, ExportReadiness, ListingRecord};
use crate::output::RunSummary;
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{ListingStore, StorageError, StorageResult};
use crate::storage::{RunRecord, RunStatus, StoreStatistics, StoredListing};
use crate::HarvestError;
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::BTreeMap;
use std::path::Path;

const LISTING_COLUMNS: &str = "id, identity_key, title, description, company_type, category_tags,
    location, contacts, source_url, source_name, discovered_at, announcement_type,
    announcement_date, export_ready, reviewed, created_at";

const RUN_COLUMNS: &str = "id, started_at, finished_at, config_hash, status, new_count,
    duplicate_count, error_count, skipped_count";

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Creates a new SqliteStorage instance
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStorage)` - Successfully opened/created database
    /// * `Err(HarvestError)` - Failed to open database
    pub fn new(path: &Path) -> Result<Self, HarvestError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database
    pub fn new_in_memory() -> Result<Self, HarvestError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }
}

fn json_column<T: serde::de::DeserializeOwned>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    serde_json::from_str(&raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn listing_from_row(row: &Row<'_>) -> rusqlite::Result<StoredListing> {
    let discovered_raw: String = row.get(10)?;
    let discovered_at = DateTime::parse_from_rfc3339(&discovered_raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(10, Type::Text, Box::new(e)))?;

    let category_tags: Vec<String> = json_column(row, 5)?;
    let contacts: Contacts = json_column(row, 7)?;

    Ok(StoredListing {
        id: row.get(0)?,
        record: ListingRecord {
            identity_key: row.get(1)?,
            title: row.get(2)?,
            description: row.get(3)?,
            company_type: row.get(4)?,
            category_tags,
            location: row.get(6)?,
            contacts,
            source_url: row.get(8)?,
            source_name: row.get(9)?,
            discovered_at,
            announcement_type: row.get(11)?,
            announcement_date: row.get(12)?,
            export_ready: ExportReadiness::from_db_str(&row.get::<_, String>(13)?)
                .unwrap_or_default(),
        },
        reviewed: row.get::<_, i64>(14)? != 0,
        created_at: row.get(15)?,
    })
}

fn run_from_row(row: &Row<'_>) -> rusqlite::Result<RunRecord> {
    Ok(RunRecord {
        id: row.get(0)?,
        started_at: row.get(1)?,
        finished_at: row.get(2)?,
        config_hash: row.get(3)?,
        status: RunStatus::from_db_string(&row.get::<_, String>(4)?)
            .unwrap_or(RunStatus::Failed),
        new_count: row.get::<_, i64>(5)? as u64,
        duplicate_count: row.get::<_, i64>(6)? as u64,
        error_count: row.get::<_, i64>(7)? as u64,
        skipped_count: row.get::<_, i64>(8)? as u64,
    })
}

impl ListingStore for SqliteStorage {
    // ===== Listings =====

    fn exists(&self, identity_key: &str) -> StorageResult<bool> {
        let found: Option<i64> = self
            .conn
            .query_row(
                "SELECT 1 FROM listings WHERE identity_key = ?1",
                params![identity_key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    fn insert_if_absent(&mut self, record: &ListingRecord) -> StorageResult<bool> {
        let tags = serde_json::to_string(&record.category_tags)?;
        let contacts = serde_json::to_string(&record.contacts)?;

        // Conflicts on the unique key leave the stored row untouched
        let changed = self.conn.execute(
            "INSERT INTO listings (identity_key, title, description, company_type, category_tags,
                location, contacts, source_url, source_name, discovered_at, announcement_type,
                announcement_date, export_ready)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
             ON CONFLICT(identity_key) DO NOTHING",
            params![
                record.identity_key,
                record.title,
                record.description,
                record.company_type,
                tags,
                record.location,
                contacts,
                record.source_url,
                record.source_name,
                record.discovered_at.to_rfc3339(),
                record.announcement_type,
                record.announcement_date,
                record.export_ready.as_str(),
            ],
        )?;

        Ok(changed == 1)
    }

    fn set_reviewed(&mut self, identity_key: &str, reviewed: bool) -> StorageResult<()> {
        let changed = self.conn.execute(
            "UPDATE listings SET reviewed = ?1 WHERE identity_key = ?2",
            params![reviewed as i64, identity_key],
        )?;

        if changed == 0 {
            return Err(StorageError::ListingNotFound(identity_key.to_string()));
        }
        Ok(())
    }

    fn get(&self, identity_key: &str) -> StorageResult<Option<StoredListing>> {
        let sql = format!(
            "SELECT {} FROM listings WHERE identity_key = ?1",
            LISTING_COLUMNS
        );
        let listing = self
            .conn
            .query_row(&sql, params![identity_key], listing_from_row)
            .optional()?;
        Ok(listing)
    }

    fn load_all(&self) -> StorageResult<Vec<StoredListing>> {
        let sql = format!(
            "SELECT {} FROM listings ORDER BY created_at DESC, id DESC",
            LISTING_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let listings = stmt
            .query_map([], listing_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(listings)
    }

    fn statistics(&self) -> StorageResult<StoreStatistics> {
        let (total, reviewed, today): (i64, i64, i64) = self.conn.query_row(
            "SELECT COUNT(*),
                    COALESCE(SUM(reviewed), 0),
                    COALESCE(SUM(CASE WHEN date(created_at) = date('now') THEN 1 ELSE 0 END), 0)
             FROM listings",
            [],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )?;

        let mut stmt = self.conn.prepare(
            "SELECT source_name, COUNT(*) FROM listings GROUP BY source_name ORDER BY source_name",
        )?;
        let by_source: BTreeMap<String, u64> = stmt
            .query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as u64))
            })?
            .collect::<Result<_, _>>()?;

        Ok(StoreStatistics {
            total: total as u64,
            reviewed: reviewed as u64,
            unreviewed: (total - reviewed) as u64,
            today: today as u64,
            by_source,
        })
    }

    // ===== Run Management =====

    fn create_run(&mut self, config_hash: &str) -> StorageResult<i64> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO runs (started_at, config_hash, status) VALUES (?1, ?2, ?3)",
            params![now, config_hash, RunStatus::Running.to_db_string()],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn finish_run(
        &mut self,
        run_id: i64,
        status: RunStatus,
        summary: &RunSummary,
    ) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        let changed = self.conn.execute(
            "UPDATE runs SET status = ?1, finished_at = ?2, new_count = ?3, duplicate_count = ?4,
                error_count = ?5, skipped_count = ?6
             WHERE id = ?7",
            params![
                status.to_db_string(),
                now,
                summary.new_count as i64,
                summary.duplicate_count as i64,
                summary.error_count as i64,
                summary.skipped_count as i64,
                run_id
            ],
        )?;

        if changed == 0 {
            return Err(StorageError::RunNotFound(run_id));
        }
        Ok(())
    }

    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>> {
        let sql = format!("SELECT {} FROM runs ORDER BY id DESC LIMIT 1", RUN_COLUMNS);
        let run = self.conn.query_row(&sql, [], run_from_row).optional()?;
        Ok(run)
    }
}
