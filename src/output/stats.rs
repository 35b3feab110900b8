//! Statistics generation from the listing database
//!
//! This module provides functionality for extracting and displaying
//! listing statistics from the storage layer.

use crate::storage::{ListingStore, RunRecord, StoreStatistics};
use crate::HarvestError;

/// Store totals plus the most recent run
#[derive(Debug, Clone)]
pub struct HarvestStatistics {
    pub store: StoreStatistics,
    pub latest_run: Option<RunRecord>,
}

/// Loads statistics from storage
///
/// # Arguments
///
/// * `storage` - The storage backend to query
///
/// # Returns
///
/// * `Ok(HarvestStatistics)` - Successfully loaded statistics
/// * `Err(HarvestError)` - Failed to query statistics
pub fn load_statistics(storage: &dyn ListingStore) -> Result<HarvestStatistics, HarvestError> {
    Ok(HarvestStatistics {
        store: storage.statistics()?,
        latest_run: storage.get_latest_run()?,
    })
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(stats: &HarvestStatistics) {
    let store = &stats.store;

    println!("=== Listing Statistics ===\n");

    println!("Overview:");
    println!("  Total listings: {}", store.total);
    println!("  Reviewed: {}", store.reviewed);
    println!("  Unreviewed: {}", store.unreviewed);
    println!("  Added today: {}", store.today);
    println!();

    if !store.by_source.is_empty() {
        println!("Listings by Source:");
        let mut sources: Vec<_> = store.by_source.iter().collect();
        sources.sort_by(|a, b| b.1.cmp(a.1));

        for (source, count) in sources {
            let percentage = if store.total > 0 {
                (*count as f64 / store.total as f64) * 100.0
            } else {
                0.0
            };
            println!("  {}: {} ({:.1}%)", source, count, percentage);
        }
        println!();
    }

    match &stats.latest_run {
        Some(run) => {
            println!("Latest Run (#{}):", run.id);
            println!("  Started: {}", run.started_at);
            println!(
                "  Finished: {}",
                run.finished_at.as_deref().unwrap_or("(not finished)")
            );
            println!("  Status: {}", run.status.to_db_string());
            println!(
                "  New: {}  Duplicates: {}  Errors: {}  Skipped: {}",
                run.new_count, run.duplicate_count, run.error_count, run.skipped_count
            );
        }
        None => println!("No crawl runs recorded yet."),
    }
}
