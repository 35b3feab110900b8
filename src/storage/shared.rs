//! Listing store shared between source workers
//!
//! One mutex guards both the persistent store and the in-run set of keys
//! already seen, so the check and the insert happen as one step. The lock is
//! only ever taken from synchronous code and never held across an await.

use crate::normalize::ListingRecord;
use crate::storage::traits::{ListingStore, StorageError, StorageResult};
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

/// Result of offering a record to the store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// First time this key was seen; the record is now stored
    Inserted,

    /// The key was already stored or already seen in this run
    Duplicate,
}

struct Inner {
    store: Box<dyn ListingStore>,
    seen: HashSet<String>,
}

/// Cloneable handle to a locked [`ListingStore`]
#[derive(Clone)]
pub struct SharedStore {
    inner: Arc<Mutex<Inner>>,
}

impl SharedStore {
    pub fn new(store: Box<dyn ListingStore>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                store,
                seen: HashSet::new(),
            })),
        }
    }

    fn lock(&self) -> StorageResult<MutexGuard<'_, Inner>> {
        self.inner.lock().map_err(|_| StorageError::Poisoned)
    }

    /// Stores the record if its key has not been seen in this run or before
    pub fn offer(&self, record: &ListingRecord) -> StorageResult<Admission> {
        let mut inner = self.lock()?;

        if inner.seen.contains(&record.identity_key) {
            return Ok(Admission::Duplicate);
        }

        let inserted = inner.store.insert_if_absent(record)?;
        inner.seen.insert(record.identity_key.clone());

        Ok(if inserted {
            Admission::Inserted
        } else {
            Admission::Duplicate
        })
    }

    /// Runs `f` with exclusive access to the underlying store
    pub fn with_store<T>(
        &self,
        f: impl FnOnce(&mut dyn ListingStore) -> StorageResult<T>,
    ) -> StorageResult<T> {
        let mut inner = self.lock()?;
        f(inner.store.as_mut())
    }

    /// Forgets the keys seen so far, at the start of a new run
    pub fn clear_seen(&self) -> StorageResult<()> {
        self.lock()?.seen.clear();
        Ok(())
    }

    /// Number of distinct keys seen during this run
    pub fn seen_count(&self) -> StorageResult<usize> {
        Ok(self.lock()?.seen.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::SqliteStorage;

    fn shared() -> SharedStore {
        SharedStore::new(Box::new(SqliteStorage::new_in_memory().unwrap()))
    }

    #[test]
    fn test_offer_inserts_once() {
        let store = shared();
        let record = ListingRecord::new("1", "Miel", "board");

        assert_eq!(store.offer(&record).unwrap(), Admission::Inserted);
        assert_eq!(store.offer(&record).unwrap(), Admission::Duplicate);
        assert_eq!(store.seen_count().unwrap(), 1);
        assert_eq!(
            store.with_store(|s| s.load_all()).unwrap().len(),
            1
        );
    }

    #[test]
    fn test_prepopulated_key_is_duplicate() {
        let store = shared();
        let record = ListingRecord::new("9", "Dattes", "board");
        store
            .with_store(|s| s.insert_if_absent(&record))
            .unwrap();

        assert_eq!(store.offer(&record).unwrap(), Admission::Duplicate);
    }

    #[test]
    fn test_cleared_key_is_checked_against_store() {
        let store = shared();
        let record = ListingRecord::new("3", "Huile", "board");
        store.offer(&record).unwrap();

        store.clear_seen().unwrap();
        assert_eq!(store.seen_count().unwrap(), 0);
        assert_eq!(store.offer(&record).unwrap(), Admission::Duplicate);
        assert_eq!(store.seen_count().unwrap(), 1);
    }

    #[test]
    fn test_concurrent_offers_admit_one() {
        let store = shared();
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = store.clone();
                std::thread::spawn(move || {
                    let record = ListingRecord::new("same", format!("copy {}", i), "board");
                    store.offer(&record).unwrap()
                })
            })
            .collect();

        let inserted = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|a| *a == Admission::Inserted)
            .count();
        assert_eq!(inserted, 1);
    }
}
