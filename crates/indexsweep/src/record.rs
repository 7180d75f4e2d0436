// Copyright 2026 Dropbox (created by Andrew Yates <ayates@dropbox.com>)

//! Record lookups for the refresh path
//!
//! Page-like records are swept with [`SweepMode::Refresh`](crate::SweepMode):
//! after their documents are removed, the record is re-queued for indexing if
//! it still exists and is still visible. The [`RecordStore`] answers both
//! questions against the system of record.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};

/// Minimal view of a system-of-record row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredRecord {
    /// Table the row lives in
    pub table: String,
    /// Row uid
    pub uid: i64,
    /// Uid of the parent page, `0` at the tree root
    pub parent_id: i64,
}

impl StoredRecord {
    /// Create a record view.
    pub fn new(table: impl Into<String>, uid: i64, parent_id: i64) -> Self {
        Self {
            table: table.into(),
            uid,
            parent_id,
        }
    }
}

/// Read access to the system of record backing the index.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Fetch the current row, or `None` when it no longer exists.
    async fn get_record(
        &self,
        table: &str,
        uid: i64,
    ) -> Result<Option<StoredRecord>, Box<dyn std::error::Error + Send + Sync>>;

    /// Whether an ancestor of `record` excludes its subtree from indexing.
    ///
    /// The default says no ancestor does, which is correct for flat stores
    /// without page-tree semantics.
    async fn excluded_by_rootline(
        &self,
        record: &StoredRecord,
    ) -> Result<bool, Box<dyn std::error::Error + Send + Sync>> {
        let _ = record;
        Ok(false)
    }
}

const PAGE_TABLE: &str = "pages";

// Ancestor walks stop here; guards against parent cycles in fixtures.
const MAX_ROOTLINE_DEPTH: usize = 64;

/// In-memory record store with a page-tree root line walk.
///
/// Rows are keyed by `(table, uid)`. The root line of a record is the chain
/// of `pages` rows reached by following `parent_id` upwards; marking a page
/// with [`exclude_subtree`](InMemoryRecordStore::exclude_subtree) makes every
/// record below it fail the visibility check.
#[derive(Debug, Clone, Default)]
pub struct InMemoryRecordStore {
    records: Arc<RwLock<HashMap<(String, i64), StoredRecord>>>,
    excluded_roots: Arc<RwLock<HashSet<i64>>>,
}

impl InMemoryRecordStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a row.
    pub fn insert(&self, record: StoredRecord) {
        let mut records = self.records.write().unwrap_or_else(|e| e.into_inner());
        records.insert((record.table.clone(), record.uid), record);
    }

    /// Remove a row, simulating a hard delete in the system of record.
    pub fn remove(&self, table: &str, uid: i64) {
        let mut records = self.records.write().unwrap_or_else(|e| e.into_inner());
        records.remove(&(table.to_string(), uid));
    }

    /// Mark `page_uid` so every record below it fails the root line check.
    pub fn exclude_subtree(&self, page_uid: i64) {
        let mut excluded = self
            .excluded_roots
            .write()
            .unwrap_or_else(|e| e.into_inner());
        excluded.insert(page_uid);
    }

    /// Number of stored rows.
    #[must_use]
    pub fn len(&self) -> usize {
        let records = self.records.read().unwrap_or_else(|e| e.into_inner());
        records.len()
    }

    /// Check if the store has no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn get_record(
        &self,
        table: &str,
        uid: i64,
    ) -> Result<Option<StoredRecord>, Box<dyn std::error::Error + Send + Sync>> {
        let records = self.records.read().unwrap_or_else(|e| e.into_inner());
        Ok(records.get(&(table.to_string(), uid)).cloned())
    }

    async fn excluded_by_rootline(
        &self,
        record: &StoredRecord,
    ) -> Result<bool, Box<dyn std::error::Error + Send + Sync>> {
        let records = self.records.read().unwrap_or_else(|e| e.into_inner());
        let excluded = self
            .excluded_roots
            .read()
            .unwrap_or_else(|e| e.into_inner());

        let mut parent = record.parent_id;
        for _ in 0..MAX_ROOTLINE_DEPTH {
            if parent == 0 {
                break;
            }
            if excluded.contains(&parent) {
                return Ok(true);
            }
            match records.get(&(PAGE_TABLE.to_string(), parent)) {
                Some(page) => parent = page.parent_id,
                // Dangling parent: treat the reachable part as the root line.
                None => break,
            }
        }
        Ok(false)
    }
}
