// Copyright 2026 Dropbox (created by Andrew Yates <ayates@dropbox.com>)

//! The index queue and its in-memory implementation
//!
//! The queue holds one entry per record per site that should be present in
//! the index. During a sweep it serves two purposes: it tells the sweeper
//! which sites a record was indexed under, and it is itself cleaned up so the
//! next indexing run does not resurrect deleted documents.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, RwLock};

/// One queue entry: a record that should be present in the index of one site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueItem {
    /// Table or entity kind of the queued record
    pub item_type: String,
    /// Queue entry id, unique across the whole queue
    pub queue_uid: i64,
    /// Uid of the queued record
    pub record_uid: i64,
    /// Hash of the owning site; `None` marks an entry whose site is gone
    pub site_hash: Option<String>,
}

impl QueueItem {
    /// Create an entry without a site hash.
    pub fn new(item_type: impl Into<String>, queue_uid: i64, record_uid: i64) -> Self {
        Self {
            item_type: item_type.into(),
            queue_uid,
            record_uid,
            site_hash: None,
        }
    }

    /// Attach the owning site's hash.
    #[must_use]
    pub fn with_site_hash(mut self, site_hash: impl Into<String>) -> Self {
        self.site_hash = Some(site_hash.into());
        self
    }
}

/// Store of records waiting to be indexed, queried and cleaned during sweeps.
#[async_trait]
pub trait IndexQueue: Send + Sync {
    /// Entries for one record, across all sites.
    async fn get_items(
        &self,
        item_type: &str,
        record_uid: i64,
    ) -> Result<Vec<QueueItem>, Box<dyn std::error::Error + Send + Sync>>;

    /// Drop every entry of one record.
    async fn delete_item(
        &self,
        item_type: &str,
        record_uid: i64,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;

    /// Mark one record's entries as changed so the next indexing run picks
    /// them up again.
    ///
    /// A record without entries is left alone; marking is not an upsert.
    async fn update_item(
        &self,
        item_type: &str,
        record_uid: i64,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;

    /// Drop a single entry by its queue uid.
    async fn remove_entry(
        &self,
        queue_uid: i64,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}

#[derive(Debug, Clone)]
struct Entry {
    item: QueueItem,
    changed_at: Option<DateTime<Utc>>,
}

/// In-memory index queue for testing and single-process setups.
///
/// Clones share the underlying entries.
#[derive(Debug, Clone, Default)]
pub struct InMemoryIndexQueue {
    entries: Arc<RwLock<Vec<Entry>>>,
}

impl InMemoryIndexQueue {
    /// Create an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an entry. This is the indexing side of the queue; sweeps only
    /// consume.
    pub fn add_item(&self, item: QueueItem) {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        entries.push(Entry {
            item,
            changed_at: None,
        });
    }

    /// Number of entries currently queued.
    #[must_use]
    pub fn len(&self) -> usize {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        entries.len()
    }

    /// Check if the queue is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of all entries, in insertion order.
    #[must_use]
    pub fn items(&self) -> Vec<QueueItem> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        entries.iter().map(|entry| entry.item.clone()).collect()
    }

    /// Entries marked changed since insertion, i.e. waiting for re-indexing.
    #[must_use]
    pub fn changed_items(&self) -> Vec<QueueItem> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        entries
            .iter()
            .filter(|entry| entry.changed_at.is_some())
            .map(|entry| entry.item.clone())
            .collect()
    }
}

#[async_trait]
impl IndexQueue for InMemoryIndexQueue {
    async fn get_items(
        &self,
        item_type: &str,
        record_uid: i64,
    ) -> Result<Vec<QueueItem>, Box<dyn std::error::Error + Send + Sync>> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        Ok(entries
            .iter()
            .filter(|entry| entry.item.item_type == item_type && entry.item.record_uid == record_uid)
            .map(|entry| entry.item.clone())
            .collect())
    }

    async fn delete_item(
        &self,
        item_type: &str,
        record_uid: i64,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        entries
            .retain(|entry| entry.item.item_type != item_type || entry.item.record_uid != record_uid);
        Ok(())
    }

    async fn update_item(
        &self,
        item_type: &str,
        record_uid: i64,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        let now = Utc::now();
        for entry in entries
            .iter_mut()
            .filter(|entry| entry.item.item_type == item_type && entry.item.record_uid == record_uid)
        {
            entry.changed_at = Some(now);
        }
        Ok(())
    }

    async fn remove_entry(
        &self,
        queue_uid: i64,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        entries.retain(|entry| entry.item.queue_uid != queue_uid);
        Ok(())
    }
}
