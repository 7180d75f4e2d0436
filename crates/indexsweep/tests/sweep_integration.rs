//! End-to-end sweep tests over the public API
//!
//! These tests wire real in-memory backends together and walk whole
//! lifecycles: record deleted in the system of record, documents swept from
//! every affected core, queue cleaned, follow-up hooks notified. Individual
//! module behavior is covered next to the modules; this file checks that the
//! parts agree with each other.

#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::clone_on_ref_ptr
)]

use async_trait::async_trait;
use futures::future::join_all;
use indexsweep::{
    CommitFailurePolicy, DeleteByQueryResponse, GarbagePostProcessor, GarbageSweeper,
    InMemoryConnectionRegistry, InMemoryIndexQueue, InMemoryRecordStore, InMemorySiteRegistry,
    PostProcessorChain, QueueItem, SearchConnection, Site, StoredRecord, SweepMode,
};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Scripted in-memory core used across the journeys.
struct TestCore {
    core_path: String,
    reachable: bool,
    deletes: Arc<RwLock<Vec<String>>>,
    commits: Arc<RwLock<Vec<(bool, bool)>>>,
}

impl TestCore {
    fn new(core_path: &str) -> Arc<Self> {
        Arc::new(Self {
            core_path: core_path.to_string(),
            reachable: true,
            deletes: Arc::new(RwLock::new(Vec::new())),
            commits: Arc::new(RwLock::new(Vec::new())),
        })
    }

    fn offline(core_path: &str) -> Arc<Self> {
        Arc::new(Self {
            core_path: core_path.to_string(),
            reachable: false,
            deletes: Arc::new(RwLock::new(Vec::new())),
            commits: Arc::new(RwLock::new(Vec::new())),
        })
    }

    async fn deletes(&self) -> Vec<String> {
        self.deletes.read().await.clone()
    }

    async fn commit_count(&self) -> usize {
        self.commits.read().await.len()
    }
}

#[async_trait]
impl SearchConnection for TestCore {
    fn core_path(&self) -> &str {
        &self.core_path
    }

    async fn delete_by_query(
        &self,
        query: &str,
    ) -> Result<DeleteByQueryResponse, Box<dyn std::error::Error + Send + Sync>> {
        if !self.reachable {
            return Err("no route to core".into());
        }
        self.deletes.write().await.push(query.to_string());
        Ok(DeleteByQueryResponse::ok())
    }

    async fn commit(
        &self,
        wait_flush: bool,
        wait_searcher: bool,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.commits.write().await.push((wait_flush, wait_searcher));
        Ok(())
    }
}

/// Post-processor collecting the records it saw.
struct SweepLog {
    seen: Arc<RwLock<Vec<(String, i64)>>>,
}

#[async_trait]
impl GarbagePostProcessor for SweepLog {
    async fn post_process(
        &self,
        table: &str,
        uid: i64,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.seen.write().await.push((table.to_string(), uid));
        Ok(())
    }
}

// ==================== Full Lifecycle Tests ====================

#[tokio::test]
async fn test_purge_journey_across_sites_and_languages() {
    let _ = tracing_subscriber::fmt::try_init();

    // Site A has English and German cores and wants commits; site B has a
    // single core and batches its commits elsewhere.
    let queue = Arc::new(InMemoryIndexQueue::new());
    queue.add_item(QueueItem::new("news", 1, 42).with_site_hash("hash_a"));
    queue.add_item(QueueItem::new("news", 2, 42).with_site_hash("hash_b"));
    queue.add_item(QueueItem::new("news", 3, 77).with_site_hash("hash_a"));

    let sites = Arc::new(InMemorySiteRegistry::new(vec![
        Site::new("site-a", "hash_a").with_commits(true),
        Site::new("site-b", "hash_b"),
    ]));

    let a_en = TestCore::new("/solr/a_en");
    let a_de = TestCore::new("/solr/a_de");
    let b_en = TestCore::new("/solr/b_en");
    let connections = Arc::new(InMemoryConnectionRegistry::new());
    connections.register("hash_a", 0, a_en.clone());
    connections.register("hash_a", 1, a_de.clone());
    connections.register("hash_b", 0, b_en.clone());

    let seen = Arc::new(RwLock::new(Vec::new()));
    let mut chain = PostProcessorChain::new();
    chain.register("log", Arc::new(SweepLog { seen: seen.clone() }));

    let sweeper = GarbageSweeper::builder()
        .queue(queue.clone())
        .sites(sites)
        .connections(connections)
        .post_processors(chain)
        .mode(SweepMode::Purge)
        .build()
        .unwrap();

    let report = sweeper.remove_garbage_of("news", 42).await.unwrap();

    // One scoped delete per core of each affected site.
    assert_eq!(report.attempted, 3);
    assert_eq!(report.deleted, 3);
    assert!(report.is_clean());
    assert_eq!(
        a_en.deletes().await,
        vec!["type:news AND uid:42 AND siteHash:hash_a"]
    );
    assert_eq!(
        a_de.deletes().await,
        vec!["type:news AND uid:42 AND siteHash:hash_a"]
    );
    assert_eq!(
        b_en.deletes().await,
        vec!["type:news AND uid:42 AND siteHash:hash_b"]
    );

    // Commits only where the site asked for them.
    assert_eq!(report.commits, 2);
    assert_eq!(a_en.commit_count().await, 1);
    assert_eq!(a_de.commit_count().await, 1);
    assert_eq!(b_en.commit_count().await, 0);

    // Swept record dequeued everywhere; unrelated record untouched.
    assert_eq!(queue.len(), 1);
    assert_eq!(queue.items()[0].record_uid, 77);

    // The hook saw exactly this sweep.
    assert_eq!(seen.read().await.clone(), vec![("news".to_string(), 42)]);
}

#[tokio::test]
async fn test_refresh_journey_keeps_living_pages_indexed() {
    let queue = Arc::new(InMemoryIndexQueue::new());
    queue.add_item(QueueItem::new("pages", 1, 42).with_site_hash("hash_a"));

    let sites = Arc::new(InMemorySiteRegistry::new(vec![Site::new(
        "site-a", "hash_a",
    )]));
    let core = TestCore::new("/solr/a_en");
    let connections = Arc::new(InMemoryConnectionRegistry::new());
    connections.register("hash_a", 0, core.clone());

    // Page 42 sits under root page 1 and is still visible.
    let records = Arc::new(InMemoryRecordStore::new());
    records.insert(StoredRecord::new("pages", 1, 0));
    records.insert(StoredRecord::new("pages", 42, 1));

    let sweeper = GarbageSweeper::builder()
        .queue(queue.clone())
        .sites(sites)
        .connections(connections)
        .records(records.clone())
        .mode(SweepMode::for_table("pages"))
        .build()
        .unwrap();

    let report = sweeper.remove_garbage_of("pages", 42).await.unwrap();

    // Stale documents removed, then the page queued for re-indexing.
    assert_eq!(core.deletes().await.len(), 1);
    assert!(report.requeued);
    assert_eq!(queue.changed_items().len(), 1);
    assert_eq!(queue.len(), 1);

    // Now the page gets hidden below an excluded root; the next sweep only
    // deletes.
    records.exclude_subtree(1);
    let report = sweeper.remove_garbage_of("pages", 42).await.unwrap();
    assert!(!report.requeued);
    assert_eq!(core.deletes().await.len(), 2);
}

#[tokio::test]
async fn test_orphans_pruned_and_resweep_falls_back_to_all_sites() {
    let queue = Arc::new(InMemoryIndexQueue::new());
    queue.add_item(QueueItem::new("news", 1, 42).with_site_hash("hash_live"));
    queue.add_item(QueueItem::new("news", 2, 42).with_site_hash("hash_dead"));

    let sites = Arc::new(InMemorySiteRegistry::new(vec![Site::new(
        "live", "hash_live",
    )]));
    let core = TestCore::new("/solr/live_en");
    let connections = Arc::new(InMemoryConnectionRegistry::new());
    connections.register("hash_live", 0, core.clone());

    let sweeper = GarbageSweeper::builder()
        .queue(queue.clone())
        .sites(sites)
        .connections(connections)
        .build()
        .unwrap();

    let first = sweeper.remove_garbage_of("news", 42).await.unwrap();
    assert_eq!(first.pruned_orphans, 1);
    assert_eq!(first.attempted, 1);
    assert!(queue.is_empty());

    // Sweeping again finds no queue entries and conservatively fans out over
    // every known site. Deleting already-deleted documents is a no-op on the
    // core side.
    let second = sweeper.remove_garbage_of("news", 42).await.unwrap();
    assert_eq!(second.pruned_orphans, 0);
    assert_eq!(second.attempted, 1);
    assert!(second.is_clean());
    assert_eq!(core.deletes().await.len(), 2);
}

// ==================== Partial Failure Tests ====================

#[tokio::test]
async fn test_offline_core_does_not_block_the_rest() {
    let _ = tracing_subscriber::fmt::try_init();

    let queue = Arc::new(InMemoryIndexQueue::new());
    queue.add_item(QueueItem::new("news", 1, 42).with_site_hash("hash_a"));
    queue.add_item(QueueItem::new("news", 2, 42).with_site_hash("hash_b"));

    let sites = Arc::new(InMemorySiteRegistry::new(vec![
        Site::new("site-a", "hash_a"),
        Site::new("site-b", "hash_b"),
    ]));
    let down = TestCore::offline("/solr/a_en");
    let up = TestCore::new("/solr/b_en");
    let connections = Arc::new(InMemoryConnectionRegistry::new());
    connections.register("hash_a", 0, down.clone());
    connections.register("hash_b", 0, up.clone());

    let seen = Arc::new(RwLock::new(Vec::new()));
    let mut chain = PostProcessorChain::new();
    chain.register("log", Arc::new(SweepLog { seen: seen.clone() }));

    let sweeper = GarbageSweeper::builder()
        .queue(queue.clone())
        .sites(sites)
        .connections(connections)
        .post_processors(chain)
        .commit_failure_policy(CommitFailurePolicy::Report)
        .build()
        .unwrap();

    let report = sweeper.remove_garbage_of("news", 42).await.unwrap();

    // The sweep finished despite the unreachable core.
    assert_eq!(report.attempted, 2);
    assert_eq!(report.deleted, 1);
    assert_eq!(report.delete_failures.len(), 1);
    assert_eq!(report.delete_failures[0].core_path, "/solr/a_en");
    assert_eq!(report.delete_failures[0].http_status, None);
    assert!(report.has_failures());

    // Queue cleanup and hooks still ran; the failed core is left to the
    // reconciliation run.
    assert!(queue.is_empty());
    assert_eq!(seen.read().await.len(), 1);
    assert_eq!(up.deletes().await.len(), 1);
}

// ==================== Concurrency Tests ====================

#[tokio::test]
async fn test_concurrent_sweeps_share_one_sweeper() {
    let queue = Arc::new(InMemoryIndexQueue::new());
    for uid in 1..=8 {
        queue.add_item(QueueItem::new("news", uid, uid).with_site_hash("hash_a"));
    }

    let sites = Arc::new(InMemorySiteRegistry::new(vec![Site::new(
        "site-a", "hash_a",
    )]));
    let core = TestCore::new("/solr/a_en");
    let connections = Arc::new(InMemoryConnectionRegistry::new());
    connections.register("hash_a", 0, core.clone());

    let sweeper = Arc::new(
        GarbageSweeper::builder()
            .queue(queue.clone())
            .sites(sites)
            .connections(connections)
            .build()
            .unwrap(),
    );

    let handles: Vec<_> = (1..=8)
        .map(|uid| {
            let sweeper = sweeper.clone();
            tokio::spawn(async move { sweeper.remove_garbage_of("news", uid).await })
        })
        .collect();

    for result in join_all(handles).await {
        let report = result.unwrap().unwrap();
        assert!(report.is_clean());
    }

    // Every record was swept exactly once and dequeued.
    assert!(queue.is_empty());
    let mut deletes = core.deletes().await;
    deletes.sort();
    let mut expected: Vec<String> = (1..=8)
        .map(|uid| format!("type:news AND uid:{uid} AND siteHash:hash_a"))
        .collect();
    expected.sort();
    assert_eq!(deletes, expected);
}
