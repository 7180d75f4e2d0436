// Copyright 2026 Dropbox (created by Andrew Yates <ayates@dropbox.com>)

//! The garbage sweeper: deletion fan-out, queue cleanup, re-queueing
//!
//! [`GarbageSweeper::remove_garbage_of`] is the one entry point callers need:
//! given a record key it removes the record's documents from every core of
//! every affected site, cleans the index queue up behind itself and runs the
//! registered post-processors. Which sites are affected is read from the
//! queue; a record the queue does not know is conservatively swept from every
//! site.
//!
//! Backend failures during the fan-out do not stop it. A core that refuses or
//! never receives a delete is recorded in the [`SweepReport`] and left for a
//! later reconciliation run; the remaining cores are still swept.

use crate::connection::{ConnectionMap, ConnectionRegistry, SearchConnection};
use crate::error::{Result, SweepError};
use crate::post_process::PostProcessorChain;
use crate::query::DeletionQuery;
use crate::queue::IndexQueue;
use crate::record::RecordStore;
use crate::site::{Site, SiteRegistry};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// How a sweep treats the index queue after deleting documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SweepMode {
    /// Purge - drop the record's queue entries; it is gone for good
    #[default]
    Purge,
    /// Refresh - re-queue the record for indexing if it still exists and is
    /// still visible
    Refresh,
}

impl SweepMode {
    /// The conventional mode for a table: page-tree tables are refreshed,
    /// everything else is purged.
    #[must_use]
    pub fn for_table(table: &str) -> Self {
        match table {
            "pages" => SweepMode::Refresh,
            _ => SweepMode::Purge,
        }
    }
}

/// What to do when a core rejects the commit after a successful delete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommitFailurePolicy {
    /// Drop the failure silently
    Ignore,
    /// Log the failure and record it in the report, then keep sweeping
    #[default]
    Report,
    /// Stop the sweep with [`SweepError::Commit`]
    Abort,
}

/// One `delete_by_query` that did not go through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteFailure {
    /// Core the delete was sent to
    pub core_path: String,
    /// The deletion query that failed
    pub query: String,
    /// Status the core answered with; `None` when the request never arrived
    pub http_status: Option<u16>,
    /// Status message or transport error detail
    pub message: String,
}

/// One commit that was rejected after a successful delete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitFailure {
    /// Core the commit was sent to
    pub core_path: String,
    /// Error detail
    pub message: String,
}

/// Outcome of one sweep operation.
///
/// The report never hides partial failure: a sweep that returns `Ok` may
/// still carry failed deletes or commits, and [`is_clean`](Self::is_clean)
/// is the cheap way to tell.
#[derive(Debug, Clone, Default)]
pub struct SweepReport {
    /// Number of `delete_by_query` calls issued
    pub attempted: usize,
    /// Number of cores that accepted their delete
    pub deleted: usize,
    /// Deletes that were rejected or never arrived
    pub delete_failures: Vec<DeleteFailure>,
    /// Number of commits issued
    pub commits: usize,
    /// Commits that were rejected (empty under [`CommitFailurePolicy::Ignore`])
    pub commit_failures: Vec<CommitFailure>,
    /// Queue entries dropped because their site no longer exists
    pub pruned_orphans: usize,
    /// Whether the record was re-queued for indexing (refresh mode only)
    pub requeued: bool,
    /// Post-processors that failed and were skipped
    pub post_processor_failures: usize,
}

impl SweepReport {
    /// Check if every backend call of the sweep went through.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.delete_failures.is_empty()
            && self.commit_failures.is_empty()
            && self.post_processor_failures == 0
    }

    /// Check if anything went wrong along the way.
    #[must_use]
    pub fn has_failures(&self) -> bool {
        !self.is_clean()
    }
}

/// Removes deleted records' documents from the search index.
///
/// Built once via [`builder`](GarbageSweeper::builder) and shared; sweeps
/// borrow the sweeper immutably, so concurrent sweeps of different records
/// are fine.
///
/// # Example
///
/// ```rust,no_run
/// # use indexsweep::{GarbageSweeper, InMemoryConnectionRegistry, InMemoryIndexQueue,
/// #     InMemorySiteRegistry, SweepMode};
/// # use std::sync::Arc;
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let sweeper = GarbageSweeper::builder()
///     .queue(Arc::new(InMemoryIndexQueue::new()))
///     .sites(Arc::new(InMemorySiteRegistry::default()))
///     .connections(Arc::new(InMemoryConnectionRegistry::new()))
///     .mode(SweepMode::Purge)
///     .build()?;
///
/// let report = sweeper.remove_garbage_of("news", 42).await?;
/// println!("swept {} cores", report.deleted);
/// # Ok(())
/// # }
/// ```
pub struct GarbageSweeper {
    queue: Arc<dyn IndexQueue>,
    sites: Arc<dyn SiteRegistry>,
    connections: Arc<dyn ConnectionRegistry>,
    records: Option<Arc<dyn RecordStore>>,
    post_processors: PostProcessorChain,
    mode: SweepMode,
    commit_failure_policy: CommitFailurePolicy,
}

impl std::fmt::Debug for GarbageSweeper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GarbageSweeper")
            .field("mode", &self.mode)
            .field("commit_failure_policy", &self.commit_failure_policy)
            .finish_non_exhaustive()
    }
}

impl GarbageSweeper {
    /// Create a new builder for a sweeper.
    #[must_use]
    pub fn builder() -> GarbageSweeperBuilder {
        GarbageSweeperBuilder::default()
    }

    /// The queue treatment this sweeper applies.
    #[must_use]
    pub fn mode(&self) -> SweepMode {
        self.mode
    }

    /// Collect the garbage of one record.
    ///
    /// Deletes the record's documents from every affected site, applies the
    /// configured [`SweepMode`] to the index queue and runs the registered
    /// post-processors. Post-processors run regardless of backend failures
    /// along the way; an error return means the sweep itself could not
    /// proceed, and no part of it is rolled back.
    pub async fn remove_garbage_of(&self, table: &str, uid: i64) -> Result<SweepReport> {
        tracing::debug!(table, uid, mode = ?self.mode, "Starting garbage sweep");
        let mut report = SweepReport::default();

        self.delete_index_documents(table, uid, None, &mut report)
            .await?;

        match self.mode {
            SweepMode::Purge => {
                self.queue
                    .delete_item(table, uid)
                    .await
                    .map_err(|source| SweepError::Queue {
                        operation: "delete_item",
                        source,
                    })?;
            }
            SweepMode::Refresh => {
                self.requeue_if_alive(table, uid, &mut report).await?;
            }
        }

        report.post_processor_failures = self.post_processors.dispatch(table, uid).await?;

        tracing::debug!(
            table,
            uid,
            attempted = report.attempted,
            deleted = report.deleted,
            failed = report.delete_failures.len(),
            pruned = report.pruned_orphans,
            "Garbage sweep finished"
        );
        Ok(report)
    }

    /// Delete one record's documents without touching the queue.
    ///
    /// With `language` set, queue-driven deletions are narrowed to that
    /// language's core on sites that have one configured; sites without a
    /// core for the language are swept across all their cores. Records absent
    /// from the queue are swept everywhere regardless of `language`.
    ///
    /// Post-processors do not run here; they are tied to full garbage
    /// collection, not to document deletion.
    pub async fn remove_index_documents(
        &self,
        table: &str,
        uid: i64,
        language: Option<i64>,
    ) -> Result<SweepReport> {
        let mut report = SweepReport::default();
        self.delete_index_documents(table, uid, language, &mut report)
            .await?;
        Ok(report)
    }

    /// Fan the deletion out over the affected sites and cores.
    async fn delete_index_documents(
        &self,
        table: &str,
        uid: i64,
        language: Option<i64>,
        report: &mut SweepReport,
    ) -> Result<()> {
        let items = self
            .queue
            .get_items(table, uid)
            .await
            .map_err(|source| SweepError::Queue {
                operation: "get_items",
                source,
            })?;

        if items.is_empty() {
            // Not queued anywhere. The record may still be indexed under any
            // site, so sweep all of them.
            let sites = self
                .sites
                .available_sites()
                .await
                .map_err(|source| SweepError::SiteRegistry { source })?;
            for site in sites {
                let connections = self.connections.connections_for_site(&site);
                self.sweep_site(table, uid, &site, &connections, report)
                    .await?;
            }
            return Ok(());
        }

        for item in items {
            let site = match item.site_hash.as_deref() {
                Some(hash) => self
                    .sites
                    .site_by_hash(hash)
                    .await
                    .map_err(|source| SweepError::SiteRegistry { source })?,
                None => None,
            };

            let Some(site) = site else {
                // The owning site is gone; there is nowhere to send a delete.
                // Drop the entry so it stops resurfacing in later sweeps.
                tracing::debug!(
                    queue_uid = item.queue_uid,
                    item_type = %item.item_type,
                    record_uid = item.record_uid,
                    "Pruning queue entry with unresolvable site"
                );
                self.queue
                    .remove_entry(item.queue_uid)
                    .await
                    .map_err(|source| SweepError::Queue {
                        operation: "remove_entry",
                        source,
                    })?;
                report.pruned_orphans += 1;
                continue;
            };

            let mut connections = self.connections.connections_for_site(&site);
            if let Some(language) = language {
                if connections.contains_key(&language) {
                    connections.retain(|l, _| *l == language);
                }
            }
            self.sweep_site(table, uid, &site, &connections, report)
                .await?;
        }
        Ok(())
    }

    /// Send the deletion to every core of one site, committing where the
    /// site wants commits.
    async fn sweep_site(
        &self,
        table: &str,
        uid: i64,
        site: &Site,
        connections: &ConnectionMap,
        report: &mut SweepReport,
    ) -> Result<()> {
        let query = DeletionQuery::new(table, uid, &site.site_hash).to_string();
        for connection in connections.values() {
            report.attempted += 1;
            match connection.delete_by_query(&query).await {
                Ok(response) if response.is_success() => {
                    report.deleted += 1;
                    if site.enable_commits {
                        self.commit_connection(connection.as_ref(), report).await?;
                    }
                }
                Ok(response) => {
                    // No retry here; the reconciliation run picks these up.
                    tracing::error!(
                        status = response.http_status,
                        message = %response.status_message,
                        core = connection.core_path(),
                        query = %query,
                        "Core rejected index document deletion"
                    );
                    report.delete_failures.push(DeleteFailure {
                        core_path: connection.core_path().to_string(),
                        query: query.clone(),
                        http_status: Some(response.http_status),
                        message: response.status_message,
                    });
                }
                Err(e) => {
                    tracing::error!(
                        error = %e,
                        core = connection.core_path(),
                        query = %query,
                        "Index document deletion never reached the core"
                    );
                    report.delete_failures.push(DeleteFailure {
                        core_path: connection.core_path().to_string(),
                        query: query.clone(),
                        http_status: None,
                        message: e.to_string(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Commit a successful delete, applying the commit failure policy.
    async fn commit_connection(
        &self,
        connection: &dyn SearchConnection,
        report: &mut SweepReport,
    ) -> Result<()> {
        report.commits += 1;
        if let Err(e) = connection.commit(false, false).await {
            match self.commit_failure_policy {
                CommitFailurePolicy::Ignore => {}
                CommitFailurePolicy::Report => {
                    tracing::warn!(
                        error = %e,
                        core = connection.core_path(),
                        "Commit after deletion failed"
                    );
                    report.commit_failures.push(CommitFailure {
                        core_path: connection.core_path().to_string(),
                        message: e.to_string(),
                    });
                }
                CommitFailurePolicy::Abort => {
                    return Err(SweepError::Commit {
                        core_path: connection.core_path().to_string(),
                        source: e,
                    });
                }
            }
        }
        Ok(())
    }

    /// Re-queue the record for indexing if it still exists and is visible.
    async fn requeue_if_alive(
        &self,
        table: &str,
        uid: i64,
        report: &mut SweepReport,
    ) -> Result<()> {
        let Some(records) = self.records.as_ref() else {
            return Err(SweepError::configuration(
                "refresh mode requires a record store",
            ));
        };

        let record = records
            .get_record(table, uid)
            .await
            .map_err(|source| SweepError::RecordStore {
                table: table.to_string(),
                uid,
                source,
            })?;
        let Some(record) = record else {
            tracing::debug!(table, uid, "Record is gone, nothing to re-queue");
            return Ok(());
        };

        let excluded = records
            .excluded_by_rootline(&record)
            .await
            .map_err(|source| SweepError::RecordStore {
                table: table.to_string(),
                uid,
                source,
            })?;
        if excluded {
            tracing::debug!(table, uid, "Record excluded by its root line, not re-queued");
            return Ok(());
        }

        self.queue
            .update_item(table, uid)
            .await
            .map_err(|source| SweepError::Queue {
                operation: "update_item",
                source,
            })?;
        report.requeued = true;
        Ok(())
    }
}

/// Builder for [`GarbageSweeper`].
#[derive(Default)]
pub struct GarbageSweeperBuilder {
    queue: Option<Arc<dyn IndexQueue>>,
    sites: Option<Arc<dyn SiteRegistry>>,
    connections: Option<Arc<dyn ConnectionRegistry>>,
    records: Option<Arc<dyn RecordStore>>,
    post_processors: PostProcessorChain,
    mode: SweepMode,
    commit_failure_policy: CommitFailurePolicy,
}

impl GarbageSweeperBuilder {
    /// The index queue to read fan-out targets from and clean up.
    #[must_use]
    pub fn queue(mut self, queue: Arc<dyn IndexQueue>) -> Self {
        self.queue = Some(queue);
        self
    }

    /// The registry resolving site hashes and listing all sites.
    #[must_use]
    pub fn sites(mut self, sites: Arc<dyn SiteRegistry>) -> Self {
        self.sites = Some(sites);
        self
    }

    /// The registry resolving each site's core connections.
    #[must_use]
    pub fn connections(mut self, connections: Arc<dyn ConnectionRegistry>) -> Self {
        self.connections = Some(connections);
        self
    }

    /// The record store backing the refresh mode's liveness check.
    #[must_use]
    pub fn records(mut self, records: Arc<dyn RecordStore>) -> Self {
        self.records = Some(records);
        self
    }

    /// The post-processors to run after every sweep.
    #[must_use]
    pub fn post_processors(mut self, post_processors: PostProcessorChain) -> Self {
        self.post_processors = post_processors;
        self
    }

    /// Queue treatment, [`SweepMode::Purge`] unless set.
    #[must_use]
    pub fn mode(mut self, mode: SweepMode) -> Self {
        self.mode = mode;
        self
    }

    /// Commit failure handling, [`CommitFailurePolicy::Report`] unless set.
    #[must_use]
    pub fn commit_failure_policy(mut self, policy: CommitFailurePolicy) -> Self {
        self.commit_failure_policy = policy;
        self
    }

    /// Build the sweeper.
    ///
    /// Fails with [`SweepError::Configuration`] when a required part is
    /// missing, or when refresh mode is requested without a record store.
    pub fn build(self) -> Result<GarbageSweeper> {
        let queue = self
            .queue
            .ok_or_else(|| SweepError::configuration("an index queue is required"))?;
        let sites = self
            .sites
            .ok_or_else(|| SweepError::configuration("a site registry is required"))?;
        let connections = self
            .connections
            .ok_or_else(|| SweepError::configuration("a connection registry is required"))?;
        if self.mode == SweepMode::Refresh && self.records.is_none() {
            return Err(SweepError::configuration(
                "refresh mode requires a record store",
            ));
        }

        Ok(GarbageSweeper {
            queue,
            sites,
            connections,
            records: self.records,
            post_processors: self.post_processors,
            mode: self.mode,
            commit_failure_policy: self.commit_failure_policy,
        })
    }
}
