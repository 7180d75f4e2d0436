// Copyright 2026 Dropbox (created by Andrew Yates <ayates@dropbox.com>)

//! # indexsweep
//!
//! Garbage collection and consistency sweeping for multi-site search
//! indexes.
//!
//! When a record is deleted or hidden in the system of record, its documents
//! must disappear from every search core that ever indexed it. `indexsweep`
//! owns that removal: it reads the index queue to learn which sites a record
//! was indexed under, fans a scoped `delete_by_query` out over each site's
//! cores, cleans the queue up behind itself and runs registered
//! post-processors for follow-up work such as cache invalidation.
//!
//! # Design
//!
//! - **Partial failure is tolerated, not retried.** A core that refuses or
//!   never receives its delete is logged and recorded in the
//!   [`SweepReport`]; the sweep continues so reachable cores are not held
//!   hostage by unreachable ones. Consistency for the failed cores is
//!   deferred to a later reconciliation run.
//! - **The queue drives the fan-out.** Queue entries name the sites a record
//!   belongs to. A record the queue does not know is conservatively swept
//!   from every site; a queue entry whose site no longer exists is pruned
//!   without any backend call.
//! - **Two queue treatments.** [`SweepMode::Purge`] drops the record's queue
//!   entries for good; [`SweepMode::Refresh`] re-queues records that still
//!   exist and are still visible, which keeps page-like content fresh after
//!   moves and permission changes.
//!
//! # Example
//!
//! ```rust,no_run
//! use indexsweep::{
//!     DeleteByQueryResponse, GarbageSweeper, InMemoryConnectionRegistry, InMemoryIndexQueue,
//!     InMemorySiteRegistry, QueueItem, SearchConnection, Site, SweepMode,
//! };
//! use std::sync::Arc;
//!
//! # struct SolrCore;
//! # #[async_trait::async_trait]
//! # impl SearchConnection for SolrCore {
//! #     fn core_path(&self) -> &str {
//! #         "/solr/core_en"
//! #     }
//! #     async fn delete_by_query(
//! #         &self,
//! #         _query: &str,
//! #     ) -> Result<DeleteByQueryResponse, Box<dyn std::error::Error + Send + Sync>> {
//! #         Ok(DeleteByQueryResponse::ok())
//! #     }
//! #     async fn commit(
//! #         &self,
//! #         _wait_flush: bool,
//! #         _wait_searcher: bool,
//! #     ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
//! #         Ok(())
//! #     }
//! # }
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let queue = Arc::new(InMemoryIndexQueue::new());
//! queue.add_item(QueueItem::new("news", 1, 42).with_site_hash("a1b2c3"));
//!
//! let sites = Arc::new(InMemorySiteRegistry::new(vec![
//!     Site::new("main", "a1b2c3").with_commits(true),
//! ]));
//!
//! let connections = Arc::new(InMemoryConnectionRegistry::new());
//! connections.register("a1b2c3", 0, Arc::new(SolrCore));
//!
//! let sweeper = GarbageSweeper::builder()
//!     .queue(Arc::clone(&queue) as _)
//!     .sites(sites)
//!     .connections(connections)
//!     .mode(SweepMode::Purge)
//!     .build()?;
//!
//! let report = sweeper.remove_garbage_of("news", 42).await?;
//! assert_eq!(report.deleted, 1);
//! assert!(queue.is_empty());
//! # Ok(())
//! # }
//! ```

pub mod connection;
pub mod error;
pub mod post_process;
pub mod query;
pub mod queue;
pub mod record;
pub mod site;
pub mod sweeper;

pub use connection::{
    ConnectionMap, ConnectionRegistry, DeleteByQueryResponse, InMemoryConnectionRegistry,
    SearchConnection,
};
pub use error::{Result, SweepError};
pub use post_process::{GarbagePostProcessor, PostProcessorChain};
pub use query::DeletionQuery;
pub use queue::{IndexQueue, InMemoryIndexQueue, QueueItem};
pub use record::{InMemoryRecordStore, RecordStore, StoredRecord};
pub use site::{InMemorySiteRegistry, Site, SiteRegistry};
pub use sweeper::{
    CommitFailure, CommitFailurePolicy, DeleteFailure, GarbageSweeper, GarbageSweeperBuilder,
    SweepMode, SweepReport,
};
