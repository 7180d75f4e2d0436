//! Basic garbage sweep across two sites.
//!
//! Wires the in-memory backends together, deletes one record's documents
//! from every affected core and prints what happened. Run with:
//!
//! ```bash
//! cargo run --example basic_sweep
//! ```

use async_trait::async_trait;
use indexsweep::{
    DeleteByQueryResponse, GarbagePostProcessor, GarbageSweeper, InMemoryConnectionRegistry,
    InMemoryIndexQueue, InMemorySiteRegistry, PostProcessorChain, QueueItem, SearchConnection,
    Site, SweepMode,
};
use std::sync::Arc;

/// Pretend Solr core that prints what it is asked to do.
struct PrintingCore {
    core_path: String,
}

impl PrintingCore {
    fn new(core_path: &str) -> Arc<Self> {
        Arc::new(Self {
            core_path: core_path.to_string(),
        })
    }
}

#[async_trait]
impl SearchConnection for PrintingCore {
    fn core_path(&self) -> &str {
        &self.core_path
    }

    async fn delete_by_query(
        &self,
        query: &str,
    ) -> Result<DeleteByQueryResponse, Box<dyn std::error::Error + Send + Sync>> {
        println!("  {} <- deleteByQuery({query})", self.core_path);
        Ok(DeleteByQueryResponse::ok())
    }

    async fn commit(
        &self,
        _wait_flush: bool,
        _wait_searcher: bool,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        println!("  {} <- commit", self.core_path);
        Ok(())
    }
}

/// Follow-up hook, the place where cache invalidation would live.
struct CacheFlush;

#[async_trait]
impl GarbagePostProcessor for CacheFlush {
    async fn post_process(
        &self,
        table: &str,
        uid: i64,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        println!("  cache flushed for {table}:{uid}");
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "indexsweep=debug".into()),
        )
        .init();

    // Two sites share the installation. The main site commits immediately,
    // the shop site batches commits elsewhere.
    let sites = Arc::new(InMemorySiteRegistry::new(vec![
        Site::new("main", "hash_main").with_commits(true),
        Site::new("shop", "hash_shop"),
    ]));

    // The main site serves two languages.
    let connections = Arc::new(InMemoryConnectionRegistry::new());
    connections.register("hash_main", 0, PrintingCore::new("/solr/main_en"));
    connections.register("hash_main", 1, PrintingCore::new("/solr/main_de"));
    connections.register("hash_shop", 0, PrintingCore::new("/solr/shop_en"));

    // news:42 was indexed on both sites.
    let queue = Arc::new(InMemoryIndexQueue::new());
    queue.add_item(QueueItem::new("news", 1, 42).with_site_hash("hash_main"));
    queue.add_item(QueueItem::new("news", 2, 42).with_site_hash("hash_shop"));

    let mut chain = PostProcessorChain::new();
    chain.register("cache-flush", Arc::new(CacheFlush));

    let sweeper = GarbageSweeper::builder()
        .queue(Arc::clone(&queue) as _)
        .sites(sites)
        .connections(connections)
        .post_processors(chain)
        .mode(SweepMode::Purge)
        .build()?;

    println!("sweeping news:42");
    let report = sweeper.remove_garbage_of("news", 42).await?;

    println!(
        "done: {} cores swept, {} commits, {} failures, queue entries left: {}",
        report.deleted,
        report.commits,
        report.delete_failures.len(),
        queue.len()
    );
    Ok(())
}
