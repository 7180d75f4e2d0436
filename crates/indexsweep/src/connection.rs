// Copyright 2026 Dropbox (created by Andrew Yates <ayates@dropbox.com>)

//! Search backend connections and their per-site resolution
//!
//! A site usually owns one core per language. The sweeper never talks to a
//! backend directly; it asks the [`ConnectionRegistry`] for a site's
//! [`ConnectionMap`] and fans the deletion out over it.

use crate::site::Site;
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock};

/// Outcome of a `delete_by_query` call against one core.
///
/// Only transport-level problems surface as errors from
/// [`SearchConnection::delete_by_query`]; a core that answered at all reports
/// its verdict here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteByQueryResponse {
    /// HTTP status returned by the core
    pub http_status: u16,
    /// Status line or error detail accompanying the status
    pub status_message: String,
}

impl DeleteByQueryResponse {
    /// Response for a delete the core accepted.
    #[must_use]
    pub fn ok() -> Self {
        Self {
            http_status: 200,
            status_message: "OK".to_string(),
        }
    }

    /// Response for a delete the core rejected.
    #[must_use]
    pub fn failed(http_status: u16, status_message: impl Into<String>) -> Self {
        Self {
            http_status,
            status_message: status_message.into(),
        }
    }

    /// Check if the core accepted the delete.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.http_status == 200
    }
}

/// Write connection to one search core.
#[async_trait]
pub trait SearchConnection: Send + Sync {
    /// Path of the core this connection writes to, for diagnostics.
    fn core_path(&self) -> &str;

    /// Delete every document matching `query` from the core.
    ///
    /// Implementations return `Err` only when the request never reached the
    /// core; a reachable core that refuses the delete reports the refusal
    /// through the response status.
    async fn delete_by_query(
        &self,
        query: &str,
    ) -> Result<DeleteByQueryResponse, Box<dyn std::error::Error + Send + Sync>>;

    /// Make previous writes visible to searchers.
    async fn commit(
        &self,
        wait_flush: bool,
        wait_searcher: bool,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}

/// Connections of one site, keyed by language id.
///
/// Ordered by language so fan-out and the resulting logs are deterministic.
pub type ConnectionMap = BTreeMap<i64, Arc<dyn SearchConnection>>;

/// Resolves the configured write connections per site.
///
/// Resolution is a pure configuration lookup: a site without configured
/// backends yields an empty map, not an error.
pub trait ConnectionRegistry: Send + Sync {
    /// Connections for `site`, keyed by language id.
    fn connections_for_site(&self, site: &Site) -> ConnectionMap;
}

/// In-memory connection registry for testing and single-process setups.
///
/// Clones share the underlying connection table.
#[derive(Clone, Default)]
pub struct InMemoryConnectionRegistry {
    by_site: Arc<RwLock<HashMap<String, ConnectionMap>>>,
}

impl InMemoryConnectionRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection for one language of one site.
    ///
    /// Registering the same site hash and language twice replaces the earlier
    /// connection.
    pub fn register(
        &self,
        site_hash: impl Into<String>,
        language: i64,
        connection: Arc<dyn SearchConnection>,
    ) {
        let mut by_site = self.by_site.write().unwrap_or_else(|e| e.into_inner());
        by_site
            .entry(site_hash.into())
            .or_default()
            .insert(language, connection);
    }

    /// Total number of registered connections across all sites.
    #[must_use]
    pub fn len(&self) -> usize {
        let by_site = self.by_site.read().unwrap_or_else(|e| e.into_inner());
        by_site.values().map(BTreeMap::len).sum()
    }

    /// Check if no connections are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ConnectionRegistry for InMemoryConnectionRegistry {
    fn connections_for_site(&self, site: &Site) -> ConnectionMap {
        let by_site = self.by_site.read().unwrap_or_else(|e| e.into_inner());
        by_site.get(&site.site_hash).cloned().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NullConnection {
        core_path: String,
    }

    #[async_trait]
    impl SearchConnection for NullConnection {
        fn core_path(&self) -> &str {
            &self.core_path
        }

        async fn delete_by_query(
            &self,
            _query: &str,
        ) -> Result<DeleteByQueryResponse, Box<dyn std::error::Error + Send + Sync>> {
            Ok(DeleteByQueryResponse::ok())
        }

        async fn commit(
            &self,
            _wait_flush: bool,
            _wait_searcher: bool,
        ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
            Ok(())
        }
    }

    fn conn(core_path: &str) -> Arc<dyn SearchConnection> {
        Arc::new(NullConnection {
            core_path: core_path.to_string(),
        })
    }

    #[test]
    fn test_response_helpers() {
        assert!(DeleteByQueryResponse::ok().is_success());
        assert_eq!(DeleteByQueryResponse::ok().status_message, "OK");

        let failed = DeleteByQueryResponse::failed(503, "Service Unavailable");
        assert!(!failed.is_success());
        assert_eq!(failed.http_status, 503);
    }

    #[test]
    fn test_only_http_200_counts_as_success() {
        // 2xx is not good enough; the backend contract is exactly 200.
        assert!(!DeleteByQueryResponse::failed(204, "No Content").is_success());
        assert!(!DeleteByQueryResponse::failed(301, "Moved").is_success());
    }

    #[test]
    fn test_unknown_site_yields_empty_map() {
        let registry = InMemoryConnectionRegistry::new();
        let site = Site::new("main", "hash_a");
        assert!(registry.connections_for_site(&site).is_empty());
    }

    #[test]
    fn test_connections_ordered_by_language() {
        let registry = InMemoryConnectionRegistry::new();
        registry.register("hash_a", 2, conn("/solr/core_fr"));
        registry.register("hash_a", 0, conn("/solr/core_en"));
        registry.register("hash_a", 1, conn("/solr/core_de"));

        let site = Site::new("main", "hash_a");
        let languages: Vec<i64> = registry.connections_for_site(&site).into_keys().collect();
        assert_eq!(languages, vec![0, 1, 2]);
    }

    #[test]
    fn test_register_replaces_same_language() {
        let registry = InMemoryConnectionRegistry::new();
        registry.register("hash_a", 0, conn("/solr/old"));
        registry.register("hash_a", 0, conn("/solr/new"));

        let site = Site::new("main", "hash_a");
        let connections = registry.connections_for_site(&site);
        assert_eq!(connections.len(), 1);
        assert_eq!(registry.len(), 1);
        let core_paths: Vec<&str> = connections.values().map(|c| c.core_path()).collect();
        assert_eq!(core_paths, vec!["/solr/new"]);
    }

    #[test]
    fn test_sites_are_isolated() {
        let registry = InMemoryConnectionRegistry::new();
        registry.register("hash_a", 0, conn("/solr/a_en"));
        registry.register("hash_b", 0, conn("/solr/b_en"));
        registry.register("hash_b", 1, conn("/solr/b_de"));

        assert_eq!(
            registry
                .connections_for_site(&Site::new("a", "hash_a"))
                .len(),
            1
        );
        assert_eq!(
            registry
                .connections_for_site(&Site::new("b", "hash_b"))
                .len(),
            2
        );
        assert_eq!(registry.len(), 3);
    }
}
