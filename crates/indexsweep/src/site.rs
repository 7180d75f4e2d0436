// Copyright 2026 Dropbox (created by Andrew Yates <ayates@dropbox.com>)

//! Sites and the registry that resolves them
//!
//! A site is the unit of index partitioning: every document carries the hash
//! of the site it belongs to, and deletions are always scoped to one site
//! hash. The [`SiteRegistry`] answers two questions during a sweep: "which
//! sites exist at all" (for the conservative everywhere-fan-out) and "which
//! site does this hash belong to" (for queue-driven deletions).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, RwLock};

/// Per-site configuration snapshot used during a sweep.
///
/// Snapshots are cheap to clone and carry everything the sweeper needs, so a
/// sweep never goes back to the registry mid-flight and cannot observe a
/// half-applied configuration change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Site {
    /// Human-readable site name, used in logs only
    pub name: String,
    /// Stable identifier scoping documents to this site within shared cores
    pub site_hash: String,
    /// Whether deletions against this site's cores are followed by a commit
    pub enable_commits: bool,
}

impl Site {
    /// Create a site with commits disabled.
    pub fn new(name: impl Into<String>, site_hash: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            site_hash: site_hash.into(),
            enable_commits: false,
        }
    }

    /// Toggle whether deletions on this site are committed immediately.
    #[must_use]
    pub fn with_commits(mut self, enable: bool) -> Self {
        self.enable_commits = enable;
        self
    }
}

/// Source of truth for the sites an installation serves.
#[async_trait]
pub trait SiteRegistry: Send + Sync {
    /// All sites known to the installation.
    async fn available_sites(&self) -> Result<Vec<Site>, Box<dyn std::error::Error + Send + Sync>>;

    /// Resolve a site by its hash, or `None` when no site carries it.
    ///
    /// The default implementation scans [`available_sites`]. Registries backed
    /// by an indexed store should override it.
    ///
    /// [`available_sites`]: SiteRegistry::available_sites
    async fn site_by_hash(
        &self,
        site_hash: &str,
    ) -> Result<Option<Site>, Box<dyn std::error::Error + Send + Sync>> {
        Ok(self
            .available_sites()
            .await?
            .into_iter()
            .find(|site| site.site_hash == site_hash))
    }
}

/// In-memory site registry for testing and single-process setups.
///
/// Clones share the underlying site list.
#[derive(Debug, Clone, Default)]
pub struct InMemorySiteRegistry {
    sites: Arc<RwLock<Vec<Site>>>,
}

impl InMemorySiteRegistry {
    /// Create a registry over a fixed site list.
    #[must_use]
    pub fn new(sites: Vec<Site>) -> Self {
        Self {
            sites: Arc::new(RwLock::new(sites)),
        }
    }

    /// Add a site to the registry.
    pub fn add_site(&self, site: Site) {
        let mut sites = self.sites.write().unwrap_or_else(|e| e.into_inner());
        sites.push(site);
    }

    /// Number of registered sites.
    #[must_use]
    pub fn len(&self) -> usize {
        let sites = self.sites.read().unwrap_or_else(|e| e.into_inner());
        sites.len()
    }

    /// Check if the registry has no sites.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl SiteRegistry for InMemorySiteRegistry {
    async fn available_sites(&self) -> Result<Vec<Site>, Box<dyn std::error::Error + Send + Sync>> {
        let sites = self.sites.read().unwrap_or_else(|e| e.into_inner());
        Ok(sites.clone())
    }
}
