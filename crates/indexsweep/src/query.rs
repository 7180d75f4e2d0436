// Copyright 2026 Dropbox (created by Andrew Yates <ayates@dropbox.com>)

//! Deletion query composition.

use std::fmt;

/// Query matching every indexed document of one record within one site.
///
/// Renders as `type:<table> AND uid:<uid> AND siteHash:<hash>`. The query is
/// derived on demand from the record key and the target site; it is never
/// persisted, so it cannot go stale between composing and sending it.
///
/// # Example
///
/// ```
/// use indexsweep::DeletionQuery;
///
/// let query = DeletionQuery::new("pages", 42, "a1b2c3");
/// assert_eq!(query.to_string(), "type:pages AND uid:42 AND siteHash:a1b2c3");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeletionQuery {
    table: String,
    uid: i64,
    site_hash: String,
}

impl DeletionQuery {
    /// Compose the deletion query for one record on one site.
    #[must_use]
    pub fn new(table: impl Into<String>, uid: i64, site_hash: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            uid,
            site_hash: site_hash.into(),
        }
    }

    /// Table part of the record key.
    #[must_use]
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Uid part of the record key.
    #[must_use]
    pub fn uid(&self) -> i64 {
        self.uid
    }

    /// Hash of the site the deletion is scoped to.
    #[must_use]
    pub fn site_hash(&self) -> &str {
        &self.site_hash
    }
}

impl fmt::Display for DeletionQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "type:{} AND uid:{} AND siteHash:{}",
            self.table, self.uid, self.site_hash
        )
    }
}
