// Copyright 2026 Dropbox (created by Andrew Yates <ayates@dropbox.com>)

//! Error types for sweep operations
//!
//! Every fallible operation in this crate returns [`SweepError`]. Backend
//! failures (queue storage, site registry, record store, commits) wrap the
//! underlying error as a source; configuration problems carry a plain
//! description because there is nothing underneath them to unwrap.

use thiserror::Error;

/// Errors that stop a sweep operation.
///
/// A failed `delete_by_query` against one core is deliberately NOT an error:
/// the sweeper records it in the [`SweepReport`](crate::SweepReport) and keeps
/// fanning out, so one unreachable core cannot leave documents behind on the
/// reachable ones. Errors of this type mean the sweep itself could not
/// proceed.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum SweepError {
    /// The index queue could not be read or written
    #[error("Index queue {operation} failed: {source}")]
    Queue {
        /// Queue operation that failed ("get_items", "delete_item", ...)
        operation: &'static str,
        /// The underlying queue storage error
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// The site registry could not be queried
    #[error("Site registry lookup failed: {source}")]
    SiteRegistry {
        /// The underlying registry error
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// The record store could not be queried
    #[error("Record store lookup failed for {table}:{uid}: {source}")]
    RecordStore {
        /// Table of the record being looked up
        table: String,
        /// Uid of the record being looked up
        uid: i64,
        /// The underlying store error
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// A commit was rejected while the sweeper is configured to abort on
    /// commit failures
    #[error("Commit failed on core '{core_path}': {source}")]
    Commit {
        /// Path of the core that rejected the commit
        core_path: String,
        /// The underlying commit error
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// The configured post-processor order names an id nobody registered
    #[error("No garbage post-processor registered under id '{id}'")]
    UnknownPostProcessor {
        /// The id that could not be resolved
        id: String,
    },

    /// The sweeper was assembled with missing or contradictory parts
    #[error("Invalid sweeper configuration: {reason}")]
    Configuration {
        /// What is missing or contradictory
        reason: String,
    },
}

impl SweepError {
    /// Shorthand for a [`SweepError::Configuration`].
    pub(crate) fn configuration(reason: impl Into<String>) -> Self {
        SweepError::Configuration {
            reason: reason.into(),
        }
    }

    /// Check if this error is a configuration issue (fix the wiring, not the
    /// backends).
    #[must_use]
    pub fn is_configuration_issue(&self) -> bool {
        matches!(
            self,
            SweepError::Configuration { .. } | SweepError::UnknownPostProcessor { .. }
        )
    }

    /// Check if this error came out of a backend and may clear up on retry.
    #[must_use]
    pub fn is_connectivity(&self) -> bool {
        matches!(
            self,
            SweepError::Queue { .. }
                | SweepError::SiteRegistry { .. }
                | SweepError::RecordStore { .. }
                | SweepError::Commit { .. }
        )
    }
}

/// Result type alias for sweep operations.
pub type Result<T> = std::result::Result<T, SweepError>;
