// Copyright 2026 Dropbox (created by Andrew Yates <ayates@dropbox.com>)

//! Extension hooks invoked after every garbage removal
//!
//! Deployments hang cache invalidation, audit trails and similar follow-up
//! work off the sweep by registering [`GarbagePostProcessor`] implementations
//! on the [`PostProcessorChain`]. The chain runs after the sweep strategy has
//! done its work, whether or not any backend call succeeded.

use crate::error::{Result, SweepError};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

/// Hook running after a record's garbage has been collected.
#[async_trait]
pub trait GarbagePostProcessor: Send + Sync {
    /// Called once per swept record with the record's key.
    ///
    /// Errors are logged and counted, then dropped; a failing hook never
    /// undoes or blocks the sweep it follows.
    async fn post_process(
        &self,
        table: &str,
        uid: i64,
    ) -> std::result::Result<(), Box<dyn std::error::Error + Send + Sync>>;
}

/// Ordered dispatcher over registered post-processors.
///
/// Processors are registered under string ids. Invocation order is the
/// registration order unless overridden with
/// [`set_order`](PostProcessorChain::set_order). An order naming an id nobody
/// registered is a configuration error: dispatch fails fast on it, before
/// running anything.
pub struct PostProcessorChain {
    registered: HashMap<String, Arc<dyn GarbagePostProcessor>>,
    order: Vec<String>,
}

impl PostProcessorChain {
    /// Create an empty chain.
    #[must_use]
    pub fn new() -> Self {
        Self {
            registered: HashMap::new(),
            order: Vec::new(),
        }
    }

    /// Register `processor` under `id`, appending it to the invocation order.
    ///
    /// Re-registering an id replaces the implementation but keeps its
    /// position.
    pub fn register(&mut self, id: impl Into<String>, processor: Arc<dyn GarbagePostProcessor>) {
        let id = id.into();
        if !self.order.contains(&id) {
            self.order.push(id.clone());
        }
        self.registered.insert(id, processor);
    }

    /// Replace the invocation order.
    ///
    /// Ids left out of `ids` are no longer invoked; unknown ids make the next
    /// dispatch fail with [`SweepError::UnknownPostProcessor`].
    pub fn set_order<I, S>(&mut self, ids: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.order = ids.into_iter().map(Into::into).collect();
    }

    /// Number of post-processors in the invocation order.
    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Check if the chain has nothing to invoke.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Run every ordered processor for one swept record.
    ///
    /// Returns the number of processors that failed and were skipped.
    pub async fn dispatch(&self, table: &str, uid: i64) -> Result<usize> {
        for id in &self.order {
            if !self.registered.contains_key(id) {
                return Err(SweepError::UnknownPostProcessor { id: id.clone() });
            }
        }

        let mut skipped = 0;
        for id in &self.order {
            let Some(processor) = self.registered.get(id) else {
                continue;
            };
            if let Err(e) = processor.post_process(table, uid).await {
                skipped += 1;
                tracing::warn!(id = %id, error = %e, "Post-processor error (ignored)");
            }
        }
        Ok(skipped)
    }
}

impl Default for PostProcessorChain {
    fn default() -> Self {
        Self::new()
    }
}
