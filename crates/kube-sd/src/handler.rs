//! Change notifier adapter.
//!
//! Turns cache callbacks into queue keys. Runs on the cache's task, so it
//! only counts the event and enqueues; all real work happens in the
//! reconciliation loop.

use crate::cache::{meta_namespace_key, ResourceEventHandler};
use crate::metrics::EventCounters;
use crate::queue::WorkQueue;
use kube::core::DynamicObject;
use std::sync::Arc;
use tracing::debug;

/// Enqueues the key of every node the cache reports as added, updated or deleted.
pub struct NodeEventHandler {
    queue: Arc<dyn WorkQueue>,
    counters: EventCounters,
}

impl NodeEventHandler {
    /// Creates a handler feeding `queue`.
    pub fn new(queue: Arc<dyn WorkQueue>, counters: EventCounters) -> Self {
        Self { queue, counters }
    }

    fn enqueue(&self, obj: &DynamicObject) {
        match meta_namespace_key(obj) {
            Ok(key) => self.queue.add(key),
            Err(e) => debug!(error = %e, "Skipping node notification without a key"),
        }
    }
}

impl ResourceEventHandler for NodeEventHandler {
    fn on_add(&self, obj: &DynamicObject) {
        self.counters.add.inc();
        self.enqueue(obj);
    }

    fn on_update(&self, _old: &DynamicObject, new: &DynamicObject) {
        self.counters.update.inc();
        self.enqueue(new);
    }

    fn on_delete(&self, obj: &DynamicObject) {
        self.counters.delete.inc();
        self.enqueue(obj);
    }
}
