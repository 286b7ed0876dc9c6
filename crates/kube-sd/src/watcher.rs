//! Node discovery lifecycle.
//!
//! Owns the queue between the cache and the reconciliation loop: subscribes
//! to the cache on construction, waits for the initial sync when run, then
//! drives the loop until cancelled.

use crate::cache::{wait_for_cache_sync, Informer, ObjectStore};
use crate::discoverer::Discoverer;
use crate::error::DiscoveryError;
use crate::handler::NodeEventHandler;
use crate::metrics::EventCounters;
use crate::queue::{DedupQueue, WorkQueue};
use crate::reconciler::NodeReconciler;
use crate::target_group::TargetGroup;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Discovers Kubernetes nodes.
pub struct NodeDiscovery {
    informer: Arc<dyn Informer>,
    store: Arc<dyn ObjectStore>,
    queue: Arc<dyn WorkQueue>,
}

impl NodeDiscovery {
    /// Creates a node discovery fed by `informer`, with its own `node` queue.
    pub fn new(informer: Arc<dyn Informer>, counters: EventCounters) -> Self {
        Self::with_queue(informer, counters, Arc::new(DedupQueue::named("node")))
    }

    /// Creates a node discovery using `queue` between the cache and the loop.
    pub fn with_queue(
        informer: Arc<dyn Informer>,
        counters: EventCounters,
        queue: Arc<dyn WorkQueue>,
    ) -> Self {
        let handler = NodeEventHandler::new(Arc::clone(&queue), counters);
        if let Err(e) = informer.add_event_handler(Arc::new(handler)) {
            error!(error = %e, "Error adding nodes event handler.");
        }

        Self {
            store: informer.store(),
            informer,
            queue,
        }
    }
}

#[async_trait]
impl Discoverer for NodeDiscovery {
    async fn run(
        &self,
        cancel: CancellationToken,
        tx: mpsc::Sender<Vec<TargetGroup>>,
    ) -> Result<(), DiscoveryError> {
        if !wait_for_cache_sync(self.informer.as_ref(), &cancel).await {
            self.queue.shut_down();
            if cancel.is_cancelled() {
                debug!("Node discovery cancelled before cache sync");
                return Ok(());
            }
            error!("node informer unable to sync cache");
            return Err(DiscoveryError::CacheSync);
        }
        info!("Node cache synced, starting reconciliation");

        let reconciler = NodeReconciler::new(Arc::clone(&self.store), Arc::clone(&self.queue));
        let loop_cancel = cancel.clone();
        let reconcile_loop = tokio::spawn(async move {
            reconciler.run(&loop_cancel, &tx).await;
        });

        // Block until the discovery is explicitly cancelled
        cancel.cancelled().await;

        self.queue.shut_down();
        if let Err(e) = reconcile_loop.await {
            error!(error = %e, "Node reconciliation loop panicked");
        }
        info!("Node discovery stopped");
        Ok(())
    }
}
