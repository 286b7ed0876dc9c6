//! Reconciliation loop for node keys.
//!
//! Drains the work queue one key at a time. For each key:
//!
//! 1. Split the key into a node name (malformed keys are dropped)
//! 2. Look the key up in the cache store (read errors are dropped)
//! 3. Absent: send a tombstone for `node/<name>`
//! 4. Present: convert to a Node and send its freshly built group, or
//!    nothing if the node has no usable address
//!
//! Every key handed out by the queue is marked done exactly once, whichever
//! branch it takes. Nothing is retried here: a later notification for the
//! same node re-runs the whole pass against the then-current cache state.

use crate::cache::{split_meta_namespace_key, ObjectStore};
use crate::discoverer::send;
use crate::node::{build_node, convert_to_node, node_source_from_name};
use crate::queue::WorkQueue;
use crate::target_group::TargetGroup;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

/// Marks a key done when dropped.
struct DoneGuard<'a> {
    queue: &'a dyn WorkQueue,
    key: &'a str,
}

impl Drop for DoneGuard<'_> {
    fn drop(&mut self) {
        self.queue.done(self.key);
    }
}

/// Turns queued node keys into target groups.
pub struct NodeReconciler {
    store: Arc<dyn ObjectStore>,
    queue: Arc<dyn WorkQueue>,
}

impl NodeReconciler {
    /// Creates a reconciler reading keys from `queue` and state from `store`.
    pub fn new(store: Arc<dyn ObjectStore>, queue: Arc<dyn WorkQueue>) -> Self {
        Self { store, queue }
    }

    /// Processes keys until the queue shuts down.
    pub async fn run(&self, cancel: &CancellationToken, tx: &mpsc::Sender<Vec<TargetGroup>>) {
        while self.process(cancel, tx).await {}
        debug!("Node reconciliation loop stopped");
    }

    /// Processes one key. Returns false once the queue has shut down.
    pub async fn process(
        &self,
        cancel: &CancellationToken,
        tx: &mpsc::Sender<Vec<TargetGroup>>,
    ) -> bool {
        let Some(key) = self.queue.get().await else {
            return false;
        };
        let _done = DoneGuard {
            queue: self.queue.as_ref(),
            key: &key,
        };

        if let Some(group) = self.reconcile(&key) {
            send(cancel, tx, group).await;
        }
        true
    }

    /// Computes what to send for `key` given the current store contents.
    ///
    /// Returns a tombstone if the node is gone, its group if it can be built,
    /// and `None` if nothing should be sent.
    pub fn reconcile(&self, key: &str) -> Option<TargetGroup> {
        let name = match split_meta_namespace_key(key) {
            Ok((_, name)) => name,
            Err(e) => {
                debug!(key = %key, error = %e, "Dropping malformed node key");
                return None;
            }
        };

        let obj = match self.store.get_by_key(key) {
            Ok(obj) => obj,
            Err(e) => {
                warn!(key = %key, error = %e, "Node store lookup failed");
                return None;
            }
        };

        let Some(obj) = obj else {
            debug!(node = %name, "Node gone from cache, sending tombstone");
            return Some(TargetGroup::tombstone(node_source_from_name(name)));
        };

        let node = match convert_to_node(&obj) {
            Ok(node) => node,
            Err(e) => {
                error!(key = %key, error = %e, "converting to Node object failed");
                return None;
            }
        };

        build_node(&node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{create_test_node, to_dynamic, FakeStore};
    use crate::queue::DedupQueue;

    fn reconciler() -> (NodeReconciler, Arc<FakeStore>, Arc<DedupQueue>) {
        let store = Arc::new(FakeStore::default());
        let queue = Arc::new(DedupQueue::named("node"));
        let reconciler = NodeReconciler::new(store.clone(), queue.clone());
        (reconciler, store, queue)
    }

    #[test]
    fn test_absent_node_yields_tombstone() {
        let (reconciler, _, _) = reconciler();
        let tg = reconciler.reconcile("n1").unwrap();
        assert_eq!(tg, TargetGroup::tombstone("node/n1"));
    }

    #[test]
    fn test_present_node_yields_group() {
        let (reconciler, store, _) = reconciler();
        store.insert(to_dynamic(&create_test_node("n1", &[("InternalIP", "10.0.0.5")], 10250)));

        let tg = reconciler.reconcile("n1").unwrap();
        assert_eq!(tg.source, "node/n1");
        assert_eq!(tg.targets[0]["__address__"], "10.0.0.5:10250");
    }

    #[test]
    fn test_node_without_address_yields_nothing() {
        let (reconciler, store, _) = reconciler();
        store.insert(to_dynamic(&create_test_node("n1", &[], 10250)));
        assert!(reconciler.reconcile("n1").is_none());
    }

    #[test]
    fn test_malformed_key_yields_nothing() {
        let (reconciler, _, _) = reconciler();
        assert!(reconciler.reconcile("a/b/c").is_none());
    }

    #[test]
    fn test_store_error_yields_nothing() {
        let (reconciler, store, _) = reconciler();
        store.fail_lookups(true);
        assert!(reconciler.reconcile("n1").is_none());
    }

    #[test]
    fn test_unconvertible_object_yields_nothing() {
        let (reconciler, store, _) = reconciler();
        let mut obj = to_dynamic(&create_test_node("n1", &[("InternalIP", "10.0.0.5")], 10250));
        if let Some(types) = obj.types.as_mut() {
            types.kind = "Pod".to_string();
        }
        store.insert(obj);
        assert!(reconciler.reconcile("n1").is_none());
    }

    #[test]
    fn test_reconcile_is_idempotent() {
        let (reconciler, store, _) = reconciler();
        store.insert(to_dynamic(&create_test_node(
            "n1",
            &[("InternalIP", "10.0.0.5"), ("Hostname", "n1")],
            10250,
        )));
        assert_eq!(reconciler.reconcile("n1"), reconciler.reconcile("n1"));
    }

    #[tokio::test]
    async fn test_process_acknowledges_every_branch() {
        let (reconciler, store, queue) = reconciler();
        let cancel = CancellationToken::new();
        let (tx, mut rx) = mpsc::channel(8);
        store.insert(to_dynamic(&create_test_node("bare", &[], 10250)));

        for key in ["a/b/c", "bare", "gone"] {
            queue.add(key.to_string());
            assert!(reconciler.process(&cancel, &tx).await);
            // Acknowledged: re-adding makes the key available again at once
            queue.add(key.to_string());
            assert_eq!(queue.len(), 1);
            assert_eq!(queue.get().await.as_deref(), Some(key));
            queue.done(key);
        }

        // Only the absent node produced output
        let groups = rx.try_recv().unwrap();
        assert_eq!(groups, vec![TargetGroup::tombstone("node/gone")]);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_process_returns_false_on_shutdown() {
        let (reconciler, _, queue) = reconciler();
        let cancel = CancellationToken::new();
        let (tx, _rx) = mpsc::channel(1);
        queue.shut_down();
        assert!(!reconciler.process(&cancel, &tx).await);
    }
}
