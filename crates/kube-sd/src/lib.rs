//! Kubernetes Node Discovery
//!
//! Converts the add/update/delete notifications of a node cache into a
//! continuously updated stream of scrape [`TargetGroup`]s.
//!
//! # Data flow
//!
//! ```text
//! cache events -> NodeEventHandler -> WorkQueue -> NodeReconciler
//!     -> ObjectStore lookup -> build_node / resolve_node_address -> channel
//! ```
//!
//! The cache ([`Informer`], [`ObjectStore`]) and the queue ([`WorkQueue`]) are
//! interface boundaries. [`DedupQueue`] is the in-process queue used by
//! [`NodeDiscovery`]; the cache is supplied by the caller (a kube watch
//! stream in production, [`mock::FakeInformer`] in tests).
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use kube_sd::{Discoverer, EventMetrics, Informer, NodeDiscovery, Role};
//! use tokio::sync::mpsc;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example(informer: Arc<dyn Informer>) -> Result<(), kube_sd::DiscoveryError> {
//! let registry = prometheus::Registry::new();
//! let metrics = EventMetrics::register(&registry)?;
//! let discovery = NodeDiscovery::new(informer, metrics.counters(Role::Node));
//!
//! let cancel = CancellationToken::new();
//! let (tx, mut rx) = mpsc::channel(16);
//! tokio::spawn(async move { discovery.run(cancel, tx).await });
//!
//! while let Some(groups) = rx.recv().await {
//!     for group in groups {
//!         println!("{} -> {} targets", group.source, group.targets.len());
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod address;
pub mod cache;
pub mod discoverer;
pub mod error;
pub mod handler;
pub mod labels;
pub mod metrics;
pub mod node;
pub mod queue;
pub mod reconciler;
pub mod target_group;
pub mod watcher;
#[cfg(any(test, feature = "test-util"))]
pub mod mock;

pub use address::{resolve_node_address, AddressMap, ResolvedAddress};
pub use cache::{
    meta_namespace_key, split_meta_namespace_key, wait_for_cache_sync, Informer, ObjectStore,
    ResourceEventHandler,
};
pub use discoverer::{send, Discoverer};
pub use error::DiscoveryError;
pub use handler::NodeEventHandler;
pub use labels::Role;
pub use metrics::{EventCounters, EventMetrics};
pub use node::{build_node, convert_to_node, node_source, node_source_from_name};
pub use queue::{DedupQueue, WorkQueue};
pub use reconciler::NodeReconciler;
pub use target_group::{LabelSet, TargetGroup};
pub use watcher::NodeDiscovery;
