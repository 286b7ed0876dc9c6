//! In-memory cache fakes for unit testing
//!
//! `FakeInformer` plays the role of the cluster cache: tests mutate it with
//! `apply`/`delete`, which update its `FakeStore` and then notify handlers,
//! in that order, as a real cache does.

use crate::cache::{meta_namespace_key, Informer, ObjectStore, ResourceEventHandler};
use crate::error::DiscoveryError;
use async_trait::async_trait;
use k8s_openapi::api::core::v1::{
    DaemonEndpoint, Node, NodeAddress, NodeDaemonEndpoints, NodeStatus,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::core::DynamicObject;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::watch;

/// Helper to create a test Node with the given addresses and kubelet port
pub fn create_test_node(name: &str, addresses: &[(&str, &str)], kubelet_port: i32) -> Node {
    Node {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            ..Default::default()
        },
        spec: None,
        status: Some(NodeStatus {
            addresses: Some(
                addresses
                    .iter()
                    .map(|(ty, address)| node_address(ty, address))
                    .collect(),
            ),
            daemon_endpoints: Some(NodeDaemonEndpoints {
                kubelet_endpoint: Some(DaemonEndpoint { port: kubelet_port }),
            }),
            ..Default::default()
        }),
    }
}

/// Helper to create a NodeAddress
pub fn node_address(ty: &str, address: &str) -> NodeAddress {
    NodeAddress {
        address: address.to_string(),
        type_: ty.to_string(),
    }
}

/// Converts a Node into the untyped form caches hold
pub fn to_dynamic(node: &Node) -> DynamicObject {
    let value = serde_json::to_value(node).expect("Node serializes");
    serde_json::from_value(value).expect("Node deserializes as DynamicObject")
}

/// Mock ObjectStore backed by a HashMap
#[derive(Default)]
pub struct FakeStore {
    objects: Mutex<HashMap<String, Arc<DynamicObject>>>,
    fail_lookups: AtomicBool,
}

impl FakeStore {
    /// Add or replace an object (for test setup). Returns the previous object.
    pub fn insert(&self, obj: DynamicObject) -> Option<Arc<DynamicObject>> {
        let key = meta_namespace_key(&obj).expect("test object has a name");
        self.objects.lock().unwrap().insert(key, Arc::new(obj))
    }

    /// Remove an object by key (for test setup). Returns the removed object.
    pub fn remove(&self, key: &str) -> Option<Arc<DynamicObject>> {
        self.objects.lock().unwrap().remove(key)
    }

    /// Make every subsequent lookup fail
    pub fn fail_lookups(&self, fail: bool) {
        self.fail_lookups.store(fail, Ordering::SeqCst);
    }
}

impl ObjectStore for FakeStore {
    fn get_by_key(&self, key: &str) -> Result<Option<Arc<DynamicObject>>, DiscoveryError> {
        if self.fail_lookups.load(Ordering::SeqCst) {
            return Err(DiscoveryError::StoreLookup(format!("injected failure for {key}")));
        }
        Ok(self.objects.lock().unwrap().get(key).cloned())
    }
}

/// Mock Informer that notifies handlers synchronously
pub struct FakeInformer {
    store: Arc<FakeStore>,
    handlers: Mutex<Vec<Arc<dyn ResourceEventHandler>>>,
    synced: Mutex<Option<watch::Sender<bool>>>,
}

impl Default for FakeInformer {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeInformer {
    /// Create an unsynced informer with an empty store
    pub fn new() -> Self {
        let (synced, _) = watch::channel(false);
        Self {
            store: Arc::new(FakeStore::default()),
            handlers: Mutex::new(Vec::new()),
            synced: Mutex::new(Some(synced)),
        }
    }

    /// The backing store, for test setup and fault injection
    pub fn fake_store(&self) -> Arc<FakeStore> {
        Arc::clone(&self.store)
    }

    /// Report the initial list as complete
    pub fn mark_synced(&self) {
        if let Some(synced) = self.synced.lock().unwrap().as_ref() {
            synced.send_replace(true);
        }
    }

    /// Stop the informer without it ever syncing
    pub fn abandon_sync(&self) {
        self.synced.lock().unwrap().take();
    }

    /// Number of subscribed handlers
    pub fn handler_count(&self) -> usize {
        self.handlers.lock().unwrap().len()
    }

    /// Store `node` and notify handlers of an add or update
    pub fn apply(&self, node: &Node) {
        let obj = to_dynamic(node);
        let old = self.store.insert(obj.clone());
        for handler in self.handlers() {
            match &old {
                Some(old) => handler.on_update(old, &obj),
                None => handler.on_add(&obj),
            }
        }
    }

    /// Remove the node named `name` and notify handlers if it existed
    pub fn delete(&self, name: &str) {
        if let Some(old) = self.store.remove(name) {
            for handler in self.handlers() {
                handler.on_delete(&old);
            }
        }
    }

    fn handlers(&self) -> Vec<Arc<dyn ResourceEventHandler>> {
        self.handlers.lock().unwrap().clone()
    }
}

#[async_trait]
impl Informer for FakeInformer {
    fn store(&self) -> Arc<dyn ObjectStore> {
        self.store.clone()
    }

    fn add_event_handler(
        &self,
        handler: Arc<dyn ResourceEventHandler>,
    ) -> Result<(), DiscoveryError> {
        self.handlers.lock().unwrap().push(handler);
        Ok(())
    }

    async fn wait_until_synced(&self) -> bool {
        let mut synced = match self.synced.lock().unwrap().as_ref() {
            Some(synced) => synced.subscribe(),
            None => return false,
        };
        synced.wait_for(|synced| *synced).await.is_ok()
    }
}
