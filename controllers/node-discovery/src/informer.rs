//! Kubernetes-backed node cache.
//!
//! The cache itself is a `kube_runtime` reflector store fed from a watch
//! stream. This module adds the change notifications on top: each event is
//! compared against the store before the reflector applies it, and handlers
//! run after it has, so a handler reading the store sees the state that
//! triggered it.
//!
//! A (re)list arrives as `Init`, `InitApply`* and `InitDone`. The reflector
//! swaps the listed objects in on `InitDone`; nodes that vanished while the
//! watch was down are reported as deleted.

use crate::error::ControllerError;
use async_trait::async_trait;
use futures::StreamExt;
use k8s_openapi::api::core::v1::Node;
use kube::api::{Api, ApiResource, DynamicObject};
use kube_runtime::reflector::{store::Writer, ObjectRef, Store};
use kube_runtime::{watcher, WatchStreamExt};
use kube_sd::{
    meta_namespace_key, split_meta_namespace_key, DiscoveryError, Informer, ObjectStore,
    ResourceEventHandler,
};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Key lookups over the reflector's store.
#[derive(Clone)]
pub struct NodeStore {
    reader: Store<DynamicObject>,
    resource: ApiResource,
}

impl NodeStore {
    fn cached(&self, obj: &DynamicObject) -> Option<Arc<DynamicObject>> {
        self.reader.get(&ObjectRef::from_obj_with(obj, self.resource.clone()))
    }

    fn snapshot(&self) -> HashMap<String, Arc<DynamicObject>> {
        self.reader
            .state()
            .into_iter()
            .filter_map(|obj| key_of(&obj).map(|key| (key, obj)))
            .collect()
    }
}

impl ObjectStore for NodeStore {
    fn get_by_key(&self, key: &str) -> Result<Option<Arc<DynamicObject>>, DiscoveryError> {
        let (namespace, name) = split_meta_namespace_key(key)?;
        let mut obj_ref = ObjectRef::new_with(name, self.resource.clone());
        if let Some(ns) = namespace {
            obj_ref = obj_ref.within(ns);
        }
        Ok(self.reader.get(&obj_ref))
    }
}

/// A change to deliver to handlers once the store reflects it.
enum Change {
    Added(Arc<DynamicObject>),
    Updated(Arc<DynamicObject>, Arc<DynamicObject>),
    Deleted(Arc<DynamicObject>),
}

/// Reader side of the reflector plus the subscribed handlers.
pub struct NodeMirror {
    store: Arc<NodeStore>,
    handlers: RwLock<Vec<Arc<dyn ResourceEventHandler>>>,
}

impl NodeMirror {
    /// Creates a mirror reading the store `writer` maintains.
    pub fn new(writer: &Writer<DynamicObject>, resource: ApiResource) -> Self {
        Self {
            store: Arc::new(NodeStore {
                reader: writer.as_reader(),
                resource,
            }),
            handlers: RwLock::new(Vec::new()),
        }
    }

    /// Applies one watch event through `writer`, then notifies handlers.
    pub fn handle(
        &self,
        writer: &mut Writer<DynamicObject>,
        event: watcher::Event<DynamicObject>,
    ) {
        let changes = match &event {
            watcher::Event::Init => {
                debug!("Node list started");
                writer.apply_watcher_event(&event);
                Vec::new()
            }
            watcher::Event::InitApply(_) => {
                writer.apply_watcher_event(&event);
                Vec::new()
            }
            watcher::Event::InitDone => {
                let previous = self.store.snapshot();
                writer.apply_watcher_event(&event);
                self.relist(previous)
            }
            watcher::Event::Apply(obj) => {
                let old = self.store.cached(obj);
                writer.apply_watcher_event(&event);
                let new = Arc::new(obj.clone());
                match old {
                    Some(old) => vec![Change::Updated(old, new)],
                    None => vec![Change::Added(new)],
                }
            }
            watcher::Event::Delete(obj) => {
                let old = self.store.cached(obj);
                writer.apply_watcher_event(&event);
                // The object sent with the delete is the final state
                old.map(|_| Change::Deleted(Arc::new(obj.clone())))
                    .into_iter()
                    .collect()
            }
        };

        self.dispatch(&changes);
    }

    fn relist(&self, mut previous: HashMap<String, Arc<DynamicObject>>) -> Vec<Change> {
        let listed = self.store.snapshot();
        info!(nodes = listed.len(), "Node list mirrored");

        let mut changes = Vec::with_capacity(listed.len());
        for (key, new) in listed {
            changes.push(match previous.remove(&key) {
                Some(old) => Change::Updated(old, new),
                None => Change::Added(new),
            });
        }
        changes.extend(previous.into_values().map(Change::Deleted));
        changes
    }

    fn dispatch(&self, changes: &[Change]) {
        if changes.is_empty() {
            return;
        }
        let handlers = match self.handlers.read() {
            Ok(handlers) => handlers.clone(),
            Err(e) => {
                warn!(error = %e, "Node handler list unavailable");
                return;
            }
        };
        for change in changes {
            for handler in &handlers {
                match change {
                    Change::Added(obj) => handler.on_add(obj),
                    Change::Updated(old, new) => handler.on_update(old, new),
                    Change::Deleted(obj) => handler.on_delete(obj),
                }
            }
        }
    }
}

fn key_of(obj: &DynamicObject) -> Option<String> {
    match meta_namespace_key(obj) {
        Ok(key) => Some(key),
        Err(e) => {
            debug!(error = %e, "Ignoring node without a key");
            None
        }
    }
}

#[async_trait]
impl Informer for NodeMirror {
    fn store(&self) -> Arc<dyn ObjectStore> {
        self.store.clone()
    }

    fn add_event_handler(
        &self,
        handler: Arc<dyn ResourceEventHandler>,
    ) -> Result<(), DiscoveryError> {
        self.handlers
            .write()
            .map_err(|e| DiscoveryError::HandlerRegistration(e.to_string()))?
            .push(handler);
        Ok(())
    }

    async fn wait_until_synced(&self) -> bool {
        self.store.reader.wait_until_ready().await.is_ok()
    }
}

/// Node cache fed by a kube watch stream.
pub struct KubeInformer {
    api: Api<DynamicObject>,
    config: watcher::Config,
    writer: Mutex<Writer<DynamicObject>>,
    mirror: NodeMirror,
}

impl KubeInformer {
    /// Creates an informer over `api`. Nothing is watched until [`KubeInformer::run`].
    pub fn new(api: Api<DynamicObject>, config: watcher::Config) -> Self {
        let writer = Writer::new(Self::node_resource());
        let mirror = NodeMirror::new(&writer, Self::node_resource());
        Self {
            api,
            config,
            writer: Mutex::new(writer),
            mirror,
        }
    }

    /// The resource this informer watches, for `Api::all_with`.
    pub fn node_resource() -> ApiResource {
        ApiResource::erase::<Node>(&())
    }

    /// Watches until `cancel` fires or the stream ends.
    ///
    /// Stream errors are logged; the watch backs off and resumes on its own.
    pub async fn run(&self, cancel: CancellationToken) -> Result<(), ControllerError> {
        let mut writer = self.writer.try_lock().map_err(|_| {
            ControllerError::Task("node watcher is already running".to_string())
        })?;
        info!("Starting node watcher");

        let stream = watcher(self.api.clone(), self.config.clone()).default_backoff();
        let mut stream = std::pin::pin!(stream);

        loop {
            let event = tokio::select! {
                () = cancel.cancelled() => break,
                event = stream.next() => event,
            };
            match event {
                Some(Ok(event)) => self.mirror.handle(&mut writer, event),
                Some(Err(e)) => warn!(error = %e, "Node watch stream error"),
                None => {
                    warn!("Node watch stream ended");
                    break;
                }
            }
        }

        info!("Node watcher stopped");
        Ok(())
    }
}

#[async_trait]
impl Informer for KubeInformer {
    fn store(&self) -> Arc<dyn ObjectStore> {
        self.mirror.store()
    }

    fn add_event_handler(
        &self,
        handler: Arc<dyn ResourceEventHandler>,
    ) -> Result<(), DiscoveryError> {
        self.mirror.add_event_handler(handler)
    }

    async fn wait_until_synced(&self) -> bool {
        self.mirror.wait_until_synced().await
    }
}
