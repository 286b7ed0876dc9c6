//! Interface to the resource cache.
//!
//! The cache mirrors cluster state locally and tells interested parties when
//! it changes. Discovery only needs three things from it: a readiness
//! signal, a store readable by key, and change notifications.

use crate::error::DiscoveryError;
use async_trait::async_trait;
use kube::core::DynamicObject;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Read access to the objects mirrored by a cache.
///
/// Implementations must be safe to read while the cache is being updated.
pub trait ObjectStore: Send + Sync {
    /// Returns the object stored under `key`, or `None` if it is absent.
    ///
    /// # Errors
    ///
    /// Returns [`DiscoveryError::StoreLookup`] if the store cannot be read.
    fn get_by_key(&self, key: &str) -> Result<Option<Arc<DynamicObject>>, DiscoveryError>;
}

/// Callbacks invoked by a cache when a mirrored object changes.
///
/// Called from the cache's own task, concurrently with readers of the store.
pub trait ResourceEventHandler: Send + Sync {
    /// An object appeared in the cache.
    fn on_add(&self, obj: &DynamicObject);

    /// A cached object changed.
    fn on_update(&self, old: &DynamicObject, new: &DynamicObject);

    /// An object left the cache. `obj` is its last known state.
    fn on_delete(&self, obj: &DynamicObject);
}

/// A cache of cluster objects with change notifications.
#[async_trait]
pub trait Informer: Send + Sync {
    /// Returns the store the cache keeps up to date.
    fn store(&self) -> Arc<dyn ObjectStore>;

    /// Subscribes `handler` to change notifications.
    ///
    /// # Errors
    ///
    /// Returns [`DiscoveryError::HandlerRegistration`] if the cache no longer
    /// accepts handlers.
    fn add_event_handler(
        &self,
        handler: Arc<dyn ResourceEventHandler>,
    ) -> Result<(), DiscoveryError>;

    /// Resolves once the initial list has been mirrored into the store.
    ///
    /// Returns false if the cache stopped before it could sync.
    async fn wait_until_synced(&self) -> bool;
}

/// Waits until `informer` has synced or `cancel` fires.
///
/// Returns false if cancelled first, or if the informer went away before
/// syncing.
pub async fn wait_for_cache_sync(informer: &dyn Informer, cancel: &CancellationToken) -> bool {
    tokio::select! {
        biased;
        () = cancel.cancelled() => false,
        synced = informer.wait_until_synced() => synced,
    }
}

/// Returns the queue key of `obj`: `namespace/name`, or just `name` for
/// cluster-scoped objects.
///
/// # Errors
///
/// Returns [`DiscoveryError::MissingName`] if the object has no name.
pub fn meta_namespace_key(obj: &DynamicObject) -> Result<String, DiscoveryError> {
    let name = obj
        .metadata
        .name
        .as_deref()
        .filter(|name| !name.is_empty())
        .ok_or(DiscoveryError::MissingName)?;

    match obj.metadata.namespace.as_deref() {
        Some(ns) if !ns.is_empty() => Ok(format!("{ns}/{name}")),
        _ => Ok(name.to_string()),
    }
}

/// Splits a queue key into its namespace (if any) and name.
///
/// # Errors
///
/// Returns [`DiscoveryError::KeyParse`] if the key has more than one `/`.
pub fn split_meta_namespace_key(key: &str) -> Result<(Option<&str>, &str), DiscoveryError> {
    let mut parts = key.split('/');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(name), None, None) => Ok((None, name)),
        (Some(ns), Some(name), None) => Ok((Some(ns), name)),
        _ => Err(DiscoveryError::KeyParse(key.to_string())),
    }
}
