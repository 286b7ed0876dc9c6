//! Node discovery errors.
//!
//! Every variant except [`DiscoveryError::Metrics`] is local and recoverable:
//! the reconciliation loop logs it, acknowledges the work item and moves on.

use thiserror::Error;

/// Errors that can occur while discovering nodes.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// The initial cache list never completed before cancellation
    #[error("node informer unable to sync cache")]
    CacheSync,

    /// A work queue key was not `name` or `namespace/name`
    #[error("unexpected key format: {0:?}")]
    KeyParse(String),

    /// An object without a name cannot be given a queue key
    #[error("object has no name")]
    MissingName,

    /// The cache store could not be read
    #[error("cache store lookup failed: {0}")]
    StoreLookup(String),

    /// A cached object does not have the shape of a Node
    #[error("received unexpected object: {0}")]
    Conversion(String),

    /// A node reports no address of a known type
    #[error("host address unknown: {0}")]
    NoAddressFound(String),

    /// Event counters could not be registered
    #[error("metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    /// JSON round trip of a cached object failed
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// An event handler could not be attached to the informer
    #[error("event handler registration failed: {0}")]
    HandlerRegistration(String),
}
