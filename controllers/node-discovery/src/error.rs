//! Controller-specific error types.
//!
//! This module defines error types specific to the node discovery controller
//! that are not covered by upstream library errors.

use kube::Error as KubeError;
use kube_sd::DiscoveryError;
use thiserror::Error;

/// Errors that can occur in the node discovery controller.
#[derive(Debug, Error)]
pub enum ControllerError {
    /// Kubernetes API error
    #[error("Kubernetes error: {0}")]
    Kube(#[from] KubeError),

    /// Discovery error
    #[error("Discovery error: {0}")]
    Discovery(#[from] DiscoveryError),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A background task panicked or was aborted
    #[error("Task failed: {0}")]
    Task(String),
}
