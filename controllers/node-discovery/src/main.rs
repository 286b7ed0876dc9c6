//! Node Discovery Controller
//!
//! Watches the cluster's nodes and turns them into scrape target groups:
//! one group per node, addressed at its kubelet, labelled with its
//! metadata. Groups are logged as they change.

mod config;
mod controller;
mod error;
mod informer;

use crate::config::Config;
use crate::error::ControllerError;
use controller::Controller;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), ControllerError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    // kube's rustls transport needs a process-wide crypto provider
    if rustls::crypto::ring::default_provider().install_default().is_err() {
        info!("rustls crypto provider already installed");
    }

    info!("Starting Node Discovery Controller");

    let config = Config::from_env()?;

    info!("Configuration:");
    info!("  Label selector: {}", config.label_selector.as_deref().unwrap_or("<none>"));
    info!("  Field selector: {}", config.field_selector.as_deref().unwrap_or("<none>"));
    info!("  Output buffer: {}", config.output_buffer);

    // Initialize and run controller
    let controller = Controller::new(config).await?;
    controller.run().await?;

    Ok(())
}
