//! Main controller implementation.
//!
//! This module contains the `Controller` struct that wires the kube-backed
//! node cache into node discovery and consumes the resulting target groups.

use crate::config::Config;
use crate::error::ControllerError;
use crate::informer::KubeInformer;
use kube::api::{Api, DynamicObject};
use kube::Client;
use kube_runtime::watcher;
use kube_sd::{Discoverer, EventMetrics, Informer, NodeDiscovery, Role, TargetGroup};
use prometheus::Registry;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Main controller for node discovery.
pub struct Controller {
    informer: Arc<KubeInformer>,
    discovery: NodeDiscovery,
    registry: Registry,
    output_buffer: usize,
}

impl Controller {
    /// Creates a new controller instance.
    pub async fn new(config: Config) -> Result<Self, ControllerError> {
        info!("Initializing node discovery controller");

        let client = Client::try_default().await?;
        let api: Api<DynamicObject> = Api::all_with(client, &KubeInformer::node_resource());

        let mut watch_config = watcher::Config::default();
        if let Some(labels) = &config.label_selector {
            watch_config = watch_config.labels(labels);
        }
        if let Some(fields) = &config.field_selector {
            watch_config = watch_config.fields(fields);
        }

        let registry = Registry::new();
        let metrics = EventMetrics::register(&registry)?;

        let informer = Arc::new(KubeInformer::new(api, watch_config));
        let discovery = NodeDiscovery::new(
            Arc::clone(&informer) as Arc<dyn Informer>,
            metrics.counters(Role::Node),
        );

        Ok(Self {
            informer,
            discovery,
            registry,
            output_buffer: config.output_buffer,
        })
    }

    /// Runs the controller until a shutdown signal arrives.
    pub async fn run(self) -> Result<(), ControllerError> {
        info!("Node discovery controller running");

        let cancel = CancellationToken::new();
        let (tx, mut rx) = mpsc::channel(self.output_buffer);

        let informer_task = {
            let informer = Arc::clone(&self.informer);
            let cancel = cancel.clone();
            tokio::spawn(async move { informer.run(cancel).await })
        };

        let discovery = self.discovery;
        let discovery_task = {
            let cancel = cancel.clone();
            tokio::spawn(async move { discovery.run(cancel, tx).await })
        };

        tokio::select! {
            () = shutdown_signal() => info!("Shutdown signal received"),
            () = consume(&mut rx) => info!("Target group channel closed"),
        }
        cancel.cancel();

        let discovery_result = discovery_task
            .await
            .map_err(|e| ControllerError::Task(format!("node discovery: {e}")))?;
        let informer_result = informer_task
            .await
            .map_err(|e| ControllerError::Task(format!("node watcher: {e}")))?;

        log_event_totals(&self.registry);

        discovery_result?;
        informer_result
    }
}

async fn consume(rx: &mut mpsc::Receiver<Vec<TargetGroup>>) {
    while let Some(groups) = rx.recv().await {
        for group in groups {
            log_group(&group);
        }
    }
}

fn log_group(group: &TargetGroup) {
    if group.is_tombstone() {
        info!(source = %group.source, "Target group removed");
        return;
    }
    let address = group
        .targets
        .first()
        .and_then(|target| target.get(kube_sd::labels::ADDRESS_LABEL))
        .map_or("", String::as_str);
    info!(source = %group.source, address = %address, "Target group updated");
    match serde_json::to_string(group) {
        Ok(json) => debug!(group = %json, "Target group"),
        Err(e) => error!(source = %group.source, error = %e, "Failed to encode target group"),
    }
}

fn log_event_totals(registry: &Registry) {
    for family in registry.gather() {
        debug!(metric = ?family, "Event totals");
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}
