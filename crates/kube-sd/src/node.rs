//! Node target groups.
//!
//! Builds the target group for a single node: group labels from its
//! provider ID and metadata, and one target at `<address>:<kubelet port>`
//! carrying one label per address type the node reports.

use crate::address::{join_host_port, resolve_node_address};
use crate::error::DiscoveryError;
use crate::labels::{
    add_object_meta_labels, sanitize_label_name, Role, ADDRESS_LABEL, INSTANCE_LABEL,
    META_LABEL_PREFIX,
};
use crate::target_group::{LabelSet, TargetGroup};
use k8s_openapi::api::core::v1::Node;
use k8s_openapi::Resource;
use kube::core::DynamicObject;
use tracing::warn;

/// Converts a cached object into a Node.
///
/// # Errors
///
/// Returns [`DiscoveryError::Conversion`] if the object declares a kind other
/// than `Node`, and [`DiscoveryError::Serialization`] if its body does not
/// deserialize as one.
pub fn convert_to_node(obj: &DynamicObject) -> Result<Node, DiscoveryError> {
    if let Some(types) = &obj.types {
        if types.kind != Node::KIND {
            return Err(DiscoveryError::Conversion(format!(
                "expected {}, got {} {}",
                Node::KIND,
                types.api_version,
                types.kind
            )));
        }
    }

    let mut value = serde_json::to_value(obj)?;
    if let Some(fields) = value.as_object_mut() {
        fields
            .entry("apiVersion")
            .or_insert_with(|| Node::API_VERSION.into());
        fields.entry("kind").or_insert_with(|| Node::KIND.into());
    }
    Ok(serde_json::from_value(value)?)
}

/// Source identifier of the group for the node named `name`.
#[must_use]
pub fn node_source_from_name(name: &str) -> String {
    format!("node/{name}")
}

/// Source identifier of the group for `node`.
#[must_use]
pub fn node_source(node: &Node) -> String {
    node_source_from_name(node.metadata.name.as_deref().unwrap_or_default())
}

fn node_provider_id_label() -> String {
    format!("{META_LABEL_PREFIX}node_provider_id")
}

fn node_address_label(address_type: &str) -> String {
    sanitize_label_name(&format!("{META_LABEL_PREFIX}node_address_{address_type}"))
}

fn node_labels(node: &Node) -> LabelSet {
    let mut labels = LabelSet::new();

    let provider_id = node
        .spec
        .as_ref()
        .and_then(|spec| spec.provider_id.clone())
        .unwrap_or_default();
    labels.insert(node_provider_id_label(), provider_id);

    add_object_meta_labels(&mut labels, &node.metadata, Role::Node);

    labels
}

fn kubelet_port(node: &Node) -> i32 {
    node.status
        .as_ref()
        .and_then(|status| status.daemon_endpoints.as_ref())
        .and_then(|endpoints| endpoints.kubelet_endpoint.as_ref())
        .map_or(0, |endpoint| endpoint.port)
}

/// Builds the target group for `node`.
///
/// Returns `None` if the node has no address of a known type. That is not a
/// deletion: nothing should be sent for the node on this pass.
#[must_use]
pub fn build_node(node: &Node) -> Option<TargetGroup> {
    let name = node.metadata.name.as_deref().unwrap_or_default();

    let addresses = node
        .status
        .as_ref()
        .and_then(|status| status.addresses.as_deref())
        .unwrap_or_default();

    let resolved = match resolve_node_address(addresses) {
        Ok(resolved) => resolved,
        Err(e) => {
            warn!(node = %name, error = %e, "No node address found");
            return None;
        }
    };

    let mut target = LabelSet::new();
    target.insert(
        ADDRESS_LABEL.to_string(),
        join_host_port(&resolved.primary, kubelet_port(node)),
    );
    target.insert(INSTANCE_LABEL.to_string(), name.to_string());

    for (address_type, values) in &resolved.by_type {
        if let Some(first) = values.first() {
            target.insert(node_address_label(address_type), first.clone());
        }
    }

    Some(TargetGroup {
        targets: vec![target],
        labels: node_labels(node),
        source: node_source(node),
    })
}
