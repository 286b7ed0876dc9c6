//! Label naming conventions shared by every Kubernetes resource role.
//!
//! Object metadata is expanded into meta labels the same way for nodes,
//! pods, services and the rest: every label and annotation produces one
//! entry carrying its value and one `...present_` entry set to `true`.

use crate::target_group::LabelSet;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use std::fmt;

/// Prefix of every discovery meta label.
pub const META_LABEL_PREFIX: &str = "__meta_kubernetes_";

/// Label holding the `host:port` a target is scraped at.
pub const ADDRESS_LABEL: &str = "__address__";

/// Label identifying the scraped instance.
pub const INSTANCE_LABEL: &str = "instance";

/// Value of every `...present_` label.
pub const PRESENT_VALUE: &str = "true";

/// Kind of Kubernetes resource a discoverer targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// Cluster nodes
    Node,
    /// Pods
    Pod,
    /// Services
    Service,
    /// Endpoints
    Endpoints,
    /// EndpointSlices
    EndpointSlice,
    /// Ingresses
    Ingress,
}

impl Role {
    /// Returns the lowercase role name used in label names and metrics.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Node => "node",
            Role::Pod => "pod",
            Role::Service => "service",
            Role::Endpoints => "endpoints",
            Role::EndpointSlice => "endpointslice",
            Role::Ingress => "ingress",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Replaces every character outside `[a-zA-Z0-9_]` with `_`.
#[must_use]
pub fn sanitize_label_name(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect()
}

/// Adds the name, label and annotation meta labels of `meta` to `labels`.
///
/// Keys that collide after sanitization keep the value of the key that
/// sorts last.
pub fn add_object_meta_labels(labels: &mut LabelSet, meta: &ObjectMeta, role: Role) {
    let prefix = format!("{META_LABEL_PREFIX}{role}");

    labels.insert(
        format!("{prefix}_name"),
        meta.name.clone().unwrap_or_default(),
    );

    for (key, value) in meta.labels.iter().flatten() {
        let name = sanitize_label_name(key);
        labels.insert(format!("{prefix}_label_{name}"), value.clone());
        labels.insert(
            format!("{prefix}_labelpresent_{name}"),
            PRESENT_VALUE.to_string(),
        );
    }

    for (key, value) in meta.annotations.iter().flatten() {
        let name = sanitize_label_name(key);
        labels.insert(format!("{prefix}_annotation_{name}"), value.clone());
        labels.insert(
            format!("{prefix}_annotationpresent_{name}"),
            PRESENT_VALUE.to_string(),
        );
    }
}
