//! Node address resolution.
//!
//! A node may report any number of addresses of overlapping types. One of
//! them is picked as the scrape address, by type priority:
//!
//! 1. `InternalIP`
//! 2. `InternalDNS`
//! 3. `ExternalIP`
//! 4. `ExternalDNS`
//! 5. `LegacyHostIP`
//! 6. `Hostname`
//!
//! Within a type, the first address in the node's list wins.

use crate::error::DiscoveryError;
use k8s_openapi::api::core::v1::NodeAddress;
use std::collections::BTreeMap;

/// Address type reported by pre-1.0 kubelets.
pub const NODE_LEGACY_HOST_IP: &str = "LegacyHostIP";

/// Address types in resolution order.
pub const ADDRESS_TYPE_PRIORITY: [&str; 6] = [
    "InternalIP",
    "InternalDNS",
    "ExternalIP",
    "ExternalDNS",
    NODE_LEGACY_HOST_IP,
    "Hostname",
];

/// Address type to every address of that type, in source order.
pub type AddressMap = BTreeMap<String, Vec<String>>;

/// Result of a successful resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedAddress {
    /// The address to scrape
    pub primary: String,
    /// All addresses grouped by type, including types outside the priority list
    pub by_type: AddressMap,
}

/// Picks the scrape address of a node from its reported addresses.
///
/// # Errors
///
/// Returns [`DiscoveryError::NoAddressFound`] when no address has a type from
/// [`ADDRESS_TYPE_PRIORITY`], including when the list is empty.
pub fn resolve_node_address(addresses: &[NodeAddress]) -> Result<ResolvedAddress, DiscoveryError> {
    let mut by_type = AddressMap::new();
    for a in addresses {
        by_type
            .entry(a.type_.clone())
            .or_default()
            .push(a.address.clone());
    }

    let primary = ADDRESS_TYPE_PRIORITY
        .iter()
        .find_map(|ty| by_type.get(*ty).and_then(|values| values.first()))
        .cloned();

    match primary {
        Some(primary) => Ok(ResolvedAddress { primary, by_type }),
        None => Err(DiscoveryError::NoAddressFound(format!(
            "{} addresses, none of a known type",
            addresses.len()
        ))),
    }
}

/// Joins a host and port, bracketing IPv6 literals.
#[must_use]
pub fn join_host_port(host: &str, port: i32) -> String {
    if host.contains(':') {
        format!("[{host}]:{port}")
    } else {
        format!("{host}:{port}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(ty: &str, address: &str) -> NodeAddress {
        NodeAddress {
            address: address.to_string(),
            type_: ty.to_string(),
        }
    }

    #[test]
    fn test_internal_ip_wins_regardless_of_order() {
        let addresses = vec![
            addr("Hostname", "node-1"),
            addr("ExternalIP", "203.0.113.7"),
            addr("ExternalDNS", "node-1.example.com"),
            addr("InternalIP", "10.0.0.5"),
            addr("InternalDNS", "node-1.internal"),
        ];
        let resolved = resolve_node_address(&addresses).unwrap();
        assert_eq!(resolved.primary, "10.0.0.5");
        assert_eq!(resolved.by_type.len(), 5);
    }

    #[test]
    fn test_priority_is_a_total_order() {
        let all = [
            addr("InternalIP", "10.0.0.1"),
            addr("InternalDNS", "internal.dns"),
            addr("ExternalIP", "203.0.113.1"),
            addr("ExternalDNS", "external.dns"),
            addr(NODE_LEGACY_HOST_IP, "192.0.2.1"),
            addr("Hostname", "host"),
        ];

        // Dropping the highest-priority entries one at a time promotes the next one
        for skip in 0..all.len() {
            let mut remaining: Vec<NodeAddress> = all[skip..].to_vec();
            remaining.reverse();
            let resolved = resolve_node_address(&remaining).unwrap();
            assert_eq!(resolved.primary, all[skip].address);
        }
    }

    #[test]
    fn test_first_value_within_type_wins() {
        let addresses = vec![
            addr("InternalIP", "10.0.0.7"),
            addr("InternalIP", "10.0.0.5"),
        ];
        let resolved = resolve_node_address(&addresses).unwrap();
        assert_eq!(resolved.primary, "10.0.0.7");
        assert_eq!(
            resolved.by_type["InternalIP"],
            vec!["10.0.0.7".to_string(), "10.0.0.5".to_string()]
        );
    }

    #[test]
    fn test_external_dns_only() {
        let resolved = resolve_node_address(&[addr("ExternalDNS", "ext.example.com")]).unwrap();
        assert_eq!(resolved.primary, "ext.example.com");
    }

    #[test]
    fn test_empty_list_fails() {
        let err = resolve_node_address(&[]).unwrap_err();
        assert!(matches!(err, DiscoveryError::NoAddressFound(_)));
    }

    #[test]
    fn test_unknown_types_fail() {
        let err = resolve_node_address(&[addr("Bogus", "1.2.3.4"), addr("internalip", "10.0.0.1")])
            .unwrap_err();
        assert!(matches!(err, DiscoveryError::NoAddressFound(_)));
    }

    #[test]
    fn test_unknown_types_kept_in_map() {
        let resolved =
            resolve_node_address(&[addr("Bogus", "1.2.3.4"), addr("Hostname", "h")]).unwrap();
        assert_eq!(resolved.primary, "h");
        assert_eq!(resolved.by_type["Bogus"], vec!["1.2.3.4".to_string()]);
    }

    #[test]
    fn test_join_host_port() {
        assert_eq!(join_host_port("10.0.0.5", 10250), "10.0.0.5:10250");
        assert_eq!(join_host_port("node.example.com", 0), "node.example.com:0");
        assert_eq!(join_host_port("fd00::1", 10250), "[fd00::1]:10250");
    }
}
