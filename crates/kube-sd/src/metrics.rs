//! Event counters.
//!
//! One counter vector per registry, labelled by role and event kind. Each
//! discoverer receives its three counters by value instead of reaching for
//! a process-wide static.

use crate::error::DiscoveryError;
use crate::labels::Role;
use prometheus::{IntCounter, IntCounterVec, Opts, Registry};

const EVENTS_METRIC: &str = "prometheus_sd_kubernetes_events_total";
const EVENTS_HELP: &str = "The number of Kubernetes events handled.";

/// The `prometheus_sd_kubernetes_events_total` vector, registered once per registry.
#[derive(Debug, Clone)]
pub struct EventMetrics {
    events: IntCounterVec,
}

impl EventMetrics {
    /// Creates the event counter vector and registers it on `registry`.
    ///
    /// # Errors
    ///
    /// Returns [`DiscoveryError::Metrics`] if the vector is already
    /// registered on `registry`.
    pub fn register(registry: &Registry) -> Result<Self, DiscoveryError> {
        let events = IntCounterVec::new(Opts::new(EVENTS_METRIC, EVENTS_HELP), &["role", "event"])?;
        registry.register(Box::new(events.clone()))?;
        Ok(Self { events })
    }

    /// Returns the add/update/delete counters for `role`.
    #[must_use]
    pub fn counters(&self, role: Role) -> EventCounters {
        EventCounters {
            add: self.events.with_label_values(&[role.as_str(), "add"]),
            update: self.events.with_label_values(&[role.as_str(), "update"]),
            delete: self.events.with_label_values(&[role.as_str(), "delete"]),
        }
    }
}

/// Counters incremented as cache notifications arrive.
#[derive(Debug, Clone)]
pub struct EventCounters {
    /// Add notifications received
    pub add: IntCounter,
    /// Update notifications received
    pub update: IntCounter,
    /// Delete notifications received
    pub delete: IntCounter,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_are_labelled_by_role_and_event() {
        let registry = Registry::new();
        let metrics = EventMetrics::register(&registry).unwrap();
        let counters = metrics.counters(Role::Node);

        counters.add.inc();
        counters.add.inc();
        counters.delete.inc();

        assert_eq!(counters.add.get(), 2);
        assert_eq!(counters.update.get(), 0);
        assert_eq!(counters.delete.get(), 1);
        // One family, three series
        assert_eq!(registry.gather().len(), 1);
    }

    #[test]
    fn test_counters_for_same_role_share_series() {
        let registry = Registry::new();
        let metrics = EventMetrics::register(&registry).unwrap();
        metrics.counters(Role::Node).update.inc();
        metrics.counters(Role::Node).update.inc();
        assert_eq!(metrics.counters(Role::Node).update.get(), 2);
        assert_eq!(metrics.counters(Role::Pod).update.get(), 0);
    }

    #[test]
    fn test_double_registration_fails() {
        let registry = Registry::new();
        EventMetrics::register(&registry).unwrap();
        assert!(matches!(
            EventMetrics::register(&registry),
            Err(DiscoveryError::Metrics(_))
        ));
    }
}
