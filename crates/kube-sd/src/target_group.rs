//! Target groups emitted by discovery.

use serde::Serialize;
use std::collections::BTreeMap;

/// Label name to label value. Ordered so groups compare and print
/// deterministically.
pub type LabelSet = BTreeMap<String, String>;

/// A set of targets sharing a common label set, identified by `source`.
///
/// A group with no targets and no labels is a tombstone: the consumer drops
/// everything previously reported for that source.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TargetGroup {
    /// Targets, each identified within the group by its `__address__` label
    pub targets: Vec<LabelSet>,
    /// Labels common to every target in the group
    pub labels: LabelSet,
    /// Stable identifier of the group, e.g. `node/worker-1`
    pub source: String,
}

impl TargetGroup {
    /// Creates an empty group for `source` with no labels or targets.
    #[must_use]
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            ..Default::default()
        }
    }

    /// Creates the removal marker for `source`.
    #[must_use]
    pub fn tombstone(source: impl Into<String>) -> Self {
        Self::new(source)
    }

    /// Returns true if this group signals that its source is gone.
    #[must_use]
    pub fn is_tombstone(&self) -> bool {
        self.targets.is_empty() && self.labels.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tombstone_has_only_source() {
        let tg = TargetGroup::tombstone("node/n1");
        assert_eq!(tg.source, "node/n1");
        assert!(tg.labels.is_empty());
        assert!(tg.targets.is_empty());
        assert!(tg.is_tombstone());
    }

    #[test]
    fn test_group_with_target_is_not_tombstone() {
        let mut tg = TargetGroup::new("node/n1");
        let mut target = LabelSet::new();
        target.insert("__address__".to_string(), "10.0.0.5:10250".to_string());
        tg.targets.push(target);
        assert!(!tg.is_tombstone());
    }

    #[test]
    fn test_serializes_with_stable_label_order() {
        let mut tg = TargetGroup::new("node/n1");
        tg.labels.insert("b".to_string(), "2".to_string());
        tg.labels.insert("a".to_string(), "1".to_string());
        let json = serde_json::to_string(&tg).unwrap();
        assert_eq!(
            json,
            r#"{"targets":[],"labels":{"a":"1","b":"2"},"source":"node/n1"}"#
        );
    }
}
