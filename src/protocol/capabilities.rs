//! Capability sets advertised during the hello exchange.
//!
//! A NETCONF peer declares supported protocol features and models as
//! capability identifier URIs in its opening message. The push engine
//! only ever asks one question of a negotiated set: is it a superset of
//! the capabilities a snapshot requires? The delta is the diagnostic
//! surface when the answer stays no until the polling deadline.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Base NETCONF capability every client advertises.
pub const BASE_CAPABILITY: &str = "urn:ietf:params:netconf:base:1.0";

/// Ordered set of capability identifier URIs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CapabilitySet(BTreeSet<String>);

impl CapabilitySet {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create the default client set: just the base capability.
    pub fn base() -> Self {
        Self::new().with(BASE_CAPABILITY)
    }

    /// Add a capability, builder-style.
    pub fn with(mut self, uri: impl Into<String>) -> Self {
        self.0.insert(uri.into());
        self
    }

    /// Add a capability.
    pub fn insert(&mut self, uri: impl Into<String>) {
        self.0.insert(uri.into());
    }

    /// Check membership.
    pub fn contains(&self, uri: &str) -> bool {
        self.0.contains(uri)
    }

    /// Whether every capability in `required` is present here.
    pub fn contains_all(&self, required: &CapabilitySet) -> bool {
        required.0.is_subset(&self.0)
    }

    /// Capabilities in `self` that `observed` lacks (`self − observed`).
    pub fn missing_in(&self, observed: &CapabilitySet) -> CapabilitySet {
        CapabilitySet(self.0.difference(&observed.0).cloned().collect())
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of capabilities.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Iterate over capability URIs in sorted order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl FromIterator<String> for CapabilitySet {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'a> FromIterator<&'a str> for CapabilitySet {
    fn from_iter<I: IntoIterator<Item = &'a str>>(iter: I) -> Self {
        Self(iter.into_iter().map(str::to_string).collect())
    }
}

impl fmt::Display for CapabilitySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, uri) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{uri}")?;
        }
        write!(f, "}}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_superset_test() {
        let observed: CapabilitySet = ["urn:a", "urn:b", "urn:c"].into_iter().collect();
        let required: CapabilitySet = ["urn:a", "urn:c"].into_iter().collect();
        assert!(observed.contains_all(&required));
        assert!(!required.contains_all(&observed));
    }

    #[test]
    fn test_empty_required_always_satisfied() {
        let observed: CapabilitySet = ["urn:a"].into_iter().collect();
        assert!(observed.contains_all(&CapabilitySet::new()));
        assert!(CapabilitySet::new().contains_all(&CapabilitySet::new()));
    }

    #[test]
    fn test_missing_diff() {
        let expected: CapabilitySet = ["urn:x", "urn:y"].into_iter().collect();
        let observed: CapabilitySet = ["urn:y", "urn:z"].into_iter().collect();
        let missing = expected.missing_in(&observed);
        assert_eq!(missing, ["urn:x"].into_iter().collect());
    }

    #[test]
    fn test_display_sorted() {
        let caps: CapabilitySet = ["urn:b", "urn:a"].into_iter().collect();
        assert_eq!(caps.to_string(), "{urn:a, urn:b}");
    }

    #[test]
    fn test_base_set() {
        let caps = CapabilitySet::base();
        assert!(caps.contains(BASE_CAPABILITY));
        assert_eq!(caps.len(), 1);
    }
}
