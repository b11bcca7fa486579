//! Configuration snapshot inputs.
//!
//! Snapshots are supplied by an external persister in a fixed total
//! order that determines push order. The engine only ever reads them.

use std::fmt;

use crate::protocol::CapabilitySet;

/// Source of one configuration snapshot.
///
/// Implementations are expected to be cheap to re-read: the engine
/// re-reads the snapshot body on every retry attempt.
pub trait ConfigSnapshotHolder: Send + Sync {
    /// Raw XML body of the configuration snapshot.
    fn config_snapshot(&self) -> &str;

    /// Capabilities the server must advertise before this snapshot may
    /// be pushed.
    fn required_capabilities(&self) -> &CapabilitySet;

    /// Identity used as the result-map key and in diagnostics.
    fn name(&self) -> &str;
}

/// In-memory snapshot value.
#[derive(Debug, Clone)]
pub struct ConfigSnapshot {
    name: String,
    xml: String,
    required_capabilities: CapabilitySet,
}

impl ConfigSnapshot {
    /// Create a snapshot with a diagnostic name, XML body and required
    /// capability set.
    pub fn new(
        name: impl Into<String>,
        xml: impl Into<String>,
        required_capabilities: CapabilitySet,
    ) -> Self {
        Self {
            name: name.into(),
            xml: xml.into(),
            required_capabilities,
        }
    }
}

impl ConfigSnapshotHolder for ConfigSnapshot {
    fn config_snapshot(&self) -> &str {
        &self.xml
    }

    fn required_capabilities(&self) -> &CapabilitySet {
        &self.required_capabilities
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for ConfigSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}
