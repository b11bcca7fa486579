//! Configuration management.
//!
//! Supports configuration from:
//! - TOML config files
//! - Environment variables (`CONFSYNC_*`)
//! - Built-in defaults matching the controller's stock deployment
//!
//! Every retry and deadline policy of the push engine is a knob here
//! rather than a constant at the call site: the right values are
//! deployment-specific.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ConfsyncError, Result};

/// Default NETCONF server address.
pub const DEFAULT_ADDRESS: &str = "127.0.0.1:830";

/// Push engine and session configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PusherConfig {
    /// NETCONF server address to push configuration to.
    pub address: SocketAddr,

    /// Per-connection timeout for transport connect and hello exchange.
    pub connection_timeout_ms: u64,

    /// Total wall-clock budget for the capability polling loop.
    pub max_wait_for_capabilities_ms: u64,

    /// Delay between capability polling attempts.
    pub capability_poll_delay_ms: u64,

    /// Maximum edit+commit cycles per snapshot before giving up.
    pub max_push_attempts: u32,

    /// Delay after a version-conflict commit rejection before the next cycle.
    pub conflict_retry_delay_ms: u64,

    /// Maximum response-wait polls per RPC call.
    pub rpc_send_attempts: u32,

    /// Duration of one response-wait poll.
    pub rpc_attempt_delay_ms: u64,
}

impl Default for PusherConfig {
    fn default() -> Self {
        Self {
            address: DEFAULT_ADDRESS.parse().expect("default address is valid"),
            connection_timeout_ms: 5000,
            max_wait_for_capabilities_ms: 120_000,
            capability_poll_delay_ms: 5000,
            max_push_attempts: 30,
            conflict_retry_delay_ms: 1000,
            rpc_send_attempts: 20,
            rpc_attempt_delay_ms: 1000,
        }
    }
}

impl PusherConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let content = std::fs::read_to_string(&path)
            .map_err(|e| ConfsyncError::Config(format!("Failed to read config file: {e}")))?;

        toml::from_str(&content)
            .map_err(|e| ConfsyncError::Config(format!("Failed to parse config: {e}")))
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(address) = std::env::var("CONFSYNC_ADDRESS") {
            if let Ok(address) = address.parse() {
                config.address = address;
            }
        }
        if let Ok(val) = std::env::var("CONFSYNC_CONNECTION_TIMEOUT_MS") {
            if let Ok(val) = val.parse() {
                config.connection_timeout_ms = val;
            }
        }
        if let Ok(val) = std::env::var("CONFSYNC_MAX_WAIT_FOR_CAPABILITIES_MS") {
            if let Ok(val) = val.parse() {
                config.max_wait_for_capabilities_ms = val;
            }
        }
        if let Ok(val) = std::env::var("CONFSYNC_CAPABILITY_POLL_DELAY_MS") {
            if let Ok(val) = val.parse() {
                config.capability_poll_delay_ms = val;
            }
        }
        if let Ok(val) = std::env::var("CONFSYNC_MAX_PUSH_ATTEMPTS") {
            if let Ok(val) = val.parse() {
                config.max_push_attempts = val;
            }
        }

        config
    }

    /// Merge with another config (other takes precedence over defaults)
    pub fn merge(self, other: Self) -> Self {
        let defaults = Self::default();
        macro_rules! pick {
            ($field:ident) => {
                if other.$field != defaults.$field {
                    other.$field
                } else {
                    self.$field
                }
            };
        }
        Self {
            address: pick!(address),
            connection_timeout_ms: pick!(connection_timeout_ms),
            max_wait_for_capabilities_ms: pick!(max_wait_for_capabilities_ms),
            capability_poll_delay_ms: pick!(capability_poll_delay_ms),
            max_push_attempts: pick!(max_push_attempts),
            conflict_retry_delay_ms: pick!(conflict_retry_delay_ms),
            rpc_send_attempts: pick!(rpc_send_attempts),
            rpc_attempt_delay_ms: pick!(rpc_attempt_delay_ms),
        }
    }

    /// Per-connection timeout as a [`Duration`].
    pub fn connection_timeout(&self) -> Duration {
        Duration::from_millis(self.connection_timeout_ms)
    }

    /// Capability polling budget as a [`Duration`].
    pub fn max_wait_for_capabilities(&self) -> Duration {
        Duration::from_millis(self.max_wait_for_capabilities_ms)
    }

    /// Capability polling delay as a [`Duration`].
    pub fn capability_poll_delay(&self) -> Duration {
        Duration::from_millis(self.capability_poll_delay_ms)
    }

    /// Conflict retry delay as a [`Duration`].
    pub fn conflict_retry_delay(&self) -> Duration {
        Duration::from_millis(self.conflict_retry_delay_ms)
    }

    /// RPC response-wait poll duration as a [`Duration`].
    pub fn rpc_attempt_delay(&self) -> Duration {
        Duration::from_millis(self.rpc_attempt_delay_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_match_stock_deployment() {
        let config = PusherConfig::default();
        assert_eq!(config.connection_timeout_ms, 5000);
        assert_eq!(config.max_wait_for_capabilities_ms, 120_000);
        assert_eq!(config.capability_poll_delay_ms, 5000);
        assert_eq!(config.max_push_attempts, 30);
        assert_eq!(config.conflict_retry_delay_ms, 1000);
        assert_eq!(config.rpc_send_attempts, 20);
        assert_eq!(config.rpc_attempt_delay_ms, 1000);
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "address = \"10.0.0.1:1830\"\nmax_push_attempts = 5\nconflict_retry_delay_ms = 50"
        )
        .unwrap();

        let config = PusherConfig::from_file(file.path()).unwrap();
        assert_eq!(config.address, "10.0.0.1:1830".parse().unwrap());
        assert_eq!(config.max_push_attempts, 5);
        assert_eq!(config.conflict_retry_delay_ms, 50);
        // Unspecified knobs fall back to defaults
        assert_eq!(config.rpc_send_attempts, 20);
    }

    #[test]
    fn test_from_file_rejects_garbage() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "address = [not toml").unwrap();

        let result = PusherConfig::from_file(file.path());
        assert!(matches!(result, Err(ConfsyncError::Config(_))));
    }

    #[test]
    fn test_merge_prefers_non_default_overrides() {
        let base = PusherConfig {
            max_push_attempts: 3,
            capability_poll_delay_ms: 10,
            ..Default::default()
        };
        let overrides = PusherConfig {
            max_push_attempts: 7,
            ..Default::default()
        };

        let merged = base.merge(overrides);
        assert_eq!(merged.max_push_attempts, 7);
        // The default-valued override does not clobber the base setting
        assert_eq!(merged.capability_poll_delay_ms, 10);
    }
}
