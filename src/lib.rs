//! # Confsync - Configuration Synchronization Core
//!
//! NETCONF client engine that pushes ordered configuration snapshots to a
//! managed server with capability polling and optimistic-lock retry.
//!
//! ## Features
//!
//! - **Capability polling**: sessions are opened and discarded until the
//!   server advertises the capabilities a snapshot requires
//! - **Push with retry**: edit-config + commit per snapshot, retrying the
//!   whole cycle on version-conflict commit rejections
//! - **Message framing**: `]]>]]>`-delimited XML with the out-of-band
//!   session-metadata header on the opening message
//! - **Change notifications**: single-consumer fan-out of data-change
//!   events as namespaced XML documents
//! - **Managed shutdown**: secret-guarded singleton stop operation
//!
//! ## Architecture
//!
//! ```text
//! ordered snapshots
//!        |
//!        v
//! ┌──────────────┐   per attempt   ┌──────────────────┐
//! │ ConfigPusher │ ──────────────> │ CapabilityPoller │
//! │  (retries)   │                 │  (poll until ⊇)  │
//! └──────┬───────┘                 └────────┬─────────┘
//!        │ edit-config + commit             │ open/close
//!        v                                  v
//! ┌──────────────┐                 ┌──────────────────┐
//! │   Session    │ <────────────── │    Session::open │
//! │ (rpc calls)  │                 │   (negotiator)   │
//! └──────┬───────┘                 └──────────────────┘
//!        │
//!        v
//! ┌──────────────┐
//! │    codec     │  header ++ xml, ]]>]]> framing
//! └──────────────┘
//! ```
//!
//! Pushes are strictly sequential: each snapshot fully completes before
//! the next begins, and the whole `push_all` call is single-flight.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use confsync::{CapabilitySet, ConfigPusher, ConfigSnapshot, PusherConfig};
//!
//! let pusher = ConfigPusher::new(PusherConfig::default());
//!
//! let snapshots = vec![ConfigSnapshot::new(
//!     "base-modules",
//!     "<data><modules xmlns=\"urn:example:modules\"/></data>",
//!     CapabilitySet::new().with("urn:example:modules?revision=2024-01-01"),
//! )];
//!
//! let results = pusher.push_all(&snapshots).await?;
//! assert_eq!(results["base-modules"].attempts, 1);
//! ```
//!
//! ## Error model
//!
//! Transient conditions (connect failures, a not-yet-stable server,
//! version conflicts) are retried by the layer that owns them and only
//! surface once their budget or deadline is exhausted. Everything else
//! aborts the push run immediately with the offending snapshot named.
//!
//! ## Modules
//!
//! - [`pusher`]: push engine, capability poller, snapshot inputs
//! - [`protocol`]: hello negotiation, messages, sessions
//! - [`codec`]: wire framing and the additional session-metadata header
//! - [`notify`]: data-change notification fan-out
//! - [`mgmt`]: managed shutdown boundary
//! - [`config`]: configuration knobs
//! - [`error`]: error types and result alias

pub mod codec;
pub mod config;
pub mod error;
pub mod mgmt;
pub mod notify;
pub mod protocol;
pub mod pusher;

// Re-exports for convenience
pub use codec::{AdditionalHeader, FrameDecoder, MESSAGE_SEPARATOR};
pub use config::PusherConfig;
pub use error::{ConfsyncError, Result};
pub use mgmt::{ShutdownModule, StopHandle, SHUTDOWN_INSTANCE_NAME};
pub use notify::{ChangeStream, DataChangeEvent};
pub use protocol::{CapabilitySet, NetconfMessage, Session, BASE_CAPABILITY};
pub use pusher::{CapabilityPoller, ConfigPusher, ConfigSnapshot, ConfigSnapshotHolder, PushResult};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
