//! The configuration push engine.
//!
//! [`ConfigPusher`] drives the whole synchronization: a reachability
//! probe first, then one snapshot at a time, strictly in input order,
//! since later snapshots may depend on earlier ones being committed. Each
//! attempt runs on a fresh session so capability stability is
//! re-validated, and the only condition the engine retries is a commit
//! rejected on a version conflict. Everything else aborts the run with
//! the offending snapshot named in the error.

mod poller;
mod snapshot;

pub use poller::CapabilityPoller;
pub use snapshot::{ConfigSnapshot, ConfigSnapshotHolder};

use indexmap::IndexMap;
use tokio::sync::Mutex;
use tokio::time::sleep;
use xmltree::Element;

use crate::config::PusherConfig;
use crate::error::{ConfsyncError, Result};
use crate::protocol::{CapabilitySet, NetconfMessage, Session};

/// Outcome of pushing one snapshot.
#[derive(Debug, Clone)]
pub struct PushResult {
    /// Reply to the edit-config request.
    pub edit_response: NetconfMessage,
    /// Reply to the commit request.
    pub commit_response: NetconfMessage,
    /// Edit+commit cycles used, `>= 1`.
    pub attempts: u32,
}

/// Pushes ordered configuration snapshots over NETCONF with
/// version-conflict retries.
#[derive(Debug)]
pub struct ConfigPusher {
    config: PusherConfig,
    poller: CapabilityPoller,
    // One logical configuration-apply operation per device: concurrent
    // callers serialize here.
    push_lock: Mutex<()>,
}

impl ConfigPusher {
    /// Create a push engine for the configured server.
    pub fn new(config: PusherConfig) -> Self {
        let poller = CapabilityPoller::new(&config);
        Self {
            config,
            poller,
            push_lock: Mutex::new(()),
        }
    }

    /// The engine configuration.
    pub fn config(&self) -> &PusherConfig {
        &self.config
    }

    /// Push every snapshot, in order.
    ///
    /// Returns one [`PushResult`] per snapshot, keyed by snapshot name
    /// in input order. The first fatal failure aborts the run; snapshots
    /// after it are not attempted, since ordering past a failed snapshot
    /// cannot be guaranteed.
    pub async fn push_all<H: ConfigSnapshotHolder>(
        &self,
        snapshots: &[H],
    ) -> Result<IndexMap<String, PushResult>> {
        let _guard = self.push_lock.lock().await;
        tracing::debug!(count = snapshots.len(), "config snapshots to be pushed to netconf");

        // First just make sure we can connect to netconf, even if
        // nothing is being pushed
        let probe = self.poller.wait_for_capabilities(&CapabilitySet::new()).await?;
        probe.close().await;

        let mut result = IndexMap::with_capacity(snapshots.len());
        for snapshot in snapshots {
            let pushed = self.push_snapshot_with_retries(snapshot).await?;
            tracing::debug!(
                snapshot = snapshot.name(),
                attempts = pushed.attempts,
                "config snapshot pushed successfully"
            );
            result.insert(snapshot.name().to_string(), pushed);
        }
        tracing::debug!("all configuration snapshots have been pushed successfully");
        Ok(result)
    }

    /// Retry the edit+commit cycle until the optimistic lock succeeds or
    /// the attempt budget is exhausted.
    async fn push_snapshot_with_retries<H: ConfigSnapshotHolder>(
        &self,
        snapshot: &H,
    ) -> Result<PushResult> {
        let mut last_conflict: Option<ConfsyncError> = None;

        for attempt in 1..=self.config.max_push_attempts {
            let session = self
                .poller
                .wait_for_capabilities(snapshot.required_capabilities())
                .await?;
            tracing::trace!(snapshot = snapshot.name(), attempt, "pushing configuration to netconf");

            match self.push_once(snapshot, session).await {
                Ok((edit_response, commit_response)) => {
                    return Ok(PushResult {
                        edit_response,
                        commit_response,
                        attempts: attempt,
                    })
                }
                Err(conflict @ ConfsyncError::VersionConflict(_)) => {
                    tracing::debug!(
                        snapshot = snapshot.name(),
                        attempt,
                        "commit rejected on conflicting configuration version, will retry"
                    );
                    last_conflict = Some(conflict);
                    sleep(self.config.conflict_retry_delay()).await;
                }
                Err(e) => return Err(e),
            }
        }

        Err(ConfsyncError::MaxAttemptsExceeded {
            snapshot: snapshot.name().to_string(),
            last_conflict: last_conflict.map(Box::new),
        })
    }

    /// One edit-config + commit cycle. The session is consumed and
    /// closed on every path out of here.
    async fn push_once<H: ConfigSnapshotHolder>(
        &self,
        snapshot: &H,
        mut session: Session,
    ) -> Result<(NetconfMessage, NetconfMessage)> {
        // Malformed input is a caller bug, not a transient condition
        let parsed = match Element::parse(snapshot.config_snapshot().as_bytes()) {
            Ok(element) => element,
            Err(e) => {
                session.close().await;
                return Err(ConfsyncError::Parse(format!(
                    "cannot parse {}: {e}",
                    snapshot.name()
                )));
            }
        };

        let edit_request = match NetconfMessage::edit_config(&parsed) {
            Ok(request) => request,
            Err(e) => {
                session.close().await;
                return Err(e);
            }
        };

        let attempts = self.config.rpc_send_attempts;
        let delay = self.config.rpc_attempt_delay();

        // Edit failures are never retried, whatever their shape; only a
        // commit-side version conflict is
        let edit_response = match session.call(edit_request, attempts, delay).await {
            Ok(response) => response,
            Err(e) => {
                session.close().await;
                return Err(ConfsyncError::Rpc(format!(
                    "edit-config failed on {}: {e}",
                    snapshot.name()
                )));
            }
        };

        let commit_request = match NetconfMessage::commit() {
            Ok(request) => request,
            Err(e) => {
                session.close().await;
                return Err(e);
            }
        };

        match session.call(commit_request, attempts, delay).await {
            Ok(commit_response) => {
                session.close().await;
                tracing::trace!(snapshot = snapshot.name(), "configuration loaded successfully");
                Ok((edit_response, commit_response))
            }
            Err(conflict @ ConfsyncError::VersionConflict(_)) => {
                session.close().await;
                Err(conflict)
            }
            Err(e) => {
                session.close().await;
                Err(ConfsyncError::Rpc(format!(
                    "unable to load {}: {e}",
                    snapshot.name()
                )))
            }
        }
    }
}
