//! Capability polling.
//!
//! Before any snapshot is pushed, the server must both accept
//! connections and advertise the capabilities the snapshot requires. A
//! device frequently accepts TCP well before its management plane is
//! ready, so the poller keeps opening (and discarding) sessions until
//! one reports a capability superset of the expected set, or the
//! deadline passes.

use std::net::SocketAddr;
use std::time::Duration;

use tokio::time::{sleep, Instant};

use crate::codec::AdditionalHeader;
use crate::config::PusherConfig;
use crate::error::{ConfsyncError, Result};
use crate::protocol::{CapabilitySet, Session};

/// Polls the server until an expected capability set is advertised.
#[derive(Debug, Clone)]
pub struct CapabilityPoller {
    address: SocketAddr,
    connection_timeout: Duration,
    poll_delay: Duration,
    max_wait: Duration,
    client_capabilities: CapabilitySet,
}

impl CapabilityPoller {
    /// Create a poller from the engine configuration.
    pub fn new(config: &PusherConfig) -> Self {
        Self {
            address: config.address,
            connection_timeout: config.connection_timeout(),
            poll_delay: config.capability_poll_delay(),
            max_wait: config.max_wait_for_capabilities(),
            client_capabilities: CapabilitySet::base(),
        }
    }

    /// Open sessions until one advertises a superset of `expected`, or
    /// the deadline elapses.
    ///
    /// With an empty `expected` set this degenerates into a reachability
    /// probe: the first successfully negotiated session is returned
    /// regardless of what it advertises. The returned session belongs to
    /// the caller; sessions that fell short were already closed here.
    pub async fn wait_for_capabilities(&self, expected: &CapabilitySet) -> Result<Session> {
        let deadline = Instant::now() + self.max_wait;
        let mut attempt = 0u32;
        let mut latest_observed: Option<CapabilitySet> = None;

        while Instant::now() < deadline {
            attempt += 1;
            let header =
                AdditionalHeader::persister(&self.address.ip().to_string(), self.address.port());

            let session = match Session::open(
                self.address,
                self.connection_timeout,
                &self.client_capabilities,
                header,
            )
            .await
            {
                Ok(session) => session,
                Err(e) if e.is_retryable_connect() => {
                    tracing::debug!(attempt, "netconf {} not reachable or not stable: {e}", self.address);
                    sleep(self.poll_delay).await;
                    continue;
                }
                Err(e) => return Err(e),
            };

            let observed = session.capabilities().clone();
            if observed.contains_all(expected) {
                tracing::debug!(
                    attempt,
                    capabilities = observed.len(),
                    "hello from netconf stable"
                );
                tracing::trace!(session_id = session.session_id(), "session id received from netconf server");
                return Ok(session);
            }

            tracing::debug!(attempt, observed = %observed, "polling hello from netconf");
            latest_observed = Some(observed);
            session.close().await;
            sleep(self.poll_delay).await;
        }

        match latest_observed {
            None => {
                let message = format!(
                    "could not connect to netconf server {} within {} ms",
                    self.address,
                    self.max_wait.as_millis()
                );
                tracing::error!("{message}");
                Err(ConfsyncError::CapabilityTimeout {
                    message,
                    missing: expected.clone(),
                })
            }
            Some(observed) => {
                let missing = expected.missing_in(&observed);
                let message = format!(
                    "netconf server did not provide required capabilities. \
                     Expected but not found: {missing}, all expected {expected}, current {observed}"
                );
                tracing::error!("{message}");
                Err(ConfsyncError::CapabilityTimeout { message, missing })
            }
        }
    }
}
