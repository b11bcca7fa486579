//! Additional session-metadata header for the opening message.
//!
//! NETCONF clients behind the controller prefix their very first message
//! with an out-of-band header describing the user, peer address and
//! transport. The header is plain UTF-8, bracket-enclosed and
//! semicolon-separated, written immediately before the XML hello with no
//! other delimiter:
//!
//! ```text
//! [unknown;127.0.0.1/830;tcp;;;persister;;]
//! <hello xmlns="urn:ietf:params:xml:ns:netconf:base:1.0">
//! ...
//! ```
//!
//! It is transport metadata, not part of the logical message: the decoder
//! strips and surfaces it separately.

use crate::error::{ConfsyncError, Result};

/// Default client identity when the caller has no authenticated user.
pub const DEFAULT_CLIENT_ID: &str = "unknown";

/// Transport name advertised for plain TCP sessions.
pub const TRANSPORT_TCP: &str = "tcp";

/// Session metadata prefixed to the first client-sent message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdditionalHeader {
    /// Client identity ("unknown" when unauthenticated)
    pub client_id: String,
    /// Peer IP address
    pub address: String,
    /// Peer port
    pub port: String,
    /// Transport name ("tcp")
    pub transport: String,
    /// Application tag identifying the session's purpose
    pub session_tag: String,
}

impl AdditionalHeader {
    /// Create a header with explicit fields.
    pub fn new(
        client_id: &str,
        address: &str,
        port: &str,
        transport: &str,
        session_tag: &str,
    ) -> Self {
        Self {
            client_id: client_id.to_string(),
            address: address.to_string(),
            port: port.to_string(),
            transport: transport.to_string(),
            session_tag: session_tag.to_string(),
        }
    }

    /// Create the persister header for a peer address, with the default
    /// client identity and TCP transport.
    pub fn persister(address: &str, port: u16) -> Self {
        Self::new(
            DEFAULT_CLIENT_ID,
            address,
            &port.to_string(),
            TRANSPORT_TCP,
            "persister",
        )
    }

    /// Serialize to the bracket-enclosed wire form, trailing newline
    /// included. The empty slots are placeholders the server fills from
    /// its own session bookkeeping.
    pub fn to_formatted_string(&self) -> String {
        format!(
            "[{};{}/{};{};;;{};;]\n",
            self.client_id, self.address, self.port, self.transport, self.session_tag
        )
    }

    /// Parse the wire form back into a header.
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim_end();
        let inner = trimmed
            .strip_prefix('[')
            .and_then(|s| s.strip_suffix(']'))
            .ok_or_else(|| {
                ConfsyncError::Parse(format!("additional header not bracket-enclosed: {raw}"))
            })?;

        let fields: Vec<&str> = inner.split(';').collect();
        if fields.len() < 6 {
            return Err(ConfsyncError::Parse(format!(
                "additional header has {} fields, expected at least 6: {raw}",
                fields.len()
            )));
        }

        let (address, port) = fields[1].split_once('/').ok_or_else(|| {
            ConfsyncError::Parse(format!("additional header address not ip/port: {}", fields[1]))
        })?;

        Ok(Self::new(fields[0], address, port, fields[2], fields[5]))
    }
}
