//! Client session lifecycle: open, RPC exchange, close.
//!
//! A [`Session`] owns one TCP connection to the NETCONF server. Opening
//! a session performs the hello exchange: the client hello (with the
//! additional metadata header attached) goes out immediately after
//! connect, then the server hello is awaited within the connection
//! timeout and its capability set and session id are recorded. The
//! capability set is fixed at negotiation time; a capability change on
//! the server requires a fresh session.
//!
//! Sessions are exclusively owned by whichever component opened them and
//! must be closed on every exit path. They are never shared across
//! concurrent pushes.

use std::net::SocketAddr;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::{timeout, Instant};

use super::capabilities::CapabilitySet;
use super::message::{NetconfMessage, ReplyStatus};
use crate::codec::{decode_message, encode_message, AdditionalHeader, FrameDecoder, MESSAGE_SEPARATOR};
use crate::error::{ConfsyncError, Result};

/// How long a closing session waits for the close-session reply before
/// tearing the transport down regardless.
const CLOSE_DRAIN: Duration = Duration::from_millis(500);

/// One negotiated NETCONF client session.
pub struct Session {
    stream: TcpStream,
    decoder: FrameDecoder,
    capabilities: CapabilitySet,
    session_id: u64,
    label: String,
    next_message_id: u64,
}

impl Session {
    /// Open a session: connect, send the client hello with `header`
    /// attached, and await the server hello.
    ///
    /// Failure modes are distinct on purpose: a refused or timed-out
    /// connect is [`ConfsyncError::Connect`], while a connected peer
    /// whose hello never arrives (or arrives malformed) is
    /// [`ConfsyncError::NotStable`]. The capability poller retries both;
    /// nothing else should.
    pub async fn open(
        address: SocketAddr,
        connection_timeout: Duration,
        client_capabilities: &CapabilitySet,
        header: AdditionalHeader,
    ) -> Result<Session> {
        let label = uuid::Uuid::new_v4().to_string();

        let stream = match timeout(connection_timeout, TcpStream::connect(address)).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => {
                return Err(ConfsyncError::Connect(format!(
                    "cannot connect to {address}: {e}"
                )))
            }
            Err(_) => {
                return Err(ConfsyncError::Connect(format!(
                    "connect to {address} timed out after {connection_timeout:?}"
                )))
            }
        };

        let mut session = Session {
            stream,
            decoder: FrameDecoder::new(),
            capabilities: CapabilitySet::new(),
            session_id: 0,
            label,
            next_message_id: 1,
        };

        let hello = NetconfMessage::client_hello(client_capabilities);
        session
            .send(&hello, Some(&header))
            .await
            .map_err(|e| ConfsyncError::Connect(format!("cannot send hello to {address}: {e}")))?;

        let server_hello = match session.read_message(connection_timeout).await {
            Ok(Some((message, _))) => message,
            Ok(None) => {
                return Err(ConfsyncError::NotStable(format!(
                    "no hello from {address} within {connection_timeout:?}"
                )))
            }
            Err(e) => {
                return Err(ConfsyncError::NotStable(format!(
                    "hello exchange with {address} failed: {e}"
                )))
            }
        };

        if !server_hello.is_hello() {
            return Err(ConfsyncError::NotStable(format!(
                "expected hello from {address}, got <{}>",
                server_hello.root().name
            )));
        }
        let capabilities = server_hello.capabilities().ok_or_else(|| {
            ConfsyncError::NotStable(format!("hello from {address} carries no capabilities"))
        })?;
        let session_id = server_hello.session_id().ok_or_else(|| {
            ConfsyncError::NotStable(format!("hello from {address} carries no session-id"))
        })?;

        tracing::debug!(
            session = %session.label,
            session_id,
            capabilities = capabilities.len(),
            "session established with {address}"
        );
        session.capabilities = capabilities;
        session.session_id = session_id;
        Ok(session)
    }

    /// Capability set the server declared in its hello.
    pub fn capabilities(&self) -> &CapabilitySet {
        &self.capabilities
    }

    /// Session identifier the server assigned.
    pub fn session_id(&self) -> u64 {
        self.session_id
    }

    /// Local client label, for log correlation only.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Send `request` and wait for the correlated rpc-reply.
    ///
    /// The request is written exactly once. The wait is polled: each
    /// empty poll of `attempt_delay` consumes one of `max_attempts`
    /// attempts; uncorrelated inbound messages are skipped without
    /// consuming the budget. A reply whose status is not ok becomes
    /// [`ConfsyncError::VersionConflict`] when the error payload marks an
    /// optimistic-lock failure, otherwise [`ConfsyncError::Rpc`]. Hard
    /// transport faults fail immediately and are never retried here.
    pub async fn call(
        &mut self,
        mut request: NetconfMessage,
        max_attempts: u32,
        attempt_delay: Duration,
    ) -> Result<NetconfMessage> {
        let id = self.next_message_id;
        self.next_message_id += 1;
        request.set_message_id(id);

        self.send(&request, None).await.map_err(|e| {
            ConfsyncError::Rpc(format!("failed to execute netconf transaction: {e}"))
        })?;

        let mut attempt = 0;
        loop {
            let received = self.read_message(attempt_delay).await.map_err(|e| match e {
                ConfsyncError::Io(e) => {
                    ConfsyncError::Rpc(format!("failed to execute netconf transaction: {e}"))
                }
                other => other,
            })?;

            let Some((message, _)) = received else {
                attempt += 1;
                if attempt >= max_attempts {
                    return Err(ConfsyncError::Rpc(format!(
                        "no response for message {id} after {max_attempts} attempts"
                    )));
                }
                tracing::trace!(session = %self.label, attempt, "response not yet available");
                continue;
            };

            if !message.is_rpc_reply() || message.message_id() != Some(id.to_string().as_str()) {
                tracing::trace!(
                    session = %self.label,
                    element = %message.root().name,
                    "skipping uncorrelated message"
                );
                continue;
            }

            return match message.reply_status() {
                ReplyStatus::Ok => Ok(message),
                ReplyStatus::Error(err) if err.is_version_conflict() => {
                    Err(ConfsyncError::VersionConflict(err.body))
                }
                ReplyStatus::Error(err) => Err(ConfsyncError::Rpc(format!(
                    "server replied with error {tag}: {body}",
                    tag = err.error_tag.as_deref().unwrap_or("unknown"),
                    body = err.body
                ))),
            };
        }
    }

    /// Close the session, releasing the transport.
    ///
    /// Best-effort: a close-session request is sent and its reply
    /// briefly drained, but failures only get logged since close runs on
    /// error paths too.
    pub async fn close(mut self) {
        let outcome = async {
            let request = NetconfMessage::close_session()?;
            let mut request = request;
            let id = self.next_message_id;
            self.next_message_id += 1;
            request.set_message_id(id);
            self.send(&request, None).await?;
            let _ = self.read_message(CLOSE_DRAIN).await?;
            Ok::<(), ConfsyncError>(())
        }
        .await;

        if let Err(e) = outcome {
            tracing::debug!(session = %self.label, "close-session handshake failed: {e}");
        }
        let _ = self.stream.shutdown().await;
        tracing::trace!(session = %self.label, session_id = self.session_id, "session closed");
    }

    async fn send(
        &mut self,
        message: &NetconfMessage,
        header: Option<&AdditionalHeader>,
    ) -> Result<()> {
        let bytes = encode_message(message, header)?;
        self.stream.write_all(&bytes).await?;
        self.stream.write_all(MESSAGE_SEPARATOR).await?;
        self.stream.flush().await?;
        Ok(())
    }

    /// Read the next complete message, waiting at most `wait`. Returns
    /// `Ok(None)` when the window elapses with no complete frame.
    async fn read_message(
        &mut self,
        wait: Duration,
    ) -> Result<Option<(NetconfMessage, Option<AdditionalHeader>)>> {
        let deadline = Instant::now() + wait;
        loop {
            if let Some(frame) = self.decoder.take_frame() {
                return decode_message(&frame).map(Some);
            }

            let Some(remaining) = deadline.checked_duration_since(Instant::now()) else {
                return Ok(None);
            };

            let mut chunk = [0u8; 4096];
            match timeout(remaining, self.stream.read(&mut chunk)).await {
                Err(_) => return Ok(None),
                Ok(Ok(0)) => {
                    return Err(ConfsyncError::Io(std::io::Error::new(
                        std::io::ErrorKind::UnexpectedEof,
                        "connection closed by peer",
                    )))
                }
                Ok(Ok(n)) => self.decoder.feed(&chunk[..n]),
                Ok(Err(e)) => return Err(ConfsyncError::Io(e)),
            }
        }
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("label", &self.label)
            .field("session_id", &self.session_id)
            .field("capabilities", &self.capabilities.len())
            .finish_non_exhaustive()
    }
}
