//! Message encoding and wire framing.
//!
//! Two concerns live here, both pure transforms over bytes:
//!
//! - [`framing`]: `]]>]]>`-delimited frame accumulation and the
//!   encode/decode entry points for whole messages
//! - [`header`]: the bracket-enclosed session-metadata block prefixed to
//!   the very first client-sent message of a session
//!
//! The codec knows nothing about retries or session state; the protocol
//! layer owns those.

mod framing;
mod header;

pub use framing::{decode_message, encode_message, FrameDecoder, MESSAGE_SEPARATOR};
pub use header::{AdditionalHeader, DEFAULT_CLIENT_ID, TRANSPORT_TCP};
