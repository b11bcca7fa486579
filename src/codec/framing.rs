//! Wire framing for NETCONF messages.
//!
//! The session framing mode is end-of-message delimited: every XML
//! document on the wire is followed by the `]]>]]>` marker. The decoder
//! accumulates raw transport bytes and yields one complete frame per
//! marker; partial and coalesced reads are both handled.
//!
//! Encoding is a pure transform: for the opening message of a
//! client-initiated session the additional header is written first,
//! followed immediately by the XML body; every other message is XML only.

use bytes::{Bytes, BytesMut};

use super::header::AdditionalHeader;
use crate::error::Result;
use crate::protocol::NetconfMessage;

/// End-of-message marker separating frames on the wire.
pub const MESSAGE_SEPARATOR: &[u8] = b"]]>]]>";

/// Serialize a message to its wire bytes, without the end-of-message
/// marker. A present `header` marks this as the session-opening message
/// and is prepended verbatim; the header format is self-delimiting so no
/// further separator is needed.
pub fn encode_message(
    message: &NetconfMessage,
    header: Option<&AdditionalHeader>,
) -> Result<Bytes> {
    let xml = message.to_xml()?;
    let mut out = BytesMut::with_capacity(xml.len() + 64);
    if let Some(header) = header {
        out.extend_from_slice(header.to_formatted_string().as_bytes());
    }
    out.extend_from_slice(xml.as_bytes());
    Ok(out.freeze())
}

/// Parse one complete frame into a message, stripping a leading
/// additional header when present. The header is surfaced separately:
/// it is transport metadata, not part of the logical message.
pub fn decode_message(frame: &[u8]) -> Result<(NetconfMessage, Option<AdditionalHeader>)> {
    let (header, body) = split_additional_header(frame)?;
    let message = NetconfMessage::parse(body)?;
    Ok((message, header))
}

fn split_additional_header(frame: &[u8]) -> Result<(Option<AdditionalHeader>, &[u8])> {
    if frame.first() != Some(&b'[') {
        return Ok((None, frame));
    }
    let Some(end) = frame.iter().position(|&b| b == b']') else {
        return Ok((None, frame));
    };
    let raw = std::str::from_utf8(&frame[..=end])
        .map_err(|e| crate::error::ConfsyncError::Parse(format!("header not UTF-8: {e}")))?;
    let header = AdditionalHeader::parse(raw)?;
    Ok((Some(header), &frame[end + 1..]))
}

/// Incremental frame decoder over a growing transport buffer.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buf: BytesMut,
}

impl FrameDecoder {
    /// Create an empty decoder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append raw transport bytes.
    pub fn feed(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    /// Take the next complete frame, if one end-of-message marker has
    /// fully arrived. The marker itself is consumed and not returned.
    pub fn take_frame(&mut self) -> Option<Bytes> {
        let idx = find_separator(&self.buf)?;
        let frame = self.buf.split_to(idx).freeze();
        let _ = self.buf.split_to(MESSAGE_SEPARATOR.len());
        Some(frame)
    }

    /// Bytes buffered but not yet forming a complete frame.
    pub fn pending(&self) -> usize {
        self.buf.len()
    }
}

fn find_separator(buf: &[u8]) -> Option<usize> {
    buf.windows(MESSAGE_SEPARATOR.len())
        .position(|w| w == MESSAGE_SEPARATOR)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn framed(payload: &[u8]) -> Vec<u8> {
        let mut out = payload.to_vec();
        out.extend_from_slice(MESSAGE_SEPARATOR);
        out
    }

    #[test]
    fn test_single_frame() {
        let mut decoder = FrameDecoder::new();
        decoder.feed(&framed(b"<rpc/>"));
        assert_eq!(decoder.take_frame().unwrap().as_ref(), b"<rpc/>");
        assert!(decoder.take_frame().is_none());
        assert_eq!(decoder.pending(), 0);
    }

    #[test]
    fn test_partial_then_complete() {
        let mut decoder = FrameDecoder::new();
        let bytes = framed(b"<rpc-reply/>");
        decoder.feed(&bytes[..5]);
        assert!(decoder.take_frame().is_none());
        decoder.feed(&bytes[5..]);
        assert_eq!(decoder.take_frame().unwrap().as_ref(), b"<rpc-reply/>");
    }

    #[test]
    fn test_coalesced_frames() {
        let mut decoder = FrameDecoder::new();
        let mut bytes = framed(b"<a/>");
        bytes.extend_from_slice(&framed(b"<b/>"));
        decoder.feed(&bytes);
        assert_eq!(decoder.take_frame().unwrap().as_ref(), b"<a/>");
        assert_eq!(decoder.take_frame().unwrap().as_ref(), b"<b/>");
        assert!(decoder.take_frame().is_none());
    }

    #[test]
    fn test_separator_split_across_reads() {
        let mut decoder = FrameDecoder::new();
        decoder.feed(b"<x/>]]>");
        assert!(decoder.take_frame().is_none());
        decoder.feed(b"]]>");
        assert_eq!(decoder.take_frame().unwrap().as_ref(), b"<x/>");
    }

    #[test]
    fn test_header_split() {
        let frame = b"[unknown;127.0.0.1/830;tcp;;;persister;;]\n<hello xmlns=\"urn:ietf:params:xml:ns:netconf:base:1.0\"><capabilities><capability>urn:ietf:params:netconf:base:1.0</capability></capabilities></hello>";
        let (message, header) = decode_message(frame).unwrap();
        let header = header.unwrap();
        assert_eq!(header.client_id, "unknown");
        assert_eq!(header.session_tag, "persister");
        assert!(message.is_hello());
    }

    #[test]
    fn test_no_header_passthrough() {
        let frame = b"<hello xmlns=\"urn:ietf:params:xml:ns:netconf:base:1.0\"><capabilities><capability>urn:ietf:params:netconf:base:1.0</capability></capabilities></hello>";
        let (message, header) = decode_message(frame).unwrap();
        assert!(header.is_none());
        assert!(message.is_hello());
    }

    #[test]
    fn test_malformed_xml_is_parse_error() {
        let result = decode_message(b"<hello><unclosed>");
        assert!(matches!(
            result,
            Err(crate::error::ConfsyncError::Parse(_))
        ));
    }
}
