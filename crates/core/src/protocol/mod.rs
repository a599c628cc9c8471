//! RTSP protocol implementation (RFC 7826, compatible with RFC 2326).
//!
//! This module handles the text-based RTSP signaling protocol from the
//! client side: framing the control byte stream, building requests,
//! parsing responses and server notices, and extracting tracks from SDP.
//!
//! ## RTSP message format (RFC 7826 §5)
//!
//! RTSP messages follow HTTP/1.1 syntax with a different method set:
//!
//! ```text
//! DESCRIBE rtsp://server/stream RTSP/1.0\r\n
//! CSeq: 2\r\n
//! Accept: application/sdp\r\n
//! \r\n
//! ```
//!
//! Key differences from HTTP:
//! - Stateful: the server binds a session id on SETUP (RFC 7826 §4.1).
//! - Replies are matched to requests by `CSeq` only; they carry no method.
//! - The server may send requests of its own (e.g. ANNOUNCE notices).
//!
//! ## Client methods
//!
//! | Method | RFC 7826 section | Purpose |
//! |--------|------------------|---------|
//! | OPTIONS | §13.1 | Capability discovery |
//! | DESCRIBE | §13.2 | Retrieve SDP session description |
//! | SETUP | §13.3 | Negotiate transport |
//! | PLAY | §13.4 | Start media delivery |
//! | PAUSE | §13.6 | Suspend media delivery |
//! | TEARDOWN | §13.7 | Destroy session |
//! | GET_PARAMETER | §13.8 | Keepalive |

pub mod framer;
pub mod message;
pub mod request;
pub mod response;
pub mod sdp;
pub mod url;

pub use framer::{Frame, MessageFramer};
pub use message::RtspMessage;
pub use request::{Method, RtspRequest};
pub use response::RtspResponse;
pub use url::RtspUrl;

use crate::error::{ParseErrorKind, RtspError};

/// Split a framed message into its header block and body.
///
/// A message without a blank line is treated as headers only.
pub(crate) fn split_head(raw: &[u8]) -> crate::error::Result<(&str, &[u8])> {
    let (head, body) = match framer::find_header_end(raw) {
        Some((end, terminator_len)) => (&raw[..end], &raw[end + terminator_len..]),
        None => (raw, &raw[raw.len()..]),
    };
    let head = std::str::from_utf8(head)
        .map_err(|_| RtspError::malformed(ParseErrorKind::InvalidEncoding))?;
    Ok((head, body))
}

/// Parse `Name: value` lines up to the first blank line.
pub(crate) fn parse_headers<'a>(
    lines: impl Iterator<Item = &'a str>,
) -> crate::error::Result<Vec<(String, String)>> {
    let mut headers = Vec::new();

    for line in lines {
        if line.trim().is_empty() {
            break;
        }

        let colon_pos = line
            .find(':')
            .ok_or(RtspError::malformed(ParseErrorKind::InvalidHeader))?;

        let name = line[..colon_pos].trim().to_string();
        let value = line[colon_pos + 1..].trim().to_string();

        headers.push((name, value));
    }

    Ok(headers)
}
