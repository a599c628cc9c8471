//! Control-stream framing.
//!
//! TCP delivers the control channel as an unstructured byte stream. The
//! framer accumulates reads and cuts them into complete units:
//!
//! - **RTSP messages**: header block terminated by an empty line, followed
//!   by exactly `Content-Length` body bytes (0 when absent or unparsable).
//! - **Interleaved frames** (RFC 7826 §14): `$`, a channel byte, a 16-bit
//!   big-endian length, then that many bytes of RTP/RTCP data.
//!
//! Frames come out identically no matter how the stream was chunked.

use crate::error::{ParseErrorKind, RtspError};

/// Upper bound on an unterminated header block.
pub const MAX_HEADER_SIZE: usize = 64 * 1024;

/// Upper bound on a declared `Content-Length`.
pub const MAX_BODY_SIZE: usize = 4 * 1024 * 1024;

const INTERLEAVED_MARKER: u8 = b'$';
const INTERLEAVED_HEADER_LEN: usize = 4;

/// One complete unit cut from the control stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// Header block plus body of one RTSP message.
    Message(Vec<u8>),
    /// Binary data multiplexed onto the control connection.
    Interleaved { channel: u8, payload: Vec<u8> },
}

/// Incremental splitter for the control byte stream.
#[derive(Debug, Default)]
pub struct MessageFramer {
    buf: Vec<u8>,
}

impl MessageFramer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append bytes from a socket read.
    pub fn extend(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    /// Bytes received but not yet part of a complete frame.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// Cut the next complete frame off the front of the buffer.
    ///
    /// Returns `Ok(None)` when more bytes are needed. An unterminated header
    /// block past [`MAX_HEADER_SIZE`] is discarded with
    /// [`ParseErrorKind::HeaderTooLarge`], and a message declaring a body
    /// past [`MAX_BODY_SIZE`] with [`ParseErrorKind::BodyTooLarge`]. Either
    /// way the buffered bytes are dropped and framing starts over.
    pub fn next_frame(&mut self) -> crate::error::Result<Option<Frame>> {
        let blank = self
            .buf
            .iter()
            .take_while(|b| **b == b'\r' || **b == b'\n')
            .count();
        self.buf.drain(..blank);

        if self.buf.is_empty() {
            return Ok(None);
        }

        if self.buf[0] == INTERLEAVED_MARKER {
            return Ok(self.next_interleaved());
        }

        let Some((end, terminator_len)) = find_header_end(&self.buf) else {
            if self.buf.len() > MAX_HEADER_SIZE {
                tracing::warn!(buffered = self.buf.len(), "dropping unterminated header block");
                self.buf.clear();
                return Err(RtspError::malformed(ParseErrorKind::HeaderTooLarge));
            }
            return Ok(None);
        };

        let body_len = content_length(&self.buf[..end]);
        if body_len > MAX_BODY_SIZE {
            tracing::warn!(body_len, "dropping message with oversized body");
            self.buf.clear();
            return Err(RtspError::malformed(ParseErrorKind::BodyTooLarge));
        }
        let total = end + terminator_len + body_len;
        if self.buf.len() < total {
            return Ok(None);
        }

        let message: Vec<u8> = self.buf.drain(..total).collect();
        Ok(Some(Frame::Message(message)))
    }

    /// Drain every complete frame currently buffered.
    pub fn drain_frames(&mut self) -> (Vec<Frame>, Option<RtspError>) {
        let mut frames = Vec::new();
        loop {
            match self.next_frame() {
                Ok(Some(frame)) => frames.push(frame),
                Ok(None) => return (frames, None),
                Err(e) => return (frames, Some(e)),
            }
        }
    }

    fn next_interleaved(&mut self) -> Option<Frame> {
        if self.buf.len() < INTERLEAVED_HEADER_LEN {
            return None;
        }
        let channel = self.buf[1];
        let len = u16::from_be_bytes([self.buf[2], self.buf[3]]) as usize;
        if self.buf.len() < INTERLEAVED_HEADER_LEN + len {
            return None;
        }
        let payload = self.buf[INTERLEAVED_HEADER_LEN..INTERLEAVED_HEADER_LEN + len].to_vec();
        self.buf.drain(..INTERLEAVED_HEADER_LEN + len);
        Some(Frame::Interleaved { channel, payload })
    }
}

/// Position and length of the first empty-line terminator (`\r\n\r\n` or
/// a bare `\n\n`).
pub(crate) fn find_header_end(buf: &[u8]) -> Option<(usize, usize)> {
    let crlf = buf.windows(4).position(|w| w == b"\r\n\r\n").map(|p| (p, 4));
    let lf = buf.windows(2).position(|w| w == b"\n\n").map(|p| (p, 2));
    match (crlf, lf) {
        (Some(a), Some(b)) => Some(if a.0 <= b.0 { a } else { b }),
        (a, b) => a.or(b),
    }
}

/// `Content-Length` from a header block, case-insensitive; 0 if missing
/// or unparsable.
fn content_length(head: &[u8]) -> usize {
    String::from_utf8_lossy(head)
        .lines()
        .skip(1)
        .filter_map(|line| line.split_once(':'))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
        .and_then(|(_, value)| value.trim().parse().ok())
        .unwrap_or(0)
}
