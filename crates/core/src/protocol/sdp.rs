//! SDP (Session Description Protocol) track extraction (RFC 8866).
//!
//! The DESCRIBE reply body is an SDP document. Only the media control
//! attributes matter to the client:
//!
//! ```text
//! v=0
//! o=- 0 0 IN IP4 10.0.0.1
//! s=Stream
//! a=control:*                 ← aggregate control (session level)
//! m=video 0 RTP/AVP 96
//! a=rtpmap:96 H264/90000
//! a=control:track1            ← per-track control URL
//! ```
//!
//! Format negotiation is out of scope; the payload is opaque to the client.

const CONTROL_PREFIX: &str = "a=control:";

/// All `a=control:` tokens in document order.
pub fn control_attributes(sdp: &str) -> Vec<&str> {
    sdp.lines()
        .filter_map(|line| line.trim().strip_prefix(CONTROL_PREFIX))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .collect()
}

/// The default track for SETUP: the first control token that is not an
/// aggregate (`*`-terminated) reference.
pub fn default_track(sdp: &str) -> Option<&str> {
    let track = control_attributes(sdp)
        .into_iter()
        .find(|token| !token.ends_with('*'));
    tracing::debug!(?track, "SDP control attributes scanned");
    track
}
