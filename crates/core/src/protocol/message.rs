use super::request::RtspRequest;
use super::response::RtspResponse;

/// Any complete message read from the control channel.
///
/// Responses start with the protocol version (`RTSP/1.0 200 OK`); anything
/// else is a server-initiated request such as an ANNOUNCE notice.
#[derive(Debug, Clone)]
pub enum RtspMessage {
    Response(RtspResponse),
    Request(RtspRequest),
}

impl RtspMessage {
    /// Parse a framed message, choosing the grammar from the start line.
    pub fn parse(raw: &[u8]) -> crate::error::Result<Self> {
        let start = raw
            .iter()
            .position(|b| !b.is_ascii_whitespace())
            .unwrap_or(raw.len());

        if raw[start..].starts_with(b"RTSP/") {
            RtspResponse::parse(&raw[start..]).map(RtspMessage::Response)
        } else {
            RtspRequest::parse(&raw[start..]).map(RtspMessage::Request)
        }
    }
}
