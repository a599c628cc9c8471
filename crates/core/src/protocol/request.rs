use std::fmt;
use std::str::FromStr;

use crate::error::{ParseErrorKind, RtspError};

/// RTSP protocol version written on every outgoing request line.
pub const RTSP_VERSION: &str = "RTSP/1.0";

/// RTSP methods (RFC 7826 §13).
///
/// OPTIONS through GET_PARAMETER are sent by the client; SET_PARAMETER,
/// ANNOUNCE and REDIRECT only arrive from the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Options,
    Describe,
    Setup,
    Play,
    Pause,
    Teardown,
    GetParameter,
    SetParameter,
    Announce,
    Redirect,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Options => "OPTIONS",
            Method::Describe => "DESCRIBE",
            Method::Setup => "SETUP",
            Method::Play => "PLAY",
            Method::Pause => "PAUSE",
            Method::Teardown => "TEARDOWN",
            Method::GetParameter => "GET_PARAMETER",
            Method::SetParameter => "SET_PARAMETER",
            Method::Announce => "ANNOUNCE",
            Method::Redirect => "REDIRECT",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Method {
    type Err = RtspError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "OPTIONS" => Method::Options,
            "DESCRIBE" => Method::Describe,
            "SETUP" => Method::Setup,
            "PLAY" => Method::Play,
            "PAUSE" => Method::Pause,
            "TEARDOWN" => Method::Teardown,
            "GET_PARAMETER" => Method::GetParameter,
            "SET_PARAMETER" => Method::SetParameter,
            "ANNOUNCE" => Method::Announce,
            "REDIRECT" => Method::Redirect,
            other => {
                return Err(RtspError::malformed(ParseErrorKind::UnknownMethod(
                    other.to_string(),
                )));
            }
        })
    }
}

/// An RTSP request (RFC 7826 §7).
///
/// Outgoing requests are assembled with the builder methods and written
/// with [`serialize`](Self::serialize):
///
/// ```text
/// Method SP Request-URI SP RTSP-Version CRLF
/// *(Header: Value CRLF)
/// CRLF
/// [body]
/// ```
///
/// Headers keep insertion order on the wire. Incoming server-initiated
/// requests (ANNOUNCE notices and the like) go through [`parse`](Self::parse).
#[derive(Debug, Clone)]
#[must_use]
pub struct RtspRequest {
    pub method: Method,
    /// Request-URI (e.g. `rtsp://host:554/stream/track1`).
    pub uri: String,
    pub version: String,
    /// Headers as ordered (name, value) pairs. Lookups via
    /// [`get_header`](Self::get_header) are case-insensitive.
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl RtspRequest {
    pub fn new(method: Method, uri: &str) -> Self {
        RtspRequest {
            method,
            uri: uri.to_string(),
            version: RTSP_VERSION.to_string(),
            headers: Vec::new(),
            body: Vec::new(),
        }
    }

    pub fn with_version(mut self, version: &str) -> Self {
        self.version = version.to_string();
        self
    }

    pub fn add_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    pub fn with_body(mut self, body: Vec<u8>) -> Self {
        self.body = body;
        self
    }

    /// Serialize to the RTSP text wire format.
    ///
    /// Header values are placed verbatim. When a body is present,
    /// `Content-Length` is appended after the caller's headers.
    pub fn serialize(&self) -> Vec<u8> {
        let mut head = format!("{} {} {}\r\n", self.method, self.uri, self.version);

        for (name, value) in &self.headers {
            head.push_str(&format!("{}: {}\r\n", name, value));
        }

        if !self.body.is_empty() {
            head.push_str(&format!("Content-Length: {}\r\n", self.body.len()));
        }
        head.push_str("\r\n");

        let mut out = head.into_bytes();
        out.extend_from_slice(&self.body);
        out
    }

    /// Parse a server-initiated request from a complete framed message.
    ///
    /// Returns [`RtspError::MalformedMessage`] when the request line is not
    /// `Method URI Version` or a header line has no colon.
    pub fn parse(raw: &[u8]) -> crate::error::Result<Self> {
        let (head, body) = super::split_head(raw)?;
        let mut lines = head.lines();

        let request_line = lines
            .next()
            .filter(|line| !line.trim().is_empty())
            .ok_or(RtspError::malformed(ParseErrorKind::EmptyMessage))?;

        let parts: Vec<&str> = request_line.split_whitespace().collect();

        if parts.len() != 3 {
            return Err(RtspError::malformed(ParseErrorKind::InvalidStartLine));
        }

        let method: Method = parts[0].parse()?;
        let uri = parts[1].to_string();
        let version = parts[2].to_string();

        let headers = super::parse_headers(lines)?;

        Ok(RtspRequest {
            method,
            uri,
            version,
            headers,
            body: body.to_vec(),
        })
    }

    /// Look up a header value by name (case-insensitive, RFC 7826 §5.2).
    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// The CSeq header value, if present and numeric.
    pub fn cseq(&self) -> Option<u32> {
        self.get_header("CSeq").and_then(|v| v.trim().parse().ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serialize_keeps_header_order() {
        let req = RtspRequest::new(Method::Describe, "rtsp://10.0.0.1/stream")
            .add_header("CSeq", "2")
            .add_header("User-Agent", "rtsp-rs")
            .add_header("Accept", "application/sdp");
        let wire = String::from_utf8(req.serialize()).unwrap();
        assert_eq!(
            wire,
            "DESCRIBE rtsp://10.0.0.1/stream RTSP/1.0\r\n\
             CSeq: 2\r\n\
             User-Agent: rtsp-rs\r\n\
             Accept: application/sdp\r\n\r\n"
        );
    }

    #[test]
    fn serialize_with_body_adds_content_length() {
        let req = RtspRequest::new(Method::GetParameter, "rtsp://host/s")
            .add_header("CSeq", "7")
            .with_body(b"position\r\n".to_vec());
        let wire = String::from_utf8(req.serialize()).unwrap();
        assert!(wire.contains("Content-Length: 10\r\n"));
        assert!(wire.ends_with("\r\n\r\nposition\r\n"));
    }

    #[test]
    fn parse_announce_notice() {
        let raw = b"ANNOUNCE rtsp://10.0.0.1/stream RTSP/1.0\r\n\
                    CSeq: 12\r\n\
                    x-notice: 2101 \"End of Stream Reached\"\r\n\r\n";
        let req = RtspRequest::parse(raw).unwrap();
        assert_eq!(req.method, Method::Announce);
        assert_eq!(req.cseq(), Some(12));
        assert_eq!(req.get_header("X-Notice"), Some("2101 \"End of Stream Reached\""));
    }

    #[test]
    fn parse_invalid_request_line() {
        assert!(RtspRequest::parse(b"JUST_A_METHOD\r\n\r\n").is_err());
    }

    #[test]
    fn parse_unknown_method() {
        let err = RtspRequest::parse(b"FETCH rtsp://h/s RTSP/1.0\r\n\r\n").unwrap_err();
        assert!(matches!(
            err,
            RtspError::MalformedMessage {
                kind: ParseErrorKind::UnknownMethod(_)
            }
        ));
    }

    #[test]
    fn method_round_trips_through_str() {
        for m in [Method::Options, Method::GetParameter, Method::Teardown] {
            assert_eq!(m.as_str().parse::<Method>().unwrap(), m);
        }
    }
}
