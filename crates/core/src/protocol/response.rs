use crate::error::{ParseErrorKind, RtspError};

use super::request::RTSP_VERSION;

/// An RTSP response (RFC 7826 §8).
///
/// ```text
/// RTSP/1.0 200 OK\r\n
/// CSeq: 2\r\n
/// Content-Type: application/sdp\r\n
/// Content-Length: 142\r\n
/// \r\n
/// v=0\r\n...
/// ```
///
/// Parsed responses store header names lower-cased. The builder side
/// ([`ok`](Self::ok), [`add_header`](Self::add_header),
/// [`serialize`](Self::serialize)) is used to acknowledge server-initiated
/// requests.
#[derive(Debug, Clone)]
#[must_use]
pub struct RtspResponse {
    pub version: String,
    pub status_code: u16,
    pub status_text: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl RtspResponse {
    pub fn new(status_code: u16, status_text: &str) -> Self {
        RtspResponse {
            version: RTSP_VERSION.to_string(),
            status_code,
            status_text: status_text.to_string(),
            headers: Vec::new(),
            body: Vec::new(),
        }
    }

    /// 200 OK, success (RFC 7826 §17.2.1).
    pub fn ok() -> Self {
        Self::new(200, "OK")
    }

    pub fn add_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    /// Serialize to the RTSP text wire format.
    pub fn serialize(&self) -> Vec<u8> {
        let mut head = format!(
            "{} {} {}\r\n",
            self.version, self.status_code, self.status_text
        );
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

    /// Parse a response from a complete framed message.
    ///
    /// The status line splits into version, status code and an optional
    /// reason phrase. Header names are lower-cased; values are trimmed.
    pub fn parse(raw: &[u8]) -> crate::error::Result<Self> {
        let (head, body) = super::split_head(raw)?;
        let mut lines = head.lines();

        let status_line = lines
            .next()
            .filter(|line| !line.trim().is_empty())
            .ok_or(RtspError::malformed(ParseErrorKind::EmptyMessage))?;

        let mut parts = status_line.trim().splitn(3, ' ');
        let (Some(version), Some(code)) = (parts.next(), parts.next()) else {
            return Err(RtspError::malformed(ParseErrorKind::InvalidStartLine));
        };
        if !version.starts_with("RTSP/") {
            return Err(RtspError::malformed(ParseErrorKind::InvalidStartLine));
        }

        let status_code: u16 = code
            .parse()
            .ok()
            .filter(|c| (100..1000).contains(c))
            .ok_or(RtspError::malformed(ParseErrorKind::InvalidStatusCode))?;
        let status_text = parts.next().unwrap_or("").trim().to_string();

        let headers = super::parse_headers(lines)?
            .into_iter()
            .map(|(name, value)| (name.to_ascii_lowercase(), value))
            .collect();

        Ok(RtspResponse {
            version: version.to_string(),
            status_code,
            status_text,
            headers,
            body: body.to_vec(),
        })
    }

    /// Look up a header value by name (case-insensitive).
    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// The CSeq this response answers (RFC 7826 §18.20).
    pub fn cseq(&self) -> Option<u32> {
        self.get_header("CSeq").and_then(|v| v.trim().parse().ok())
    }

    /// Session id from the `Session` header, without the `;timeout=` suffix.
    pub fn session_id(&self) -> Option<&str> {
        self.get_header("Session")
            .map(|s| s.split(';').next().unwrap_or(s).trim())
            .filter(|s| !s.is_empty())
    }

    pub fn is_success(&self) -> bool {
        self.status_code == 200
    }

    /// Body as text, with invalid UTF-8 replaced.
    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}
