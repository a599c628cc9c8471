//! Error types for the RTSP client library.

use std::fmt;

use crate::protocol::request::Method;
use crate::session::SessionState;

/// Errors that can occur in the RTSP client library.
///
/// Variants map to specific failure modes across the stack:
///
/// - **Transport**: [`Io`](Self::Io), [`ConnectionFailure`](Self::ConnectionFailure),
///   [`Timeout`](Self::Timeout), [`PortRangeExhausted`](Self::PortRangeExhausted).
/// - **Framing**: [`MalformedMessage`](Self::MalformedMessage),
///   [`TruncatedPacket`](Self::TruncatedPacket).
/// - **Session**: [`ProtocolViolation`](Self::ProtocolViolation),
///   [`SessionRejected`](Self::SessionRejected),
///   [`RedirectRequested`](Self::RedirectRequested),
///   [`InvalidState`](Self::InvalidState), [`SessionClosed`](Self::SessionClosed).
///
/// Malformed messages, protocol violations and truncated packets are
/// swallowed (logged) by the background loops. Everything else reaches the
/// caller.
#[derive(Debug, thiserror::Error)]
pub enum RtspError {
    /// Underlying I/O or socket error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The control connection could not be opened.
    #[error("cannot connect to {addr}: {source}")]
    ConnectionFailure {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// Bytes on the control channel could not be parsed as an RTSP message.
    #[error("malformed RTSP message: {kind}")]
    MalformedMessage { kind: ParseErrorKind },

    /// A well-formed reply that does not fit the session (RFC 7826 §18.20).
    #[error("protocol violation: {0}")]
    ProtocolViolation(ViolationKind),

    /// RTP datagram shorter than the 12-byte fixed header.
    #[error("truncated RTP packet: {len} bytes")]
    TruncatedPacket { len: usize },

    /// The server answered a request with a status other than 200 or 302.
    #[error("{method} rejected with {status} {reason}")]
    SessionRejected {
        method: Method,
        status: u16,
        reason: String,
    },

    /// The server answered with 302 and a `Location` to reconnect to.
    #[error("redirected to {location}")]
    RedirectRequested { location: String },

    /// A socket operation or reply wait exceeded its bound.
    #[error("timed out: {operation}")]
    Timeout { operation: String },

    /// The stream URL could not be parsed.
    #[error("invalid RTSP URL: {0}")]
    InvalidUrl(String),

    /// The request is not allowed in the current session state.
    #[error("{method} not allowed in state {state:?}")]
    InvalidState { method: Method, state: SessionState },

    /// The session has already reached CLOSED.
    #[error("session closed")]
    SessionClosed,

    /// No free even port left in the configured client port range.
    #[error("client port range exhausted")]
    PortRangeExhausted,
}

/// Specific kind of RTSP parse failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseErrorKind {
    /// Input was empty (no start line).
    EmptyMessage,
    /// Start line did not have the expected token count.
    InvalidStartLine,
    /// Status code was not a three-digit number.
    InvalidStatusCode,
    /// A header line did not contain a colon separator.
    InvalidHeader,
    /// The header block was not valid UTF-8.
    InvalidEncoding,
    /// Request line named a method outside RFC 7826 §13.
    UnknownMethod(String),
    /// Header block grew past the framer limit without terminating.
    HeaderTooLarge,
    /// `Content-Length` declared a body past the framer limit.
    BodyTooLarge,
}

impl fmt::Display for ParseErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyMessage => write!(f, "empty message"),
            Self::InvalidStartLine => write!(f, "invalid start line"),
            Self::InvalidStatusCode => write!(f, "invalid status code"),
            Self::InvalidHeader => write!(f, "invalid header"),
            Self::InvalidEncoding => write!(f, "header block is not UTF-8"),
            Self::UnknownMethod(m) => write!(f, "unknown method {m}"),
            Self::HeaderTooLarge => write!(f, "header block too large"),
            Self::BodyTooLarge => write!(f, "declared body too large"),
        }
    }
}

/// Why a reply was rejected by the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViolationKind {
    /// Reply carried no usable CSeq header.
    MissingCSeq,
    /// Reply CSeq does not match any outstanding request.
    UnknownCSeq(u32),
    /// Reply `Session` header differs from the bound session id.
    SessionMismatch { expected: String, received: String },
}

impl fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingCSeq => write!(f, "reply without CSeq"),
            Self::UnknownCSeq(cseq) => write!(f, "no pending request for CSeq {cseq}"),
            Self::SessionMismatch { expected, received } => {
                write!(f, "session {received} does not match bound session {expected}")
            }
        }
    }
}

impl RtspError {
    pub(crate) fn malformed(kind: ParseErrorKind) -> Self {
        RtspError::MalformedMessage { kind }
    }

    pub(crate) fn timeout(operation: impl Into<String>) -> Self {
        RtspError::Timeout {
            operation: operation.into(),
        }
    }
}

/// Convenience alias for `Result<T, RtspError>`.
pub type Result<T> = std::result::Result<T, RtspError>;
