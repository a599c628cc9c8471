//! RTSP client session state machine (RFC 7826 §4.1, Appendix B).
//!
//! A [`Session`] is one control dialog with a server. It owns everything
//! the protocol needs to correlate replies and drive transitions:
//!
//! - The CSeq counter, strictly increasing by one per request.
//! - The pending table mapping each outstanding CSeq to its method.
//!   Replies carry only the CSeq, so this is how a reply finds its request.
//! - The server-assigned session id, bound on the first reply that carries
//!   one and checked on every reply after that.
//! - The playback cursor read by every PLAY.
//!
//! ## Session lifecycle
//!
//! ```text
//! DESCRIBE 200           Init     -> Init      (learns the track)
//! SETUP 200              Init     -> Ready     (binds session id)
//! PLAY 200               Ready    -> Playing
//! PAUSE 200              Playing  -> Ready
//! TEARDOWN 200           any      -> Closed
//! 302                    any      -> Closed    (redirected)
//! other status           any      -> Closed    (rejected)
//! ```
//!
//! The state machine performs no I/O. [`Session::on_response`] and
//! [`Session::on_notification`] return the follow-up request, if any, for
//! the caller to send.

pub mod cursor;
pub mod transport;

use std::collections::HashMap;

use crate::error::{Result, RtspError, ViolationKind};
use crate::protocol::request::{Method, RtspRequest};
use crate::protocol::response::RtspResponse;
use crate::protocol::{RtspUrl, sdp, url};

pub use cursor::{PlaybackCommand, PlaybackCursor};
pub use transport::TransportHeader;

/// `x-notice` codes carried by server ANNOUNCE notices.
pub const NOTICE_END_OF_STREAM: u32 = 2101;
pub const NOTICE_BEGIN_OF_STREAM: u32 = 2102;
pub const NOTICE_CLOSE: u32 = 2103;

/// Client-side session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Connected, no transport set up yet.
    Init,
    /// Transport set up; media not flowing.
    Ready,
    /// Media is being delivered.
    Playing,
    /// Terminal.
    Closed,
}

/// Why a session reached [`SessionState::Closed`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Closure {
    TornDown,
    Rejected {
        method: Method,
        status: u16,
        reason: String,
    },
    Redirected {
        location: String,
    },
    ConnectionLost(String),
    /// A chained request could not be sent.
    Aborted(String),
    /// The RTP receive loop failed while the client was running.
    MediaFailed(String),
}

impl Closure {
    pub fn to_error(&self) -> RtspError {
        match self {
            Closure::TornDown => RtspError::SessionClosed,
            Closure::Rejected {
                method,
                status,
                reason,
            } => RtspError::SessionRejected {
                method: *method,
                status: *status,
                reason: reason.clone(),
            },
            Closure::Redirected { location } => RtspError::RedirectRequested {
                location: location.clone(),
            },
            Closure::ConnectionLost(reason) => RtspError::Io(std::io::Error::new(
                std::io::ErrorKind::ConnectionAborted,
                reason.clone(),
            )),
            Closure::Aborted(reason) | Closure::MediaFailed(reason) => {
                RtspError::Io(std::io::Error::other(reason.clone()))
            }
        }
    }
}

/// A request the session wants sent as a consequence of a reply or notice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FollowUp {
    /// Chain DESCRIBE into SETUP of the default track.
    Setup { uri: String },
    /// Chain SETUP into PLAY, or resume after a stream notice.
    Play,
    /// Release the server-side session.
    Teardown,
}

/// Result of dispatching one reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dispatch {
    pub cseq: u32,
    pub method: Method,
    pub status: u16,
    pub follow_up: Option<FollowUp>,
}

/// Header values stamped onto every request.
#[derive(Debug, Clone)]
pub struct RequestDefaults {
    pub user_agent: String,
    pub version: String,
    /// Pre-built `Authorization` value.
    pub authorization: Option<String>,
    /// Extra headers for DESCRIBE.
    pub describe_headers: Vec<(String, String)>,
}

#[derive(Debug, Clone, Copy)]
struct Pending {
    method: Method,
    awaited: bool,
}

/// One RTSP control dialog.
#[derive(Debug)]
pub struct Session {
    url: RtspUrl,
    /// Aggregate control URI: `Content-Base` once known, else the URL.
    base: String,
    defaults: RequestDefaults,
    cseq: u32,
    session_id: Option<String>,
    state: SessionState,
    pending: HashMap<u32, Pending>,
    replies: HashMap<u32, RtspResponse>,
    track: Option<String>,
    transport: Option<TransportHeader>,
    cursor: PlaybackCursor,
    autoplay: bool,
    closure: Option<Closure>,
}

impl Session {
    pub fn new(url: RtspUrl, defaults: RequestDefaults) -> Self {
        let cursor = PlaybackCursor::for_url(&url);
        Session {
            base: url.as_request_uri(),
            url,
            defaults,
            cseq: 0,
            session_id: None,
            state: SessionState::Init,
            pending: HashMap::new(),
            replies: HashMap::new(),
            track: None,
            transport: None,
            cursor,
            autoplay: false,
            closure: None,
        }
    }

    pub fn url(&self) -> &RtspUrl {
        &self.url
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_open(&self) -> bool {
        self.state != SessionState::Closed
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    /// Last CSeq issued (0 before the first request).
    pub fn cseq(&self) -> u32 {
        self.cseq
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// SETUP target learned from DESCRIBE.
    pub fn track_uri(&self) -> Option<&str> {
        self.track.as_deref()
    }

    pub fn base_uri(&self) -> &str {
        &self.base
    }

    pub fn transport(&self) -> Option<&TransportHeader> {
        self.transport.as_ref()
    }

    pub fn cursor(&self) -> &PlaybackCursor {
        &self.cursor
    }

    pub fn cursor_mut(&mut self) -> &mut PlaybackCursor {
        &mut self.cursor
    }

    pub fn closure(&self) -> Option<&Closure> {
        self.closure.as_ref()
    }

    /// Chain DESCRIBE→SETUP→PLAY from replies.
    pub fn set_autoplay(&mut self, autoplay: bool) {
        self.autoplay = autoplay;
    }

    pub fn autoplay(&self) -> bool {
        self.autoplay
    }

    /// Reject requests that make no sense in the current state.
    pub fn check_allowed(&self, method: Method) -> Result<()> {
        use SessionState::*;
        match (self.state, method) {
            (Closed, _) => Err(RtspError::SessionClosed),
            (Init | Ready, Method::Setup) => Ok(()),
            (Ready | Playing, Method::Play | Method::Pause) => Ok(()),
            (state, Method::Setup | Method::Play | Method::Pause) => {
                Err(RtspError::InvalidState { method, state })
            }
            _ => Ok(()),
        }
    }

    /// Build the next request for `method` against the session's URIs.
    ///
    /// SETUP goes through [`setup_request`](Self::setup_request) instead
    /// because it needs a transport.
    pub fn request(&mut self, method: Method, awaited: bool) -> RtspRequest {
        let mut headers = Vec::new();
        let uri = match method {
            Method::Options => self.url.as_request_uri(),
            Method::Describe => {
                headers.push(("Accept".to_string(), "application/sdp".to_string()));
                headers.extend(self.defaults.describe_headers.iter().cloned());
                self.url.as_request_uri()
            }
            Method::Play => {
                headers.push(("Range".to_string(), self.cursor.range.clone()));
                headers.push(("Scale".to_string(), self.cursor.scale_header()));
                self.base.clone()
            }
            _ => self.base.clone(),
        };
        self.prepare(method, &uri, headers, awaited)
    }

    /// Build a SETUP for `uri` with the given `Transport` value.
    pub fn setup_request(&mut self, uri: &str, transport: &str, awaited: bool) -> RtspRequest {
        let headers = vec![("Transport".to_string(), transport.to_string())];
        self.prepare(Method::Setup, uri, headers, awaited)
    }

    /// Assign the next CSeq, stamp the standard headers and record the
    /// request as pending. Nothing is recorded once the session is CLOSED.
    pub fn prepare(
        &mut self,
        method: Method,
        uri: &str,
        headers: Vec<(String, String)>,
        awaited: bool,
    ) -> RtspRequest {
        self.cseq += 1;
        let cseq = self.cseq;

        let mut request = RtspRequest::new(method, uri)
            .with_version(&self.defaults.version)
            .add_header("CSeq", &cseq.to_string())
            .add_header("User-Agent", &self.defaults.user_agent);
        if let Some(id) = &self.session_id {
            request = request.add_header("Session", id);
        }
        if let Some(auth) = &self.defaults.authorization {
            request = request.add_header("Authorization", auth);
        }
        for (name, value) in &headers {
            request = request.add_header(name, value);
        }

        if self.is_open() {
            self.pending.insert(cseq, Pending { method, awaited });
        }
        request
    }

    /// Correlate a reply with its request and apply the transition.
    ///
    /// Returns [`RtspError::ProtocolViolation`] without touching any state
    /// when the CSeq is unknown or the session id does not match.
    pub fn on_response(&mut self, response: RtspResponse) -> Result<Dispatch> {
        let cseq = response
            .cseq()
            .ok_or(RtspError::ProtocolViolation(ViolationKind::MissingCSeq))?;

        if !self.pending.contains_key(&cseq) {
            return Err(RtspError::ProtocolViolation(ViolationKind::UnknownCSeq(cseq)));
        }

        if let (Some(bound), Some(received)) = (&self.session_id, response.session_id())
            && bound != received
        {
            return Err(RtspError::ProtocolViolation(
                ViolationKind::SessionMismatch {
                    expected: bound.clone(),
                    received: received.to_string(),
                },
            ));
        }

        let Some(pending) = self.pending.remove(&cseq) else {
            return Err(RtspError::ProtocolViolation(ViolationKind::UnknownCSeq(cseq)));
        };
        let method = pending.method;
        let status = response.status_code;

        let follow_up = match status {
            200 => self.on_success(method, &response),
            302 => {
                match response.get_header("Location") {
                    Some(location) => self.close(Closure::Redirected {
                        location: location.to_string(),
                    }),
                    None => self.close(Closure::Rejected {
                        method,
                        status,
                        reason: response.status_text.clone(),
                    }),
                }
                None
            }
            _ => {
                let had_session = self.session_id.is_some() && self.is_open();
                self.close(Closure::Rejected {
                    method,
                    status,
                    reason: response.status_text.clone(),
                });
                (had_session && method != Method::Teardown).then_some(FollowUp::Teardown)
            }
        };

        if pending.awaited {
            self.replies.insert(cseq, response);
        }

        Ok(Dispatch {
            cseq,
            method,
            status,
            follow_up,
        })
    }

    /// Handle a server-initiated request (stream notice).
    pub fn on_notification(&mut self, request: &RtspRequest) -> Option<FollowUp> {
        let code = request
            .get_header("x-notice")
            .and_then(|v| v.split_whitespace().next())
            .and_then(|c| c.parse::<u32>().ok());

        match code {
            Some(NOTICE_END_OF_STREAM | NOTICE_BEGIN_OF_STREAM)
                if matches!(self.state, SessionState::Ready | SessionState::Playing) =>
            {
                tracing::info!(
                    code,
                    range = %self.cursor.range,
                    "stream notice, resuming playback"
                );
                self.cursor.scale = 1.0;
                Some(FollowUp::Play)
            }
            Some(NOTICE_CLOSE) if self.is_open() => {
                tracing::info!(code, "server asked to close session");
                Some(FollowUp::Teardown)
            }
            _ => {
                tracing::debug!(
                    method = %request.method,
                    ?code,
                    state = ?self.state,
                    "notification ignored"
                );
                None
            }
        }
    }

    /// Take the reply for an awaited CSeq once it has been dispatched.
    pub fn take_reply(&mut self, cseq: u32) -> Option<RtspResponse> {
        self.replies.remove(&cseq)
    }

    /// Whether `cseq` is still waiting for its reply.
    pub fn is_pending(&self, cseq: u32) -> bool {
        self.pending.contains_key(&cseq)
    }

    /// Stop waiting for `cseq`. A reply arriving later is a violation.
    pub fn forget(&mut self, cseq: u32) {
        self.pending.remove(&cseq);
        self.replies.remove(&cseq);
    }

    /// Move to CLOSED. The first closure reason sticks. Outstanding
    /// requests are dropped; replies already dispatched stay takeable.
    pub fn close(&mut self, closure: Closure) {
        if self.closure.is_none() {
            tracing::info!(session_id = ?self.session_id, ?closure, "session closed");
            self.closure = Some(closure);
        }
        self.pending.clear();
        self.set_state(SessionState::Closed);
    }

    fn on_success(&mut self, method: Method, response: &RtspResponse) -> Option<FollowUp> {
        if !self.is_open() {
            return None;
        }

        if self.session_id.is_none()
            && let Some(id) = response.session_id()
        {
            tracing::info!(session_id = id, %method, "session id bound");
            self.session_id = Some(id.to_string());
        }

        match method {
            Method::Describe => {
                let sdp = response.body_text();
                if let Some(base) = response
                    .get_header("Content-Base")
                    .or_else(|| response.get_header("Content-Location"))
                {
                    self.base = base.to_string();
                }
                let track = match sdp::default_track(&sdp) {
                    Some(control) => url::resolve(&self.base, control),
                    None => self.base.clone(),
                };
                tracing::debug!(track = %track, "default track selected");
                self.track = Some(track.clone());
                (self.autoplay && self.state == SessionState::Init)
                    .then_some(FollowUp::Setup { uri: track })
            }
            Method::Setup => {
                self.transport = response
                    .get_header("Transport")
                    .and_then(TransportHeader::parse);
                if self.state == SessionState::Init {
                    self.set_state(SessionState::Ready);
                }
                self.autoplay.then_some(FollowUp::Play)
            }
            Method::Play => {
                self.set_state(SessionState::Playing);
                None
            }
            Method::Pause => {
                if self.state == SessionState::Playing {
                    self.set_state(SessionState::Ready);
                }
                None
            }
            Method::Teardown => {
                self.close(Closure::TornDown);
                None
            }
            _ => None,
        }
    }

    fn set_state(&mut self, state: SessionState) {
        if self.state != state {
            tracing::debug!(
                session_id = ?self.session_id,
                old_state = ?self.state,
                new_state = ?state,
                "state transition"
            );
            self.state = state;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn defaults() -> RequestDefaults {
        RequestDefaults {
            user_agent: "test-agent".to_string(),
            version: "RTSP/1.0".to_string(),
            authorization: None,
            describe_headers: Vec::new(),
        }
    }

    fn session() -> Session {
        Session::new(RtspUrl::parse("rtsp://10.0.0.1/stream").unwrap(), defaults())
    }

    const TRACK: &str = "rtsp://10.0.0.1:554/stream/track1";
    const UDP_TRANSPORT: &str = "RTP/AVP;unicast;client_port=10014-10015";

    fn reply(raw: &str) -> RtspResponse {
        RtspResponse::parse(raw.as_bytes()).unwrap()
    }

    fn setup_and_play(s: &mut Session) {
        let setup = s.setup_request(TRACK, UDP_TRANSPORT, false);
        let cseq = setup.cseq().unwrap();
        s.on_response(reply(&format!(
            "RTSP/1.0 200 OK\r\nCSeq: {cseq}\r\nSession: 4321;timeout=60\r\n\r\n"
        )))
        .unwrap();
        let play = s.request(Method::Play, false);
        let cseq = play.cseq().unwrap();
        s.on_response(reply(&format!(
            "RTSP/1.0 200 OK\r\nCSeq: {cseq}\r\nSession: 4321\r\n\r\n"
        )))
        .unwrap();
    }

    #[test]
    fn cseq_increments_by_one_for_every_method() {
        let mut s = session();
        let methods = [
            Method::Options,
            Method::Describe,
            Method::GetParameter,
            Method::Play,
            Method::Teardown,
        ];
        let cseqs: Vec<u32> = methods
            .iter()
            .map(|m| s.request(*m, false).cseq().unwrap())
            .collect();
        assert_eq!(cseqs, vec![1, 2, 3, 4, 5]);
        assert_eq!(s.pending_count(), 5);
    }

    #[test]
    fn request_carries_standard_headers() {
        let mut s = session();
        let req = s.request(Method::Describe, false);
        assert_eq!(req.uri, "rtsp://10.0.0.1:554/stream");
        assert_eq!(req.get_header("User-Agent"), Some("test-agent"));
        assert_eq!(req.get_header("Accept"), Some("application/sdp"));
        assert_eq!(req.get_header("Session"), None);
    }

    #[test]
    fn setup_then_play() {
        let mut s = session();
        setup_and_play(&mut s);
        assert_eq!(s.state(), SessionState::Playing);
        assert_eq!(s.session_id(), Some("4321"));

        let req = s.request(Method::GetParameter, false);
        assert_eq!(req.get_header("Session"), Some("4321"));
    }

    #[test]
    fn setup_binds_session_and_enters_ready() {
        let mut s = session();
        let setup = s.setup_request(TRACK, UDP_TRANSPORT, false);
        let d = s
            .on_response(reply(&format!(
                "RTSP/1.0 200 OK\r\nCSeq: {}\r\nSession: 4321\r\n\
                 Transport: {UDP_TRANSPORT};server_port=5000-5001\r\n\r\n",
                setup.cseq().unwrap()
            )))
            .unwrap();
        assert_eq!(d.method, Method::Setup);
        assert_eq!(s.state(), SessionState::Ready);
        assert_eq!(s.session_id(), Some("4321"));
        assert_eq!(s.transport().unwrap().server_ports, Some((5000, 5001)));
    }

    #[test]
    fn unknown_cseq_is_a_violation() {
        let mut s = session();
        s.request(Method::Options, false);
        let err = s
            .on_response(reply("RTSP/1.0 200 OK\r\nCSeq: 99\r\nSession: 1\r\n\r\n"))
            .unwrap_err();
        assert!(matches!(
            err,
            RtspError::ProtocolViolation(ViolationKind::UnknownCSeq(99))
        ));
        assert_eq!(s.state(), SessionState::Init);
        assert_eq!(s.session_id(), None);
        assert_eq!(s.pending_count(), 1);
    }

    #[test]
    fn session_mismatch_is_a_violation() {
        let mut s = session();
        setup_and_play(&mut s);
        let pause = s.request(Method::Pause, false);
        let err = s
            .on_response(reply(&format!(
                "RTSP/1.0 200 OK\r\nCSeq: {}\r\nSession: 9999\r\n\r\n",
                pause.cseq().unwrap()
            )))
            .unwrap_err();
        assert!(matches!(
            err,
            RtspError::ProtocolViolation(ViolationKind::SessionMismatch { .. })
        ));
        assert_eq!(s.state(), SessionState::Playing);
        assert!(s.is_pending(pause.cseq().unwrap()));
    }

    #[test]
    fn error_status_closes_from_any_state() {
        for played in [false, true] {
            let mut s = session();
            if played {
                setup_and_play(&mut s);
            }
            let req = s.request(Method::Describe, true);
            let cseq = req.cseq().unwrap();
            let d = s
                .on_response(reply(&format!("RTSP/1.0 404 Not Found\r\nCSeq: {cseq}\r\n\r\n")))
                .unwrap();
            assert_eq!(s.state(), SessionState::Closed);
            assert_eq!(d.status, 404);
            assert_eq!(
                d.follow_up,
                played.then_some(FollowUp::Teardown),
                "teardown only when a server session exists"
            );
            assert!(matches!(
                s.closure(),
                Some(Closure::Rejected { status: 404, method: Method::Describe, .. })
            ));
            assert_eq!(s.take_reply(cseq).unwrap().status_code, 404);
        }
    }

    #[test]
    fn redirect_records_location() {
        let mut s = session();
        let req = s.request(Method::Describe, true);
        s.on_response(reply(&format!(
            "RTSP/1.0 302 Moved Temporarily\r\nCSeq: {}\r\n\
             Location: rtsp://10.0.0.2/stream\r\n\r\n",
            req.cseq().unwrap()
        )))
        .unwrap();
        assert_eq!(s.state(), SessionState::Closed);
        assert_eq!(
            s.closure(),
            Some(&Closure::Redirected {
                location: "rtsp://10.0.0.2/stream".to_string()
            })
        );
        assert!(matches!(
            s.closure().unwrap().to_error(),
            RtspError::RedirectRequested { .. }
        ));
    }

    #[test]
    fn describe_learns_track_and_chains() {
        let mut s = session();
        s.set_autoplay(true);
        let req = s.request(Method::Describe, false);
        let body = "v=0\r\na=control:track1\r\na=control:*\r\n";
        let d = s
            .on_response(reply(&format!(
                "RTSP/1.0 200 OK\r\nCSeq: {}\r\n\
                 Content-Base: rtsp://10.0.0.1/stream/\r\nContent-Length: {}\r\n\r\n{}",
                req.cseq().unwrap(),
                body.len(),
                body
            )))
            .unwrap();
        assert_eq!(s.state(), SessionState::Init);
        assert_eq!(s.track_uri(), Some("rtsp://10.0.0.1/stream/track1"));
        assert_eq!(
            d.follow_up,
            Some(FollowUp::Setup {
                uri: "rtsp://10.0.0.1/stream/track1".to_string()
            })
        );

        let setup = s.setup_request(
            "rtsp://10.0.0.1/stream/track1",
            "RTP/AVP;unicast;client_port=1-2",
            false,
        );
        let d = s
            .on_response(reply(&format!(
                "RTSP/1.0 200 OK\r\nCSeq: {}\r\nSession: 77\r\n\r\n",
                setup.cseq().unwrap()
            )))
            .unwrap();
        assert_eq!(d.follow_up, Some(FollowUp::Play));
    }

    #[test]
    fn pause_and_teardown() {
        let mut s = session();
        setup_and_play(&mut s);
        let pause = s.request(Method::Pause, false);
        s.on_response(reply(&format!(
            "RTSP/1.0 200 OK\r\nCSeq: {}\r\n\r\n",
            pause.cseq().unwrap()
        )))
        .unwrap();
        assert_eq!(s.state(), SessionState::Ready);

        let teardown = s.request(Method::Teardown, false);
        s.on_response(reply(&format!(
            "RTSP/1.0 200 OK\r\nCSeq: {}\r\nSession: 4321\r\n\r\n",
            teardown.cseq().unwrap()
        )))
        .unwrap();
        assert_eq!(s.state(), SessionState::Closed);
        assert_eq!(s.closure(), Some(&Closure::TornDown));
        assert!(matches!(s.check_allowed(Method::Play), Err(RtspError::SessionClosed)));
    }

    #[test]
    fn guards_follow_state() {
        let s = session();
        assert!(s.check_allowed(Method::Setup).is_ok());
        assert!(matches!(
            s.check_allowed(Method::Play),
            Err(RtspError::InvalidState { state: SessionState::Init, .. })
        ));
        let mut s = session();
        setup_and_play(&mut s);
        assert!(s.check_allowed(Method::Setup).is_err());
        assert!(s.check_allowed(Method::Pause).is_ok());
    }

    #[test]
    fn notices_resume_or_close() {
        let mut s = session();
        let eos =
            RtspRequest::parse(b"ANNOUNCE rtsp://h/s RTSP/1.0\r\nx-notice: 2101\r\n\r\n")
                .unwrap();
        assert_eq!(s.on_notification(&eos), None, "nothing to resume before SETUP");

        setup_and_play(&mut s);
        s.cursor_mut().scale = 4.0;
        assert_eq!(s.on_notification(&eos), Some(FollowUp::Play));
        assert_eq!(s.cursor().scale, 1.0);

        let close = RtspRequest::parse(
            b"ANNOUNCE rtsp://h/s RTSP/1.0\r\nx-notice: 2103 \"Close\"\r\n\r\n",
        )
        .unwrap();
        assert_eq!(s.on_notification(&close), Some(FollowUp::Teardown));
    }

    #[test]
    fn forgotten_request_ignores_late_reply() {
        let mut s = session();
        let req = s.request(Method::GetParameter, true);
        let cseq = req.cseq().unwrap();
        s.forget(cseq);
        assert!(!s.is_pending(cseq));

        let err = s
            .on_response(reply(&format!("RTSP/1.0 200 OK\r\nCSeq: {cseq}\r\n\r\n")))
            .unwrap_err();
        assert!(matches!(
            err,
            RtspError::ProtocolViolation(ViolationKind::UnknownCSeq(_))
        ));
        assert!(s.take_reply(cseq).is_none());
    }

    #[test]
    fn close_drops_outstanding_requests() {
        let mut s = session();
        setup_and_play(&mut s);
        s.request(Method::GetParameter, false);
        s.request(Method::Pause, true);
        assert_eq!(s.pending_count(), 2);

        s.close(Closure::MediaFailed("silence".to_string()));
        assert_eq!(s.pending_count(), 0);

        let teardown = s.request(Method::Teardown, false);
        assert_eq!(teardown.get_header("Session"), Some("4321"));
        assert_eq!(s.pending_count(), 0);
        assert!(matches!(s.closure().unwrap().to_error(), RtspError::Io(_)));
    }

    #[test]
    fn play_uses_cursor() {
        let mut s = session();
        setup_and_play(&mut s);
        s.cursor_mut().apply(&PlaybackCommand::Backward);
        let req = s.request(Method::Play, false);
        assert_eq!(req.get_header("Range"), Some("npt=now-"));
        assert_eq!(req.get_header("Scale"), Some("-2"));
    }
}
