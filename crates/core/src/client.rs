use std::io::Write;
use std::net::{IpAddr, TcpStream};
use std::ops::RangeInclusive;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::error::{Result, RtspError};
use crate::media::receiver::ReceiveContext;
use crate::media::{PacketSource, ReceiveStats, RtpFrame, receive_loop};
use crate::protocol::request::RTSP_VERSION;
use crate::protocol::{Frame, Method, RtspMessage, RtspRequest, RtspResponse, RtspUrl};
use crate::session::transport::{self, Cast, INTERLEAVED_CHANNELS, TransportMode};
use crate::session::{
    Closure, FollowUp, PlaybackCommand, PlaybackCursor, RequestDefaults, Session, SessionState,
    TransportHeader,
};
use crate::transport::tcp::{self, ControlHandler};
use crate::transport::{InterleavedSource, UdpSource, udp};

/// Client-level configuration, fixed for the lifetime of a connection.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// `User-Agent` sent on every request.
    pub user_agent: String,
    /// Version token on request lines.
    pub rtsp_version: String,
    pub transport: TransportMode,
    pub cast: Cast,
    /// Local ports the UDP media socket may bind (even port chosen).
    pub client_ports: RangeInclusive<u16>,
    /// Explicit `destination=` for the Transport header.
    pub destination: Option<IpAddr>,
    pub connect_timeout: Duration,
    /// Bound on every blocking read so shutdown is observed.
    pub poll_interval: Duration,
    /// How long a caller waits for the reply to its request.
    pub response_timeout: Duration,
    /// Idle time after which a GET_PARAMETER keep-alive is sent.
    pub keepalive_interval: Duration,
    /// Longest media silence tolerated while PLAYING.
    pub media_timeout: Duration,
    /// Pre-built `Authorization` value. Falls back to `Basic` credentials
    /// from the URL.
    pub authorization: Option<String>,
    /// Extra headers sent with DESCRIBE.
    pub describe_headers: Vec<(String, String)>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            user_agent: format!("rtsp-client-rs/{}", env!("CARGO_PKG_VERSION")),
            rtsp_version: RTSP_VERSION.to_string(),
            transport: TransportMode::Udp,
            cast: Cast::Unicast,
            client_ports: 10014..=10113,
            destination: None,
            connect_timeout: Duration::from_secs(2),
            poll_interval: Duration::from_millis(200),
            response_timeout: Duration::from_secs(10),
            keepalive_interval: Duration::from_secs(10),
            media_timeout: Duration::from_secs(10),
            authorization: None,
            describe_headers: Vec::new(),
        }
    }
}

/// Final state of a session, returned by [`Client::teardown`].
#[derive(Debug, Clone, PartialEq)]
pub struct SessionReport {
    pub state: SessionState,
    pub closure: Option<Closure>,
    pub stats: ReceiveStats,
}

/// Media plumbing prepared before SETUP and started on its success.
#[derive(Default)]
struct MediaSlot {
    source: Option<Box<dyn PacketSource>>,
    frames: Option<Sender<RtpFrame>>,
    interleaved: Option<Sender<Vec<u8>>>,
    rtp_channel: u8,
    rtp_port: Option<u16>,
    handle: Option<JoinHandle<Result<ReceiveStats>>>,
}

/// State shared between the caller and the control loop.
///
/// Lock order: `session` before `writer`. The session lock is held while a
/// request is written so CSeq order on the wire matches issue order.
struct Shared {
    session: Mutex<Session>,
    changed: Condvar,
    writer: Mutex<TcpStream>,
    config: ClientConfig,
    running: Arc<AtomicBool>,
    playing: Arc<AtomicBool>,
    last_sent: Mutex<Instant>,
    media: Mutex<MediaSlot>,
    stats: Arc<Mutex<ReceiveStats>>,
    failure: Mutex<Option<RtspError>>,
}

impl Shared {
    /// Build a request under the session lock and write it. Returns its CSeq.
    fn send(&self, build: impl FnOnce(&mut Session) -> Result<RtspRequest>) -> Result<u32> {
        let mut session = self.session.lock();
        let request = build(&mut session)?;
        let cseq = session.cseq();

        if let Err(e) = self.write(&request) {
            session.close(Closure::ConnectionLost(e.to_string()));
            drop(session);
            self.changed.notify_all();
            return Err(e.into());
        }
        Ok(cseq)
    }

    fn write(&self, request: &RtspRequest) -> std::io::Result<()> {
        let cseq = request.cseq();
        if request.method == Method::GetParameter {
            tracing::trace!(?cseq, uri = %request.uri, "keep-alive");
        } else {
            tracing::debug!(?cseq, method = %request.method, uri = %request.uri, "request");
        }
        self.writer.lock().write_all(&request.serialize())?;
        *self.last_sent.lock() = Instant::now();
        Ok(())
    }

    /// Send `method` and block until its reply is dispatched.
    fn call(&self, method: Method) -> Result<RtspResponse> {
        let cseq = self.send(|s| {
            s.check_allowed(method)?;
            Ok(s.request(method, true))
        })?;
        self.wait_reply(cseq, method)
    }

    fn send_setup(&self, uri: &str, awaited: bool) -> Result<u32> {
        let transport = self.prepare_media()?;
        self.send(|s| {
            s.check_allowed(Method::Setup)?;
            Ok(s.setup_request(uri, &transport, awaited))
        })
    }

    fn wait_reply(&self, cseq: u32, method: Method) -> Result<RtspResponse> {
        let deadline = Instant::now() + self.config.response_timeout;
        let mut session = self.session.lock();
        loop {
            if let Some(reply) = session.take_reply(cseq) {
                let location = reply.get_header("Location").map(str::to_string);
                return match (reply.status_code, location) {
                    (200, _) => Ok(reply),
                    (302, Some(location)) => Err(RtspError::RedirectRequested { location }),
                    (status, _) => Err(RtspError::SessionRejected {
                        method,
                        status,
                        reason: reply.status_text,
                    }),
                };
            }
            if !session.is_open() {
                return Err(session
                    .closure()
                    .map(Closure::to_error)
                    .unwrap_or(RtspError::SessionClosed));
            }
            if self.changed.wait_until(&mut session, deadline).timed_out() {
                session.forget(cseq);
                return Err(RtspError::timeout(format!("{method} reply (CSeq {cseq})")));
            }
        }
    }

    /// Block until PLAYING or CLOSED.
    fn wait_playing(&self, timeout: Duration) -> Result<()> {
        let deadline = Instant::now() + timeout;
        let mut session = self.session.lock();
        loop {
            match session.state() {
                SessionState::Playing => return Ok(()),
                SessionState::Closed => {
                    if let Some(e) = self.failure.lock().take() {
                        return Err(e);
                    }
                    return Err(session
                        .closure()
                        .map(Closure::to_error)
                        .unwrap_or(RtspError::SessionClosed));
                }
                SessionState::Init | SessionState::Ready => {}
            }
            if self.changed.wait_until(&mut session, deadline).timed_out() {
                return Err(RtspError::timeout("session start"));
            }
        }
    }

    /// Bind or open the media source and return the `Transport` value to
    /// request with.
    fn prepare_media(&self) -> Result<String> {
        let config = &self.config;
        let mut slot = self.media.lock();
        match config.transport {
            TransportMode::Udp => {
                let port = match slot.rtp_port {
                    Some(port) => port,
                    None => {
                        let socket = udp::bind_in_range(config.client_ports.clone())?;
                        let source = UdpSource::new(socket, config.poll_interval)?;
                        let port = source.local_port()?;
                        slot.source = Some(Box::new(source));
                        slot.rtp_port = Some(port);
                        port
                    }
                };
                Ok(transport::request_header(
                    TransportMode::Udp,
                    config.cast,
                    port,
                    config.destination,
                ))
            }
            TransportMode::Interleaved => {
                if slot.interleaved.is_none() {
                    let (tx, rx) = mpsc::channel();
                    slot.interleaved = Some(tx);
                    slot.source = Some(Box::new(InterleavedSource::new(rx, config.poll_interval)));
                }
                Ok(transport::request_header(
                    TransportMode::Interleaved,
                    config.cast,
                    0,
                    None,
                ))
            }
        }
    }

    /// Spawn the RTP receive loop once SETUP succeeded.
    fn start_media(&self, channel: Option<u8>) {
        let mut slot = self.media.lock();
        if slot.handle.is_some() {
            return;
        }
        if let Some(channel) = channel {
            slot.rtp_channel = channel;
        }
        let (Some(source), Some(frames)) = (slot.source.take(), slot.frames.clone()) else {
            return;
        };

        let ctx = ReceiveContext {
            running: self.running.clone(),
            playing: self.playing.clone(),
            idle_timeout: self.config.media_timeout,
        };
        let stats = self.stats.clone();
        let spawned = thread::Builder::new()
            .name("rtp-receive".to_string())
            .spawn(move || receive_loop(source, frames, stats, ctx));
        match spawned {
            Ok(handle) => slot.handle = Some(handle),
            Err(e) => tracing::error!(error = %e, "cannot start RTP receive loop"),
        }
    }

    /// Join the receive loop if it exited on its own.
    fn reap_media(&self) {
        let finished = {
            let mut slot = self.media.lock();
            let done = slot.handle.as_ref().is_some_and(JoinHandle::is_finished);
            if done { slot.handle.take() } else { None }
        };
        if let Some(handle) = finished {
            self.finish_media(handle);
        }
    }

    /// Collect the receive loop's outcome. The loop only fails while the
    /// client is running, so any error closes the session and is kept
    /// for [`Client::teardown`].
    fn finish_media(&self, handle: JoinHandle<Result<ReceiveStats>>) {
        let error = match handle.join() {
            Ok(Ok(stats)) => {
                *self.stats.lock() = stats;
                return;
            }
            Ok(Err(e)) => e,
            Err(_) => RtspError::Io(std::io::Error::other("RTP receive loop panicked")),
        };
        tracing::error!(error = %error, "RTP receive loop failed");
        self.playing.store(false, Ordering::SeqCst);

        let release = {
            let mut session = self.session.lock();
            let release = session.is_open() && session.session_id().is_some();
            session.close(Closure::MediaFailed(error.to_string()));
            release
        };
        {
            let mut failure = self.failure.lock();
            if failure.is_none() {
                *failure = Some(error);
            }
        }
        self.changed.notify_all();

        if release {
            self.follow(FollowUp::Teardown);
        }
    }

    fn dispatch(&self, response: RtspResponse) {
        let (dispatch, state, channel) = {
            let mut session = self.session.lock();
            let open = session.is_open();
            match session.on_response(response) {
                Ok(dispatch) => {
                    let channel = session
                        .transport()
                        .and_then(|t| t.interleaved)
                        .map(|(rtp, _)| rtp);
                    (dispatch, session.state(), channel)
                }
                Err(e) if open => {
                    tracing::warn!(error = %e, "discarding reply");
                    return;
                }
                Err(e) => {
                    tracing::debug!(error = %e, "reply after close ignored");
                    return;
                }
            }
        };
        self.playing
            .store(state == SessionState::Playing, Ordering::SeqCst);

        if dispatch.method == Method::GetParameter {
            tracing::trace!(cseq = dispatch.cseq, status = dispatch.status, "keep-alive reply");
        } else {
            tracing::debug!(
                cseq = dispatch.cseq,
                method = %dispatch.method,
                status = dispatch.status,
                state = ?state,
                "response"
            );
        }

        if dispatch.method == Method::Setup && dispatch.status == 200 {
            self.start_media(channel);
        }
        self.changed.notify_all();

        if let Some(follow_up) = dispatch.follow_up {
            self.follow(follow_up);
        }
    }

    fn on_server_request(&self, request: RtspRequest) {
        tracing::debug!(method = %request.method, uri = %request.uri, "server request");

        if let Some(cseq) = request.cseq() {
            let mut ack = RtspResponse::ok().add_header("CSeq", &cseq.to_string());
            if let Some(id) = request.get_header("Session") {
                ack = ack.add_header("Session", id);
            }
            if let Err(e) = self.writer.lock().write_all(&ack.serialize()) {
                tracing::warn!(cseq, error = %e, "cannot acknowledge server request");
            }
        }

        let follow_up = self.session.lock().on_notification(&request);
        if let Some(follow_up) = follow_up {
            self.follow(follow_up);
        }
    }

    /// Send a request chained from a reply or notice.
    fn follow(&self, follow_up: FollowUp) {
        let result = match &follow_up {
            FollowUp::Setup { uri } => self.send_setup(uri, false),
            FollowUp::Play => self.send(|s| {
                s.check_allowed(Method::Play)?;
                Ok(s.request(Method::Play, false))
            }),
            FollowUp::Teardown => self.send(|s| Ok(s.request(Method::Teardown, false))),
        };

        if let Err(e) = result {
            tracing::warn!(?follow_up, error = %e, "chained request failed");
            let mut session = self.session.lock();
            if session.is_open() {
                session.close(Closure::Aborted(e.to_string()));
                *self.failure.lock() = Some(e);
            }
            drop(session);
            self.changed.notify_all();
        }
    }
}

impl ControlHandler for Shared {
    fn on_frame(&self, frame: Frame) {
        match frame {
            Frame::Message(raw) => match RtspMessage::parse(&raw) {
                Ok(RtspMessage::Response(response)) => self.dispatch(response),
                Ok(RtspMessage::Request(request)) => self.on_server_request(request),
                Err(e) => tracing::warn!(error = %e, "discarding control message"),
            },
            Frame::Interleaved { channel, payload } => {
                let slot = self.media.lock();
                match &slot.interleaved {
                    Some(tx) if channel == slot.rtp_channel => {
                        // Receiver gone means the receive loop already exited.
                        let _ = tx.send(payload);
                    }
                    _ => tracing::trace!(channel, len = payload.len(), "interleaved frame ignored"),
                }
            }
        }
    }

    fn on_tick(&self) {
        if !self.running.load(Ordering::SeqCst) {
            return;
        }
        self.reap_media();
        if self.last_sent.lock().elapsed() < self.config.keepalive_interval {
            return;
        }
        let result = self.send(|s| {
            if !s.is_open() || s.session_id().is_none() {
                return Err(RtspError::SessionClosed);
            }
            Ok(s.request(Method::GetParameter, false))
        });
        match result {
            Ok(_) | Err(RtspError::SessionClosed) => {}
            Err(e) => tracing::warn!(error = %e, "keep-alive failed"),
        }
    }

    fn on_closed(&self, reason: &'static str, clean: bool) {
        self.playing.store(false, Ordering::SeqCst);
        if !clean {
            self.session
                .lock()
                .close(Closure::ConnectionLost(reason.to_string()));
        }
        // Dropping the interleaved sender ends the receive loop.
        self.media.lock().interleaved = None;
        self.changed.notify_all();
    }
}

/// RTSP client for one stream.
///
/// Owns the control connection and two background loops: the control
/// loop (replies, notices, keep-alive) and, after SETUP, the RTP receive
/// loop. Every request method blocks until its own reply is dispatched.
///
/// ```no_run
/// use rtsp::{Client, ClientConfig};
///
/// let mut client = Client::connect("rtsp://10.0.0.1/stream", ClientConfig::default())?;
/// let frames = client.take_frames().expect("frames not taken yet");
/// client.start()?;
/// for frame in frames.iter().take(100) {
///     println!("seq {} ({} bytes)", frame.sequence, frame.payload.len());
/// }
/// let report = client.teardown()?;
/// println!("lost {}", report.stats.lost);
/// # Ok::<(), rtsp::RtspError>(())
/// ```
pub struct Client {
    shared: Arc<Shared>,
    control: Option<JoinHandle<()>>,
    frames: Option<Receiver<RtpFrame>>,
}

impl Client {
    /// Open the control connection to `url` and start the control loop.
    pub fn connect(url: &str, config: ClientConfig) -> Result<Self> {
        let url = RtspUrl::parse(url)?;
        let stream = tcp::connect(&url.authority(), config.connect_timeout)?;
        let reader = stream.try_clone()?;
        reader.set_read_timeout(Some(config.poll_interval))?;

        let defaults = RequestDefaults {
            user_agent: config.user_agent.clone(),
            version: config.rtsp_version.clone(),
            authorization: config.authorization.clone().or_else(|| url.authorization()),
            describe_headers: config.describe_headers.clone(),
        };
        tracing::info!(url = %url, transport = ?config.transport, "connecting RTSP session");

        let (frames_tx, frames_rx) = mpsc::channel();
        let running = Arc::new(AtomicBool::new(true));
        let shared = Arc::new(Shared {
            session: Mutex::new(Session::new(url, defaults)),
            changed: Condvar::new(),
            writer: Mutex::new(stream),
            config,
            running: running.clone(),
            playing: Arc::new(AtomicBool::new(false)),
            last_sent: Mutex::new(Instant::now()),
            media: Mutex::new(MediaSlot {
                frames: Some(frames_tx),
                rtp_channel: INTERLEAVED_CHANNELS.0,
                ..MediaSlot::default()
            }),
            stats: Arc::new(Mutex::new(ReceiveStats::default())),
            failure: Mutex::new(None),
        });

        let handler = shared.clone();
        let control = thread::Builder::new()
            .name("rtsp-control".to_string())
            .spawn(move || tcp::control_loop(reader, handler, running))?;

        Ok(Client {
            shared,
            control: Some(control),
            frames: Some(frames_rx),
        })
    }

    /// DESCRIBE, then SETUP the default track and PLAY, chained from the
    /// replies. Blocks until PLAYING or CLOSED.
    pub fn start(&mut self) -> Result<()> {
        self.shared.session.lock().set_autoplay(true);
        self.shared.send(|s| {
            s.check_allowed(Method::Describe)?;
            Ok(s.request(Method::Describe, false))
        })?;
        self.shared
            .wait_playing(self.shared.config.response_timeout * 3)
    }

    pub fn options(&mut self) -> Result<RtspResponse> {
        self.shared.call(Method::Options)
    }

    /// Fetch the SDP description. The default track is remembered for
    /// [`setup`](Self::setup).
    pub fn describe(&mut self) -> Result<String> {
        Ok(self.shared.call(Method::Describe)?.body_text())
    }

    /// SETUP `track`, or the default track learned from DESCRIBE.
    pub fn setup(&mut self, track: Option<&str>) -> Result<()> {
        let uri = match track {
            Some(track) => {
                let session = self.shared.session.lock();
                crate::protocol::url::resolve(session.base_uri(), track)
            }
            None => {
                let session = self.shared.session.lock();
                session
                    .track_uri()
                    .unwrap_or(session.base_uri())
                    .to_string()
            }
        };
        let cseq = self.shared.send_setup(&uri, true)?;
        self.shared.wait_reply(cseq, Method::Setup).map(|_| ())
    }

    /// PLAY at the held cursor.
    pub fn play(&mut self) -> Result<()> {
        self.shared.call(Method::Play).map(|_| ())
    }

    pub fn pause(&mut self) -> Result<()> {
        self.shared.call(Method::Pause).map(|_| ())
    }

    /// Explicit keep-alive.
    pub fn get_parameter(&mut self) -> Result<RtspResponse> {
        self.shared.call(Method::GetParameter)
    }

    /// Apply a user playback command.
    pub fn command(&mut self, command: PlaybackCommand) -> Result<()> {
        match command {
            PlaybackCommand::Teardown => self.teardown().map(|_| ()),
            PlaybackCommand::Pause => {
                self.shared.session.lock().check_allowed(Method::Pause)?;
                self.shared.session.lock().cursor_mut().apply(&command);
                self.pause()
            }
            command => {
                self.shared.session.lock().check_allowed(Method::Play)?;
                self.shared.session.lock().cursor_mut().apply(&command);
                self.play()
            }
        }
    }

    /// TEARDOWN, then stop and join both loops.
    ///
    /// The loops are always joined. An error from the TEARDOWN exchange,
    /// or the failure that ended the RTP receive loop, is returned after
    /// shutdown; [`stats`](Self::stats) stays readable either way.
    pub fn teardown(&mut self) -> Result<SessionReport> {
        let open = self.shared.session.lock().is_open();
        let outcome = if open && self.control.is_some() {
            self.shared.call(Method::Teardown).map(|_| ())
        } else {
            Ok(())
        };

        self.shutdown();
        let report = self.report();
        tracing::info!(
            state = ?report.state,
            delivered = report.stats.delivered,
            lost = report.stats.lost,
            late = report.stats.late,
            loss_rate = report.stats.loss_rate(),
            "session report"
        );
        outcome?;
        match self.shared.failure.lock().take() {
            Some(e) => Err(e),
            None => Ok(report),
        }
    }

    /// After a 302, connect to the `Location` with the same configuration
    /// and cursor, and replay DESCRIBE (and the auto-chain if it was
    /// active).
    ///
    /// A further redirect during the replay is not an error: the returned
    /// client is closed and [`redirect_target`](Self::redirect_target)
    /// names the next hop.
    pub fn follow_redirect(mut self) -> Result<Client> {
        let Some(location) = self.redirect_target() else {
            return Err(RtspError::SessionClosed);
        };
        let (cursor, autoplay) = {
            let session = self.shared.session.lock();
            (session.cursor().clone(), session.autoplay())
        };
        let config = self.shared.config.clone();
        self.shutdown();

        tracing::info!(%location, "following redirect");
        let mut next = Client::connect(&location, config)?;
        next.set_cursor(cursor);
        let replay = if autoplay {
            next.start()
        } else {
            next.describe().map(|_| ())
        };
        match replay {
            Ok(()) | Err(RtspError::RedirectRequested { .. }) => Ok(next),
            Err(e) => Err(e),
        }
    }

    pub fn state(&self) -> SessionState {
        self.shared.session.lock().state()
    }

    pub fn session_id(&self) -> Option<String> {
        self.shared.session.lock().session_id().map(str::to_string)
    }

    pub fn url(&self) -> RtspUrl {
        self.shared.session.lock().url().clone()
    }

    pub fn track_uri(&self) -> Option<String> {
        self.shared.session.lock().track_uri().map(str::to_string)
    }

    /// Transport parameters confirmed by the server's SETUP reply.
    pub fn transport(&self) -> Option<TransportHeader> {
        self.shared.session.lock().transport().cloned()
    }

    pub fn closure(&self) -> Option<Closure> {
        self.shared.session.lock().closure().cloned()
    }

    /// `Location` of a pending redirect, if the session was redirected.
    pub fn redirect_target(&self) -> Option<String> {
        match self.shared.session.lock().closure() {
            Some(Closure::Redirected { location }) => Some(location.clone()),
            _ => None,
        }
    }

    pub fn cursor(&self) -> PlaybackCursor {
        self.shared.session.lock().cursor().clone()
    }

    pub fn set_cursor(&mut self, cursor: PlaybackCursor) {
        *self.shared.session.lock().cursor_mut() = cursor;
    }

    /// Local RTP port, once a UDP media socket is bound.
    pub fn rtp_port(&self) -> Option<u16> {
        self.shared.media.lock().rtp_port
    }

    /// Counters published by the receive loop.
    pub fn stats(&self) -> ReceiveStats {
        *self.shared.stats.lock()
    }

    /// In-order RTP frames. Frames queue until the receiver is taken, so
    /// take it before [`start`](Self::start) when consuming media.
    pub fn take_frames(&mut self) -> Option<Receiver<RtpFrame>> {
        self.frames.take()
    }

    fn report(&self) -> SessionReport {
        let session = self.shared.session.lock();
        SessionReport {
            state: session.state(),
            closure: session.closure().cloned(),
            stats: *self.shared.stats.lock(),
        }
    }

    fn shutdown(&mut self) {
        self.shared.running.store(false, Ordering::SeqCst);
        self.shared.playing.store(false, Ordering::SeqCst);

        if let Some(control) = self.control.take()
            && control.join().is_err()
        {
            tracing::error!("control loop panicked");
        }

        let handle = {
            let mut slot = self.shared.media.lock();
            slot.frames = None;
            slot.source = None;
            slot.handle.take()
        };
        if let Some(handle) = handle {
            self.shared.finish_media(handle);
        }
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        self.shared.running.store(false, Ordering::SeqCst);
    }
}
