use std::io::Read;
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crate::error::{Result, RtspError};
use crate::protocol::{Frame, MessageFramer};

const READ_BUFFER_SIZE: usize = 16 * 1024;

/// Open the control connection, failing fast after `timeout`.
///
/// Every resolved address is tried in turn; the last failure is reported
/// as [`RtspError::ConnectionFailure`].
pub fn connect(authority: &str, timeout: Duration) -> Result<TcpStream> {
    let addrs = authority
        .to_socket_addrs()
        .map_err(|source| RtspError::ConnectionFailure {
            addr: authority.to_string(),
            source,
        })?;

    let mut last_err = std::io::Error::new(
        std::io::ErrorKind::AddrNotAvailable,
        "host resolved to no addresses",
    );
    for addr in addrs {
        match TcpStream::connect_timeout(&addr, timeout) {
            Ok(stream) => {
                stream.set_nodelay(true)?;
                tracing::info!(%addr, "control connection established");
                return Ok(stream);
            }
            Err(e) => {
                tracing::debug!(%addr, error = %e, "connect attempt failed");
                last_err = e;
            }
        }
    }

    Err(RtspError::ConnectionFailure {
        addr: authority.to_string(),
        source: last_err,
    })
}

/// Receiver of everything the control loop produces.
pub trait ControlHandler: Send + Sync {
    /// A complete frame cut from the control stream.
    fn on_frame(&self, frame: Frame);

    /// Called after every read attempt, including poll timeouts. Drives
    /// the keep-alive timer.
    fn on_tick(&self);

    /// The loop is exiting. `reason` is a short description for logs.
    fn on_closed(&self, reason: &'static str, clean: bool);
}

/// Read the control connection until `running` is cleared or the peer
/// goes away.
///
/// `stream` must already have a read timeout set; each timeout is one
/// tick.
pub fn control_loop<H: ControlHandler>(
    stream: TcpStream,
    handler: Arc<H>,
    running: Arc<AtomicBool>,
) {
    let peer_addr = match stream.peer_addr() {
        Ok(addr) => addr,
        Err(e) => {
            tracing::warn!(error = %e, "control socket has no peer");
            handler.on_closed("control socket disconnected", false);
            return;
        }
    };

    let mut conn = Connection {
        reader: stream,
        framer: MessageFramer::new(),
        handler,
        peer_addr,
    };

    let reason = conn.run(&running);
    let clean = !running.load(Ordering::SeqCst);
    tracing::debug!(%peer_addr, reason, clean, "control loop exited");
    conn.handler.on_closed(reason, clean);
}

/// Read side of one control connection.
struct Connection<H> {
    reader: TcpStream,
    framer: MessageFramer,
    handler: Arc<H>,
    peer_addr: SocketAddr,
}

impl<H: ControlHandler> Connection<H> {
    /// Read/frame/dispatch loop. Returns the reason for exiting.
    fn run(&mut self, running: &AtomicBool) -> &'static str {
        let mut buf = vec![0u8; READ_BUFFER_SIZE];

        while running.load(Ordering::SeqCst) {
            match self.reader.read(&mut buf) {
                Ok(0) => return "connection closed by server",
                Ok(n) => {
                    self.framer.extend(&buf[..n]);
                    let (frames, err) = self.framer.drain_frames();
                    for frame in frames {
                        self.handler.on_frame(frame);
                    }
                    if let Some(e) = err {
                        tracing::warn!(
                            peer = %self.peer_addr,
                            error = %e,
                            "discarding control bytes"
                        );
                    }
                }
                Err(ref e) if super::is_poll_timeout(e) => {}
                Err(e) => {
                    if running.load(Ordering::SeqCst) {
                        tracing::warn!(peer = %self.peer_addr, error = %e, "control read error");
                    }
                    return "read error";
                }
            }
            self.handler.on_tick();
        }

        "client shutting down"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::io::Write;
    use std::net::TcpListener;

    #[derive(Default)]
    struct Recorder {
        frames: Mutex<Vec<Frame>>,
        closed: Mutex<Option<(&'static str, bool)>>,
    }

    impl ControlHandler for Recorder {
        fn on_frame(&self, frame: Frame) {
            self.frames.lock().push(frame);
        }
        fn on_tick(&self) {}
        fn on_closed(&self, reason: &'static str, clean: bool) {
            *self.closed.lock() = Some((reason, clean));
        }
    }

    #[test]
    fn frames_until_peer_closes() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let server = std::thread::spawn(move || {
            let (mut sock, _) = listener.accept().unwrap();
            sock.write_all(b"RTSP/1.0 200 OK\r\nCSeq: 1\r\n\r\n$\x00\x00\x02ab")
                .unwrap();
        });

        let stream = connect(&addr.to_string(), Duration::from_secs(2)).unwrap();
        stream
            .set_read_timeout(Some(Duration::from_millis(50)))
            .unwrap();
        let recorder = Arc::new(Recorder::default());
        control_loop(stream, recorder.clone(), Arc::new(AtomicBool::new(true)));
        server.join().unwrap();

        let frames = recorder.frames.lock();
        assert_eq!(frames.len(), 2);
        assert_eq!(
            frames[1],
            Frame::Interleaved {
                channel: 0,
                payload: b"ab".to_vec()
            }
        );
        assert_eq!(
            *recorder.closed.lock(),
            Some(("connection closed by server", false))
        );
    }

    #[test]
    fn refused_connection_is_typed() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let err = connect(&addr.to_string(), Duration::from_millis(500)).unwrap_err();
        assert!(matches!(err, RtspError::ConnectionFailure { .. }));
    }
}
