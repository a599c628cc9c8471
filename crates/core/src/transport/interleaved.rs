use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::time::Duration;

use crate::media::PacketSource;

/// RTP payloads demultiplexed from `$` frames on the control connection.
///
/// The control loop owns the socket; it forwards frames for the RTP
/// channel here. The sender side disappearing means the control
/// connection is gone.
pub struct InterleavedSource {
    rx: Receiver<Vec<u8>>,
    poll: Duration,
}

impl InterleavedSource {
    pub fn new(rx: Receiver<Vec<u8>>, poll: Duration) -> Self {
        Self { rx, poll }
    }
}

impl PacketSource for InterleavedSource {
    fn recv(&mut self) -> std::io::Result<Option<Vec<u8>>> {
        match self.rx.recv_timeout(self.poll) {
            Ok(data) => Ok(Some(data)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => Err(std::io::Error::new(
                std::io::ErrorKind::ConnectionAborted,
                "control connection closed",
            )),
        }
    }

    fn kind(&self) -> &'static str {
        "interleaved"
    }
}
