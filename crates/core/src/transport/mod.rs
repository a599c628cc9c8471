//! Network transport layer for RTSP signaling and RTP media reception.
//!
//! RTSP uses a split transport model:
//!
//! - **TCP** ([`tcp`]): carries RTSP request/response signaling. One
//!   connection per session, read by a dedicated control loop thread.
//!
//! - **UDP** ([`udp`]): carries RTP media. One socket bound to an even
//!   port from the configured client range.
//!
//! - **Interleaved** ([`interleaved`]): RTP multiplexed onto the control
//!   connection with `$` framing (RFC 7826 §14). The control loop hands
//!   those frames to the receive loop over a channel.
//!
//! Every blocking read is bounded by a poll interval so the loops observe
//! the shared `running` flag promptly.

pub mod interleaved;
pub mod tcp;
pub mod udp;

pub use interleaved::InterleavedSource;
pub use tcp::ControlHandler;
pub use udp::UdpSource;

/// Whether an I/O error only means the poll interval elapsed.
pub(crate) fn is_poll_timeout(e: &std::io::Error) -> bool {
    matches!(
        e.kind(),
        std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut
    )
}
