//! RTP reception.
//!
//! Media arrives as RTP packets (RFC 3550) either on a UDP socket or
//! interleaved on the RTSP control connection. Both arrive through the
//! [`PacketSource`] trait, so the receive loop does not care which
//! transport was negotiated.
//!
//! ## RTP overview (RFC 3550)
//!
//! Every RTP packet carries a 12-byte fixed header ([`rtp::RtpPacket`])
//! containing:
//!
//! - **Sequence number** (16-bit, wrapping): for reordering and loss detection.
//! - **Timestamp** (32-bit): media clock, typically 90 kHz for video.
//! - **SSRC** (32-bit): identifies the sender.
//! - **Marker bit**: set on the last packet of an access unit (frame).
//!
//! Payloads are handed to the consumer as opaque bytes.

pub mod receiver;
pub mod rtp;
pub mod sequence;

pub use receiver::receive_loop;
pub use rtp::RtpPacket;
pub use sequence::{ReceiveStats, SequenceTracker};

/// A source of raw RTP datagrams.
///
/// Implementations block for at most their configured poll interval so
/// the receive loop can observe shutdown between calls.
pub trait PacketSource: Send {
    /// Next datagram, or `Ok(None)` when the poll interval elapsed first.
    fn recv(&mut self) -> std::io::Result<Option<Vec<u8>>>;

    /// Short label for logs (e.g. `"udp"`).
    fn kind(&self) -> &'static str;
}

/// An in-order RTP payload delivered to the consumer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RtpFrame {
    /// Wire sequence number.
    pub sequence: u16,
    /// Extended sequence number; strictly increasing across wraparound.
    pub index: u64,
    pub timestamp: u32,
    pub payload_type: u8,
    pub marker: bool,
    pub ssrc: u32,
    pub payload: Vec<u8>,
}
