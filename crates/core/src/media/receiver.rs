use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use super::rtp::RtpPacket;
use super::sequence::{ReceiveStats, SequenceTracker};
use super::{PacketSource, RtpFrame};
use crate::error::{Result, RtspError};

/// Flags and bounds the receive loop polls between reads.
#[derive(Clone)]
pub struct ReceiveContext {
    /// Cleared by TEARDOWN; the loop exits cleanly once it sees it.
    pub running: Arc<AtomicBool>,
    /// Set while the session is PLAYING. Silence only counts then.
    pub playing: Arc<AtomicBool>,
    /// Longest silence tolerated while playing.
    pub idle_timeout: Duration,
}

/// RTP receive loop.
///
/// Decodes each datagram, drops late ones and forwards the rest in order
/// to `frames`. Counters are published to `stats` after every datagram.
/// Returns the final counters on shutdown, or an error if the source
/// failed or went silent while playing. A source reporting
/// `ConnectionAborted` was closed by its owner and ends the loop cleanly.
pub fn receive_loop(
    mut source: Box<dyn PacketSource>,
    frames: Sender<RtpFrame>,
    stats: Arc<Mutex<ReceiveStats>>,
    ctx: ReceiveContext,
) -> Result<ReceiveStats> {
    let mut tracker = SequenceTracker::new();
    let mut last_packet = Instant::now();
    let mut consumer_gone = false;

    tracing::debug!(source = source.kind(), "RTP receive loop started");

    while ctx.running.load(Ordering::SeqCst) {
        let datagram = match source.recv() {
            Ok(Some(datagram)) => datagram,
            Ok(None) => {
                if !ctx.playing.load(Ordering::SeqCst) {
                    last_packet = Instant::now();
                } else if last_packet.elapsed() > ctx.idle_timeout {
                    return Err(RtspError::timeout("no RTP packets while playing"));
                }
                continue;
            }
            Err(e) => {
                if !ctx.running.load(Ordering::SeqCst) {
                    break;
                }
                if e.kind() == std::io::ErrorKind::ConnectionAborted {
                    tracing::debug!(source = source.kind(), "media source closed");
                    break;
                }
                tracing::error!(source = source.kind(), error = %e, "RTP receive failed");
                return Err(e.into());
            }
        };
        last_packet = Instant::now();

        match RtpPacket::decode(&datagram) {
            Ok(packet) => {
                if let Some(index) = tracker.observe(packet.sequence) {
                    let frame = RtpFrame {
                        sequence: packet.sequence,
                        index,
                        timestamp: packet.timestamp,
                        payload_type: packet.payload_type,
                        marker: packet.marker,
                        ssrc: packet.ssrc,
                        payload: packet.payload,
                    };
                    if frames.send(frame).is_err() && !consumer_gone {
                        tracing::debug!("frame consumer dropped; counting only");
                        consumer_gone = true;
                    }
                } else {
                    tracing::trace!(seq = packet.sequence, "late RTP packet dropped");
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "dropping RTP datagram");
                tracker.record_truncated();
            }
        }

        *stats.lock() = tracker.stats();
    }

    let final_stats = tracker.stats();
    tracing::debug!(?final_stats, "RTP receive loop exited");
    Ok(final_stats)
}
