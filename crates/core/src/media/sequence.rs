/// Packet counters for one receive session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReceiveStats {
    /// Packets forwarded to the consumer.
    pub delivered: u64,
    /// Loss events: one per sequence gap and one per truncated datagram.
    pub lost: u64,
    /// Duplicate or older packets discarded.
    pub late: u64,
    /// Sequence numbers skipped over by gaps.
    pub missing: u64,
}

impl ReceiveStats {
    /// Fraction of expected packets that never arrived in order.
    pub fn loss_rate(&self) -> f64 {
        let expected = self.delivered + self.missing;
        if expected == 0 {
            0.0
        } else {
            self.missing as f64 / expected as f64
        }
    }
}

/// In-order acceptance over the 16-bit RTP sequence space.
///
/// A packet is newer than the last delivered one when the forward distance
/// is in `1..0x8000` (RFC 3550 §A.1 wraparound rule). Newer packets are
/// delivered even across a gap; the gap counts as one loss. Everything
/// else is late and dropped.
#[derive(Debug, Default)]
pub struct SequenceTracker {
    last: Option<u16>,
    cycles: u64,
    stats: ReceiveStats,
}

impl SequenceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the extended index to deliver `seq` under, or `None` if the
    /// packet is late.
    pub fn observe(&mut self, seq: u16) -> Option<u64> {
        if let Some(last) = self.last {
            let delta = seq.wrapping_sub(last);
            if delta == 0 || delta >= 0x8000 {
                self.stats.late += 1;
                return None;
            }
            if seq < last {
                self.cycles += 1;
            }
            if delta != 1 {
                self.stats.lost += 1;
                self.stats.missing += u64::from(delta - 1);
                tracing::debug!(last, seq, skipped = delta - 1, "RTP sequence gap");
            }
        }

        self.last = Some(seq);
        self.stats.delivered += 1;
        Some((self.cycles << 16) | u64::from(seq))
    }

    /// Count a datagram that could not be decoded.
    pub fn record_truncated(&mut self) {
        self.stats.lost += 1;
    }

    pub fn last(&self) -> Option<u16> {
        self.last
    }

    pub fn stats(&self) -> ReceiveStats {
        self.stats
    }
}
