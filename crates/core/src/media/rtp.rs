use crate::error::{Result, RtspError};

/// Size of the fixed RTP header (RFC 3550 §5.1).
pub const RTP_HEADER_LEN: usize = 12;

/// An RTP packet with its fixed header fields (RFC 3550 §5.1).
///
/// ```text
///  0                   1                   2                   3
///  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |V=2|P|X|  CC   |M|     PT      |       Sequence Number         |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |                           Timestamp                           |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |                             SSRC                              |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// ```
///
/// Everything after byte 12 is payload. CSRC lists and header extensions
/// are not split out; when present they stay at the front of the payload.
/// All multi-byte fields are big-endian.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RtpPacket {
    /// 2-bit version, 2 for RFC 3550.
    pub version: u8,
    pub padding: bool,
    pub extension: bool,
    /// 4-bit contributing-source count.
    pub csrc_count: u8,
    /// Set on the last packet of a frame.
    pub marker: bool,
    /// 7-bit payload type (RFC 3551).
    pub payload_type: u8,
    pub sequence: u16,
    pub timestamp: u32,
    pub ssrc: u32,
    pub payload: Vec<u8>,
}

impl RtpPacket {
    /// A version-2 packet with no padding, extension or CSRCs.
    pub fn new(
        payload_type: u8,
        sequence: u16,
        timestamp: u32,
        ssrc: u32,
        payload: Vec<u8>,
    ) -> Self {
        Self {
            version: 2,
            padding: false,
            extension: false,
            csrc_count: 0,
            marker: false,
            payload_type,
            sequence,
            timestamp,
            ssrc,
            payload,
        }
    }

    pub fn with_marker(mut self, marker: bool) -> Self {
        self.marker = marker;
        self
    }

    /// Serialize header and payload. Fields wider than their bit widths
    /// are masked.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(RTP_HEADER_LEN + self.payload.len());
        out.push(
            ((self.version & 0x03) << 6)
                | ((self.padding as u8) << 5)
                | ((self.extension as u8) << 4)
                | (self.csrc_count & 0x0F),
        );
        out.push(((self.marker as u8) << 7) | (self.payload_type & 0x7F));
        out.extend_from_slice(&self.sequence.to_be_bytes());
        out.extend_from_slice(&self.timestamp.to_be_bytes());
        out.extend_from_slice(&self.ssrc.to_be_bytes());
        out.extend_from_slice(&self.payload);
        out
    }

    /// Parse a datagram. Fails with [`RtspError::TruncatedPacket`] below
    /// 12 bytes.
    pub fn decode(data: &[u8]) -> Result<Self> {
        if data.len() < RTP_HEADER_LEN {
            return Err(RtspError::TruncatedPacket { len: data.len() });
        }

        Ok(Self {
            version: data[0] >> 6,
            padding: data[0] & 0x20 != 0,
            extension: data[0] & 0x10 != 0,
            csrc_count: data[0] & 0x0F,
            marker: data[1] & 0x80 != 0,
            payload_type: data[1] & 0x7F,
            sequence: u16::from_be_bytes([data[2], data[3]]),
            timestamp: u32::from_be_bytes([data[4], data[5], data[6], data[7]]),
            ssrc: u32::from_be_bytes([data[8], data[9], data[10], data[11]]),
            payload: data[RTP_HEADER_LEN..].to_vec(),
        })
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> RtpPacket {
        RtpPacket::new(96, 0x1234, 0xDEADBEEF, 0xAABBCCDD, vec![1, 2, 3]).with_marker(true)
    }

    #[test]
    fn header_layout() {
        let buf = sample().encode();
        assert_eq!(buf.len(), 15);
        assert_eq!(buf[0] >> 6, 2);
        assert_eq!(buf[1], 0x80 | 96);
        assert_eq!(&buf[2..4], &[0x12, 0x34]);
        assert_eq!(&buf[4..8], &[0xDE, 0xAD, 0xBE, 0xEF]);
        assert_eq!(&buf[8..12], &[0xAA, 0xBB, 0xCC, 0xDD]);
        assert_eq!(&buf[12..], &[1, 2, 3]);
    }

    #[test]
    fn flag_bits() {
        let mut p = sample();
        p.padding = true;
        p.extension = true;
        p.csrc_count = 3;
        let buf = p.encode();
        assert_eq!(buf[0], 0b1011_0011);
    }

    #[test]
    fn decode_reads_fields() {
        let p = RtpPacket::decode(&sample().encode()).unwrap();
        assert_eq!(p.version, 2);
        assert_eq!(p.sequence, 0x1234);
        assert_eq!(p.timestamp, 0xDEADBEEF);
        assert_eq!(p.payload_type, 96);
        assert!(p.marker);
        assert_eq!(p.payload(), &[1, 2, 3]);
    }

    #[test]
    fn empty_payload_is_valid() {
        let p = RtpPacket::decode(&[0x80, 0x60, 0, 1, 0, 0, 0, 0, 0, 0, 0, 0]).unwrap();
        assert_eq!(p.sequence, 1);
        assert!(p.payload.is_empty());
    }

    #[test]
    fn truncated_packet() {
        let err = RtpPacket::decode(&[0x80; 11]).unwrap_err();
        assert!(matches!(err, RtspError::TruncatedPacket { len: 11 }));
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn decode_inverts_encode(
                version in 0u8..4,
                padding in any::<bool>(),
                extension in any::<bool>(),
                csrc_count in 0u8..16,
                marker in any::<bool>(),
                payload_type in 0u8..128,
                sequence in any::<u16>(),
                timestamp in any::<u32>(),
                ssrc in any::<u32>(),
                payload in proptest::collection::vec(any::<u8>(), 0..64),
            ) {
                let packet = RtpPacket {
                    version, padding, extension, csrc_count, marker,
                    payload_type, sequence, timestamp, ssrc, payload,
                };
                prop_assert_eq!(RtpPacket::decode(&packet.encode()).unwrap(), packet);
            }
        }
    }
}
