use std::net::{IpAddr, Ipv4Addr, SocketAddr, UdpSocket};
use std::ops::RangeInclusive;
use std::time::Duration;

use crate::error::{Result, RtspError};
use crate::media::PacketSource;

/// Largest datagram the receive buffer accepts.
const MAX_DATAGRAM: usize = 65_536;

/// Bind a UDP socket on an even port from `ports` (RTP convention; the
/// odd neighbour is left for RTCP).
///
/// The scan starts at a random even offset so concurrent clients do not
/// all collide on the first port.
pub fn bind_in_range(ports: RangeInclusive<u16>) -> Result<UdpSocket> {
    let even: Vec<u16> = ports.filter(|p| p % 2 == 0).collect();
    if even.is_empty() {
        return Err(RtspError::PortRangeExhausted);
    }

    let start = usize::from(rand::random::<u16>()) % even.len();
    for port in even.iter().cycle().skip(start).take(even.len()) {
        let addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), *port);
        match UdpSocket::bind(addr) {
            Ok(socket) => {
                tracing::debug!(port, "media socket bound");
                return Ok(socket);
            }
            Err(e) => tracing::trace!(port, error = %e, "client port unavailable"),
        }
    }

    Err(RtspError::PortRangeExhausted)
}

/// RTP datagrams from a bound UDP socket.
pub struct UdpSource {
    socket: UdpSocket,
    buf: Vec<u8>,
}

impl UdpSource {
    /// Wrap `socket`, bounding each receive by `poll`.
    pub fn new(socket: UdpSocket, poll: Duration) -> Result<Self> {
        socket.set_read_timeout(Some(poll))?;
        Ok(Self {
            socket,
            buf: vec![0u8; MAX_DATAGRAM],
        })
    }

    pub fn local_port(&self) -> Result<u16> {
        Ok(self.socket.local_addr()?.port())
    }
}

impl PacketSource for UdpSource {
    fn recv(&mut self) -> std::io::Result<Option<Vec<u8>>> {
        match self.socket.recv_from(&mut self.buf) {
            Ok((n, _)) => Ok(Some(self.buf[..n].to_vec())),
            Err(ref e) if super::is_poll_timeout(e) => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn kind(&self) -> &'static str {
        "udp"
    }
}
