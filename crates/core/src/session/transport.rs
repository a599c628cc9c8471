use std::net::IpAddr;

/// How RTP reaches the client (RFC 7826 §18.54).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransportMode {
    /// Separate UDP socket bound to a port from the client range.
    #[default]
    Udp,
    /// `$`-framed on the RTSP control connection.
    Interleaved,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Cast {
    #[default]
    Unicast,
    Multicast,
}

impl Cast {
    pub fn as_str(&self) -> &'static str {
        match self {
            Cast::Unicast => "unicast",
            Cast::Multicast => "multicast",
        }
    }
}

/// Interleaved channel pair requested for RTP and RTCP.
pub const INTERLEAVED_CHANNELS: (u8, u8) = (0, 1);

/// Build the SETUP `Transport` header value.
///
/// ```text
/// RTP/AVP;unicast;client_port=10014-10015
/// RTP/AVP;unicast;destination=192.168.1.5;client_port=10014-10015
/// RTP/AVP/TCP;unicast;interleaved=0-1
/// ```
pub fn request_header(
    mode: TransportMode,
    cast: Cast,
    rtp_port: u16,
    destination: Option<IpAddr>,
) -> String {
    match mode {
        TransportMode::Udp => {
            let mut value = format!("RTP/AVP;{}", cast.as_str());
            if let Some(dest) = destination {
                value.push_str(&format!(";destination={dest}"));
            }
            value.push_str(&format!(
                ";client_port={}-{}",
                rtp_port,
                rtp_port.wrapping_add(1)
            ));
            value
        }
        TransportMode::Interleaved => format!(
            "RTP/AVP/TCP;{};interleaved={}-{}",
            cast.as_str(),
            INTERLEAVED_CHANNELS.0,
            INTERLEAVED_CHANNELS.1
        ),
    }
}

/// Transport parameters the server confirmed in its SETUP reply.
///
/// ```text
/// Transport: RTP/AVP;unicast;client_port=10014-10015;server_port=5000-5001;ssrc=1A2B3C4D
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportHeader {
    /// Transport spec, e.g. `RTP/AVP` or `RTP/AVP/TCP`.
    pub protocol: String,
    pub cast: Option<Cast>,
    pub client_ports: Option<(u16, u16)>,
    pub server_ports: Option<(u16, u16)>,
    pub interleaved: Option<(u8, u8)>,
    pub ssrc: Option<u32>,
    pub source: Option<String>,
}

impl TransportHeader {
    /// Parse the first alternative of a `Transport` header value.
    ///
    /// ## Examples
    ///
    /// ```
    /// use rtsp::session::transport::TransportHeader;
    ///
    /// let th =
    ///     TransportHeader::parse("RTP/AVP;unicast;client_port=8000-8001;server_port=5000-5001")
    ///         .unwrap();
    /// assert_eq!(th.client_ports, Some((8000, 8001)));
    /// assert_eq!(th.server_ports, Some((5000, 5001)));
    ///
    /// assert!(TransportHeader::parse("unicast").is_none());
    /// ```
    pub fn parse(header: &str) -> Option<Self> {
        let first = header.split(',').next()?.trim();
        let mut parts = first.split(';').map(str::trim);

        let protocol = parts.next().filter(|p| p.contains('/'))?.to_string();
        let mut th = TransportHeader {
            protocol,
            cast: None,
            client_ports: None,
            server_ports: None,
            interleaved: None,
            ssrc: None,
            source: None,
        };

        for part in parts {
            let (key, value) = part.split_once('=').unwrap_or((part, ""));
            match key.to_ascii_lowercase().as_str() {
                "unicast" => th.cast = Some(Cast::Unicast),
                "multicast" => th.cast = Some(Cast::Multicast),
                "client_port" => th.client_ports = parse_pair(value),
                "server_port" => th.server_ports = parse_pair(value),
                "interleaved" => th.interleaved = parse_channels(value),
                "ssrc" => th.ssrc = u32::from_str_radix(value.trim(), 16).ok(),
                "source" => th.source = Some(value.to_string()),
                _ => {}
            }
        }
        Some(th)
    }
}

/// `a-b` pair; a lone `a` implies `a+1`.
fn parse_pair(value: &str) -> Option<(u16, u16)> {
    match value.split_once('-') {
        Some((a, b)) => Some((a.trim().parse().ok()?, b.trim().parse().ok()?)),
        None => {
            let a: u16 = value.trim().parse().ok()?;
            Some((a, a.checked_add(1)?))
        }
    }
}

fn parse_channels(value: &str) -> Option<(u8, u8)> {
    let (a, b) = parse_pair(value)?;
    Some((u8::try_from(a).ok()?, u8::try_from(b).ok()?))
}
