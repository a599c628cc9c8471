use std::fmt;

use base64::prelude::{BASE64_STANDARD, Engine as _};

use crate::error::{Result, RtspError};

/// Default RTSP port (RFC 7826 §19.2).
pub const DEFAULT_PORT: u16 = 554;

/// A parsed `rtsp://[user[:pass]@]host[:port][/path]` URL.
///
/// Credentials are split off so they never appear in a Request-URI; see
/// [`authorization`](Self::authorization).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RtspUrl {
    pub scheme: String,
    pub host: String,
    pub port: u16,
    /// Absolute path including any query, `/` when empty.
    pub path: String,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl RtspUrl {
    pub fn parse(url: &str) -> Result<Self> {
        let url = url.trim();
        let (scheme, rest) = url
            .split_once("://")
            .filter(|(scheme, _)| {
                scheme.eq_ignore_ascii_case("rtsp") || scheme.eq_ignore_ascii_case("rtsps")
            })
            .ok_or_else(|| RtspError::InvalidUrl(url.to_string()))?;

        let (authority, path) = match rest.find('/') {
            Some(pos) => (&rest[..pos], &rest[pos..]),
            None => (rest, "/"),
        };

        let (userinfo, host_port) = match authority.rfind('@') {
            Some(pos) => (Some(&authority[..pos]), &authority[pos + 1..]),
            None => (None, authority),
        };

        let (username, password) = match userinfo {
            Some(info) => match info.split_once(':') {
                Some((user, pass)) => (Some(user.to_string()), Some(pass.to_string())),
                None => (Some(info.to_string()), None),
            },
            None => (None, None),
        };

        let (host, port) = split_host_port(host_port)
            .ok_or_else(|| RtspError::InvalidUrl(url.to_string()))?;

        Ok(RtspUrl {
            scheme: scheme.to_ascii_lowercase(),
            host,
            port,
            path: path.to_string(),
            username,
            password,
        })
    }

    /// `host:port` suitable for socket address resolution.
    pub fn authority(&self) -> String {
        if self.host.contains(':') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }

    /// The URL as sent on request lines, without credentials.
    pub fn as_request_uri(&self) -> String {
        format!("{}://{}{}", self.scheme, self.authority(), self.path)
    }

    /// Resolve a track control token against this URL.
    pub fn join(&self, control: &str) -> String {
        resolve(&self.as_request_uri(), control)
    }

    /// Live targets (`*.sdp`) start playing at the live edge.
    pub fn is_live(&self) -> bool {
        self.path.to_ascii_lowercase().ends_with(".sdp")
    }

    /// Pre-built `Basic` credential from the URL's userinfo, if any.
    pub fn authorization(&self) -> Option<String> {
        let user = self.username.as_deref()?;
        let pass = self.password.as_deref().unwrap_or("");
        Some(format!(
            "Basic {}",
            BASE64_STANDARD.encode(format!("{user}:{pass}"))
        ))
    }
}

impl fmt::Display for RtspUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_request_uri())
    }
}

/// Resolve a control token against a base URI. Absolute tokens win.
pub fn resolve(base: &str, control: &str) -> String {
    let lower = control.to_ascii_lowercase();
    if lower.starts_with("rtsp://") || lower.starts_with("rtsps://") {
        return control.to_string();
    }
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        control.trim_start_matches('/')
    )
}

fn split_host_port(host_port: &str) -> Option<(String, u16)> {
    if let Some(rest) = host_port.strip_prefix('[') {
        let (host, after) = rest.split_once(']')?;
        let port = match after.strip_prefix(':') {
            Some(p) => p.parse().ok()?,
            None if after.is_empty() => DEFAULT_PORT,
            None => return None,
        };
        return Some((host.to_string(), port));
    }

    let (host, port) = match host_port.rsplit_once(':') {
        Some((host, p)) => (host, p.parse().ok()?),
        None => (host_port, DEFAULT_PORT),
    };
    if host.is_empty() {
        return None;
    }
    Some((host.to_string(), port))
}
