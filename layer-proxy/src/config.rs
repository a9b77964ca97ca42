//! Proxy values and controller configuration.

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::checker::AddressFamily;

// ─── ProxyKind ────────────────────────────────────────────────────────────────

/// Which protocol a proxy speaks.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProxyKind {
    /// "No proxy" sentinel.
    #[default]
    None,
    Socks5,
    Http,
    Mtproto,
}

impl ProxyKind {
    /// Label shown in the proxy list.
    pub fn label(self) -> &'static str {
        match self {
            Self::None    => "NONE",
            Self::Socks5  => "SOCKS5",
            Self::Http    => "HTTP",
            Self::Mtproto => "MTPROTO",
        }
    }
}

/// Outcome of validating a [`ProxyConfig`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProxyStatus {
    Valid,
    /// Well-formed, but this client cannot use it (fake-TLS secrets).
    Unsupported,
    Invalid,
}

/// Whether application traffic goes through the selected proxy.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProxyMode {
    /// Use the operating system's proxy configuration.
    #[default]
    System,
    Enabled,
    Disabled,
}

impl fmt::Display for ProxyMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::System   => write!(f, "system"),
            Self::Enabled  => write!(f, "enabled"),
            Self::Disabled => write!(f, "disabled"),
        }
    }
}

// ─── ProxyConfig ──────────────────────────────────────────────────────────────

/// One proxy endpoint with its credentials.
///
/// For [`ProxyKind::Mtproto`] `password` holds the hex secret and `user` is
/// unused.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProxyConfig {
    pub kind:     ProxyKind,
    pub host:     String,
    pub port:     u16,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub user:     String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub password: String,
}

impl ProxyConfig {
    pub fn socks5(host: impl Into<String>, port: u16) -> Self {
        Self { kind: ProxyKind::Socks5, host: host.into(), port, ..Default::default() }
    }

    pub fn http(host: impl Into<String>, port: u16) -> Self {
        Self { kind: ProxyKind::Http, host: host.into(), port, ..Default::default() }
    }

    pub fn mtproto(host: impl Into<String>, port: u16, secret: impl Into<String>) -> Self {
        Self {
            kind:     ProxyKind::Mtproto,
            host:     host.into(),
            port,
            password: secret.into(),
            ..Default::default()
        }
    }

    /// Attach username / password authentication.
    pub fn with_auth(mut self, user: impl Into<String>, password: impl Into<String>) -> Self {
        self.user     = user.into();
        self.password = password.into();
        self
    }

    /// `false` for the "no proxy" sentinel.
    pub fn is_some(&self) -> bool {
        self.kind != ProxyKind::None
    }

    pub fn status(&self) -> ProxyStatus {
        if self.kind == ProxyKind::None || self.host.is_empty() || self.port == 0 {
            return ProxyStatus::Invalid;
        }
        match self.kind {
            ProxyKind::Mtproto => mtproto_secret_status(&self.password),
            _                  => ProxyStatus::Valid,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.status() == ProxyStatus::Valid
    }

    pub fn supports_calls(&self) -> bool {
        self.kind == ProxyKind::Socks5
    }

    pub fn supports_share(&self) -> bool {
        matches!(self.kind, ProxyKind::Socks5 | ProxyKind::Mtproto)
    }

    /// Decoded MTProxy secret, `None` unless the secret is valid.
    pub fn secret(&self) -> Option<MtprotoSecret> {
        if self.kind != ProxyKind::Mtproto {
            return None;
        }
        MtprotoSecret::parse(&self.password)
    }

    /// `host:port`, bracketing IPv6 literals.
    pub fn address(&self) -> String {
        host_port(&self.host, self.port)
    }
}

impl fmt::Display for ProxyConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind.label(), self.address())
    }
}

pub(crate) fn host_port(host: &str, port: u16) -> String {
    if host.contains(':') && !host.starts_with('[') {
        format!("[{host}]:{port}")
    } else {
        format!("{host}:{port}")
    }
}

// ─── MTProxy secrets ──────────────────────────────────────────────────────────

/// A decoded MTProxy secret.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MtprotoSecret {
    pub key:    [u8; 16],
    /// `dd`-prefixed secrets require the padded intermediate framing.
    pub padded: bool,
}

impl MtprotoSecret {
    pub fn parse(secret: &str) -> Option<Self> {
        match mtproto_secret_status(secret) {
            ProxyStatus::Valid => {}
            _ => return None,
        }
        let (padded, hex) = match secret.len() {
            32 => (false, secret),
            _  => (true, &secret[2..]),
        };
        let bytes = decode_hex(hex)?;
        let mut key = [0u8; 16];
        key.copy_from_slice(&bytes);
        Some(Self { key, padded })
    }
}

/// Validate an MTProxy secret string.
pub fn mtproto_secret_status(secret: &str) -> ProxyStatus {
    let is_hex = !secret.is_empty() && secret.bytes().all(|b| b.is_ascii_hexdigit());
    if !is_hex || secret.len() % 2 != 0 {
        return ProxyStatus::Invalid;
    }
    let prefix = secret.get(..2).map(str::to_ascii_lowercase);
    match (secret.len(), prefix.as_deref()) {
        (32, _)                    => ProxyStatus::Valid,
        (34, Some("dd"))           => ProxyStatus::Valid,
        (n, Some("ee")) if n >= 34 => ProxyStatus::Unsupported,
        _                          => ProxyStatus::Invalid,
    }
}

fn decode_hex(hex: &str) -> Option<Vec<u8>> {
    fn nibble(c: u8) -> Option<u8> {
        match c {
            b'0'..=b'9' => Some(c - b'0'),
            b'a'..=b'f' => Some(c - b'a' + 10),
            b'A'..=b'F' => Some(c - b'A' + 10),
            _ => None,
        }
    }
    hex.as_bytes()
        .chunks(2)
        .map(|pair| match pair {
            [hi, lo] => Some(nibble(*hi)? << 4 | nibble(*lo)?),
            _ => None,
        })
        .collect()
}

// ─── ProbeConfig ──────────────────────────────────────────────────────────────

/// Where and how long to probe.
#[derive(Clone, Debug)]
pub struct ProbeConfig {
    /// DC the probes address (carried in the obfuscated header).
    pub dc_id:     i16,
    pub ipv4:      Vec<IpAddr>,
    pub ipv6:      Vec<IpAddr>,
    /// DC port for TCP routes (SOCKS5).
    pub tcp_port:  u16,
    /// DC port for MTProto-over-HTTP routes.
    pub http_port: u16,
    /// Upper bound for one probe, connect to answer.
    pub timeout:   Duration,
}

impl ProbeConfig {
    /// First DC address of `family` for a proxy of `kind`.
    pub fn endpoint(&self, family: AddressFamily, kind: ProxyKind) -> Option<SocketAddr> {
        let list = match family {
            AddressFamily::Ipv4 => &self.ipv4,
            AddressFamily::Ipv6 => &self.ipv6,
        };
        let port = match kind {
            ProxyKind::Http => self.http_port,
            _               => self.tcp_port,
        };
        list.first().map(|ip| SocketAddr::new(*ip, port))
    }
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            dc_id:     2,
            ipv4:      vec![IpAddr::V4(Ipv4Addr::new(149, 154, 167, 51))],
            ipv6:      vec![IpAddr::V6(Ipv6Addr::new(0x2001, 0x67c, 0x4e8, 0xf002, 0, 0, 0, 0xa))],
            tcp_port:  443,
            http_port: 80,
            timeout:   Duration::from_secs(10),
        }
    }
}

// ─── ControllerConfig ─────────────────────────────────────────────────────────

/// Configuration for [`crate::ProxiesController`].
#[derive(Clone, Debug)]
pub struct ControllerConfig {
    /// Debounce window for settings writes.
    pub save_delay:         Duration,
    pub probe:              ProbeConfig,
    /// Results younger than this survive re-enabling IPv6 probing.
    pub ipv6_refresh_after: Duration,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            save_delay:         Duration::from_millis(1000),
            probe:              ProbeConfig::default(),
            ipv6_refresh_after: Duration::from_secs(60),
        }
    }
}
