//! Error types for layer-proxy.

use std::{fmt, io};

/// Why a single reachability probe failed.
///
/// Probe errors never leave the controller: they only move a candidate to
/// `Unavailable` and are logged.
#[derive(Debug)]
pub enum ProbeError {
    /// Network / I/O failure.
    Io(io::Error),
    /// No answer within the probe timeout.
    Timeout,
    /// The proxy refused the tunnel (SOCKS5 reply, auth failure).
    Proxy(String),
    /// The HTTP proxy or DC answered with a non-200 status.
    HttpStatus(u16),
    /// The answer was not a valid MTProto reply.
    Protocol(layer_mtproto::Error),
    /// The candidate cannot be probed (no DC address, unsupported secret).
    Unsupported(&'static str),
}

impl fmt::Display for ProbeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e)          => write!(f, "I/O error: {e}"),
            Self::Timeout        => write!(f, "probe timed out"),
            Self::Proxy(s)       => write!(f, "proxy error: {s}"),
            Self::HttpStatus(c)  => write!(f, "HTTP status {c}"),
            Self::Protocol(e)    => write!(f, "protocol error: {e}"),
            Self::Unsupported(s) => write!(f, "unsupported: {s}"),
        }
    }
}

impl std::error::Error for ProbeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e)       => Some(e),
            Self::Protocol(e) => Some(e),
            _                 => None,
        }
    }
}

impl From<io::Error> for ProbeError {
    fn from(e: io::Error) -> Self { Self::Io(e) }
}

impl From<layer_mtproto::Error> for ProbeError {
    fn from(e: layer_mtproto::Error) -> Self { Self::Protocol(e) }
}

impl From<getrandom::Error> for ProbeError {
    fn from(e: getrandom::Error) -> Self { Self::Io(io::Error::other(e.to_string())) }
}

impl From<tokio_socks::Error> for ProbeError {
    fn from(e: tokio_socks::Error) -> Self {
        match e {
            tokio_socks::Error::Io(e) => Self::Io(e),
            other => Self::Proxy(other.to_string()),
        }
    }
}
