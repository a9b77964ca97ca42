//! SOCKS5 tunnel used by probes.

use std::net::SocketAddr;

use tokio::net::TcpStream;
use tokio_socks::tcp::Socks5Stream;

use crate::ProbeError;
use crate::config::ProxyConfig;

/// Open a TCP tunnel through the SOCKS5 proxy in `proxy` to `target`.
///
/// Username / password authentication is used when either is set.
pub async fn connect(proxy: &ProxyConfig, target: SocketAddr) -> Result<TcpStream, ProbeError> {
    let proxy_addr = proxy.address();
    tracing::debug!("[socks5] Connecting via {proxy_addr} → {target}");
    let stream = if proxy.user.is_empty() && proxy.password.is_empty() {
        Socks5Stream::connect(proxy_addr.as_str(), target).await?
    } else {
        Socks5Stream::connect_with_password(
            proxy_addr.as_str(),
            target,
            proxy.user.as_str(),
            proxy.password.as_str(),
        )
        .await?
    };
    tracing::debug!("[socks5] Tunnel to {target} open ✓");
    Ok(stream.into_inner())
}
