//! The network-backed [`Checker`].
//!
//! One probe opens a route to the DC (through the candidate proxy), sends a
//! plaintext `req_pq_multi` and waits for the matching `resPQ`. The time
//! between sending the request and receiving the answer is the ping.

use std::time::{Duration, Instant};

use tokio::net::TcpStream;

use layer_mtproto::{Framing, Ping, Session, plaintext_body};

use crate::ProbeError;
use crate::checker::{Checker, ProbeHandle, ProbeOutcome, ProbeSink, ProbeTarget};
use crate::config::ProxyKind;
use crate::socks5;
use crate::transport_http;
use crate::transport_obfuscated::ObfuscatedStream;

/// Probes candidates over the real network, one tokio task per probe.
#[derive(Clone, Debug)]
pub struct MtprotoChecker {
    timeout: Duration,
}

impl MtprotoChecker {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Default for MtprotoChecker {
    fn default() -> Self {
        Self::new(Duration::from_secs(10))
    }
}

impl Checker for MtprotoChecker {
    fn start(&self, target: ProbeTarget, sink: ProbeSink) -> ProbeHandle {
        let timeout = self.timeout;
        let task = tokio::spawn(async move {
            let key = sink.key();
            let outcome = match tokio::time::timeout(timeout, probe(&target, &sink)).await {
                Ok(Ok(ping)) => {
                    tracing::debug!(
                        "[probe] item {} {} {}: {} ms",
                        key.item, key.family, target.proxy, ping.as_millis()
                    );
                    ProbeOutcome::Success { ping }
                }
                Ok(Err(e)) => {
                    tracing::debug!("[probe] item {} {} {}: {e}", key.item, key.family, target.proxy);
                    ProbeOutcome::Failure(e)
                }
                Err(_) => {
                    tracing::debug!("[probe] item {} {} {}: timed out", key.item, key.family, target.proxy);
                    ProbeOutcome::Failure(ProbeError::Timeout)
                }
            };
            sink.finish(outcome);
        });
        ProbeHandle::from_task(task)
    }
}

/// Run one probe to completion, without the timeout.
pub async fn probe(target: &ProbeTarget, sink: &ProbeSink) -> Result<Duration, ProbeError> {
    let proxy = &target.proxy;
    match proxy.kind {
        ProxyKind::Mtproto => {
            let secret = proxy
                .secret()
                .ok_or(ProbeError::Unsupported("MTProxy secret"))?;
            let stream = TcpStream::connect(proxy.address()).await?;
            sink.connected();
            let framing = if secret.padded { Framing::PaddedIntermediate } else { Framing::Intermediate };
            let conn = ObfuscatedStream::handshake(stream, framing, target.dc_id, Some(&secret.key)).await?;
            ping_obfuscated(conn).await
        }
        ProxyKind::Socks5 => {
            let endpoint = target.endpoint.ok_or(ProbeError::Unsupported("no DC address"))?;
            let stream = socks5::connect(proxy, endpoint).await?;
            sink.connected();
            let conn = ObfuscatedStream::handshake(stream, Framing::Intermediate, target.dc_id, None).await?;
            ping_obfuscated(conn).await
        }
        ProxyKind::Http => {
            let endpoint = target.endpoint.ok_or(ProbeError::Unsupported("no DC address"))?;
            let mut stream = TcpStream::connect(proxy.address()).await?;
            sink.connected();
            let ping = Ping::new()?;
            let packet = Session::new().pack(ping.body()).to_plaintext_bytes();
            let sent = Instant::now();
            let answer = transport_http::round_trip(&mut stream, proxy, endpoint, &packet).await?;
            let elapsed = sent.elapsed();
            ping.verify(plaintext_body(&answer)?)?;
            Ok(elapsed)
        }
        ProxyKind::None => Err(ProbeError::Unsupported("no proxy")),
    }
}

async fn ping_obfuscated(mut conn: ObfuscatedStream<TcpStream>) -> Result<Duration, ProbeError> {
    let ping = Ping::new()?;
    let packet = Session::new().pack(ping.body()).to_plaintext_bytes();
    let sent = Instant::now();
    conn.send(&packet).await?;
    let frame = conn.recv().await?;
    let elapsed = sent.elapsed();
    ping.verify(plaintext_body(&frame)?)?;
    Ok(elapsed)
}
