//! MTProto over HTTP through a forwarding HTTP proxy.
//!
//! Each MTProto packet is the body of a `POST http://<dc>/api` request sent
//! to the proxy with an absolute URI; the proxy forwards it and relays the
//! DC's answer. Credentials go in `Proxy-Authorization: Basic`.

use std::net::SocketAddr;

use base64::{Engine, engine::general_purpose::STANDARD};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::ProbeError;
use crate::config::ProxyConfig;

/// Refuse response heads larger than this.
const MAX_HEAD_LEN: usize = 16 * 1024;
/// Refuse response bodies larger than this.
const MAX_BODY_LEN: usize = 1024 * 1024;

/// Build the request head for one MTProto packet of `body_len` bytes.
pub fn request_head(proxy: &ProxyConfig, endpoint: SocketAddr, body_len: usize) -> String {
    let mut head = format!(
        "POST http://{endpoint}/api HTTP/1.1\r\n\
         Host: {endpoint}\r\n\
         Content-Type: application/x-www-form-urlencoded\r\n\
         Content-Length: {body_len}\r\n\
         Connection: close\r\n"
    );
    if !proxy.user.is_empty() || !proxy.password.is_empty() {
        let credentials = STANDARD.encode(format!("{}:{}", proxy.user, proxy.password));
        head.push_str(&format!("Proxy-Authorization: Basic {credentials}\r\n"));
    }
    head.push_str("\r\n");
    head
}

/// Status code and `Content-Length` of a complete response head.
pub fn parse_head(head: &str) -> Result<(u16, Option<usize>), ProbeError> {
    let mut lines = head.split("\r\n");
    let status_line = lines.next().unwrap_or_default();
    let mut parts = status_line.split_whitespace();
    let version = parts.next().unwrap_or_default();
    if !version.starts_with("HTTP/") {
        return Err(ProbeError::Proxy(format!("invalid status line: {status_line}")));
    }
    let code = parts
        .next()
        .and_then(|c| c.parse::<u16>().ok())
        .ok_or_else(|| ProbeError::Proxy(format!("invalid status line: {status_line}")))?;

    let mut content_length = None;
    for line in lines {
        if let Some((name, value)) = line.split_once(':') {
            if name.trim().eq_ignore_ascii_case("content-length") {
                let len = value
                    .trim()
                    .parse::<usize>()
                    .map_err(|_| ProbeError::Proxy(format!("invalid Content-Length: {value}")))?;
                content_length = Some(len);
            }
        }
    }
    Ok((code, content_length))
}

/// Send `packet` through the proxy on `stream` and return the DC's answer.
pub async fn round_trip<S>(
    stream:   &mut S,
    proxy:    &ProxyConfig,
    endpoint: SocketAddr,
    packet:   &[u8],
) -> Result<Vec<u8>, ProbeError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let head = request_head(proxy, endpoint, packet.len());
    stream.write_all(head.as_bytes()).await?;
    stream.write_all(packet).await?;
    stream.flush().await?;

    let mut buf = Vec::with_capacity(1024);
    let head_end = loop {
        if let Some(pos) = find_head_end(&buf) {
            break pos;
        }
        if buf.len() > MAX_HEAD_LEN {
            return Err(ProbeError::Proxy("response head too large".into()));
        }
        let mut chunk = [0u8; 1024];
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            return Err(ProbeError::Proxy("connection closed before response".into()));
        }
        buf.extend_from_slice(&chunk[..n]);
    };

    let head = String::from_utf8_lossy(&buf[..head_end]).into_owned();
    let (code, content_length) = parse_head(&head)?;
    tracing::debug!("[http] {endpoint} via {} answered {code}", proxy.address());
    if code != 200 {
        return Err(ProbeError::HttpStatus(code));
    }

    let mut body = buf.split_off(head_end + 4);
    match content_length {
        Some(len) if len > MAX_BODY_LEN => {
            return Err(ProbeError::Proxy(format!("response body of {len} bytes")));
        }
        Some(len) => {
            if body.len() < len {
                let have = body.len();
                body.resize(len, 0);
                stream.read_exact(&mut body[have..]).await?;
            }
            body.truncate(len);
        }
        None => {
            (&mut *stream).take(MAX_BODY_LEN as u64).read_to_end(&mut body).await?;
        }
    }
    Ok(body)
}

fn find_head_end(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|w| w == b"\r\n\r\n")
}
