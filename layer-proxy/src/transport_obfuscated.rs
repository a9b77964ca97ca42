//! Obfuscated2 transport over a tokio stream.
//!
//! Thin async wrapper around [`layer_mtproto::ObfuscatedTransport`]: the
//! sans-IO codec does framing and encryption, this type owns the socket.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use layer_mtproto::{Framing, ObfuscatedTransport};

use crate::ProbeError;

/// An obfuscated connection, handshake already sent.
pub struct ObfuscatedStream<S> {
    stream: S,
    codec:  ObfuscatedTransport,
}

impl<S: AsyncRead + AsyncWrite + Unpin> ObfuscatedStream<S> {
    /// Send the obfuscated header on `stream`.
    ///
    /// `secret` is the 16-byte MTProxy key, `None` when `stream` already
    /// leads to a DC.
    pub async fn handshake(
        mut stream: S,
        framing:    Framing,
        dc_id:      i16,
        secret:     Option<&[u8; 16]>,
    ) -> Result<Self, ProbeError> {
        let (codec, header) = ObfuscatedTransport::client(framing, dc_id, secret)?;
        stream.write_all(&header).await?;
        Ok(Self { stream, codec })
    }

    /// Send one framed payload.
    pub async fn send(&mut self, payload: &[u8]) -> Result<(), ProbeError> {
        let wire = self.codec.pack(payload)?;
        self.stream.write_all(&wire).await?;
        self.stream.flush().await?;
        Ok(())
    }

    /// Receive the next frame's payload.
    pub async fn recv(&mut self) -> Result<Vec<u8>, ProbeError> {
        let mut header = [0u8; 4];
        self.stream.read_exact(&mut header).await?;
        let len = self.codec.unpack_len(header)?;
        let mut body = vec![0u8; len];
        self.stream.read_exact(&mut body).await?;
        self.codec.unpack_body(&mut body);
        Ok(body)
    }

    pub fn into_inner(self) -> S {
        self.stream
    }
}
