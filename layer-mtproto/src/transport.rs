//! Transport framing.
//!
//! Sans-IO: [`ObfuscatedTransport`] turns payloads into wire bytes and back,
//! the caller owns the socket. Only the framings usable under Obfuscated2
//! are provided.

use layer_crypto::{ObfuscatedCipher, client_handshake};
use layer_crypto::obfuscated::HEADER_LEN;

use crate::Error;

/// Largest frame accepted from the remote end.
pub const MAX_FRAME_LEN: usize = 16 * 1024 * 1024;

// ─── Framing ──────────────────────────────────────────────────────────────────

/// Inner framing carried by an obfuscated connection.
///
/// | Variant | Tag | Notes |
/// |---------|-----|-------|
/// | `Intermediate` | `0xeeeeeeee` | 4-byte LE length prefix |
/// | `PaddedIntermediate` | `0xdddddddd` | adds 0..15 random bytes, required by `dd` secrets |
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Framing {
    Intermediate,
    PaddedIntermediate,
}

impl Framing {
    pub fn tag(self) -> [u8; 4] {
        match self {
            Self::Intermediate       => [0xee; 4],
            Self::PaddedIntermediate => [0xdd; 4],
        }
    }

    /// Frame `payload`. `padding` is appended only for the padded variant.
    pub fn encode(self, payload: &[u8], padding: &[u8]) -> Vec<u8> {
        let padding = match self {
            Self::Intermediate       => &[][..],
            Self::PaddedIntermediate => padding,
        };
        let len = (payload.len() + padding.len()) as u32;
        let mut out = Vec::with_capacity(4 + len as usize);
        out.extend(len.to_le_bytes());
        out.extend(payload);
        out.extend(padding);
        out
    }

    /// Body length announced by a 4-byte frame header.
    pub fn frame_len(header: [u8; 4]) -> Result<usize, Error> {
        // The top bit flags a quick ack.
        let len = (u32::from_le_bytes(header) & 0x7fff_ffff) as usize;
        if len > MAX_FRAME_LEN {
            return Err(Error::FrameTooLarge { len });
        }
        Ok(len)
    }
}

// ─── ObfuscatedTransport ──────────────────────────────────────────────────────

/// Client end of an Obfuscated2 connection.
pub struct ObfuscatedTransport {
    framing: Framing,
    enc:     ObfuscatedCipher,
    dec:     ObfuscatedCipher,
}

impl ObfuscatedTransport {
    /// Create the transport and the 64-byte header to send first.
    ///
    /// `secret` is the 16-byte MTProxy key, `None` for a direct DC connection.
    pub fn client(
        framing: Framing,
        dc_id:   i16,
        secret:  Option<&[u8; 16]>,
    ) -> Result<(Self, [u8; HEADER_LEN]), getrandom::Error> {
        let hs = client_handshake(framing.tag(), dc_id, secret)?;
        log::debug!("[obfuscated] handshake for DC{dc_id} ({framing:?})");
        Ok((Self { framing, enc: hs.encryptor, dec: hs.decryptor }, hs.header))
    }

    /// Build from an existing key schedule (servers and tests).
    pub fn from_parts(framing: Framing, enc: ObfuscatedCipher, dec: ObfuscatedCipher) -> Self {
        Self { framing, enc, dec }
    }

    pub fn framing(&self) -> Framing {
        self.framing
    }

    /// Frame and encrypt one payload.
    pub fn pack(&mut self, payload: &[u8]) -> Result<Vec<u8>, getrandom::Error> {
        let padding = match self.framing {
            Framing::Intermediate => Vec::new(),
            Framing::PaddedIntermediate => {
                let mut len = [0u8; 1];
                getrandom::getrandom(&mut len)?;
                let mut padding = vec![0u8; (len[0] % 16) as usize];
                getrandom::getrandom(&mut padding)?;
                padding
            }
        };
        let mut wire = self.framing.encode(payload, &padding);
        self.enc.apply(&mut wire);
        Ok(wire)
    }

    /// Decrypt a received frame header and return the body length.
    pub fn unpack_len(&mut self, mut header: [u8; 4]) -> Result<usize, Error> {
        self.dec.apply(&mut header);
        Framing::frame_len(header)
    }

    /// Decrypt a received frame body in place.
    pub fn unpack_body(&mut self, body: &mut [u8]) {
        self.dec.apply(body);
    }
}
