//! Obfuscated2 key schedule and stream cipher.
//!
//! Every byte on an [Obfuscated2] connection is passed through AES-256-CTR.
//! The client opens the connection with a random 64-byte header; bytes
//! `8..56` seed the keys for both directions, bytes `56..60` carry the inner
//! framing tag and bytes `60..62` the target DC id (used by MTProxy).
//!
//! When talking to an MTProxy the keys are additionally mixed with the
//! 16-byte proxy secret: `key = SHA-256(raw_key || secret)`.
//!
//! [Obfuscated2]: https://core.telegram.org/mtproto/mtproto-transports#transport-obfuscation

use aes::Aes256;
use ctr::cipher::{KeyIvInit, StreamCipher};
use sha2::{Digest, Sha256};

type Aes256Ctr = ctr::Ctr128BE<Aes256>;

/// Length of the client handshake header.
pub const HEADER_LEN: usize = 64;

/// First four bytes a valid nonce must never start with. They would make
/// the stream look like HTTP, TLS or one of the plain MTProto transports.
const FORBIDDEN_PREFIXES: [[u8; 4]; 7] = [
    *b"HEAD",
    *b"POST",
    *b"GET ",
    *b"OPTI",
    [0xdd, 0xdd, 0xdd, 0xdd],
    [0xee, 0xee, 0xee, 0xee],
    [0x16, 0x03, 0x01, 0x02],
];

// ─── ObfuscatedCipher ─────────────────────────────────────────────────────────

/// One direction of an obfuscated connection (AES-256-CTR keystream).
pub struct ObfuscatedCipher {
    inner: Aes256Ctr,
}

impl ObfuscatedCipher {
    pub fn new(key: &[u8; 32], iv: &[u8; 16]) -> Self {
        Self { inner: Aes256Ctr::new(key.into(), iv.into()) }
    }

    /// XOR `data` in place with the next bytes of the keystream.
    pub fn apply(&mut self, data: &mut [u8]) {
        self.inner.apply_keystream(data);
    }
}

// ─── Handshake ────────────────────────────────────────────────────────────────

/// Client side of an obfuscated connection, ready to use.
///
/// `header` has to be written to the socket before anything else; the
/// encryptor has already consumed the 64 header bytes.
pub struct ClientHandshake {
    pub header:    [u8; HEADER_LEN],
    pub encryptor: ObfuscatedCipher,
    pub decryptor: ObfuscatedCipher,
}

/// What a server (or MTProxy) learns from a client header.
pub struct AcceptedHandshake {
    pub tag:   [u8; 4],
    pub dc_id: i16,
    /// Decrypts bytes the client sends after the header.
    pub reader: ObfuscatedCipher,
    /// Encrypts bytes sent back to the client.
    pub writer: ObfuscatedCipher,
}

/// Build a client header for `tag` and `dc_id` from fresh random bytes.
pub fn client_handshake(
    tag:    [u8; 4],
    dc_id:  i16,
    secret: Option<&[u8; 16]>,
) -> Result<ClientHandshake, getrandom::Error> {
    let mut nonce = [0u8; HEADER_LEN];
    loop {
        getrandom::getrandom(&mut nonce)?;
        if nonce_is_valid(&nonce) {
            break;
        }
    }
    Ok(client_handshake_with_nonce(nonce, tag, dc_id, secret))
}

/// Deterministic variant of [`client_handshake`]; the caller supplies the
/// random bytes. Bytes `56..62` of `nonce` are overwritten.
pub fn client_handshake_with_nonce(
    mut nonce: [u8; HEADER_LEN],
    tag:       [u8; 4],
    dc_id:     i16,
    secret:    Option<&[u8; 16]>,
) -> ClientHandshake {
    nonce[56..60].copy_from_slice(&tag);
    nonce[60..62].copy_from_slice(&dc_id.to_le_bytes());

    let (enc_key, enc_iv) = derive(&nonce[8..40], &nonce[40..56], secret);
    let reversed = reversed_seed(&nonce);
    let (dec_key, dec_iv) = derive(&reversed[..32], &reversed[32..], secret);

    let mut encryptor = ObfuscatedCipher::new(&enc_key, &enc_iv);
    let decryptor     = ObfuscatedCipher::new(&dec_key, &dec_iv);

    // Only the tail is sent encrypted, but the keystream advances over all 64 bytes.
    let mut encrypted = nonce;
    encryptor.apply(&mut encrypted);
    let mut header = nonce;
    header[56..].copy_from_slice(&encrypted[56..]);

    ClientHandshake { header, encryptor, decryptor }
}

/// Parse a client header the way the remote end does.
pub fn accept_handshake(header: &[u8; HEADER_LEN], secret: Option<&[u8; 16]>) -> AcceptedHandshake {
    let (read_key, read_iv) = derive(&header[8..40], &header[40..56], secret);
    let reversed = reversed_seed(header);
    let (write_key, write_iv) = derive(&reversed[..32], &reversed[32..], secret);

    let mut reader = ObfuscatedCipher::new(&read_key, &read_iv);
    let writer     = ObfuscatedCipher::new(&write_key, &write_iv);

    let mut plain = *header;
    reader.apply(&mut plain);

    let mut tag = [0u8; 4];
    tag.copy_from_slice(&plain[56..60]);
    let dc_id = i16::from_le_bytes([plain[60], plain[61]]);

    AcceptedHandshake { tag, dc_id, reader, writer }
}

/// Whether a random nonce may be used as a handshake header.
pub fn nonce_is_valid(nonce: &[u8; HEADER_LEN]) -> bool {
    let prefix = [nonce[0], nonce[1], nonce[2], nonce[3]];
    nonce[0] != 0xef
        && !FORBIDDEN_PREFIXES.contains(&prefix)
        && nonce[4..8] != [0, 0, 0, 0]
}

fn reversed_seed(nonce: &[u8; HEADER_LEN]) -> [u8; 48] {
    let mut seed = [0u8; 48];
    seed.copy_from_slice(&nonce[8..56]);
    seed.reverse();
    seed
}

fn derive(key_src: &[u8], iv_src: &[u8], secret: Option<&[u8; 16]>) -> ([u8; 32], [u8; 16]) {
    let mut key = [0u8; 32];
    match secret {
        Some(secret) => {
            let mut h = Sha256::new();
            h.update(key_src);
            h.update(secret);
            key.copy_from_slice(&h.finalize());
        }
        None => key.copy_from_slice(&key_src[..32]),
    }
    let mut iv = [0u8; 16];
    iv.copy_from_slice(&iv_src[..16]);
    (key, iv)
}
