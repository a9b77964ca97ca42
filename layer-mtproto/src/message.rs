//! MTProto plaintext message framing.

use std::time::{SystemTime, UNIX_EPOCH};

use crate::Error;

/// Size of the plaintext header: `auth_key_id`, `message_id`, `length`.
pub const PLAINTEXT_HEADER_LEN: usize = 8 + 8 + 4;

/// A 64-bit MTProto message identifier.
///
/// The upper 32 bits are the current Unix time; the lower bits a
/// counter. The two least significant bits are zero for client messages.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct MessageId(pub u64);

impl MessageId {
    pub(crate) fn generate(counter: u32) -> Self {
        let unix_secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
        Self((unix_secs << 32) | (u64::from(counter) << 2))
    }
}

/// A message sent before any auth key exists.
#[derive(Debug)]
pub struct Message {
    pub id:   MessageId,
    /// The serialized TL body (constructor ID + fields).
    pub body: Vec<u8>,
}

impl Message {
    pub fn plaintext(id: MessageId, body: Vec<u8>) -> Self {
        Self { id, body }
    }

    /// Serialize into the plaintext wire format:
    ///
    /// ```text
    /// auth_key_id:long  (0 for plaintext)
    /// message_id:long
    /// message_data_length:int
    /// message_data:bytes
    /// ```
    pub fn to_plaintext_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(PLAINTEXT_HEADER_LEN + self.body.len());
        buf.extend(0i64.to_le_bytes());
        buf.extend(self.id.0.to_le_bytes());
        buf.extend((self.body.len() as u32).to_le_bytes());
        buf.extend(&self.body);
        buf
    }
}

/// Return the body of a plaintext frame received from the server.
///
/// Trailing bytes after the declared length (transport padding) are ignored.
pub fn plaintext_body(frame: &[u8]) -> Result<&[u8], Error> {
    if frame.len() < PLAINTEXT_HEADER_LEN {
        return Err(Error::FrameTooShort { len: frame.len() });
    }
    if frame[..8] != [0u8; 8] {
        return Err(Error::NonZeroAuthKeyId);
    }
    let declared = u32::from_le_bytes([frame[16], frame[17], frame[18], frame[19]]) as usize;
    let available = frame.len() - PLAINTEXT_HEADER_LEN;
    if declared > available {
        return Err(Error::TruncatedBody { declared, available });
    }
    Ok(&frame[PLAINTEXT_HEADER_LEN..PLAINTEXT_HEADER_LEN + declared])
}
