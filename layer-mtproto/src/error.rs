use std::fmt;

/// Errors raised while decoding frames or validating server responses.
#[allow(missing_docs)]
#[derive(Clone, Debug, PartialEq)]
pub enum Error {
    FrameTooShort         { len: usize },
    NonZeroAuthKeyId,
    TruncatedBody         { declared: usize, available: usize },
    FrameTooLarge         { len: usize },
    UnexpectedConstructor { got: u32, expected: u32 },
    InvalidNonce          { got: [u8; 16], expected: [u8; 16] },
    Malformed(&'static str),
}

impl std::error::Error for Error {}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FrameTooShort { len }
                => write!(f, "frame of {len} bytes is too short"),
            Self::NonZeroAuthKeyId
                => write!(f, "auth_key_id != 0 in plaintext message"),
            Self::TruncatedBody { declared, available }
                => write!(f, "body declares {declared} bytes but only {available} present"),
            Self::FrameTooLarge { len }
                => write!(f, "frame length {len} exceeds the transport limit"),
            Self::UnexpectedConstructor { got, expected }
                => write!(f, "constructor {got:#010x}, expected {expected:#010x}"),
            Self::InvalidNonce { got, expected }
                => write!(f, "nonce mismatch: got {got:?}, expected {expected:?}"),
            Self::Malformed(what)
                => write!(f, "malformed response: {what}"),
        }
    }
}
