//! MTProto plaintext messaging and transport framing.
//!
//! This crate handles:
//! * Message framing (message IDs, plaintext wire format)
//! * The `req_pq_multi` reachability ping
//! * Obfuscated2 intermediate / padded intermediate framing
//!
//! It is intentionally sans-IO: bring your own TCP stream.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
#[allow(missing_docs)]
pub mod message;
#[allow(missing_docs)]
pub mod ping;
pub mod session;
#[allow(missing_docs)]
pub mod transport;

pub use error::Error;
pub use message::{Message, MessageId, plaintext_body};
pub use ping::{Ping, ResPq};
pub use session::Session;
pub use transport::{Framing, ObfuscatedTransport};
