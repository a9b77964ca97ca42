//! Cryptographic primitives for Telegram transports.
//!
//! Provides:
//! - The Obfuscated2 key schedule (with and without an MTProxy secret)
//! - The AES-256-CTR stream cipher used on obfuscated connections

#![deny(unsafe_code)]

pub mod obfuscated;

pub use obfuscated::{
    AcceptedHandshake, ClientHandshake, ObfuscatedCipher, accept_handshake, client_handshake,
    client_handshake_with_nonce,
};
