//! Cryptographic primitives for the Keywheel rotation engine
//!
//! This crate backs the env provider's encrypted value cache:
//! - AES-256-GCM sealing with a fresh random nonce per encrypt
//! - scrypt key derivation from an operator passphrase
//! - SHA-256 value checksums for audit integrity

pub mod aead;
pub mod checksum;
pub mod error;
pub mod kdf;

pub use aead::{CacheCipher, SealedValue};
pub use checksum::value_checksum;
pub use error::{CryptoError, CryptoResult};
pub use kdf::derive_cache_key;
