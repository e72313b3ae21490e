use thiserror::Error;

#[derive(Error, Debug)]
pub enum CryptoError {
    #[error("Encryption failed")]
    EncryptionFailed,

    #[error("Decryption failed")]
    DecryptionFailed,

    #[error("Invalid key")]
    InvalidKey,

    #[error("Invalid encrypted data format")]
    InvalidFormat,

    #[error("Invalid nonce length")]
    InvalidNonce,

    #[error("Invalid UTF-8 in decrypted data")]
    InvalidUtf8,

    #[error("Key derivation failed: {0}")]
    KeyDerivationFailed(String),
}

pub type CryptoResult<T> = Result<T, CryptoError>;
