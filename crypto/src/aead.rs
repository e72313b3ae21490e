use crate::error::{CryptoError, CryptoResult};
use crate::kdf;
use aes_gcm::{
    aead::{Aead, KeyInit, OsRng},
    Aes256Gcm, Nonce,
};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use zeroize::ZeroizeOnDrop;

const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;

/// A sealed secret value as stored in the env provider's cache.
///
/// All three fields are hex-encoded. The authentication tag is kept
/// separate from the ciphertext body so tampering with either field is
/// detected on open.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SealedValue {
    pub iv: String,
    pub auth_tag: String,
    pub ciphertext: String,
}

/// AES-256-GCM cipher for the env provider's in-memory value cache
///
/// - 96-bit nonces, freshly generated per seal
/// - authentication tags for integrity
/// - key material zeroized on drop
#[derive(ZeroizeOnDrop)]
pub struct CacheCipher {
    #[zeroize(skip)]
    cipher: Aes256Gcm,
    /// Master key - automatically zeroized on drop
    #[allow(dead_code)]
    key: [u8; 32],
}

impl CacheCipher {
    /// Create a cipher from a raw 32-byte key.
    pub fn new(key: [u8; 32]) -> CryptoResult<Self> {
        let cipher = Aes256Gcm::new_from_slice(&key).map_err(|_| CryptoError::InvalidKey)?;
        Ok(Self { cipher, key })
    }

    /// Derive the key from an operator passphrase via scrypt.
    pub fn from_passphrase(passphrase: &str) -> CryptoResult<Self> {
        let key = kdf::derive_cache_key(passphrase)?;
        Self::new(key)
    }

    /// Generate an ephemeral random key. Sealed values do not survive a
    /// process restart with this constructor.
    pub fn ephemeral() -> CryptoResult<Self> {
        let mut key = [0u8; 32];
        OsRng.fill_bytes(&mut key);
        Self::new(key)
    }

    /// Encrypt a plaintext value with a fresh random nonce.
    pub fn seal(&self, plaintext: &str) -> CryptoResult<SealedValue> {
        let mut nonce_bytes = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let mut combined = self
            .cipher
            .encrypt(nonce, plaintext.as_bytes())
            .map_err(|_| CryptoError::EncryptionFailed)?;

        // aes-gcm appends the 16-byte tag to the ciphertext
        if combined.len() < TAG_LEN {
            return Err(CryptoError::EncryptionFailed);
        }
        let tag = combined.split_off(combined.len() - TAG_LEN);

        Ok(SealedValue {
            iv: hex::encode(nonce_bytes),
            auth_tag: hex::encode(tag),
            ciphertext: hex::encode(combined),
        })
    }

    /// Decrypt a sealed value and verify its authentication tag.
    pub fn open(&self, sealed: &SealedValue) -> CryptoResult<String> {
        let nonce_bytes = hex::decode(&sealed.iv).map_err(|_| CryptoError::InvalidFormat)?;
        if nonce_bytes.len() != NONCE_LEN {
            return Err(CryptoError::InvalidNonce);
        }
        let nonce = Nonce::from_slice(&nonce_bytes);

        let tag = hex::decode(&sealed.auth_tag).map_err(|_| CryptoError::InvalidFormat)?;
        let mut combined =
            hex::decode(&sealed.ciphertext).map_err(|_| CryptoError::InvalidFormat)?;
        combined.extend_from_slice(&tag);

        let plaintext = self
            .cipher
            .decrypt(nonce, combined.as_slice())
            .map_err(|_| CryptoError::DecryptionFailed)?;

        String::from_utf8(plaintext).map_err(|_| CryptoError::InvalidUtf8)
    }
}
