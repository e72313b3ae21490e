use crate::error::{CryptoError, CryptoResult};
use scrypt::Params;

/// Domain-separation salt for cache-key derivation. Fixed so the same
/// passphrase always yields the same cache key across restarts.
const CACHE_KEY_SALT: &[u8] = b"keywheel/env-cache-key/v1";

/// scrypt cost parameters
#[derive(Debug, Clone)]
pub struct ScryptParams {
    /// log2 of the CPU/memory cost (N = 2^log_n)
    pub log_n: u8,
    /// Block size
    pub r: u32,
    /// Parallelism factor
    pub p: u32,
}

impl Default for ScryptParams {
    fn default() -> Self {
        // N=16384, r=8, p=1
        Self {
            log_n: 14,
            r: 8,
            p: 1,
        }
    }
}

/// Derive the 32-byte AES-256 cache key from an operator passphrase.
pub fn derive_cache_key(passphrase: &str) -> CryptoResult<[u8; 32]> {
    derive_key(passphrase.as_bytes(), CACHE_KEY_SALT, &ScryptParams::default())
}

/// Derive a 32-byte key from arbitrary secret material and salt.
pub fn derive_key(secret: &[u8], salt: &[u8], params: &ScryptParams) -> CryptoResult<[u8; 32]> {
    let params = Params::new(params.log_n, params.r, params.p, 32)
        .map_err(|e| CryptoError::KeyDerivationFailed(e.to_string()))?;

    let mut key = [0u8; 32];
    scrypt::scrypt(secret, salt, &params, &mut key)
        .map_err(|e| CryptoError::KeyDerivationFailed(e.to_string()))?;

    Ok(key)
}
