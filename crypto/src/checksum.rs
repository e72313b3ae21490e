use sha2::{Digest, Sha256};

/// Number of hex characters retained from the SHA-256 digest.
const CHECKSUM_LEN: usize = 16;

/// Advisory checksum of a secret value: the first 16 hex characters of
/// its SHA-256 digest. Stored alongside versions for audit integrity,
/// never used as key material.
pub fn value_checksum(value: &str) -> String {
    let digest = Sha256::digest(value.as_bytes());
    let full = hex::encode(digest);
    full[..CHECKSUM_LEN].to_string()
}
