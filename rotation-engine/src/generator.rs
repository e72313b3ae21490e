//! Secret value generation

use rand::rngs::OsRng;
use rand::RngCore;
use std::sync::Arc;

/// A registered custom generator, keyed by name in the engine.
pub type SecretGenerator = Arc<dyn Fn() -> String + Send + Sync>;

const GENERATED_LEN: usize = 32;
const CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789!@#$%^&*";

/// Generate a 32-character secret from the fixed charset using OS
/// randomness. Modulo bias is negligible at this charset size.
pub fn generate_secret_value() -> String {
    let mut bytes = [0u8; GENERATED_LEN];
    OsRng.fill_bytes(&mut bytes);
    bytes
        .iter()
        .map(|b| CHARSET[*b as usize % CHARSET.len()] as char)
        .collect()
}
