//! Error types for the rotation engine

use thiserror::Error;

/// Errors raised by secret providers.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("Secret not found: {0}")]
    NotFound(String),

    #[error("Version {version} not found for secret: {path}")]
    VersionNotFound { path: String, version: u64 },

    #[error("Backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("Rejected by backend: {0}")]
    Rejected(String),

    #[error("Encryption error: {0}")]
    Crypto(#[from] crypto::CryptoError),
}

/// Errors surfaced by the engine facade.
#[derive(Error, Debug)]
pub enum RotationError {
    #[error("Invalid secret config: {0}")]
    InvalidConfig(String),

    #[error("Unknown provider: {0}")]
    UnknownProvider(String),

    #[error("Secret not configured: {0}")]
    NotConfigured(String),

    #[error("Rotation already in progress for: {0}")]
    AlreadyInProgress(String),

    #[error("Concurrent rotation limit reached ({0})")]
    ConcurrencyLimit(usize),

    #[error("Health check failed: {0}")]
    HealthCheckFailed(String),

    #[error("Secret not found: {0}")]
    NotFound(String),

    #[error("Engine is shutting down")]
    ShuttingDown,

    #[error(transparent)]
    Provider(#[from] ProviderError),
}

pub type Result<T> = std::result::Result<T, RotationError>;
