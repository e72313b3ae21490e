//! # Keywheel Rotation Engine
//!
//! Long-running engine that owns the lifecycle of named secrets across
//! heterogeneous backends.
//!
//! ## Supported Providers:
//! - Environment variables with an AEAD-encrypted cache (built-in)
//! - HashiCorp Vault
//! - AWS Secrets Manager
//! - Supabase Vault
//!
//! ## Features:
//! - Day-interval rotation schedules with exponential failure backoff
//! - Per-secret rotation state machine with auto-rollback on failed
//!   health checks
//! - Bounded grace windows during which old and new values both verify
//! - Append-only per-secret history (capped at 1,000 entries)
//! - HTTP/function/query health probes with timeout and retries
//! - Best-effort notification fan-out (webhook, Slack, email, PagerDuty)
//! - Structured audit records for every mutation and access
//!
//! ```rust,no_run
//! use rotation_engine::{EngineConfig, ProviderKind, RotationEngine, SecretConfig};
//!
//! # async fn run() -> Result<(), rotation_engine::RotationError> {
//! let engine = RotationEngine::new(EngineConfig::default())?;
//! engine.start();
//!
//! engine.schedule(
//!     SecretConfig::new("db.pw", ProviderKind::Env, "DB_PW").with_interval_days(30),
//! )?;
//! let result = engine.rotate_now("db.pw", Some("bootstrap")).await?;
//! assert!(result.success);
//!
//! engine.shutdown().await;
//! # Ok(())
//! # }
//! ```

pub mod audit;
pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod generator;
pub mod health;
pub mod history;
pub mod metrics;
pub mod model;
pub mod notify;
pub mod providers;
mod scheduler;

pub use audit::{AuditAction, AuditRecord, AuditSink, TracingAuditSink};
pub use config::{ChannelConfig, ChannelKind, EngineConfig, NotificationConfig, SecretConfig};
pub use engine::RotationEngine;
pub use error::{ProviderError, Result, RotationError};
pub use events::EngineEvent;
pub use generator::SecretGenerator;
pub use health::{
    CheckAttempt, HealthCheckConfig, HealthCheckResult, HealthCheckType, HealthProbe,
    HealthStatus, ProbeResponse, QueryExecutor,
};
pub use history::{DEFAULT_HISTORY_LIMIT, MAX_EVENTS_PER_SECRET};
pub use metrics::RotationMetrics;
pub use model::{
    CurrentValue, RotationEvent, RotationFailure, RotationResult, RotationSchedule,
    RotationStatus, RotationType, SecretVersion,
};
pub use notify::NotificationKind;
pub use providers::{
    AwsSecretsManagerProvider, EnvProvider, ProviderKind, ProviderRegistry, SecretProvider,
    SecretRead, SupabaseVaultProvider, VaultProvider,
};
