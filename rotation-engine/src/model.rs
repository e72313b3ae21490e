//! Core data model: secret versions, rotation events, runtime schedules

use crate::health::HealthCheckResult;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// How a rotation was initiated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RotationType {
    Scheduled,
    Manual,
    Rollback,
    Emergency,
}

/// Lifecycle state of one rotation attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RotationStatus {
    Pending,
    InProgress,
    Validating,
    Completed,
    Failed,
    RolledBack,
}

impl RotationStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RotationStatus::Completed | RotationStatus::Failed | RotationStatus::RolledBack
        )
    }
}

/// An immutable snapshot of one secret version as seen by a provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecretVersion {
    /// Monotonically increasing within a single path and provider
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    /// Exactly one current version per secret
    pub is_current: bool,
    /// Current version plus any in-grace predecessor
    pub is_valid: bool,
    /// First 16 hex chars of SHA-256 of the plaintext; advisory only
    pub checksum: String,
    pub created_by: String,
    pub rotation_event_id: Option<Uuid>,
}

/// Append-only history record for one rotation attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RotationEvent {
    pub id: Uuid,
    pub secret_id: String,
    #[serde(rename = "type")]
    pub event_type: RotationType,
    pub status: RotationStatus,
    pub from_version: u64,
    pub to_version: Option<u64>,
    pub initiator: String,
    pub timestamp: DateTime<Utc>,
    pub duration_ms: u64,
    pub health_check: Option<HealthCheckResult>,
    pub error: Option<String>,
    pub metadata: HashMap<String, String>,
}

/// Runtime rotation state for one configured secret.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RotationSchedule {
    pub secret_id: String,
    pub next_rotation: DateTime<Utc>,
    pub last_rotation: Option<DateTime<Utc>>,
    pub paused: bool,
    pub pause_reason: Option<String>,
    /// Consecutive failures since the last successful rotation
    pub failure_count: u32,
    pub backoff_until: Option<DateTime<Utc>>,
    /// Expiry warning already sent for the current cycle
    pub warning_sent: bool,
}

impl RotationSchedule {
    pub fn new(secret_id: impl Into<String>, next_rotation: DateTime<Utc>) -> Self {
        Self {
            secret_id: secret_id.into(),
            next_rotation,
            last_rotation: None,
            paused: false,
            pause_reason: None,
            failure_count: 0,
            backoff_until: None,
            warning_sent: false,
        }
    }

    /// Check if this secret is due for rotation.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.next_rotation <= now
    }

    /// Days until the next rotation (negative when overdue).
    pub fn days_until_rotation(&self, now: DateTime<Utc>) -> i64 {
        (self.next_rotation - now).num_days()
    }

    /// Check if the schedule is still backing off after failures.
    pub fn in_backoff(&self, now: DateTime<Utc>) -> bool {
        self.backoff_until.map(|until| until > now).unwrap_or(false)
    }
}

/// Structured failure carried inside a [`RotationResult`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RotationFailure {
    pub code: String,
    pub message: String,
}

impl RotationFailure {
    pub fn rotation_failed(message: impl Into<String>) -> Self {
        Self {
            code: "ROTATION_FAILED".to_string(),
            message: message.into(),
        }
    }
}

/// Outcome of one rotation attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RotationResult {
    pub rotation_id: Uuid,
    pub secret_id: String,
    pub success: bool,
    pub previous_version: u64,
    pub new_version: Option<u64>,
    pub duration_ms: u64,
    pub health_check: Option<HealthCheckResult>,
    pub error: Option<RotationFailure>,
}

/// Current secret material returned by `get_current_value`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentValue {
    pub value: String,
    pub version: u64,
}

/// Compute the rotation instant following a rotation at `from`.
pub(crate) fn next_rotation_after(from: DateTime<Utc>, interval_days: u32) -> DateTime<Utc> {
    from + Duration::days(i64::from(interval_days))
}
