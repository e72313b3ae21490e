//! Audit bridge: translates engine operations into structured audit
//! records consumed by an external sink

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

/// Risk zone for secret operations.
pub const AUDIT_ZONE: &str = "yellow";

const ACTOR_ID: &str = "secret-rotator";
const ACTOR_NAME: &str = "Secret Rotation Engine";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    Schedule,
    Unschedule,
    Pause,
    Resume,
    Rotate,
    Rollback,
    Access,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditActor {
    #[serde(rename = "type")]
    pub actor_type: String,
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditResource {
    #[serde(rename = "type")]
    pub resource_type: String,
    pub id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub action: AuditAction,
    pub actor: AuditActor,
    pub resource: AuditResource,
    pub zone: String,
    pub success: bool,
    pub metadata: serde_json::Value,
}

impl AuditRecord {
    /// Record for one engine operation on a secret.
    pub fn secret_op(
        action: AuditAction,
        secret_id: &str,
        success: bool,
        metadata: serde_json::Value,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            action,
            actor: AuditActor {
                actor_type: "system".to_string(),
                id: ACTOR_ID.to_string(),
                name: ACTOR_NAME.to_string(),
            },
            resource: AuditResource {
                resource_type: "secret".to_string(),
                id: secret_id.to_string(),
            },
            zone: AUDIT_ZONE.to_string(),
            success,
            metadata,
        }
    }
}

/// External audit sink. Failures inside a sink must never affect the
/// operation being audited.
pub trait AuditSink: Send + Sync {
    fn record(&self, record: AuditRecord);
}

/// Default sink: structured log lines through `tracing`.
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn record(&self, record: AuditRecord) {
        if record.success {
            info!(
                action = ?record.action,
                secret_id = %record.resource.id,
                zone = %record.zone,
                "audit"
            );
        } else {
            warn!(
                action = ?record.action,
                secret_id = %record.resource.id,
                zone = %record.zone,
                metadata = %record.metadata,
                "audit (failed operation)"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_secret_op_record_shape() {
        let record = AuditRecord::secret_op(
            AuditAction::Rotate,
            "db.pw",
            true,
            json!({"to_version": 2}),
        );

        assert_eq!(record.zone, "yellow");
        assert_eq!(record.actor.actor_type, "system");
        assert_eq!(record.actor.id, "secret-rotator");
        assert_eq!(record.resource.resource_type, "secret");
        assert_eq!(record.resource.id, "db.pw");
        assert!(record.success);
    }

    #[test]
    fn test_action_serialization() {
        let json = serde_json::to_string(&AuditAction::Unschedule).unwrap();
        assert_eq!(json, "\"unschedule\"");
    }

    #[test]
    fn test_record_serializes_renamed_fields() {
        let record = AuditRecord::secret_op(AuditAction::Access, "api.key", false, json!({}));
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["actor"]["type"], "system");
        assert_eq!(value["resource"]["type"], "secret");
    }

    #[test]
    fn test_tracing_sink_accepts_records() {
        let sink = TracingAuditSink;
        sink.record(AuditRecord::secret_op(
            AuditAction::Pause,
            "db.pw",
            true,
            json!({}),
        ));
    }
}
