//! Declarative configuration: per-secret policies, notification
//! channels, and engine-level knobs

use crate::error::RotationError;
use crate::health::HealthCheckConfig;
use crate::notify::NotificationKind;
use crate::providers::ProviderKind;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Declarative rotation policy for one managed secret.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecretConfig {
    /// Stable identifier, unique within the engine
    pub id: String,
    /// Display name
    pub name: String,
    pub provider: ProviderKind,
    /// Provider-specific path (env var name, ARN, mount path, ...)
    pub path: String,
    pub rotation_interval_days: u32,
    pub grace_period_hours: u32,
    pub notify_before_days: u32,
    pub enabled: bool,
    /// Name of a registered custom generator
    pub custom_generator: Option<String>,
    pub health_check: Option<HealthCheckConfig>,
    pub tags: Vec<String>,
    pub metadata: HashMap<String, String>,
}

impl SecretConfig {
    pub fn new(id: impl Into<String>, provider: ProviderKind, path: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            provider,
            path: path.into(),
            rotation_interval_days: 30,
            grace_period_hours: 0,
            notify_before_days: 0,
            enabled: true,
            custom_generator: None,
            health_check: None,
            tags: Vec::new(),
            metadata: HashMap::new(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_interval_days(mut self, days: u32) -> Self {
        self.rotation_interval_days = days;
        self
    }

    pub fn with_grace_period_hours(mut self, hours: u32) -> Self {
        self.grace_period_hours = hours;
        self
    }

    pub fn with_notify_before_days(mut self, days: u32) -> Self {
        self.notify_before_days = days;
        self
    }

    pub fn with_health_check(mut self, health_check: HealthCheckConfig) -> Self {
        self.health_check = Some(health_check);
        self
    }

    pub fn with_custom_generator(mut self, name: impl Into<String>) -> Self {
        self.custom_generator = Some(name.into());
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    pub fn validate(&self) -> Result<(), RotationError> {
        if self.id.trim().is_empty() {
            return Err(RotationError::InvalidConfig("id must not be empty".into()));
        }
        if self.path.trim().is_empty() {
            return Err(RotationError::InvalidConfig(format!(
                "path must not be empty for secret: {}",
                self.id
            )));
        }
        if self.rotation_interval_days < 1 {
            return Err(RotationError::InvalidConfig(format!(
                "rotation_interval_days must be >= 1 for secret: {}",
                self.id
            )));
        }
        if let Some(hc) = &self.health_check {
            hc.validate().map_err(RotationError::InvalidConfig)?;
        }
        Ok(())
    }
}

/// Notification channel kinds. Webhook and Slack are delivered over
/// HTTP; email and pagerduty delegate to the embedder's transport and
/// are recorded through the log until one is wired up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelKind {
    Webhook,
    Slack,
    Email,
    Pagerduty,
}

/// One configured channel with its opaque settings map.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelConfig {
    pub channel: ChannelKind,
    pub settings: HashMap<String, String>,
}

impl ChannelConfig {
    pub fn webhook(url: impl Into<String>) -> Self {
        let mut settings = HashMap::new();
        settings.insert("url".to_string(), url.into());
        Self {
            channel: ChannelKind::Webhook,
            settings,
        }
    }

    pub fn slack(webhook_url: impl Into<String>) -> Self {
        let mut settings = HashMap::new();
        settings.insert("url".to_string(), webhook_url.into());
        Self {
            channel: ChannelKind::Slack,
            settings,
        }
    }
}

/// Channel fan-out plus the subscribed subset of event kinds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationConfig {
    pub channels: Vec<ChannelConfig>,
    pub events: Vec<NotificationKind>,
}

/// Engine-level knobs.
#[derive(Clone)]
pub struct EngineConfig {
    /// Scheduler tick period
    pub check_interval: Duration,
    /// Concurrency ceiling for in-flight rotations
    pub max_concurrent_rotations: usize,
    /// Passphrase for the env provider's AEAD cache. When absent an
    /// ephemeral key is used and the cache does not survive a restart.
    pub encryption_key: Option<String>,
    pub notifications: Option<NotificationConfig>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            check_interval: Duration::from_secs(60),
            max_concurrent_rotations: 5,
            encryption_key: None,
            notifications: None,
        }
    }
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_check_interval(mut self, interval: Duration) -> Self {
        self.check_interval = interval;
        self
    }

    pub fn with_max_concurrent_rotations(mut self, max: usize) -> Self {
        self.max_concurrent_rotations = max;
        self
    }

    pub fn with_encryption_key(mut self, passphrase: impl Into<String>) -> Self {
        self.encryption_key = Some(passphrase.into());
        self
    }

    pub fn with_notifications(mut self, notifications: NotificationConfig) -> Self {
        self.notifications = Some(notifications);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_config() {
        let config = SecretConfig::new("db.pw", ProviderKind::Env, "DB_PW")
            .with_interval_days(30)
            .with_grace_period_hours(24);
        assert!(config.validate().is_ok());
        assert_eq!(config.name, "db.pw");
    }

    #[test]
    fn test_empty_id_rejected() {
        let config = SecretConfig::new("  ", ProviderKind::Env, "DB_PW");
        assert!(matches!(
            config.validate(),
            Err(RotationError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_empty_path_rejected() {
        let config = SecretConfig::new("db.pw", ProviderKind::Env, "");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_interval_rejected() {
        let config = SecretConfig::new("db.pw", ProviderKind::Env, "DB_PW").with_interval_days(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_health_check_rejected() {
        let mut hc = crate::health::HealthCheckConfig::function("probe");
        hc.timeout_ms = 0;
        let config = SecretConfig::new("db.pw", ProviderKind::Env, "DB_PW").with_health_check(hc);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_engine_config_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.check_interval, Duration::from_secs(60));
        assert_eq!(config.max_concurrent_rotations, 5);
        assert!(config.encryption_key.is_none());
    }
}
