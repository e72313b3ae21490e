//! HashiCorp Vault provider (KV v2 contract surface)
//!
//! Carries the connection/auth configuration and the contract mapping;
//! wire-level KV v2 calls are supplied by the embedder's Vault client.
//! Until one is attached every operation reports the backend as
//! unavailable, so rotations back off and retry instead of failing hard.

use crate::error::ProviderError;
use crate::health::{HealthCheckResult, HealthStatus};
use crate::model::SecretVersion;
use crate::providers::{SecretProvider, SecretRead};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VaultConfig {
    pub address: String,
    pub token: Option<String>,
    pub mount_path: String,
    pub namespace: Option<String>,
    pub timeout_seconds: u64,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            address: "http://127.0.0.1:8200".to_string(),
            token: None,
            mount_path: "secret".to_string(),
            namespace: None,
            timeout_seconds: 30,
        }
    }
}

pub struct VaultProvider {
    config: VaultConfig,
}

impl VaultProvider {
    pub fn new(config: VaultConfig) -> Self {
        Self { config }
    }

    fn unavailable(&self, op: &str) -> ProviderError {
        ProviderError::BackendUnavailable(format!(
            "vault {} at {}: no client attached",
            op, self.config.address
        ))
    }
}

#[async_trait]
impl SecretProvider for VaultProvider {
    fn name(&self) -> &str {
        "vault"
    }

    async fn get(&self, _path: &str) -> Result<SecretRead, ProviderError> {
        Err(self.unavailable("read"))
    }

    async fn rotate(&self, _path: &str, _new_value: &str) -> Result<u64, ProviderError> {
        Err(self.unavailable("write"))
    }

    async fn rollback(&self, _path: &str, _version: u64) -> Result<(), ProviderError> {
        Err(self.unavailable("rollback"))
    }

    async fn list_versions(&self, _path: &str) -> Result<Vec<SecretVersion>, ProviderError> {
        Err(self.unavailable("metadata read"))
    }

    async fn delete_version(&self, _path: &str, _version: u64) -> Result<(), ProviderError> {
        Err(self.unavailable("version delete"))
    }

    async fn health_check(&self) -> Result<HealthCheckResult, ProviderError> {
        Ok(HealthCheckResult::single(
            HealthStatus::Unhealthy,
            format!("vault at {} not reachable: no client attached", self.config.address),
            0,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_operations_report_backend_unavailable() {
        let provider = VaultProvider::new(VaultConfig::default());
        assert!(matches!(
            provider.get("app/db").await.unwrap_err(),
            ProviderError::BackendUnavailable(_)
        ));
        assert!(matches!(
            provider.rotate("app/db", "value").await.unwrap_err(),
            ProviderError::BackendUnavailable(_)
        ));
    }

    #[tokio::test]
    async fn test_health_check_is_unhealthy() {
        let provider = VaultProvider::new(VaultConfig::default());
        let health = provider.health_check().await.unwrap();
        assert_eq!(health.status, HealthStatus::Unhealthy);
    }
}
