//! Supabase Vault provider (contract surface)
//!
//! Holds project/key configuration and the contract mapping; the RPC
//! calls against the vault schema are supplied by the embedder. Until a
//! client is attached every operation reports the backend as
//! unavailable.

use crate::error::ProviderError;
use crate::health::{HealthCheckResult, HealthStatus};
use crate::model::SecretVersion;
use crate::providers::{SecretProvider, SecretRead};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupabaseVaultConfig {
    pub project_url: String,
    pub service_role_key: Option<String>,
}

impl Default for SupabaseVaultConfig {
    fn default() -> Self {
        Self {
            project_url: "http://127.0.0.1:54321".to_string(),
            service_role_key: None,
        }
    }
}

pub struct SupabaseVaultProvider {
    config: SupabaseVaultConfig,
}

impl SupabaseVaultProvider {
    pub fn new(config: SupabaseVaultConfig) -> Self {
        Self { config }
    }

    fn unavailable(&self, op: &str) -> ProviderError {
        ProviderError::BackendUnavailable(format!(
            "supabase vault {} at {}: no client attached",
            op, self.config.project_url
        ))
    }
}

#[async_trait]
impl SecretProvider for SupabaseVaultProvider {
    fn name(&self) -> &str {
        "supabase-vault"
    }

    async fn get(&self, _path: &str) -> Result<SecretRead, ProviderError> {
        Err(self.unavailable("select"))
    }

    async fn rotate(&self, _path: &str, _new_value: &str) -> Result<u64, ProviderError> {
        Err(self.unavailable("update_secret"))
    }

    async fn rollback(&self, _path: &str, _version: u64) -> Result<(), ProviderError> {
        Err(self.unavailable("rollback"))
    }

    async fn list_versions(&self, _path: &str) -> Result<Vec<SecretVersion>, ProviderError> {
        Err(self.unavailable("list"))
    }

    async fn delete_version(&self, _path: &str, _version: u64) -> Result<(), ProviderError> {
        Err(self.unavailable("delete"))
    }

    async fn health_check(&self) -> Result<HealthCheckResult, ProviderError> {
        Ok(HealthCheckResult::single(
            HealthStatus::Unhealthy,
            format!(
                "supabase vault at {} not reachable: no client attached",
                self.config.project_url
            ),
            0,
        ))
    }
}
