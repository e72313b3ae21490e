//! AWS Secrets Manager provider (contract surface)
//!
//! Holds region/role configuration and the contract mapping. Staged
//! version labels (AWSCURRENT/AWSPREVIOUS) must be adapted onto the
//! monotonic integer contract by the SDK client the embedder attaches;
//! until then every operation reports the backend as unavailable.

use crate::error::ProviderError;
use crate::health::{HealthCheckResult, HealthStatus};
use crate::model::SecretVersion;
use crate::providers::{SecretProvider, SecretRead};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AwsSecretsManagerConfig {
    pub region: String,
    pub role_arn: Option<String>,
    pub endpoint_url: Option<String>,
}

impl Default for AwsSecretsManagerConfig {
    fn default() -> Self {
        Self {
            region: "us-east-1".to_string(),
            role_arn: None,
            endpoint_url: None,
        }
    }
}

pub struct AwsSecretsManagerProvider {
    config: AwsSecretsManagerConfig,
}

impl AwsSecretsManagerProvider {
    pub fn new(config: AwsSecretsManagerConfig) -> Self {
        Self { config }
    }

    fn unavailable(&self, op: &str) -> ProviderError {
        ProviderError::BackendUnavailable(format!(
            "aws secrets manager {} in {}: no sdk client attached",
            op, self.config.region
        ))
    }
}

#[async_trait]
impl SecretProvider for AwsSecretsManagerProvider {
    fn name(&self) -> &str {
        "aws-secrets-manager"
    }

    async fn get(&self, _path: &str) -> Result<SecretRead, ProviderError> {
        Err(self.unavailable("get_secret_value"))
    }

    async fn rotate(&self, _path: &str, _new_value: &str) -> Result<u64, ProviderError> {
        Err(self.unavailable("put_secret_value"))
    }

    async fn rollback(&self, _path: &str, _version: u64) -> Result<(), ProviderError> {
        Err(self.unavailable("update_secret_version_stage"))
    }

    async fn list_versions(&self, _path: &str) -> Result<Vec<SecretVersion>, ProviderError> {
        Err(self.unavailable("list_secret_version_ids"))
    }

    async fn delete_version(&self, _path: &str, _version: u64) -> Result<(), ProviderError> {
        Err(self.unavailable("version delete"))
    }

    async fn health_check(&self) -> Result<HealthCheckResult, ProviderError> {
        Ok(HealthCheckResult::single(
            HealthStatus::Unhealthy,
            format!(
                "aws secrets manager in {} not reachable: no sdk client attached",
                self.config.region
            ),
            0,
        ))
    }
}
