//! Secret provider contract and implementations

pub mod aws;
pub mod env;
pub mod supabase;
pub mod vault;

pub use aws::AwsSecretsManagerProvider;
pub use env::EnvProvider;
pub use supabase::SupabaseVaultProvider;
pub use vault::VaultProvider;

use crate::error::ProviderError;
use crate::health::HealthCheckResult;
use crate::model::SecretVersion;
use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Backend tag used for provider dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Env,
    Aws,
    Vault,
    Supabase,
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self {
            ProviderKind::Env => "env",
            ProviderKind::Aws => "aws",
            ProviderKind::Vault => "vault",
            ProviderKind::Supabase => "supabase",
        };
        f.write_str(tag)
    }
}

/// Current value of a secret as read from a provider.
#[derive(Debug, Clone)]
pub struct SecretRead {
    pub value: String,
    pub version: u64,
    pub metadata: HashMap<String, String>,
}

/// Uniform capability set over heterogeneous secret backends.
///
/// Version numbers are monotonic within a single path and provider; the
/// engine never compares them across providers or paths, and never
/// assumes they are contiguous.
#[async_trait]
pub trait SecretProvider: Send + Sync {
    /// Provider name for logging
    fn name(&self) -> &str;

    /// Read the current value and its version.
    async fn get(&self, path: &str) -> Result<SecretRead, ProviderError>;

    /// Create a new version holding `new_value` and make it current.
    async fn rotate(&self, path: &str, new_value: &str) -> Result<u64, ProviderError>;

    /// Make the named existing version current again.
    async fn rollback(&self, path: &str, version: u64) -> Result<(), ProviderError>;

    /// All known versions; no ordering guarantee.
    async fn list_versions(&self, path: &str) -> Result<Vec<SecretVersion>, ProviderError>;

    /// Delete a non-current version. Deleting the current version is
    /// refused with `Rejected`.
    async fn delete_version(&self, path: &str, version: u64) -> Result<(), ProviderError>;

    /// End the grace window of a formerly-current version. Backends
    /// that manage validity themselves ignore this.
    async fn expire_version(&self, _path: &str, _version: u64) -> Result<(), ProviderError> {
        Ok(())
    }

    /// Connectivity/credentials probe.
    async fn health_check(&self) -> Result<HealthCheckResult, ProviderError>;
}

/// Registry mapping provider tags to instances.
pub struct ProviderRegistry {
    providers: RwLock<HashMap<ProviderKind, Arc<dyn SecretProvider>>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self {
            providers: RwLock::new(HashMap::new()),
        }
    }

    pub fn register(&self, kind: ProviderKind, provider: Arc<dyn SecretProvider>) {
        self.providers.write().insert(kind, provider);
    }

    pub fn get(&self, kind: ProviderKind) -> Option<Arc<dyn SecretProvider>> {
        self.providers.read().get(&kind).cloned()
    }

    pub fn contains(&self, kind: ProviderKind) -> bool {
        self.providers.read().contains_key(&kind)
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::new()
    }
}
