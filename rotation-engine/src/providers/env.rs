//! Built-in provider backed by process environment variables with an
//! AEAD-encrypted in-memory value cache

use crate::error::ProviderError;
use crate::health::{HealthCheckResult, HealthStatus};
use crate::model::SecretVersion;
use crate::providers::{SecretProvider, SecretRead};
use async_trait::async_trait;
use chrono::Utc;
use crypto::{value_checksum, CacheCipher, SealedValue};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::Instant;
use tracing::debug;

const CREATED_BY: &str = "secret-rotator";

/// Per-path state: the version list plus sealed plaintexts keyed by
/// version number.
#[derive(Default)]
struct PathState {
    versions: Vec<SecretVersion>,
    values: HashMap<u64, SealedValue>,
}

/// Environment-backed provider.
///
/// The process environment holds the current plaintext under the
/// secret's path, so operator-set overrides win on reads. Every version
/// ever rotated is kept sealed in memory for rollback and grace
/// handling.
pub struct EnvProvider {
    cipher: CacheCipher,
    state: Mutex<HashMap<String, PathState>>,
}

impl EnvProvider {
    /// `passphrase` derives the cache key via scrypt; without one an
    /// ephemeral key is generated and sealed values do not survive a
    /// process restart.
    pub fn new(passphrase: Option<&str>) -> Result<Self, ProviderError> {
        let cipher = match passphrase {
            Some(p) => CacheCipher::from_passphrase(p)?,
            None => CacheCipher::ephemeral()?,
        };
        Ok(Self {
            cipher,
            state: Mutex::new(HashMap::new()),
        })
    }

    fn current_version(state: &PathState) -> Option<u64> {
        state
            .versions
            .iter()
            .find(|v| v.is_current)
            .map(|v| v.version)
    }
}

#[async_trait]
impl SecretProvider for EnvProvider {
    fn name(&self) -> &str {
        "env"
    }

    async fn get(&self, path: &str) -> Result<SecretRead, ProviderError> {
        let state = self.state.lock();
        let path_state = state.get(path);
        let current = path_state.and_then(|s| Self::current_version(s));

        // Operator-set environment values win over the cache.
        if let Ok(value) = std::env::var(path) {
            return Ok(SecretRead {
                value,
                version: current.unwrap_or(0),
                metadata: HashMap::new(),
            });
        }

        let path_state = path_state.ok_or_else(|| ProviderError::NotFound(path.to_string()))?;
        let version = current.ok_or_else(|| ProviderError::NotFound(path.to_string()))?;
        let sealed = path_state
            .values
            .get(&version)
            .ok_or_else(|| ProviderError::NotFound(path.to_string()))?;
        let value = self.cipher.open(sealed)?;

        Ok(SecretRead {
            value,
            version,
            metadata: HashMap::new(),
        })
    }

    async fn rotate(&self, path: &str, new_value: &str) -> Result<u64, ProviderError> {
        let sealed = self.cipher.seal(new_value)?;

        let mut state = self.state.lock();
        let path_state = state.entry(path.to_string()).or_default();

        let new_version = path_state
            .versions
            .iter()
            .map(|v| v.version)
            .max()
            .map(|v| v + 1)
            .unwrap_or(1);

        for version in path_state.versions.iter_mut() {
            version.is_current = false;
        }
        path_state.versions.push(SecretVersion {
            version: new_version,
            created_at: Utc::now(),
            expires_at: None,
            is_current: true,
            is_valid: true,
            checksum: value_checksum(new_value),
            created_by: CREATED_BY.to_string(),
            rotation_event_id: None,
        });
        path_state.values.insert(new_version, sealed);
        drop(state);

        std::env::set_var(path, new_value);
        debug!(path, version = new_version, "rotated env secret");

        Ok(new_version)
    }

    async fn rollback(&self, path: &str, version: u64) -> Result<(), ProviderError> {
        let mut state = self.state.lock();
        let path_state = state
            .get_mut(path)
            .ok_or_else(|| ProviderError::VersionNotFound {
                path: path.to_string(),
                version,
            })?;

        if !path_state.versions.iter().any(|v| v.version == version) {
            return Err(ProviderError::VersionNotFound {
                path: path.to_string(),
                version,
            });
        }
        let sealed = path_state
            .values
            .get(&version)
            .ok_or_else(|| ProviderError::VersionNotFound {
                path: path.to_string(),
                version,
            })?;
        let value = self.cipher.open(sealed)?;

        for v in path_state.versions.iter_mut() {
            v.is_current = v.version == version;
            if v.is_current {
                v.is_valid = true;
            }
        }
        drop(state);

        std::env::set_var(path, &value);
        debug!(path, version, "rolled back env secret");

        Ok(())
    }

    async fn list_versions(&self, path: &str) -> Result<Vec<SecretVersion>, ProviderError> {
        Ok(self
            .state
            .lock()
            .get(path)
            .map(|s| s.versions.clone())
            .unwrap_or_default())
    }

    async fn delete_version(&self, path: &str, version: u64) -> Result<(), ProviderError> {
        let mut state = self.state.lock();
        let path_state = state
            .get_mut(path)
            .ok_or_else(|| ProviderError::VersionNotFound {
                path: path.to_string(),
                version,
            })?;

        let entry = path_state
            .versions
            .iter()
            .find(|v| v.version == version)
            .ok_or_else(|| ProviderError::VersionNotFound {
                path: path.to_string(),
                version,
            })?;
        if entry.is_current {
            return Err(ProviderError::Rejected(format!(
                "cannot delete current version {version} of {path}"
            )));
        }

        path_state.versions.retain(|v| v.version != version);
        path_state.values.remove(&version);
        Ok(())
    }

    async fn expire_version(&self, path: &str, version: u64) -> Result<(), ProviderError> {
        let mut state = self.state.lock();
        if let Some(path_state) = state.get_mut(path) {
            if let Some(v) = path_state.versions.iter_mut().find(|v| v.version == version) {
                v.is_valid = false;
                debug!(path, version, "grace window ended for env secret version");
            }
        }
        Ok(())
    }

    async fn health_check(&self) -> Result<HealthCheckResult, ProviderError> {
        let start = Instant::now();
        let paths = self.state.lock().len();
        Ok(HealthCheckResult::single(
            HealthStatus::Healthy,
            format!("env provider ready ({paths} paths cached)"),
            start.elapsed().as_millis() as u64,
        ))
    }
}
