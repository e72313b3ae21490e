//! Engine facade and rotation executor
//!
//! The engine owns all schedules, per-secret history, and the active
//! rotation set. Rotations run as independent tasks; the three shared
//! collections are guarded by locks held only across map operations,
//! never across I/O.

use crate::audit::{AuditAction, AuditRecord, AuditSink, TracingAuditSink};
use crate::config::{EngineConfig, SecretConfig};
use crate::error::{ProviderError, Result, RotationError};
use crate::events::{EngineEvent, EventBus};
use crate::generator::{self, SecretGenerator};
use crate::health::{HealthCheckResult, HealthCheckRunner, HealthProbe, HealthStatus, QueryExecutor};
use crate::history::{HistoryStore, DEFAULT_HISTORY_LIMIT};
use crate::metrics::RotationMetrics;
use crate::model::{
    next_rotation_after, CurrentValue, RotationEvent, RotationFailure, RotationResult,
    RotationSchedule, RotationStatus, RotationType, SecretVersion,
};
use crate::notify::{NotificationDispatcher, NotificationKind};
use crate::providers::{EnvProvider, ProviderKind, ProviderRegistry, SecretProvider};
use crate::scheduler;
use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use serde_json::json;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{info, warn};
use uuid::Uuid;

/// How long `shutdown` waits for in-flight rotations to drain.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(30);

const BACKOFF_BASE_SECS: u64 = 60;
const BACKOFF_CAP_SECS: u64 = 3_600;

/// Exponential backoff after consecutive failures: 1m, 2m, 4m, ...
/// capped at 60m.
fn backoff_delay_secs(failure_count: u32) -> u64 {
    let exp = failure_count.saturating_sub(1).min(16);
    BACKOFF_BASE_SECS.saturating_mul(1u64 << exp).min(BACKOFF_CAP_SECS)
}

/// Secret rotation engine handle. Cheap to clone; all clones share the
/// same underlying state.
#[derive(Clone)]
pub struct RotationEngine {
    inner: Arc<EngineInner>,
}

pub(crate) struct EngineInner {
    pub(crate) check_interval: Duration,
    pub(crate) max_concurrent: usize,
    pub(crate) providers: ProviderRegistry,
    pub(crate) generators: RwLock<HashMap<String, SecretGenerator>>,
    pub(crate) configs: RwLock<HashMap<String, SecretConfig>>,
    pub(crate) schedules: RwLock<HashMap<String, RotationSchedule>>,
    pub(crate) history: HistoryStore,
    pub(crate) active: Mutex<HashSet<String>>,
    pub(crate) health: HealthCheckRunner,
    pub(crate) notifier: NotificationDispatcher,
    pub(crate) events: EventBus,
    pub(crate) metrics: RotationMetrics,
    audit_sink: RwLock<Arc<dyn AuditSink>>,
    shutting_down: AtomicBool,
    scheduler: Mutex<Option<JoinHandle<()>>>,
    shutdown_tx: watch::Sender<bool>,
}

/// Removes the secret from the active set on every exit path.
struct ActiveGuard {
    inner: Arc<EngineInner>,
    secret_id: String,
}

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        self.inner.active.lock().remove(&self.secret_id);
    }
}

struct StepFailure {
    message: String,
    health_check: Option<HealthCheckResult>,
}

impl RotationEngine {
    pub fn new(config: EngineConfig) -> Result<Self> {
        let env_provider = EnvProvider::new(config.encryption_key.as_deref())?;
        let providers = ProviderRegistry::new();
        providers.register(ProviderKind::Env, Arc::new(env_provider));

        let (shutdown_tx, _) = watch::channel(false);

        Ok(Self {
            inner: Arc::new(EngineInner {
                check_interval: config.check_interval,
                max_concurrent: config.max_concurrent_rotations,
                providers,
                generators: RwLock::new(HashMap::new()),
                configs: RwLock::new(HashMap::new()),
                schedules: RwLock::new(HashMap::new()),
                history: HistoryStore::new(),
                active: Mutex::new(HashSet::new()),
                health: HealthCheckRunner::new(),
                notifier: NotificationDispatcher::new(config.notifications),
                events: EventBus::new(),
                metrics: RotationMetrics::new(),
                audit_sink: RwLock::new(Arc::new(TracingAuditSink)),
                shutting_down: AtomicBool::new(false),
                scheduler: Mutex::new(None),
                shutdown_tx,
            }),
        })
    }

    /// Spawn the scheduler loop. Idempotent.
    pub fn start(&self) {
        let mut slot = self.inner.scheduler.lock();
        if slot.is_some() || self.inner.is_shutting_down() {
            return;
        }
        *slot = Some(scheduler::spawn(&self.inner));
        info!(
            interval_ms = self.inner.check_interval.as_millis() as u64,
            max_concurrent = self.inner.max_concurrent,
            "scheduler started"
        );
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.inner.events.subscribe()
    }

    pub fn register_provider(&self, kind: ProviderKind, provider: Arc<dyn SecretProvider>) {
        self.inner.providers.register(kind, provider);
    }

    pub fn register_generator(
        &self,
        name: impl Into<String>,
        generate: impl Fn() -> String + Send + Sync + 'static,
    ) {
        self.inner
            .generators
            .write()
            .insert(name.into(), Arc::new(generate));
    }

    pub fn register_health_function(&self, name: impl Into<String>, probe: HealthProbe) {
        self.inner.health.register_function(name, probe);
    }

    pub fn set_query_executor(&self, executor: Arc<dyn QueryExecutor>) {
        self.inner.health.set_query_executor(executor);
    }

    pub fn set_audit_sink(&self, sink: Arc<dyn AuditSink>) {
        *self.inner.audit_sink.write() = sink;
    }

    pub fn metrics(&self) -> &RotationMetrics {
        &self.inner.metrics
    }

    /// Create or update the schedule for a secret.
    pub fn schedule(&self, config: SecretConfig) -> Result<RotationSchedule> {
        config.validate()?;
        if !self.inner.providers.contains(config.provider) {
            return Err(RotationError::UnknownProvider(config.provider.to_string()));
        }

        let now = Utc::now();
        let id = config.id.clone();
        let snapshot = {
            let mut schedules = self.inner.schedules.write();
            match schedules.get_mut(&id) {
                Some(existing) => {
                    existing.next_rotation = next_rotation_after(
                        existing.last_rotation.unwrap_or(now),
                        config.rotation_interval_days,
                    );
                    existing.warning_sent = false;
                    existing.clone()
                }
                None => {
                    let schedule = RotationSchedule::new(
                        id.clone(),
                        next_rotation_after(now, config.rotation_interval_days),
                    );
                    schedules.insert(id.clone(), schedule.clone());
                    schedule
                }
            }
        };
        self.inner.configs.write().insert(id.clone(), config);

        self.inner.events.emit(EngineEvent::Scheduled {
            secret_id: id.clone(),
        });
        self.inner.audit(AuditRecord::secret_op(
            AuditAction::Schedule,
            &id,
            true,
            json!({ "next_rotation": snapshot.next_rotation }),
        ));
        self.inner.notifier.dispatch(
            NotificationKind::RotationScheduled,
            json!({ "secretId": id, "nextRotation": snapshot.next_rotation }),
        );
        info!(secret_id = %id, next_rotation = %snapshot.next_rotation, "secret scheduled");

        Ok(snapshot)
    }

    /// Remove a secret's config and schedule. No-op when absent.
    /// History is retained as an audit source.
    pub fn unschedule(&self, id: &str) {
        let removed_config = self.inner.configs.write().remove(id).is_some();
        let removed_schedule = self.inner.schedules.write().remove(id).is_some();
        if removed_config || removed_schedule {
            self.inner.events.emit(EngineEvent::Unscheduled {
                secret_id: id.to_string(),
            });
            self.inner.audit(AuditRecord::secret_op(
                AuditAction::Unschedule,
                id,
                true,
                json!({}),
            ));
            info!(secret_id = id, "secret unscheduled");
        }
    }

    pub fn pause(&self, id: &str, reason: &str) -> Result<()> {
        {
            let mut schedules = self.inner.schedules.write();
            let schedule = schedules
                .get_mut(id)
                .ok_or_else(|| RotationError::NotConfigured(id.to_string()))?;
            schedule.paused = true;
            schedule.pause_reason = Some(reason.to_string());
        }
        self.inner.events.emit(EngineEvent::Paused {
            secret_id: id.to_string(),
            reason: reason.to_string(),
        });
        self.inner.audit(AuditRecord::secret_op(
            AuditAction::Pause,
            id,
            true,
            json!({ "reason": reason }),
        ));
        Ok(())
    }

    pub fn resume(&self, id: &str) -> Result<()> {
        {
            let mut schedules = self.inner.schedules.write();
            let schedule = schedules
                .get_mut(id)
                .ok_or_else(|| RotationError::NotConfigured(id.to_string()))?;
            schedule.paused = false;
            schedule.pause_reason = None;
        }
        self.inner.events.emit(EngineEvent::Resumed {
            secret_id: id.to_string(),
        });
        self.inner.audit(AuditRecord::secret_op(
            AuditAction::Resume,
            id,
            true,
            json!({}),
        ));
        Ok(())
    }

    /// Rotate one secret immediately. With no reason the rotation is
    /// recorded as scheduled; with a reason, as manual.
    pub async fn rotate_now(&self, id: &str, reason: Option<&str>) -> Result<RotationResult> {
        let (rotation_type, initiator) = match reason {
            Some(_) => (RotationType::Manual, "operator"),
            None => (RotationType::Scheduled, "scheduler"),
        };
        self.inner
            .execute_rotation(id, rotation_type, initiator, reason)
            .await
    }

    /// Out-of-band rotation after a suspected compromise.
    pub async fn rotate_emergency(&self, id: &str, reason: &str) -> Result<RotationResult> {
        self.inner
            .execute_rotation(id, RotationType::Emergency, "operator", Some(reason))
            .await
    }

    /// Make an earlier version current again, re-validating with the
    /// secret's health check when one is configured.
    pub async fn rollback(&self, id: &str, version: u64) -> Result<()> {
        self.inner.rollback(id, version).await
    }

    /// Most recent history entries, newest first. `limit` defaults to 50.
    pub fn get_history(&self, id: &str, limit: Option<usize>) -> Vec<RotationEvent> {
        self.inner
            .history
            .recent(id, limit.unwrap_or(DEFAULT_HISTORY_LIMIT))
    }

    pub fn get_schedules(&self) -> Vec<RotationSchedule> {
        self.inner.schedules.read().values().cloned().collect()
    }

    pub fn get_schedule(&self, id: &str) -> Option<RotationSchedule> {
        self.inner.schedules.read().get(id).cloned()
    }

    /// Provider version list; not cached by the engine.
    pub async fn get_versions(&self, id: &str) -> Result<Vec<SecretVersion>> {
        let config = self.inner.config_for(id)?;
        let provider = self.inner.provider_for(config.provider)?;
        Ok(provider.list_versions(&config.path).await?)
    }

    /// Run the secret's configured health check on demand.
    pub async fn health_check(&self, id: &str) -> Result<HealthCheckResult> {
        let config = self.inner.config_for(id)?;
        let health_check = config.health_check.clone().ok_or_else(|| {
            RotationError::NotConfigured(format!("no health check configured for: {id}"))
        })?;
        Ok(self.inner.health.run(&health_check).await)
    }

    /// Read the current value, emitting an audit access record.
    pub async fn get_current_value(&self, id: &str) -> Result<CurrentValue> {
        let config = self.inner.config_for(id)?;
        let provider = self.inner.provider_for(config.provider)?;

        let result = provider.get(&config.path).await;
        self.inner.audit(AuditRecord::secret_op(
            AuditAction::Access,
            id,
            result.is_ok(),
            json!({ "path": config.path }),
        ));

        match result {
            Ok(read) => Ok(CurrentValue {
                value: read.value,
                version: read.version,
            }),
            Err(ProviderError::NotFound(path)) => Err(RotationError::NotFound(path)),
            Err(e) => Err(e.into()),
        }
    }

    /// Run one scheduler pass immediately.
    pub async fn run_pending(&self) {
        scheduler::run_tick(&self.inner).await;
    }

    /// Stop the scheduler and wait up to 30 seconds for in-flight
    /// rotations to drain; stragglers finish in the background.
    pub async fn shutdown(&self) {
        if self.inner.shutting_down.swap(true, Ordering::SeqCst) {
            return;
        }
        info!("rotation engine shutting down");

        let _ = self.inner.shutdown_tx.send(true);
        let handle = self.inner.scheduler.lock().take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }

        let deadline = Instant::now() + SHUTDOWN_GRACE;
        loop {
            let remaining = self.inner.active.lock().len();
            if remaining == 0 {
                break;
            }
            if Instant::now() >= deadline {
                warn!(
                    remaining,
                    "shutdown grace window elapsed; rotations left to finish in the background"
                );
                break;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }

        self.inner.events.emit(EngineEvent::Shutdown);
        info!("rotation engine stopped");
    }
}

impl EngineInner {
    pub(crate) fn is_shutting_down(&self) -> bool {
        self.shutting_down.load(Ordering::SeqCst)
    }

    pub(crate) fn shutdown_rx(&self) -> watch::Receiver<bool> {
        self.shutdown_tx.subscribe()
    }

    fn audit(&self, record: AuditRecord) {
        self.audit_sink.read().record(record);
    }

    fn config_for(&self, id: &str) -> Result<SecretConfig> {
        self.configs
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| RotationError::NotConfigured(id.to_string()))
    }

    pub(crate) fn provider_for(&self, kind: ProviderKind) -> Result<Arc<dyn SecretProvider>> {
        self.providers
            .get(kind)
            .ok_or_else(|| RotationError::UnknownProvider(kind.to_string()))
    }

    /// The per-secret rotation state machine:
    /// admit -> snapshot -> generate -> write -> grace -> validate ->
    /// commit, with failure bookkeeping on any error before commit.
    pub(crate) async fn execute_rotation(
        self: &Arc<Self>,
        id: &str,
        rotation_type: RotationType,
        initiator: &str,
        reason: Option<&str>,
    ) -> Result<RotationResult> {
        if self.is_shutting_down() {
            return Err(RotationError::ShuttingDown);
        }
        let config = self.config_for(id)?;

        {
            let mut active = self.active.lock();
            if active.contains(id) {
                return Err(RotationError::AlreadyInProgress(id.to_string()));
            }
            if active.len() >= self.max_concurrent {
                return Err(RotationError::ConcurrencyLimit(self.max_concurrent));
            }
            active.insert(id.to_string());
        }
        let _guard = ActiveGuard {
            inner: Arc::clone(self),
            secret_id: id.to_string(),
        };

        let provider = self.provider_for(config.provider)?;
        let rotation_id = Uuid::new_v4();
        let started = Instant::now();

        // Best-effort snapshot; an unreadable previous version is 0.
        let previous_version = match provider.get(&config.path).await {
            Ok(read) => read.version,
            Err(_) => 0,
        };

        let outcome = self
            .run_rotation_steps(&config, &provider, previous_version)
            .await;
        let duration_ms = started.elapsed().as_millis() as u64;
        let now = Utc::now();

        let mut metadata = HashMap::new();
        if let Some(reason) = reason {
            metadata.insert("reason".to_string(), reason.to_string());
        }

        match outcome {
            Ok((new_version, health_check)) => {
                {
                    let mut schedules = self.schedules.write();
                    if let Some(schedule) = schedules.get_mut(id) {
                        schedule.last_rotation = Some(now);
                        schedule.next_rotation =
                            next_rotation_after(now, config.rotation_interval_days);
                        schedule.failure_count = 0;
                        schedule.backoff_until = None;
                        schedule.warning_sent = false;
                    }
                }
                self.history.append(RotationEvent {
                    id: rotation_id,
                    secret_id: id.to_string(),
                    event_type: rotation_type,
                    status: RotationStatus::Completed,
                    from_version: previous_version,
                    to_version: Some(new_version),
                    initiator: initiator.to_string(),
                    timestamp: now,
                    duration_ms,
                    health_check: health_check.clone(),
                    error: None,
                    metadata,
                });
                self.metrics.record_success(duration_ms);
                self.events.emit(EngineEvent::Rotated {
                    secret_id: id.to_string(),
                    new_version,
                });
                self.audit(AuditRecord::secret_op(
                    AuditAction::Rotate,
                    id,
                    true,
                    json!({
                        "rotation_id": rotation_id,
                        "from_version": previous_version,
                        "to_version": new_version,
                    }),
                ));
                self.notifier.dispatch(
                    NotificationKind::RotationCompleted,
                    json!({
                        "secretId": id,
                        "previousVersion": previous_version,
                        "newVersion": new_version,
                    }),
                );
                info!(secret_id = id, new_version, duration_ms, "rotation completed");

                Ok(RotationResult {
                    rotation_id,
                    secret_id: id.to_string(),
                    success: true,
                    previous_version,
                    new_version: Some(new_version),
                    duration_ms,
                    health_check,
                    error: None,
                })
            }
            Err(failure) => {
                {
                    let mut schedules = self.schedules.write();
                    if let Some(schedule) = schedules.get_mut(id) {
                        schedule.failure_count += 1;
                        let delay = backoff_delay_secs(schedule.failure_count);
                        schedule.backoff_until =
                            Some(now + chrono::Duration::seconds(delay as i64));
                        // next_rotation is deliberately left unchanged
                    }
                }
                self.history.append(RotationEvent {
                    id: rotation_id,
                    secret_id: id.to_string(),
                    event_type: rotation_type,
                    status: RotationStatus::Failed,
                    from_version: previous_version,
                    to_version: None,
                    initiator: initiator.to_string(),
                    timestamp: now,
                    duration_ms,
                    health_check: failure.health_check.clone(),
                    error: Some(failure.message.clone()),
                    metadata,
                });
                self.metrics.record_failure(duration_ms);
                self.events.emit(EngineEvent::RotationFailed {
                    secret_id: id.to_string(),
                    error: failure.message.clone(),
                });
                self.audit(AuditRecord::secret_op(
                    AuditAction::Rotate,
                    id,
                    false,
                    json!({ "rotation_id": rotation_id, "error": failure.message }),
                ));
                self.notifier.dispatch(
                    NotificationKind::RotationFailed,
                    json!({ "secretId": id, "error": failure.message }),
                );
                warn!(secret_id = id, error = %failure.message, "rotation failed");

                Ok(RotationResult {
                    rotation_id,
                    secret_id: id.to_string(),
                    success: false,
                    previous_version,
                    new_version: None,
                    duration_ms,
                    health_check: failure.health_check,
                    error: Some(RotationFailure::rotation_failed(failure.message)),
                })
            }
        }
    }

    async fn run_rotation_steps(
        self: &Arc<Self>,
        config: &SecretConfig,
        provider: &Arc<dyn SecretProvider>,
        previous_version: u64,
    ) -> std::result::Result<(u64, Option<HealthCheckResult>), StepFailure> {
        let new_value = self.generate_value(config);

        self.events.emit(EngineEvent::Rotating {
            secret_id: config.id.clone(),
            previous_version,
        });
        self.notifier.dispatch(
            NotificationKind::RotationStarted,
            json!({ "secretId": config.id, "previousVersion": previous_version }),
        );

        let new_version =
            provider
                .rotate(&config.path, &new_value)
                .await
                .map_err(|e| StepFailure {
                    message: e.to_string(),
                    health_check: None,
                })?;

        if previous_version > 0 {
            if config.grace_period_hours > 0 {
                self.spawn_grace_expiry(config, previous_version);
            } else {
                // zero-length grace window: the displaced version stops
                // verifying immediately
                if let Err(e) = provider.expire_version(&config.path, previous_version).await {
                    warn!(
                        secret_id = %config.id,
                        version = previous_version,
                        error = %e,
                        "immediate grace expiry failed"
                    );
                }
            }
        }

        let health_check = match &config.health_check {
            Some(health_check) => {
                let result = self.health.run(health_check).await;
                if result.status == HealthStatus::Unhealthy {
                    if previous_version > 0 {
                        if let Err(e) = provider.rollback(&config.path, previous_version).await {
                            warn!(
                                secret_id = %config.id,
                                error = %e,
                                "auto-rollback after unhealthy check also failed"
                            );
                        }
                    }
                    return Err(StepFailure {
                        message: format!(
                            "health check unhealthy after rotating {}; rolled back to version {}",
                            config.id, previous_version
                        ),
                        health_check: Some(result),
                    });
                }
                // degraded completes the rotation but is carried in the result
                Some(result)
            }
            None => None,
        };

        Ok((new_version, health_check))
    }

    fn generate_value(&self, config: &SecretConfig) -> String {
        if let Some(name) = &config.custom_generator {
            let generate = { self.generators.read().get(name).cloned() };
            match generate {
                Some(generate) => return generate(),
                None => warn!(
                    secret_id = %config.id,
                    generator = %name,
                    "custom generator not registered; using default"
                ),
            }
        }
        generator::generate_secret_value()
    }

    /// One-shot task that ends the grace window of the formerly-current
    /// version. Errors are logged and never propagate.
    fn spawn_grace_expiry(self: &Arc<Self>, config: &SecretConfig, version: u64) {
        let weak = Arc::downgrade(self);
        let secret_id = config.id.clone();
        let path = config.path.clone();
        let kind = config.provider;
        let grace = Duration::from_secs(u64::from(config.grace_period_hours) * 3_600);

        tokio::spawn(async move {
            tokio::time::sleep(grace).await;
            let Some(inner) = weak.upgrade() else { return };
            let Some(provider) = inner.providers.get(kind) else { return };
            if let Err(e) = provider.expire_version(&path, version).await {
                warn!(secret_id = %secret_id, version, error = %e, "grace expiry failed");
                return;
            }
            inner
                .events
                .emit(EngineEvent::GracePeriodEnded { secret_id, version });
        });
    }

    pub(crate) async fn rollback(self: &Arc<Self>, id: &str, target_version: u64) -> Result<()> {
        let config = self.config_for(id)?;
        let provider = self.provider_for(config.provider)?;
        let started = Instant::now();

        let from_version = provider
            .get(&config.path)
            .await
            .map(|read| read.version)
            .unwrap_or(0);

        provider.rollback(&config.path, target_version).await?;

        if let Some(health_check) = &config.health_check {
            let result = self.health.run(health_check).await;
            if result.status == HealthStatus::Unhealthy {
                // restore the version we started from; depth 1 only
                if from_version > 0 {
                    if let Err(e) = provider.rollback(&config.path, from_version).await {
                        warn!(
                            secret_id = id,
                            error = %e,
                            "restoring original version after failed rollback validation also failed"
                        );
                    }
                }
                self.history.append(RotationEvent {
                    id: Uuid::new_v4(),
                    secret_id: id.to_string(),
                    event_type: RotationType::Rollback,
                    status: RotationStatus::Failed,
                    from_version,
                    to_version: Some(target_version),
                    initiator: "operator".to_string(),
                    timestamp: Utc::now(),
                    duration_ms: started.elapsed().as_millis() as u64,
                    health_check: Some(result),
                    error: Some("health check failed after rollback".to_string()),
                    metadata: HashMap::new(),
                });
                self.audit(AuditRecord::secret_op(
                    AuditAction::Rollback,
                    id,
                    false,
                    json!({ "to_version": target_version }),
                ));
                return Err(RotationError::HealthCheckFailed(format!(
                    "rollback of {id} to version {target_version} failed validation"
                )));
            }
        }

        self.history.append(RotationEvent {
            id: Uuid::new_v4(),
            secret_id: id.to_string(),
            event_type: RotationType::Rollback,
            status: RotationStatus::RolledBack,
            from_version,
            to_version: Some(target_version),
            initiator: "operator".to_string(),
            timestamp: Utc::now(),
            duration_ms: started.elapsed().as_millis() as u64,
            health_check: None,
            error: None,
            metadata: HashMap::new(),
        });
        self.events.emit(EngineEvent::RolledBack {
            secret_id: id.to_string(),
            from_version,
            to_version: target_version,
        });
        self.audit(AuditRecord::secret_op(
            AuditAction::Rollback,
            id,
            true,
            json!({ "from_version": from_version, "to_version": target_version }),
        ));
        info!(secret_id = id, from_version, target_version, "rollback completed");

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::health::{HealthCheckConfig, ProbeResponse};
    use chrono::Duration as ChronoDuration;
    use std::time::Duration;

    fn engine() -> RotationEngine {
        RotationEngine::new(EngineConfig::default()).unwrap()
    }

    fn env_config(id: &str) -> SecretConfig {
        let path = format!("KEYWHEEL_ENG_{}", uuid::Uuid::new_v4().simple());
        SecretConfig::new(id, ProviderKind::Env, path)
    }

    fn slow_healthy_probe(delay_ms: u64) -> HealthProbe {
        Arc::new(move || {
            Box::pin(async move {
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                Ok(ProbeResponse::healthy())
            })
        })
    }

    #[tokio::test]
    async fn test_schedule_computes_next_rotation() {
        let engine = engine();
        let schedule = engine
            .schedule(env_config("db.pw").with_interval_days(30))
            .unwrap();

        let days = (schedule.next_rotation - Utc::now()).num_days();
        assert!((29..=30).contains(&days));
        assert!(schedule.last_rotation.is_none());
        assert_eq!(schedule.failure_count, 0);
    }

    #[tokio::test]
    async fn test_schedule_rejects_unregistered_provider() {
        let engine = engine();
        let config = SecretConfig::new("db.pw", ProviderKind::Vault, "app/db");
        assert!(matches!(
            engine.schedule(config),
            Err(RotationError::UnknownProvider(_))
        ));
        assert!(engine.get_schedule("db.pw").is_none());
    }

    #[tokio::test]
    async fn test_unschedule_roundtrip() {
        let engine = engine();
        engine.schedule(env_config("db.pw")).unwrap();
        assert!(engine.get_schedule("db.pw").is_some());

        engine.unschedule("db.pw");
        assert!(engine.get_schedule("db.pw").is_none());
        assert!(engine.inner.configs.read().is_empty());

        // no-op for an unknown id
        engine.unschedule("db.pw");
    }

    #[tokio::test]
    async fn test_pause_resume() {
        let engine = engine();
        engine.schedule(env_config("db.pw")).unwrap();

        engine.pause("db.pw", "maintenance").unwrap();
        let schedule = engine.get_schedule("db.pw").unwrap();
        assert!(schedule.paused);
        assert_eq!(schedule.pause_reason.as_deref(), Some("maintenance"));

        engine.resume("db.pw").unwrap();
        let schedule = engine.get_schedule("db.pw").unwrap();
        assert!(!schedule.paused);
        assert!(schedule.pause_reason.is_none());
    }

    #[tokio::test]
    async fn test_pause_unknown_secret_fails() {
        let engine = engine();
        assert!(matches!(
            engine.pause("ghost", "why"),
            Err(RotationError::NotConfigured(_))
        ));
    }

    #[tokio::test]
    async fn test_pause_blocks_scheduler_tick() {
        let engine = engine();
        engine.schedule(env_config("db.pw")).unwrap();
        {
            let mut schedules = engine.inner.schedules.write();
            schedules.get_mut("db.pw").unwrap().next_rotation =
                Utc::now() - ChronoDuration::seconds(1);
        }
        engine.pause("db.pw", "maintenance").unwrap();

        engine.run_pending().await;
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert!(engine.get_history("db.pw", None).is_empty());
        assert!(engine.inner.active.lock().is_empty());
    }

    #[tokio::test]
    async fn test_backoff_blocks_scheduler_tick() {
        let engine = engine();
        engine.schedule(env_config("db.pw")).unwrap();
        {
            let mut schedules = engine.inner.schedules.write();
            let schedule = schedules.get_mut("db.pw").unwrap();
            schedule.next_rotation = Utc::now() - ChronoDuration::seconds(1);
            schedule.backoff_until = Some(Utc::now() + ChronoDuration::seconds(60));
        }

        engine.run_pending().await;
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert!(engine.get_history("db.pw", None).is_empty());
    }

    #[tokio::test]
    async fn test_disabled_config_skipped_by_scheduler() {
        let engine = engine();
        engine.schedule(env_config("db.pw").disabled()).unwrap();
        {
            let mut schedules = engine.inner.schedules.write();
            schedules.get_mut("db.pw").unwrap().next_rotation =
                Utc::now() - ChronoDuration::seconds(1);
        }

        engine.run_pending().await;
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert!(engine.get_history("db.pw", None).is_empty());
    }

    #[tokio::test]
    async fn test_expiry_warning_sent_once_per_cycle() {
        let engine = engine();
        engine
            .schedule(env_config("db.pw").with_notify_before_days(7))
            .unwrap();
        {
            let mut schedules = engine.inner.schedules.write();
            // inside the warning window but not yet due
            schedules.get_mut("db.pw").unwrap().next_rotation =
                Utc::now() + ChronoDuration::days(2);
        }

        engine.run_pending().await;
        assert!(engine.get_schedule("db.pw").unwrap().warning_sent);

        // a second pass does not rotate or re-warn
        engine.run_pending().await;
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(engine.get_history("db.pw", None).is_empty());
    }

    #[tokio::test]
    async fn test_scheduler_dispatches_due_rotation() {
        let engine = engine();
        engine.schedule(env_config("db.pw")).unwrap();
        {
            let mut schedules = engine.inner.schedules.write();
            schedules.get_mut("db.pw").unwrap().next_rotation =
                Utc::now() - ChronoDuration::seconds(1);
        }

        engine.run_pending().await;

        let mut rotated = false;
        for _ in 0..100 {
            if engine.inner.history.len("db.pw") == 1 {
                rotated = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert!(rotated, "scheduled rotation did not run");

        let schedule = engine.get_schedule("db.pw").unwrap();
        assert!(schedule.next_rotation > Utc::now());
        assert!(schedule.last_rotation.is_some());
    }

    #[tokio::test]
    async fn test_active_set_tracks_rotation_lifetime() {
        let engine = engine();
        engine.register_health_function("slow_ok", slow_healthy_probe(200));
        engine
            .schedule(
                env_config("db.pw")
                    .with_health_check(HealthCheckConfig::function("slow_ok").with_timeout_ms(2_000)),
            )
            .unwrap();

        let task = {
            let engine = engine.clone();
            tokio::spawn(async move { engine.rotate_now("db.pw", None).await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(engine.inner.active.lock().contains("db.pw"));

        let result = task.await.unwrap().unwrap();
        assert!(result.success);
        assert!(engine.inner.active.lock().is_empty());
    }

    #[tokio::test]
    async fn test_rotation_rejected_during_shutdown() {
        let engine = engine();
        engine.schedule(env_config("db.pw")).unwrap();
        engine.shutdown().await;

        assert!(matches!(
            engine.rotate_now("db.pw", None).await,
            Err(RotationError::ShuttingDown)
        ));
    }

    #[tokio::test]
    async fn test_shutdown_emits_event_and_is_idempotent() {
        let engine = engine();
        engine.start();
        let mut events = engine.subscribe();

        engine.shutdown().await;
        engine.shutdown().await;

        let mut saw_shutdown = false;
        while let Ok(event) = events.try_recv() {
            if matches!(event, EngineEvent::Shutdown) {
                saw_shutdown = true;
            }
        }
        assert!(saw_shutdown);
    }

    #[tokio::test]
    async fn test_get_current_value_after_rotation() {
        let engine = engine();
        let config = env_config("db.pw");
        let path = config.path.clone();
        engine.schedule(config).unwrap();

        let result = engine.rotate_now("db.pw", Some("bootstrap")).await.unwrap();
        assert!(result.success);

        let current = engine.get_current_value("db.pw").await.unwrap();
        assert_eq!(current.version, 1);
        assert_eq!(current.value, std::env::var(&path).unwrap());
        std::env::remove_var(&path);
    }

    #[tokio::test]
    async fn test_health_check_requires_configuration() {
        let engine = engine();
        engine.schedule(env_config("db.pw")).unwrap();

        assert!(matches!(
            engine.health_check("db.pw").await,
            Err(RotationError::NotConfigured(_))
        ));
        assert!(matches!(
            engine.health_check("ghost").await,
            Err(RotationError::NotConfigured(_))
        ));
    }

    #[tokio::test]
    async fn test_custom_generator_is_used() {
        let engine = engine();
        engine.register_generator("fixed", || "generated-by-name".to_string());
        let config = env_config("api.key").with_custom_generator("fixed");
        let path = config.path.clone();
        engine.schedule(config).unwrap();

        engine.rotate_now("api.key", None).await.unwrap();
        assert_eq!(std::env::var(&path).unwrap(), "generated-by-name");
        std::env::remove_var(&path);
    }

    #[tokio::test]
    async fn test_emergency_rotation_records_type() {
        let engine = engine();
        let config = env_config("db.pw");
        let path = config.path.clone();
        engine.schedule(config).unwrap();

        let result = engine
            .rotate_emergency("db.pw", "suspected leak")
            .await
            .unwrap();
        assert!(result.success);

        let history = engine.get_history("db.pw", None);
        assert_eq!(history[0].event_type, RotationType::Emergency);
        assert_eq!(history[0].metadata.get("reason").unwrap(), "suspected leak");
        std::env::remove_var(&path);
    }

    #[test]
    fn test_backoff_schedule() {
        assert_eq!(backoff_delay_secs(1), 60);
        assert_eq!(backoff_delay_secs(2), 120);
        assert_eq!(backoff_delay_secs(3), 240);
        assert_eq!(backoff_delay_secs(6), 1_920);
        assert_eq!(backoff_delay_secs(7), 3_600);
        assert_eq!(backoff_delay_secs(40), 3_600);
    }
}
