//! Cooperative scheduler loop
//!
//! A single periodic ticker scans every schedule and dispatches due
//! rotations without awaiting them. Overrunning ticks are dropped, not
//! queued; the active-rotation set is the sole concurrency throttle.

use crate::engine::EngineInner;
use crate::model::{RotationSchedule, RotationType};
use crate::notify::NotificationKind;
use chrono::{Duration as ChronoDuration, Utc};
use serde_json::json;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

pub(crate) fn spawn(inner: &Arc<EngineInner>) -> JoinHandle<()> {
    let weak = Arc::downgrade(inner);
    let interval = inner.check_interval;
    let mut shutdown_rx = inner.shutdown_rx();

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // the first interval tick completes immediately; skip it
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = shutdown_rx.changed() => break,
            }
            let Some(inner) = weak.upgrade() else { break };
            if inner.is_shutting_down() {
                break;
            }
            run_tick(&inner).await;
        }
        debug!("scheduler loop stopped");
    })
}

/// One scheduler pass over every schedule.
pub(crate) async fn run_tick(inner: &Arc<EngineInner>) {
    if inner.is_shutting_down() {
        return;
    }
    let now = Utc::now();
    let schedules: Vec<RotationSchedule> = inner.schedules.read().values().cloned().collect();

    for schedule in schedules {
        let id = schedule.secret_id.clone();
        let Some(config) = inner.configs.read().get(&id).cloned() else {
            continue;
        };
        if schedule.paused || !config.enabled {
            continue;
        }
        if schedule.in_backoff(now) {
            continue;
        }

        if schedule.is_due(now) {
            let (active_count, already_active) = {
                let active = inner.active.lock();
                (active.len(), active.contains(&id))
            };
            if already_active {
                continue;
            }
            if active_count >= inner.max_concurrent {
                debug!(secret_id = %id, "concurrency ceiling reached; deferring rotation");
                continue;
            }

            // fire-and-monitor: completion updates the schedule
            let task_inner = Arc::clone(inner);
            tokio::spawn(async move {
                match task_inner
                    .execute_rotation(&id, RotationType::Scheduled, "scheduler", None)
                    .await
                {
                    Ok(result) if !result.success => {
                        debug!(secret_id = %result.secret_id, "scheduled rotation failed; backoff applied");
                    }
                    Ok(_) => {}
                    Err(e) => warn!(secret_id = %id, error = %e, "scheduled rotation not admitted"),
                }
            });
        } else if config.notify_before_days > 0 && !schedule.warning_sent {
            let warning_time =
                schedule.next_rotation - ChronoDuration::days(i64::from(config.notify_before_days));
            if warning_time <= now {
                {
                    let mut schedules = inner.schedules.write();
                    if let Some(s) = schedules.get_mut(&id) {
                        s.warning_sent = true;
                    }
                }
                inner.notifier.dispatch(
                    NotificationKind::ExpiryWarning,
                    json!({
                        "secretId": id,
                        "nextRotation": schedule.next_rotation,
                        "daysRemaining": (schedule.next_rotation - now).num_days(),
                    }),
                );
                debug!(secret_id = %id, "expiry warning sent");
            }
        }
    }
}
