//! Rotation counters

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

/// Process-lifetime rotation counters.
#[derive(Debug, Default)]
pub struct RotationMetrics {
    total_rotations: AtomicU64,
    failed_rotations: AtomicU64,
    last_rotation_duration_ms: AtomicU64,
    last_rotation: Mutex<Option<DateTime<Utc>>>,
}

impl RotationMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_success(&self, duration_ms: u64) {
        self.total_rotations.fetch_add(1, Ordering::Relaxed);
        self.last_rotation_duration_ms
            .store(duration_ms, Ordering::Relaxed);
        *self.last_rotation.lock() = Some(Utc::now());
    }

    pub fn record_failure(&self, duration_ms: u64) {
        self.total_rotations.fetch_add(1, Ordering::Relaxed);
        self.failed_rotations.fetch_add(1, Ordering::Relaxed);
        self.last_rotation_duration_ms
            .store(duration_ms, Ordering::Relaxed);
        *self.last_rotation.lock() = Some(Utc::now());
    }

    pub fn total_rotations(&self) -> u64 {
        self.total_rotations.load(Ordering::Relaxed)
    }

    pub fn failed_rotations(&self) -> u64 {
        self.failed_rotations.load(Ordering::Relaxed)
    }

    pub fn last_rotation_duration_ms(&self) -> u64 {
        self.last_rotation_duration_ms.load(Ordering::Relaxed)
    }

    pub fn last_rotation(&self) -> Option<DateTime<Utc>> {
        *self.last_rotation.lock()
    }
}
