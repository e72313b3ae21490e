//! Append-only per-secret rotation history with bounded retention

use crate::model::RotationEvent;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};

/// Retention cap per secret; older entries are evicted from the front.
pub const MAX_EVENTS_PER_SECRET: usize = 1_000;

/// Default number of entries returned by `recent`.
pub const DEFAULT_HISTORY_LIMIT: usize = 50;

pub struct HistoryStore {
    events: Mutex<HashMap<String, VecDeque<RotationEvent>>>,
}

impl HistoryStore {
    pub fn new() -> Self {
        Self {
            events: Mutex::new(HashMap::new()),
        }
    }

    pub fn append(&self, event: RotationEvent) {
        let mut events = self.events.lock();
        let deque = events.entry(event.secret_id.clone()).or_default();
        deque.push_back(event);
        while deque.len() > MAX_EVENTS_PER_SECRET {
            deque.pop_front();
        }
    }

    /// Most recent `limit` entries, newest first.
    pub fn recent(&self, secret_id: &str, limit: usize) -> Vec<RotationEvent> {
        self.events
            .lock()
            .get(secret_id)
            .map(|deque| deque.iter().rev().take(limit).cloned().collect())
            .unwrap_or_default()
    }

    pub fn len(&self, secret_id: &str) -> usize {
        self.events
            .lock()
            .get(secret_id)
            .map(VecDeque::len)
            .unwrap_or(0)
    }

    pub fn is_empty(&self, secret_id: &str) -> bool {
        self.len(secret_id) == 0
    }
}

impl Default for HistoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{RotationStatus, RotationType};
    use chrono::Utc;
    use std::collections::HashMap;
    use uuid::Uuid;

    fn event(secret_id: &str, from_version: u64) -> RotationEvent {
        RotationEvent {
            id: Uuid::new_v4(),
            secret_id: secret_id.to_string(),
            event_type: RotationType::Scheduled,
            status: RotationStatus::Completed,
            from_version,
            to_version: Some(from_version + 1),
            initiator: "scheduler".to_string(),
            timestamp: Utc::now(),
            duration_ms: 1,
            health_check: None,
            error: None,
            metadata: HashMap::new(),
        }
    }

    #[test]
    fn test_append_and_recent_ordering() {
        let store = HistoryStore::new();
        for v in 0..5 {
            store.append(event("db.pw", v));
        }

        let recent = store.recent("db.pw", 3);
        assert_eq!(recent.len(), 3);
        // newest first
        assert_eq!(recent[0].from_version, 4);
        assert_eq!(recent[2].from_version, 2);
    }

    #[test]
    fn test_retention_cap_evicts_oldest() {
        let store = HistoryStore::new();
        for v in 0..(MAX_EVENTS_PER_SECRET as u64 + 25) {
            store.append(event("db.pw", v));
        }

        assert_eq!(store.len("db.pw"), MAX_EVENTS_PER_SECRET);
        let recent = store.recent("db.pw", MAX_EVENTS_PER_SECRET);
        // the oldest 25 were evicted from the front
        assert_eq!(recent.last().unwrap().from_version, 25);
        assert_eq!(recent.first().unwrap().from_version, MAX_EVENTS_PER_SECRET as u64 + 24);
    }

    #[test]
    fn test_unknown_secret_is_empty() {
        let store = HistoryStore::new();
        assert!(store.recent("missing", 10).is_empty());
        assert!(store.is_empty("missing"));
    }

    #[test]
    fn test_secrets_are_isolated() {
        let store = HistoryStore::new();
        store.append(event("a", 0));
        store.append(event("b", 0));
        store.append(event("b", 1));

        assert_eq!(store.len("a"), 1);
        assert_eq!(store.len("b"), 2);
    }
}
