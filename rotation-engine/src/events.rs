//! Typed engine event stream for in-process subscribers

use serde::Serialize;
use tokio::sync::broadcast;
use tracing::debug;

const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Observable lifecycle events. Emitted after the corresponding state
/// transition, so subscribers never observe half-applied state.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum EngineEvent {
    Scheduled {
        secret_id: String,
    },
    Unscheduled {
        secret_id: String,
    },
    Paused {
        secret_id: String,
        reason: String,
    },
    Resumed {
        secret_id: String,
    },
    Rotating {
        secret_id: String,
        previous_version: u64,
    },
    Rotated {
        secret_id: String,
        new_version: u64,
    },
    RotationFailed {
        secret_id: String,
        error: String,
    },
    RolledBack {
        secret_id: String,
        from_version: u64,
        to_version: u64,
    },
    GracePeriodEnded {
        secret_id: String,
        version: u64,
    },
    Shutdown,
}

pub struct EventBus {
    sender: broadcast::Sender<EngineEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.sender.subscribe()
    }

    /// Broadcast an event. Lagging or absent subscribers never affect
    /// the caller.
    pub fn emit(&self, event: EngineEvent) {
        debug!(?event, "engine event");
        let _ = self.sender.send(event);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
