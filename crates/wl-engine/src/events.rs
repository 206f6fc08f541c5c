//! Engine event fan-out.
//!
//! Every observable state change in the engine is published as an
//! [`EngineEvent`]. Subscribers get their own unbounded channel, so a slow
//! consumer never blocks the scheduler.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use wl_core::types::TaskId;

use crate::delegation::Specialization;

// ---------------------------------------------------------------------------
// Event types
// ---------------------------------------------------------------------------

/// Why a due task was pushed back instead of executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RescheduleReason {
    /// Gas price was above the task's ceiling.
    GasPrice,
    /// No pool met the task's minimum yield.
    YieldFloor,
}

impl std::fmt::Display for RescheduleReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RescheduleReason::GasPrice => "gas_price",
            RescheduleReason::YieldFloor => "yield_floor",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EngineEvent {
    EngineStarted,
    EngineStopped,
    TaskCreated {
        task_id: TaskId,
        owner_id: String,
    },
    SubAgentCreated {
        task_id: TaskId,
        parent_task_id: TaskId,
        specialization: Specialization,
    },
    TaskExecuted {
        task_id: TaskId,
        amount: Decimal,
        yield_earned: Decimal,
        gas_used: u64,
        tx_ref: String,
    },
    TaskRescheduled {
        task_id: TaskId,
        reason: RescheduleReason,
        until: DateTime<Utc>,
    },
    TaskFailed {
        task_id: TaskId,
        error: String,
    },
    TaskPaused {
        task_id: TaskId,
    },
    TaskResumed {
        task_id: TaskId,
    },
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// Broadcast bus for [`EngineEvent`]s.
///
/// Subscribers receive every event published after they subscribe.
/// Disconnected subscribers are pruned on the next publish.
#[derive(Clone)]
pub struct EventBus {
    subscribers: Arc<Mutex<Vec<flume::Sender<EngineEvent>>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            subscribers: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn subscribe(&self) -> flume::Receiver<EngineEvent> {
        let (tx, rx) = flume::unbounded();
        self.subscribers
            .lock()
            .expect("event bus lock poisoned")
            .push(tx);
        rx
    }

    pub fn publish(&self, event: EngineEvent) {
        self.subscribers
            .lock()
            .expect("event bus lock poisoned")
            .retain(|tx| tx.send(event.clone()).is_ok());
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers
            .lock()
            .expect("event bus lock poisoned")
            .len()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_event() -> EngineEvent {
        EngineEvent::TaskCreated {
            task_id: TaskId::from("task_1_abc"),
            owner_id: "user-1".to_string(),
        }
    }

    #[test]
    fn subscriber_receives_published_event() {
        let bus = EventBus::new();
        let rx = bus.subscribe();

        bus.publish(sample_event());

        assert_eq!(rx.try_recv().unwrap(), sample_event());
    }

    #[test]
    fn publish_without_subscribers_is_a_noop() {
        let bus = EventBus::new();
        bus.publish(EngineEvent::EngineStarted);
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn every_subscriber_gets_every_event() {
        let bus = EventBus::new();
        let rx1 = bus.subscribe();
        let rx2 = bus.subscribe();

        bus.publish(EngineEvent::EngineStarted);
        bus.publish(EngineEvent::EngineStopped);

        for rx in [rx1, rx2] {
            assert_eq!(rx.try_recv().unwrap(), EngineEvent::EngineStarted);
            assert_eq!(rx.try_recv().unwrap(), EngineEvent::EngineStopped);
        }
    }

    #[test]
    fn dropped_subscriber_is_pruned() {
        let bus = EventBus::new();
        let rx1 = bus.subscribe();
        let rx2 = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);

        drop(rx2);
        bus.publish(EngineEvent::EngineStarted);

        assert_eq!(bus.subscriber_count(), 1);
        assert_eq!(rx1.try_recv().unwrap(), EngineEvent::EngineStarted);
    }

    #[test]
    fn events_serialize_with_type_tag() {
        let event = EngineEvent::TaskRescheduled {
            task_id: TaskId::from("task_1_abc"),
            reason: RescheduleReason::GasPrice,
            until: Utc::now(),
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "task_rescheduled");
        assert_eq!(value["reason"], "gas_price");
        assert_eq!(value["task_id"], "task_1_abc");
    }
}
