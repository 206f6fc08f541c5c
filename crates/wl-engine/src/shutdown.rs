//! Cooperative shutdown signalling for the scan loop.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::{info, warn};

/// One-shot shutdown flag shared between the engine handle and its scan
/// loop. Cloning shares state: any clone can trigger, every subscriber
/// observes the same trigger exactly once.
#[derive(Clone)]
pub struct ShutdownSignal {
    trigger: broadcast::Sender<()>,
    shutting_down: Arc<AtomicBool>,
}

impl ShutdownSignal {
    pub fn new() -> Self {
        let (trigger, _) = broadcast::channel(1);
        Self {
            trigger,
            shutting_down: Arc::new(AtomicBool::new(false)),
        }
    }

    /// New receiver that completes when [`trigger`](Self::trigger) fires.
    /// Subscribe before spawning the loop that waits on it, or a trigger
    /// racing the subscription can be missed.
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.trigger.subscribe()
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutting_down.load(Ordering::Relaxed)
    }

    /// Fire the signal. Idempotent; only the first call notifies.
    pub fn trigger(&self) {
        if self
            .shutting_down
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::Relaxed)
            .is_ok()
        {
            info!("shutdown triggered");
            // Fails only when no receiver is alive, which is fine.
            let _ = self.trigger.send(());
        } else {
            warn!("shutdown already triggered");
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.trigger.receiver_count()
    }
}

impl Default for ShutdownSignal {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
