use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::{AutonomyTier, Domain};

/// Events the mediation layer publishes for interested subscribers
/// (cross-process sync, UI refresh, daemon status).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Event {
    /// A domain's autonomy tier changed. Published synchronously
    /// after the new tier is persisted.
    TierChanged {
        domain: Domain,
        tier: AutonomyTier,
    },
    /// A new escalation prompt was created.
    EscalationCreated {
        prompt_id: Uuid,
        domain: Domain,
    },
    /// An escalation prompt was accepted or dismissed.
    EscalationResolved {
        prompt_id: Uuid,
        accepted: bool,
    },
}

/// A broadcast-based event bus for tier-change and escalation
/// notifications. Publishing with no subscribers is a no-op.
#[derive(Clone)]
pub struct EventBus {
    sender: Arc<broadcast::Sender<Event>>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender: Arc::new(sender),
        }
    }

    pub fn publish(&self, event: Event) {
        // Ignore send errors (no subscribers).
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
