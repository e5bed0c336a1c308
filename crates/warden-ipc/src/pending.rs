use parking_lot::Mutex;
use std::collections::HashMap;
use tokio::sync::oneshot;
use uuid::Uuid;

use warden_core::{ActionResponse, Result, WardenError};

/// The pending-request registry: id → completion handle.
///
/// Every insert has exactly one removal, and both go through
/// [`PendingTable::settle`], which removes the entry *before*
/// completing it. A late response and an expiring timer can both
/// call `settle`; only the first wins, the second is a no-op.
#[derive(Default)]
pub struct PendingTable {
    inner: Mutex<HashMap<Uuid, oneshot::Sender<Result<ActionResponse>>>>,
}

impl PendingTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a pending request and hand back the completion side.
    pub fn register(&self, id: Uuid) -> oneshot::Receiver<Result<ActionResponse>> {
        let (tx, rx) = oneshot::channel();
        self.inner.lock().insert(id, tx);
        rx
    }

    /// Remove-then-complete. Returns false when the id was already
    /// settled (or never registered) — the caller drops the outcome
    /// silently in that case.
    pub fn settle(&self, id: Uuid, outcome: Result<ActionResponse>) -> bool {
        let Some(tx) = self.inner.lock().remove(&id) else {
            return false;
        };
        // The receiver may be gone (caller dropped); that is still a
        // settlement.
        let _ = tx.send(outcome);
        true
    }

    /// Reject every pending request, e.g. on connection loss. The
    /// error is built per entry since errors are not clonable.
    pub fn reject_all(&self, make_error: impl Fn() -> WardenError) {
        let drained: Vec<_> = {
            let mut inner = self.inner.lock();
            inner.drain().collect()
        };
        for (_, tx) in drained {
            let _ = tx.send(Err(make_error()));
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }
}
