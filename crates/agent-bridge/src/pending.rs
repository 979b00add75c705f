//! Pending suspend requests
//!
//! One entry per outstanding suspend-class event, keyed by request id.
//! Every entry resolves exactly once: the first resolution wins, later
//! attempts (duplicate frames, local/remote races) are logged no-ops.
//! Aborting a run drains every entry with a cancellation outcome so no
//! request is left dangling.

use std::collections::HashMap;
use std::sync::Mutex;

use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::event::SuspendOutcome;

#[derive(Debug, Default)]
pub(crate) struct PendingRequests {
    slots: Mutex<HashMap<String, oneshot::Sender<SuspendOutcome>>>,
}

impl PendingRequests {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new pending request. Request ids are unique within a run;
    /// a colliding registration replaces the stale slot, whose waiter then
    /// observes a closed channel.
    pub fn register(&self, request_id: &str) -> oneshot::Receiver<SuspendOutcome> {
        let (tx, rx) = oneshot::channel();
        let mut slots = self.slots.lock().expect("pending lock poisoned");
        if slots.insert(request_id.to_string(), tx).is_some() {
            warn!(request_id, "replaced pending request with duplicate id");
        }
        rx
    }

    /// Resolve a pending request. Unknown or already-resolved ids are
    /// discarded, not an error.
    pub fn resolve(&self, request_id: &str, outcome: SuspendOutcome) -> bool {
        let slot = {
            let mut slots = self.slots.lock().expect("pending lock poisoned");
            slots.remove(request_id)
        };
        match slot {
            Some(tx) => {
                // A dropped receiver just means the dispatcher went away.
                let _ = tx.send(outcome);
                true
            }
            None => {
                debug!(request_id, "response for unknown or settled request discarded");
                false
            }
        }
    }

    /// Remove a registration that never got a handler attached.
    pub fn discard(&self, request_id: &str) {
        let mut slots = self.slots.lock().expect("pending lock poisoned");
        slots.remove(request_id);
    }

    /// Resolve every outstanding request with the same outcome. Used by
    /// `abort()` (cancellation) and transport teardown (failure).
    pub fn drain(&self, outcome: SuspendOutcome) -> usize {
        let drained: Vec<_> = {
            let mut slots = self.slots.lock().expect("pending lock poisoned");
            slots.drain().collect()
        };
        let count = drained.len();
        for (request_id, tx) in drained {
            debug!(request_id, "draining pending request");
            let _ = tx.send(outcome.clone());
        }
        count
    }

    pub fn len(&self) -> usize {
        self.slots.lock().expect("pending lock poisoned").len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::SuspendResponse;

    #[tokio::test]
    async fn test_resolve_exactly_once() {
        let pending = PendingRequests::new();
        let rx = pending.register("r1");

        assert!(pending.resolve(
            "r1",
            SuspendOutcome::Response(SuspendResponse::Input { input: "a".into() })
        ));
        // Duplicate frame: discarded, no effect.
        assert!(!pending.resolve(
            "r1",
            SuspendOutcome::Response(SuspendResponse::Input { input: "b".into() })
        ));

        match rx.await.unwrap() {
            SuspendOutcome::Response(SuspendResponse::Input { input }) => assert_eq!(input, "a"),
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_unknown_id_discarded() {
        let pending = PendingRequests::new();
        assert!(!pending.resolve("nope", SuspendOutcome::Cancelled));
    }

    #[tokio::test]
    async fn test_drain_cancels_all() {
        let pending = PendingRequests::new();
        let rx1 = pending.register("r1");
        let rx2 = pending.register("r2");
        let rx3 = pending.register("r3");

        assert_eq!(pending.drain(SuspendOutcome::Cancelled), 3);
        assert_eq!(pending.len(), 0);

        for rx in [rx1, rx2, rx3] {
            assert_eq!(rx.await.unwrap(), SuspendOutcome::Cancelled);
        }
    }
}
