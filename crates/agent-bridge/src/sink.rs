//! Event sink and dispatch
//!
//! Decouples event producers from consumers for one run. Informational and
//! terminal events fan out to passive observers in registration order;
//! suspend-class events route to at most one handler per event kind and
//! stay outstanding until the matching response settles through the pending
//! table. The sink and its pending table are owned by exactly one run.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;

use futures::future::BoxFuture;
use tracing::{debug, warn};

use crate::error::SinkError;
use crate::event::{AgentEvent, EventCategory, EventKind, SuspendOutcome, SuspendResponse};
use crate::pending::PendingRequests;

/// Handler for one suspend-class event kind. The returned future settles
/// with the response (possibly only after indefinite human input).
pub type SuspendHandler =
    Box<dyn Fn(AgentEvent) -> BoxFuture<'static, anyhow::Result<SuspendResponse>> + Send + Sync>;

type Observer = Box<dyn Fn(&AgentEvent) -> anyhow::Result<()> + Send + Sync>;

pub struct EventSink {
    observers: RwLock<Vec<Observer>>,
    handlers: RwLock<HashMap<EventKind, SuspendHandler>>,
    pending: PendingRequests,
    /// First `complete`/`error` wins; duplicates are dropped.
    settled: AtomicBool,
    /// Set by `finish` (or teardown). Informational events stop afterwards;
    /// one settling terminal event is still accepted if none arrived yet.
    closed: AtomicBool,
}

impl EventSink {
    pub fn new() -> Self {
        Self {
            observers: RwLock::new(Vec::new()),
            handlers: RwLock::new(HashMap::new()),
            pending: PendingRequests::new(),
            settled: AtomicBool::new(false),
            closed: AtomicBool::new(false),
        }
    }

    /// Register a passive observer. Observers run in registration order; a
    /// faulting observer is logged and skipped, never fatal to dispatch.
    pub fn observe(&self, observer: impl Fn(&AgentEvent) -> anyhow::Result<()> + Send + Sync + 'static) {
        self.observers
            .write()
            .expect("observer lock poisoned")
            .push(Box::new(observer));
    }

    /// Register the handler for one suspend-class event kind. The last
    /// registration wins; production code registers each kind at most once
    /// per run.
    pub fn on(&self, kind: EventKind, handler: SuspendHandler) {
        debug_assert_eq!(kind.category(), EventCategory::Suspend);
        if self
            .handlers
            .write()
            .expect("handler lock poisoned")
            .insert(kind, handler)
            .is_some()
        {
            debug!(?kind, "suspend handler replaced");
        }
    }

    /// Register a synchronously-resolving suspend handler.
    pub fn on_sync(
        &self,
        kind: EventKind,
        handler: impl Fn(AgentEvent) -> anyhow::Result<SuspendResponse> + Send + Sync + 'static,
    ) {
        self.on(
            kind,
            Box::new(move |event| Box::pin(futures::future::ready(handler(event)))),
        );
    }

    /// Dispatch one event.
    ///
    /// Informational and terminal events return `Ok(None)` once observers
    /// have run. Suspend-class events return `Ok(Some(outcome))` when their
    /// pending request settles, or fail fast with
    /// [`SinkError::NoSinkAvailable`] when no handler is registered.
    pub async fn dispatch(&self, event: AgentEvent) -> Result<Option<SuspendOutcome>, SinkError> {
        match event.category() {
            EventCategory::Informational | EventCategory::Terminal => {
                self.emit_now(&event);
                Ok(None)
            }
            EventCategory::Suspend => {
                if self.is_closed() {
                    return Err(SinkError::Closed);
                }
                self.dispatch_suspend(event).await.map(Some)
            }
        }
    }

    /// Synchronously dispatch an informational or terminal event. Suspend
    /// events must go through [`Self::dispatch`].
    pub fn emit_now(&self, event: &AgentEvent) {
        match event.category() {
            EventCategory::Informational => {
                if self.is_closed() {
                    debug!(kind = ?event.kind(), "event dropped after teardown");
                    return;
                }
                self.notify(event);
            }
            EventCategory::Terminal => self.dispatch_terminal(event),
            EventCategory::Suspend => {
                debug_assert!(false, "suspend events require dispatch()");
                warn!(kind = ?event.kind(), "suspend event passed to emit_now; dropped");
            }
        }
    }

    fn dispatch_terminal(&self, event: &AgentEvent) {
        match event.kind() {
            EventKind::Finish => {
                if self.closed.swap(true, Ordering::SeqCst) {
                    debug!("duplicate finish dropped");
                    return;
                }
                self.notify(event);
            }
            _ => {
                // Accepted even after `finish` closed the sink, so a stream
                // that ended with `finish` alone still settles exactly once.
                if self.settled.swap(true, Ordering::SeqCst) {
                    debug!(kind = ?event.kind(), "duplicate terminal event dropped");
                    return;
                }
                self.notify(event);
            }
        }
    }

    async fn dispatch_suspend(&self, event: AgentEvent) -> Result<SuspendOutcome, SinkError> {
        let kind = event.kind();
        let request_id = event
            .request_id()
            .ok_or(SinkError::MissingRequestId { kind })?
            .to_string();

        let mut rx = self.pending.register(&request_id);

        let handler_fut = {
            let handlers = self.handlers.read().expect("handler lock poisoned");
            match handlers.get(&kind) {
                Some(handler) => handler(event.clone()),
                None => {
                    drop(handlers);
                    self.pending.discard(&request_id);
                    return Err(SinkError::NoSinkAvailable { kind });
                }
            }
        };

        // The pending slot may settle before the handler does (abort, or a
        // racing remote response); in that case the handler result is moot.
        tokio::select! {
            outcome = &mut rx => {
                return outcome.map_err(|_| SinkError::Closed);
            }
            result = handler_fut => {
                match result {
                    Ok(response) => {
                        self.resolve(&request_id, SuspendOutcome::Response(response));
                    }
                    Err(e) => {
                        warn!(request_id, error = %e, "suspend handler faulted");
                        self.resolve(&request_id, SuspendOutcome::Failed(e.to_string()));
                    }
                }
            }
        }

        rx.await.map_err(|_| SinkError::Closed)
    }

    /// Resolve one pending suspend request. At most one resolution takes
    /// effect per request id; later attempts are discarded.
    pub fn resolve(&self, request_id: &str, outcome: SuspendOutcome) -> bool {
        self.pending.resolve(request_id, outcome)
    }

    /// Resolve every outstanding request with the cancellation outcome.
    pub fn drain_cancelled(&self) -> usize {
        self.pending.drain(SuspendOutcome::Cancelled)
    }

    /// Resolve every outstanding request with a failure outcome (broken
    /// transport teardown).
    pub fn drain_failed(&self, message: &str) -> usize {
        self.pending.drain(SuspendOutcome::Failed(message.to_string()))
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Whether a settling terminal event (`complete`/`error`) was observed.
    pub fn is_settled(&self) -> bool {
        self.settled.load(Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn notify(&self, event: &AgentEvent) {
        let observers = self.observers.read().expect("observer lock poisoned");
        for observer in observers.iter() {
            if let Err(e) = observer(event) {
                warn!(kind = ?event.kind(), error = %e, "observer faulted");
            }
        }
    }
}

impl Default for EventSink {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EventSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventSink")
            .field("pending", &self.pending_len())
            .field("settled", &self.is_settled())
            .field("closed", &self.is_closed())
            .finish()
    }
}
