//! Local (in-process) bridge
//!
//! Runs the agent loop inside the same process. The loop receives an
//! [`AgentContext`] and talks to the sink directly: `emit` for
//! fire-and-forget events, `suspend` for events that await a handler's
//! response. Used for local development; production selects the remote
//! bridge via a feature flag.

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::BridgeError;
use crate::event::{AgentEvent, SuspendOutcome};
use crate::protocol::StartBody;
use crate::sink::EventSink;

/// A one-shot agent loop body.
pub type LocalAgentFn =
    Box<dyn FnOnce(AgentContext) -> BoxFuture<'static, Result<(), BridgeError>> + Send>;

/// The producer-facing face of a run's sink, handed to a local agent loop.
#[derive(Clone)]
pub struct AgentContext {
    start: Arc<StartBody>,
    sink: Arc<EventSink>,
}

impl AgentContext {
    /// The start request this run was launched with.
    pub fn start(&self) -> &StartBody {
        &self.start
    }

    /// Emit a fire-and-forget or terminal event.
    pub async fn emit(&self, event: AgentEvent) -> Result<(), BridgeError> {
        self.sink.dispatch(event).await?;
        Ok(())
    }

    /// Emit a suspend-class event and await its response. Returns once the
    /// registered handler resolves, the run aborts, or the handler faults.
    pub async fn suspend(&self, event: AgentEvent) -> Result<SuspendOutcome, BridgeError> {
        debug!(kind = ?event.kind(), "local suspend");
        match self.sink.dispatch(event).await? {
            Some(outcome) => Ok(outcome),
            // Only suspend-class dispatches reach here; a missing outcome
            // means the caller passed a non-suspend event.
            None => Err(BridgeError::transport("suspend called with non-suspend event", false)),
        }
    }
}

/// Bridge wrapping an in-process agent loop.
pub struct LocalBridge {
    agent: Mutex<Option<LocalAgentFn>>,
}

impl LocalBridge {
    pub fn new(agent: LocalAgentFn) -> Self {
        Self {
            agent: Mutex::new(Some(agent)),
        }
    }
}

#[async_trait]
impl super::EventBridge for LocalBridge {
    async fn run(&self, start: StartBody, sink: Arc<EventSink>) -> Result<(), BridgeError> {
        let agent = self
            .agent
            .lock()
            .await
            .take()
            .ok_or_else(|| BridgeError::transport("local agent already consumed", false))?;

        let ctx = AgentContext {
            start: Arc::new(start),
            sink,
        };
        agent(ctx).await
    }
}
