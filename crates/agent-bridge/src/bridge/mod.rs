//! Event bridges
//!
//! A bridge adapts an event producer (an in-process agent loop or the
//! remote streaming backend) into one uniform seam the run orchestrator
//! consumes. Everything above the bridge is transport-agnostic; only the
//! bridge implementation knows whether events arrive by function call or by
//! SSE frame.

mod local;
mod remote;
mod sse;

pub use local::{AgentContext, LocalAgentFn, LocalBridge};
pub use remote::{CredentialFetcher, RemoteBridge, RemoteConfig};
pub use sse::SseDecoder;

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::BridgeError;
use crate::protocol::StartBody;
use crate::sink::EventSink;

/// The uniform event-source seam. `run` drives one execution to its
/// terminal event, dispatching everything it produces into the sink.
#[async_trait]
pub trait EventBridge: Send + Sync {
    async fn run(&self, start: StartBody, sink: Arc<EventSink>) -> Result<(), BridgeError>;
}
