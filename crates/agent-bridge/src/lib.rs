//! Agent Bridge - event protocol and suspend/resume runtime for agent runs
//!
//! One run of the agent loop (in-process or on the remote backend) emits a
//! sequence of typed events. Most are fire-and-forget; suspend-class events
//! block their logical step until a registered handler resolves a response,
//! potentially across the network. This crate owns that contract: the event
//! model, the per-run sink with its pending-request table, the local and
//! remote bridges, and the run orchestrator.

mod error;
mod event;
mod pending;
mod protocol;
mod runner;
mod sink;
mod surface;

pub mod bridge;

pub use error::{BridgeError, SinkError};
pub use event::{AgentEvent, EventCategory, EventKind, SuspendOutcome, SuspendResponse};
pub use protocol::{ResumeBody, RunKind, StartBody};
pub use runner::{Orchestrator, RunHandle, RunStatus, StartRequest};
pub use sink::{EventSink, SuspendHandler};
pub use surface::{forward_output, OutputRecord, OutputStore, SurfaceClient, SurfaceFactory};
