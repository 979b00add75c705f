//! Error types for the agent bridge

use thiserror::Error;

use crate::event::EventKind;

/// Failures surfaced by the event sink.
#[derive(Debug, Error)]
pub enum SinkError {
    /// A suspend-class event was dispatched with no registered handler.
    #[error("no event sink registered for {kind:?}")]
    NoSinkAvailable { kind: EventKind },

    /// The sink was torn down while a dispatch was outstanding.
    #[error("event sink closed")]
    Closed,

    /// A suspend-class event arrived without a request id. This is a
    /// protocol violation on the producer side.
    #[error("suspend event {kind:?} carries no request id")]
    MissingRequestId { kind: EventKind },
}

/// Failures surfaced by a bridge/transport.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// Network or stream failure, classified retryable vs. fatal.
    #[error("transport error: {message} (retryable: {retryable})")]
    Transport { message: String, retryable: bool },

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("credential fetch failed: {0}")]
    Credential(String),

    #[error("failed to decode event frame: {0}")]
    Decode(String),

    #[error(transparent)]
    Sink(#[from] SinkError),
}

impl BridgeError {
    pub fn transport(message: impl Into<String>, retryable: bool) -> Self {
        Self::Transport {
            message: message.into(),
            retryable,
        }
    }

    /// Whether retrying the run could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport { retryable, .. } => *retryable,
            Self::Http(e) => e.is_timeout() || e.is_connect(),
            Self::Credential(_) | Self::Decode(_) | Self::Sink(_) => false,
        }
    }
}
