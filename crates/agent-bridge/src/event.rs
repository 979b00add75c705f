//! Event types for agent runs
//!
//! The closed set of events an agent loop emits, exactly as they appear on
//! the wire (camelCase `type` tags, one JSON record per SSE frame).
//! Informational events are fire-and-forget, suspend-class events carry a
//! `requestId` and block their logical step until a response resolves, and
//! terminal events end the run.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Events emitted by the agent during a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum AgentEvent {
    // --- Informational ---
    Start {},
    Thought {
        content: String,
    },
    FunctionCall {
        name: String,
        args: Value,
    },
    FunctionCallUpdate {
        name: String,
        update: Value,
    },
    FunctionResult {
        name: String,
        result: Value,
    },
    Content {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        path: Option<String>,
        content: Value,
    },
    SubagentAddJson {
        path: String,
        value: Value,
    },
    SubagentError {
        message: String,
    },
    SubagentFinish {
        path: String,
    },
    SendRequest {
        request: Value,
    },
    GraphEdit {
        edits: Value,
    },

    // --- Suspend-class (each carries a run-unique requestId) ---
    WaitForInput {
        request_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        title: Option<String>,
    },
    WaitForChoice {
        request_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        title: Option<String>,
        options: Vec<String>,
    },
    ReadGraph {
        request_id: String,
    },
    InspectNode {
        request_id: String,
        node_id: String,
    },
    ApplyEdits {
        request_id: String,
        edits: Value,
    },
    QueryConsent {
        request_id: String,
        capability: String,
    },

    // --- Terminal ---
    Complete {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        summary: Option<String>,
    },
    Error {
        message: String,
        #[serde(default)]
        retryable: bool,
    },
    Finish {},
}

/// Discriminator for the handler table and dispatch logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Start,
    Thought,
    FunctionCall,
    FunctionCallUpdate,
    FunctionResult,
    Content,
    SubagentAddJson,
    SubagentError,
    SubagentFinish,
    SendRequest,
    GraphEdit,
    WaitForInput,
    WaitForChoice,
    ReadGraph,
    InspectNode,
    ApplyEdits,
    QueryConsent,
    Complete,
    Error,
    Finish,
}

/// Dispatch category of an event kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventCategory {
    /// Fire-and-forget; delivered to observers.
    Informational,
    /// Blocks its logical step until a matching response resolves.
    Suspend,
    /// Ends the run; no further events follow on the transport.
    Terminal,
}

impl AgentEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Start {} => EventKind::Start,
            Self::Thought { .. } => EventKind::Thought,
            Self::FunctionCall { .. } => EventKind::FunctionCall,
            Self::FunctionCallUpdate { .. } => EventKind::FunctionCallUpdate,
            Self::FunctionResult { .. } => EventKind::FunctionResult,
            Self::Content { .. } => EventKind::Content,
            Self::SubagentAddJson { .. } => EventKind::SubagentAddJson,
            Self::SubagentError { .. } => EventKind::SubagentError,
            Self::SubagentFinish { .. } => EventKind::SubagentFinish,
            Self::SendRequest { .. } => EventKind::SendRequest,
            Self::GraphEdit { .. } => EventKind::GraphEdit,
            Self::WaitForInput { .. } => EventKind::WaitForInput,
            Self::WaitForChoice { .. } => EventKind::WaitForChoice,
            Self::ReadGraph { .. } => EventKind::ReadGraph,
            Self::InspectNode { .. } => EventKind::InspectNode,
            Self::ApplyEdits { .. } => EventKind::ApplyEdits,
            Self::QueryConsent { .. } => EventKind::QueryConsent,
            Self::Complete { .. } => EventKind::Complete,
            Self::Error { .. } => EventKind::Error,
            Self::Finish {} => EventKind::Finish,
        }
    }

    pub fn category(&self) -> EventCategory {
        self.kind().category()
    }

    pub fn is_suspend(&self) -> bool {
        self.category() == EventCategory::Suspend
    }

    pub fn is_terminal(&self) -> bool {
        self.category() == EventCategory::Terminal
    }

    /// The request id of a suspend-class event; `None` for other categories.
    pub fn request_id(&self) -> Option<&str> {
        match self {
            Self::WaitForInput { request_id, .. }
            | Self::WaitForChoice { request_id, .. }
            | Self::ReadGraph { request_id }
            | Self::InspectNode { request_id, .. }
            | Self::ApplyEdits { request_id, .. }
            | Self::QueryConsent { request_id, .. } => Some(request_id),
            _ => None,
        }
    }
}

impl EventKind {
    pub fn category(&self) -> EventCategory {
        match self {
            Self::Start
            | Self::Thought
            | Self::FunctionCall
            | Self::FunctionCallUpdate
            | Self::FunctionResult
            | Self::Content
            | Self::SubagentAddJson
            | Self::SubagentError
            | Self::SubagentFinish
            | Self::SendRequest
            | Self::GraphEdit => EventCategory::Informational,
            Self::WaitForInput
            | Self::WaitForChoice
            | Self::ReadGraph
            | Self::InspectNode
            | Self::ApplyEdits
            | Self::QueryConsent => EventCategory::Suspend,
            Self::Complete | Self::Error | Self::Finish => EventCategory::Terminal,
        }
    }
}

/// The response payload resolving a suspend-class event. Serialized without
/// an outer tag; the field name identifies the response kind on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SuspendResponse {
    Input { input: String },
    Choice { choice: usize },
    Graph { graph: Value },
    Node { node: Value },
    EditsApplied { applied: bool },
    Consent { granted: bool },
}

/// How one pending suspend request settled.
#[derive(Debug, Clone, PartialEq)]
pub enum SuspendOutcome {
    /// The handler (or remote peer) resolved a response.
    Response(SuspendResponse),
    /// The run was aborted while the request was outstanding. Distinct from
    /// a failure so callers can skip error surfacing for intentional
    /// cancellation.
    Cancelled,
    /// The handler faulted or the transport broke under this request.
    Failed(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_wire_tags_are_camel_case() {
        let event = AgentEvent::WaitForInput {
            request_id: "r1".into(),
            title: Some("Pick a name".into()),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "waitForInput");
        assert_eq!(json["requestId"], "r1");

        let event = AgentEvent::FunctionCall {
            name: "generate_text".into(),
            args: json!({"model": "flash"}),
        };
        assert_eq!(serde_json::to_value(&event).unwrap()["type"], "functionCall");
    }

    #[test]
    fn test_decode_wire_record() {
        let event: AgentEvent =
            serde_json::from_str(r#"{"type":"thought","content":"planning"}"#).unwrap();
        assert!(matches!(event, AgentEvent::Thought { ref content } if content == "planning"));

        let event: AgentEvent =
            serde_json::from_str(r#"{"type":"error","message":"boom"}"#).unwrap();
        match event {
            AgentEvent::Error { retryable, .. } => assert!(!retryable),
            other => panic!("expected error event, got {other:?}"),
        }
    }

    #[test]
    fn test_categories() {
        assert_eq!(
            AgentEvent::Thought { content: String::new() }.category(),
            EventCategory::Informational
        );
        assert!(AgentEvent::ReadGraph { request_id: "r".into() }.is_suspend());
        assert!(AgentEvent::Finish {}.is_terminal());
        assert_eq!(
            AgentEvent::QueryConsent {
                request_id: "r9".into(),
                capability: "knowledge".into()
            }
            .request_id(),
            Some("r9")
        );
        assert_eq!(AgentEvent::Start {}.request_id(), None);
    }

    #[test]
    fn test_suspend_response_shape() {
        let json = serde_json::to_value(SuspendResponse::Input { input: "hello".into() }).unwrap();
        assert_eq!(json, json!({"input": "hello"}));

        let json = serde_json::to_value(SuspendResponse::Consent { granted: true }).unwrap();
        assert_eq!(json, json!({"granted": true}));
    }
}
