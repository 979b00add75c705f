//! Wire bodies for the remote run endpoint
//!
//! `POST {base}/api/agent/run` accepts either a start body (kind + resolved
//! segments + flags) or a resume body (interaction id + response payload).
//! Both answer with an SSE-framed event stream.

use std::collections::HashMap;

use ab_core::segment::Segment;
use serde::{Deserialize, Serialize};

use crate::event::SuspendResponse;

/// The kind of agent run being started.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunKind {
    /// Authored-objective content run (the default).
    Content,
    /// Board-edit run.
    Edit,
    /// Planning run.
    Planner,
}

/// Body of a run-start request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartBody {
    pub kind: RunKind,
    pub segments: Vec<Segment>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub flags: HashMap<String, bool>,
}

/// Body of a resume request answering one suspend-class event.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResumeBody {
    pub interaction_id: String,
    pub response: SuspendResponse,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_resume_body_wire_shape() {
        let body = ResumeBody {
            interaction_id: "r1".into(),
            response: SuspendResponse::Input { input: "hello".into() },
        };
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            json!({"interactionId": "r1", "response": {"input": "hello"}})
        );
    }

    #[test]
    fn test_start_body_wire_shape() {
        let body = StartBody {
            kind: RunKind::Content,
            segments: vec![Segment::text("draft a title")],
            flags: HashMap::new(),
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["kind"], "content");
        assert_eq!(json["segments"][0]["kind"], "text");
        assert!(json.get("flags").is_none());
    }
}
