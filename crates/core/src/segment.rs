//! Wire segments sent from the client to the agent backend
//!
//! A segment is one typed unit of resolved prompt content. The client
//! resolves everything it can locally (assets, parameter values, well-known
//! tools) and forwards the rest for the server to assemble. Segments are
//! immutable once constructed.

use base64::Engine;
use serde::{Deserialize, Serialize};

/// One resolved prompt fragment, in authored order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Segment {
    /// Literal text from the authored objective.
    Text { text: String },

    /// A resolved asset content group.
    Asset { assets: Vec<AssetContent> },

    /// A resolved input parameter value.
    Input { name: String, value: String },

    /// A tool binding for the server to wire into the agent loop.
    Tool {
        #[serde(flatten)]
        binding: ToolBinding,
    },
}

impl Segment {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    pub fn input(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Input {
            name: name.into(),
            value: value.into(),
        }
    }

    pub fn tool(binding: ToolBinding) -> Self {
        Self::Tool { binding }
    }
}

/// Inline asset content: mime type plus base64 payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetContent {
    pub mime_type: String,
    pub data: String,
}

impl AssetContent {
    /// Build an asset part from raw bytes, base64-encoding the payload.
    pub fn from_bytes(mime_type: impl Into<String>, bytes: &[u8]) -> Self {
        Self {
            mime_type: mime_type.into(),
            data: base64::engine::general_purpose::STANDARD.encode(bytes),
        }
    }
}

/// Tool bindings the client can name without knowing the server's prompt
/// template language. Well-known tools get dedicated variants; everything
/// else is forwarded verbatim for the server to resolve.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "tool", rename_all = "camelCase")]
pub enum ToolBinding {
    /// Route sub-requests between agent steps.
    Routing,
    /// Persistent memory for the run.
    Memory,
    /// The knowledge-base integration.
    Knowledge,
    /// An arbitrary custom tool the server resolves.
    Custom { path: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_segment_wire_tags() {
        let json = serde_json::to_value(Segment::text("hello")).unwrap();
        assert_eq!(json["kind"], "text");
        assert_eq!(json["text"], "hello");

        let json = serde_json::to_value(Segment::tool(ToolBinding::Custom {
            path: "tools/custom/foo".into(),
        }))
        .unwrap();
        assert_eq!(json["kind"], "tool");
        assert_eq!(json["tool"], "custom");
        assert_eq!(json["path"], "tools/custom/foo");
    }

    #[test]
    fn test_asset_content_from_bytes() {
        let asset = AssetContent::from_bytes("image/png", b"abc");
        assert_eq!(asset.mime_type, "image/png");
        assert_eq!(asset.data, "YWJj");
    }
}
