//! Authored-objective template model
//!
//! Placeholder extraction from authored content is an external collaborator;
//! this module only models its output: an ordered list of template parts.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One ordered piece of an authored template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "part", rename_all = "camelCase")]
pub enum TemplatePart {
    Text { text: String },
    Placeholder { placeholder: Placeholder },
}

impl TemplatePart {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    pub fn placeholder(kind: PlaceholderKind, path: impl Into<String>) -> Self {
        Self::Placeholder {
            placeholder: Placeholder {
                kind,
                path: path.into(),
                title: None,
            },
        }
    }
}

/// A placeholder inside the authored template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Placeholder {
    pub kind: PlaceholderKind,
    /// Asset path, parameter name, or tool path depending on kind.
    pub path: String,
    /// Optional fallback title, used when a parameter has no value.
    pub title: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaceholderKind {
    Asset,
    In,
    Tool,
}

/// A resolved parameter value. Parameter values may themselves contain
/// template parts (e.g. a value authored on another board node), which are
/// scanned for capability derivation during resolution.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParamValue {
    pub text: String,
    #[serde(default)]
    pub parts: Vec<TemplatePart>,
}

impl ParamValue {
    pub fn text_only(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            parts: Vec::new(),
        }
    }
}

/// Parameter name → resolved value.
pub type ParamMap = HashMap<String, ParamValue>;
