//! Segment resolution
//!
//! Translates an authored objective (ordered template parts) into the wire
//! segments a run starts with. Everything the client can resolve locally is
//! resolved here; custom tools and prompt assembly are deferred to the
//! server. Placeholder failures are collected and reported together so the
//! author sees every problem at once, and no run is started from a partial
//! resolution.

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, warn};

use crate::segment::{AssetContent, Segment, ToolBinding};
use crate::template::{ParamMap, Placeholder, PlaceholderKind, TemplatePart};

/// Well-known tool paths. New tools are added by extending this matcher;
/// the default case always forwards as a generic custom tool.
const TOOL_PATH_ROUTING: &str = "tools/routing";
const TOOL_PATH_MEMORY: &str = "tools/memory";
const TOOL_PATH_KNOWLEDGE: &str = "tools/knowledge";

/// Loads asset content groups for `asset` placeholders.
#[async_trait]
pub trait AssetLoader: Send + Sync {
    async fn load(&self, path: &str) -> Result<Vec<AssetContent>, crate::Error>;
}

/// Capability flags derived while walking the template. OR-accumulated,
/// never reset mid-resolution.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DerivedFlags {
    /// Set when any placeholder (top-level or nested inside a parameter
    /// value) references the knowledge-base tool.
    pub needs_knowledge_base: bool,
}

/// The outcome of a successful resolution: ordered segments plus flags.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedObjective {
    pub segments: Vec<Segment>,
    pub flags: DerivedFlags,
}

/// A single placeholder that failed to resolve.
#[derive(Debug, Clone, Error, PartialEq)]
#[error("{kind:?} placeholder '{path}': {message}")]
pub struct PlaceholderError {
    pub kind: PlaceholderKind,
    pub path: String,
    pub message: String,
}

/// Aggregate of every placeholder failure in one resolution pass.
#[derive(Debug, Clone, Error, PartialEq)]
pub struct ResolutionError {
    pub errors: Vec<PlaceholderError>,
}

impl std::fmt::Display for ResolutionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} placeholder(s) failed to resolve: ", self.errors.len())?;
        for (i, err) in self.errors.iter().enumerate() {
            if i > 0 {
                write!(f, "; ")?;
            }
            write!(f, "{err}")?;
        }
        Ok(())
    }
}

/// Resolve an authored objective into ordered wire segments.
///
/// Text and placeholders appear in the output in the same relative order as
/// in the source. All placeholders are attempted even after a failure;
/// errors are aggregated into a single [`ResolutionError`].
pub async fn resolve_to_segments(
    parts: &[TemplatePart],
    params: &ParamMap,
    assets: &dyn AssetLoader,
) -> Result<ResolvedObjective, ResolutionError> {
    let mut segments = Vec::new();
    let mut errors = Vec::new();
    let mut flags = DerivedFlags::default();

    for part in parts {
        match part {
            TemplatePart::Text { text } => segments.push(Segment::text(text.clone())),
            TemplatePart::Placeholder { placeholder } => {
                resolve_placeholder(
                    placeholder,
                    params,
                    assets,
                    &mut segments,
                    &mut errors,
                    &mut flags,
                )
                .await;
            }
        }
    }

    if !errors.is_empty() {
        warn!(count = errors.len(), "segment resolution failed");
        return Err(ResolutionError { errors });
    }

    debug!(
        segments = segments.len(),
        needs_knowledge_base = flags.needs_knowledge_base,
        "resolved objective"
    );
    Ok(ResolvedObjective { segments, flags })
}

async fn resolve_placeholder(
    placeholder: &Placeholder,
    params: &ParamMap,
    assets: &dyn AssetLoader,
    segments: &mut Vec<Segment>,
    errors: &mut Vec<PlaceholderError>,
    flags: &mut DerivedFlags,
) {
    match placeholder.kind {
        PlaceholderKind::Asset => match assets.load(&placeholder.path).await {
            Ok(contents) => segments.push(Segment::Asset { assets: contents }),
            Err(e) => errors.push(PlaceholderError {
                kind: PlaceholderKind::Asset,
                path: placeholder.path.clone(),
                message: e.to_string(),
            }),
        },
        PlaceholderKind::In => {
            // A missing parameter is never a hard failure: fall back to the
            // placeholder title if one was authored, otherwise emit nothing.
            match params.get(&placeholder.path) {
                Some(value) => {
                    derive_flags(&value.parts, flags);
                    segments.push(Segment::input(placeholder.path.clone(), value.text.clone()));
                }
                None => {
                    if let Some(title) = &placeholder.title {
                        segments.push(Segment::text(title.clone()));
                    }
                }
            }
        }
        PlaceholderKind::Tool => match match_tool_path(&placeholder.path) {
            ToolResolution::Known(binding) => {
                if matches!(binding, ToolBinding::Knowledge) {
                    flags.needs_knowledge_base = true;
                }
                segments.push(Segment::tool(binding));
            }
            ToolResolution::Custom => segments.push(Segment::tool(ToolBinding::Custom {
                path: placeholder.path.clone(),
            })),
        },
    }
}

/// Walk nested parts found inside a resolved parameter value, accumulating
/// capability flags. Only flags are derived here; nested parts do not emit
/// segments of their own.
fn derive_flags(parts: &[TemplatePart], flags: &mut DerivedFlags) {
    for part in parts {
        if let TemplatePart::Placeholder { placeholder } = part {
            if placeholder.kind == PlaceholderKind::Tool
                && placeholder.path == TOOL_PATH_KNOWLEDGE
            {
                flags.needs_knowledge_base = true;
            }
        }
    }
}

enum ToolResolution {
    Known(ToolBinding),
    Custom,
}

fn match_tool_path(path: &str) -> ToolResolution {
    match path {
        TOOL_PATH_ROUTING => ToolResolution::Known(ToolBinding::Routing),
        TOOL_PATH_MEMORY => ToolResolution::Known(ToolBinding::Memory),
        TOOL_PATH_KNOWLEDGE => ToolResolution::Known(ToolBinding::Knowledge),
        _ => ToolResolution::Custom,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::ParamValue;
    use std::collections::HashMap;

    struct StaticAssets(HashMap<String, Vec<AssetContent>>);

    #[async_trait]
    impl AssetLoader for StaticAssets {
        async fn load(&self, path: &str) -> Result<Vec<AssetContent>, crate::Error> {
            self.0
                .get(path)
                .cloned()
                .ok_or_else(|| crate::Error::AssetNotFound(path.to_string()))
        }
    }

    fn no_assets() -> StaticAssets {
        StaticAssets(HashMap::new())
    }

    fn param_parts(text: &str) -> Vec<TemplatePart> {
        vec![
            TemplatePart::text("A "),
            TemplatePart::placeholder(PlaceholderKind::In, "x"),
            TemplatePart::text(" B "),
            TemplatePart::placeholder(PlaceholderKind::In, "y"),
            TemplatePart::text(text),
        ]
    }

    #[tokio::test]
    async fn test_ordering_preserved() {
        let parts = param_parts(" C");
        let mut params = ParamMap::new();
        params.insert("x".into(), ParamValue::text_only("one"));
        params.insert("y".into(), ParamValue::text_only("two"));

        let resolved = resolve_to_segments(&parts, &params, &no_assets())
            .await
            .unwrap();

        assert_eq!(
            resolved.segments,
            vec![
                Segment::text("A "),
                Segment::input("x", "one"),
                Segment::text(" B "),
                Segment::input("y", "two"),
                Segment::text(" C"),
            ]
        );
    }

    #[tokio::test]
    async fn test_missing_param_uses_fallback_title() {
        let parts = vec![TemplatePart::Placeholder {
            placeholder: Placeholder {
                kind: PlaceholderKind::In,
                path: "topic".into(),
                title: Some("the topic".into()),
            },
        }];

        let resolved = resolve_to_segments(&parts, &ParamMap::new(), &no_assets())
            .await
            .unwrap();
        assert_eq!(resolved.segments, vec![Segment::text("the topic")]);
    }

    #[tokio::test]
    async fn test_missing_param_without_title_yields_nothing() {
        let parts = vec![TemplatePart::placeholder(PlaceholderKind::In, "topic")];
        let resolved = resolve_to_segments(&parts, &ParamMap::new(), &no_assets())
            .await
            .unwrap();
        assert!(resolved.segments.is_empty());
    }

    #[tokio::test]
    async fn test_asset_errors_aggregate() {
        let parts = vec![
            TemplatePart::placeholder(PlaceholderKind::Asset, "assets/missing-1"),
            TemplatePart::text("between"),
            TemplatePart::placeholder(PlaceholderKind::Asset, "assets/missing-2"),
        ];

        let err = resolve_to_segments(&parts, &ParamMap::new(), &no_assets())
            .await
            .unwrap_err();

        assert_eq!(err.errors.len(), 2);
        let message = err.to_string();
        assert!(message.contains("assets/missing-1"));
        assert!(message.contains("assets/missing-2"));
    }

    #[tokio::test]
    async fn test_well_known_tools_and_side_flag() {
        let parts = vec![
            TemplatePart::placeholder(PlaceholderKind::Tool, "tools/routing"),
            TemplatePart::placeholder(PlaceholderKind::Tool, "tools/knowledge"),
            TemplatePart::placeholder(PlaceholderKind::Tool, "tools/custom/weather"),
        ];

        let resolved = resolve_to_segments(&parts, &ParamMap::new(), &no_assets())
            .await
            .unwrap();

        assert_eq!(
            resolved.segments,
            vec![
                Segment::tool(ToolBinding::Routing),
                Segment::tool(ToolBinding::Knowledge),
                Segment::tool(ToolBinding::Custom {
                    path: "tools/custom/weather".into()
                }),
            ]
        );
        assert!(resolved.flags.needs_knowledge_base);
    }

    #[tokio::test]
    async fn test_flag_derived_from_nested_param_parts() {
        let parts = vec![TemplatePart::placeholder(PlaceholderKind::In, "x")];
        let mut params = ParamMap::new();
        params.insert(
            "x".into(),
            ParamValue {
                text: "nested".into(),
                parts: vec![TemplatePart::placeholder(
                    PlaceholderKind::Tool,
                    "tools/knowledge",
                )],
            },
        );

        let resolved = resolve_to_segments(&parts, &params, &no_assets())
            .await
            .unwrap();
        assert!(resolved.flags.needs_knowledge_base);
        // Nested parts only derive flags, they never emit segments.
        assert_eq!(resolved.segments, vec![Segment::input("x", "nested")]);
    }

    #[tokio::test]
    async fn test_resolved_asset_becomes_content_group() {
        let mut assets = HashMap::new();
        assets.insert(
            "assets/logo".to_string(),
            vec![AssetContent::from_bytes("image/png", b"png-bytes")],
        );
        let parts = vec![TemplatePart::placeholder(PlaceholderKind::Asset, "assets/logo")];

        let resolved = resolve_to_segments(&parts, &ParamMap::new(), &StaticAssets(assets))
            .await
            .unwrap();
        match &resolved.segments[0] {
            Segment::Asset { assets } => assert_eq!(assets[0].mime_type, "image/png"),
            other => panic!("expected asset segment, got {other:?}"),
        }
    }
}
