//! Feature flags
//!
//! Two layers: process-level flags read from the environment (used only to
//! pick the transport at startup), and an explicit override-over-defaults
//! map merged on read for flags forwarded with a run.

use serde::Serialize;
use std::collections::HashMap;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureFlagsSnapshot {
    pub remote_runs: bool,
    pub knowledge_base: bool,
}

fn env_flag(name: &str, default: bool) -> bool {
    match std::env::var(name) {
        Ok(raw) => match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => true,
            "0" | "false" | "no" | "off" => false,
            _ => default,
        },
        Err(_) => default,
    }
}

/// Whether agent runs execute on the remote backend instead of in-process.
pub fn feature_remote_runs() -> bool {
    env_flag("FEATURE_REMOTE_RUNS", false)
}

/// Whether the knowledge-base integration is available to runs.
pub fn feature_knowledge_base() -> bool {
    env_flag("FEATURE_KNOWLEDGE_BASE", true)
}

pub fn snapshot() -> FeatureFlagsSnapshot {
    FeatureFlagsSnapshot {
        remote_runs: feature_remote_runs(),
        knowledge_base: feature_knowledge_base(),
    }
}

/// A flag map with an override layer on top of defaults. The merge is
/// computed on read; neither layer is mutated by lookups.
#[derive(Debug, Clone, Default)]
pub struct FlagSet {
    defaults: HashMap<String, bool>,
    overrides: HashMap<String, bool>,
}

impl FlagSet {
    pub fn new(defaults: HashMap<String, bool>) -> Self {
        Self {
            defaults,
            overrides: HashMap::new(),
        }
    }

    pub fn set_override(&mut self, name: impl Into<String>, value: bool) {
        self.overrides.insert(name.into(), value);
    }

    pub fn clear_override(&mut self, name: &str) {
        self.overrides.remove(name);
    }

    /// Override wins over default; unknown flags read as false.
    pub fn get(&self, name: &str) -> bool {
        self.overrides
            .get(name)
            .or_else(|| self.defaults.get(name))
            .copied()
            .unwrap_or(false)
    }

    /// The effective view: defaults with overrides applied.
    pub fn merged(&self) -> HashMap<String, bool> {
        let mut out = self.defaults.clone();
        for (k, v) in &self.overrides {
            out.insert(k.clone(), *v);
        }
        out
    }
}
