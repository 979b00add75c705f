//! Per-interaction surfaces and output storage
//!
//! Suspend-class events can open interactive UI surfaces, and two surfaces
//! may be live at once within one run. Every surface gets a fresh client;
//! clients are never cached or reused keyed by run, node, or screen.
//! Rendered output lands in an [`OutputStore`] keyed by a run-local path:
//! each distinct path owns its own entry, writing the same path overwrites.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

use crate::event::AgentEvent;
use crate::sink::EventSink;

/// One rendered output entry.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputRecord {
    pub value: Value,
    pub updated_at: DateTime<Utc>,
}

impl OutputRecord {
    pub fn new(value: Value) -> Self {
        Self {
            value,
            updated_at: Utc::now(),
        }
    }
}

/// Path-keyed output storage shared with the app-screen UI.
#[derive(Debug, Default)]
pub struct OutputStore {
    entries: Mutex<HashMap<String, OutputRecord>>,
}

impl OutputStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Write the entry for a path, replacing any prior value at that path.
    pub fn put(&self, path: &str, record: OutputRecord) {
        debug!(path, "output entry written");
        self.entries
            .lock()
            .expect("output lock poisoned")
            .insert(path.to_string(), record);
    }

    pub fn get(&self, path: &str) -> Option<OutputRecord> {
        self.entries
            .lock()
            .expect("output lock poisoned")
            .get(path)
            .cloned()
    }

    pub fn remove(&self, path: &str) -> Option<OutputRecord> {
        self.entries
            .lock()
            .expect("output lock poisoned")
            .remove(path)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().expect("output lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Constructs a fresh [`SurfaceClient`] per interaction.
pub struct SurfaceFactory {
    store: Arc<OutputStore>,
    next_interaction: AtomicU64,
}

impl SurfaceFactory {
    pub fn new(store: Arc<OutputStore>) -> Self {
        Self {
            store,
            next_interaction: AtomicU64::new(0),
        }
    }

    /// Open a surface for one interaction. Always a new client instance,
    /// even for structurally identical arguments.
    pub fn open(&self, screen: &str) -> Arc<SurfaceClient> {
        let seq = self.next_interaction.fetch_add(1, Ordering::SeqCst);
        let client = Arc::new(SurfaceClient {
            id: Uuid::new_v4(),
            path: format!("{screen}#{seq}"),
            store: self.store.clone(),
        });
        debug!(id = %client.id, path = %client.path, "surface opened");
        client
    }
}

/// A rendering client bound to exactly one interaction.
#[derive(Debug)]
pub struct SurfaceClient {
    id: Uuid,
    path: String,
    store: Arc<OutputStore>,
}

impl SurfaceClient {
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// The run-local output path this surface writes to.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn render(&self, value: Value) {
        self.store.put(&self.path, OutputRecord::new(value));
    }
}

/// Forward output-bearing events into the store: `content` frames land at
/// their path (or the main screen), subagent JSON merges at the subagent's
/// path, and a subagent finish clears its working entry.
pub fn forward_output(sink: &EventSink, store: Arc<OutputStore>) {
    sink.observe(move |event| {
        match event {
            AgentEvent::Content { path, content } => {
                let path = path.as_deref().unwrap_or("main");
                store.put(path, OutputRecord::new(content.clone()));
            }
            AgentEvent::SubagentAddJson { path, value } => {
                store.put(path, OutputRecord::new(value.clone()));
            }
            AgentEvent::SubagentFinish { path } => {
                store.remove(path);
            }
            _ => {}
        }
        Ok(())
    });
}
