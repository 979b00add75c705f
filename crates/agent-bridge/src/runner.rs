//! Run orchestration
//!
//! The orchestrator owns one agent execution end to end: it builds the
//! start body, opens a bridge, and hands back a [`RunHandle`] carrying the
//! run's sink, a status watch, and the abort capability. Every run gets its
//! own sink and pending table; nothing is shared across runs.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, info, warn};
use uuid::Uuid;

use ab_core::resolve::{resolve_to_segments, AssetLoader, ResolutionError, ResolvedObjective};
use ab_core::template::{ParamMap, TemplatePart};

use crate::bridge::{EventBridge, LocalAgentFn, LocalBridge, RemoteBridge, RemoteConfig};
use crate::event::{AgentEvent, EventKind, SuspendResponse};
use crate::protocol::{RunKind, StartBody};
use crate::sink::{EventSink, SuspendHandler};

/// Everything needed to start one run.
#[derive(Debug, Clone)]
pub struct StartRequest {
    pub kind: RunKind,
    pub objective: ResolvedObjective,
    pub flags: HashMap<String, bool>,
}

/// Externally-visible run state. Suspension is not a run-level state: while
/// one request waits on input, other events keep flowing.
#[derive(Debug, Clone, PartialEq)]
pub enum RunStatus {
    Starting,
    Streaming,
    Completed { duration_ms: u64 },
    Failed { message: String, duration_ms: u64 },
    Cancelled { duration_ms: u64 },
}

impl RunStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Completed { .. } | Self::Failed { .. } | Self::Cancelled { .. }
        )
    }
}

/// Creates one agent execution per `start` call.
pub struct Orchestrator {
    make_bridge: Box<dyn Fn() -> Arc<dyn EventBridge> + Send + Sync>,
}

impl Orchestrator {
    pub fn new(make_bridge: impl Fn() -> Arc<dyn EventBridge> + Send + Sync + 'static) -> Self {
        Self {
            make_bridge: Box::new(make_bridge),
        }
    }

    /// Orchestrator running agents in-process. The factory produces a fresh
    /// agent loop per run.
    pub fn local(agent_factory: impl Fn() -> LocalAgentFn + Send + Sync + 'static) -> Self {
        Self::new(move || Arc::new(LocalBridge::new(agent_factory())))
    }

    /// Orchestrator running agents on the remote backend.
    pub fn remote(config: RemoteConfig) -> Self {
        Self::new(move || Arc::new(RemoteBridge::new(config.clone())))
    }

    /// Pick the transport from the process-level feature flag: remote when
    /// `FEATURE_REMOTE_RUNS` is on, otherwise the given in-process loop.
    pub fn from_flags(
        config: RemoteConfig,
        agent_factory: impl Fn() -> LocalAgentFn + Send + Sync + 'static,
    ) -> Self {
        if ab_core::flags::feature_remote_runs() {
            Self::remote(config)
        } else {
            Self::local(agent_factory)
        }
    }

    /// Start a run from an already-resolved objective.
    pub fn start(&self, request: StartRequest) -> RunHandle {
        let run_id = Uuid::new_v4();
        info!(%run_id, kind = ?request.kind, "starting run");

        let mut flags = request.flags;
        if request.objective.flags.needs_knowledge_base {
            flags.insert("knowledgeBase".to_string(), true);
        }
        let start_body = StartBody {
            kind: request.kind,
            segments: request.objective.segments,
            flags,
        };

        let sink = Arc::new(EventSink::new());
        let (status_tx, status_rx) = watch::channel(RunStatus::Starting);
        let status_tx = Arc::new(status_tx);
        let started_at = Instant::now();

        // Status tracking rides the observer path so local and remote
        // bridges drive it identically.
        {
            let status_tx = status_tx.clone();
            sink.observe(move |event| {
                match event {
                    AgentEvent::Complete { .. } => transition(
                        &status_tx,
                        RunStatus::Completed {
                            duration_ms: elapsed_ms(started_at),
                        },
                    ),
                    AgentEvent::Error { message, .. } => transition(
                        &status_tx,
                        RunStatus::Failed {
                            message: message.clone(),
                            duration_ms: elapsed_ms(started_at),
                        },
                    ),
                    _ => transition(&status_tx, RunStatus::Streaming),
                }
                Ok(())
            });
        }

        let bridge = (self.make_bridge)();
        let driver_sink = sink.clone();
        let driver = tokio::spawn(async move {
            match bridge.run(start_body, driver_sink.clone()).await {
                Ok(()) => {
                    if !driver_sink.is_settled() {
                        // A local loop that returned cleanly without its own
                        // terminal event still owes the UI one.
                        driver_sink.emit_now(&AgentEvent::Complete { summary: None });
                    }
                }
                Err(e) => {
                    let drained = driver_sink.drain_failed(&e.to_string());
                    if drained > 0 {
                        warn!(drained, "failed pending requests on transport error");
                    }
                    driver_sink.emit_now(&AgentEvent::Error {
                        message: e.to_string(),
                        retryable: e.is_retryable(),
                    });
                }
            }
            driver_sink.emit_now(&AgentEvent::Finish {});
            debug!("run driver finished");
        });

        RunHandle {
            id: run_id,
            sink,
            status_rx,
            shared: Arc::new(RunShared {
                status_tx,
                driver: Mutex::new(Some(driver)),
                aborted: AtomicBool::new(false),
                started_at,
            }),
        }
    }

    /// Resolve an authored template and start a run with it. Fails fast with
    /// the aggregated resolution error before any bridge is opened.
    pub async fn start_template(
        &self,
        kind: RunKind,
        parts: &[TemplatePart],
        params: &ParamMap,
        assets: &dyn AssetLoader,
        flags: HashMap<String, bool>,
    ) -> Result<RunHandle, ResolutionError> {
        let objective = resolve_to_segments(parts, params, assets).await?;
        Ok(self.start(StartRequest {
            kind,
            objective,
            flags,
        }))
    }
}

struct RunShared {
    status_tx: Arc<watch::Sender<RunStatus>>,
    driver: Mutex<Option<JoinHandle<()>>>,
    aborted: AtomicBool,
    started_at: Instant,
}

/// One agent execution: event registration surface, status watch, abort.
pub struct RunHandle {
    id: Uuid,
    sink: Arc<EventSink>,
    status_rx: watch::Receiver<RunStatus>,
    shared: Arc<RunShared>,
}

impl RunHandle {
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// The run's event sink, for registering observers and suspend
    /// handlers. Handlers registered after the run settled never fire.
    pub fn events(&self) -> &Arc<EventSink> {
        &self.sink
    }

    /// Register a passive observer on the run's events.
    pub fn observe(
        &self,
        observer: impl Fn(&AgentEvent) -> anyhow::Result<()> + Send + Sync + 'static,
    ) {
        self.sink.observe(observer);
    }

    /// Register the suspend handler for one event kind.
    pub fn on(&self, kind: EventKind, handler: SuspendHandler) {
        self.sink.on(kind, handler);
    }

    /// Register a synchronously-resolving suspend handler.
    pub fn on_sync(
        &self,
        kind: EventKind,
        handler: impl Fn(AgentEvent) -> anyhow::Result<SuspendResponse> + Send + Sync + 'static,
    ) {
        self.sink.on_sync(kind, handler);
    }

    /// An event tap as a stream. Events arriving while the consumer lags
    /// beyond the buffer are dropped from the tap (observers still see
    /// everything).
    pub fn subscribe(&self) -> ReceiverStream<AgentEvent> {
        let (tx, rx) = mpsc::channel(256);
        self.sink.observe(move |event| {
            let _ = tx.try_send(event.clone());
            Ok(())
        });
        ReceiverStream::new(rx)
    }

    pub fn status(&self) -> RunStatus {
        self.status_rx.borrow().clone()
    }

    /// Wait for the run to settle.
    pub async fn wait(&self) -> RunStatus {
        let mut rx = self.status_rx.clone();
        // The watch Ref borrows rx; clone out of it before rx drops.
        let status = match rx.wait_for(RunStatus::is_terminal).await {
            Ok(status) => status.clone(),
            // Sender kept alive by shared state; closure means the handle
            // itself is going away.
            Err(_) => self.status(),
        };
        status
    }

    /// Abort the run. Idempotent: the first call tears down the transport,
    /// resolves every outstanding suspend request with the cancellation
    /// outcome, and delivers one synthetic `error` + `finish` pairing.
    pub fn abort(&self) {
        if self.shared.aborted.swap(true, Ordering::SeqCst) {
            return;
        }
        if self.status().is_terminal() {
            return;
        }
        info!(run_id = %self.id, "aborting run");

        if let Some(driver) = self.shared.driver.lock().expect("driver lock poisoned").take() {
            driver.abort();
        }

        // Cancelled status lands before the synthetic error event so the
        // status observer cannot reinterpret the abort as a failure.
        transition(
            &self.shared.status_tx,
            RunStatus::Cancelled {
                duration_ms: elapsed_ms(self.shared.started_at),
            },
        );

        let drained = self.sink.drain_cancelled();
        debug!(drained, "cancelled pending requests");

        self.sink.emit_now(&AgentEvent::Error {
            message: "run aborted".to_string(),
            retryable: false,
        });
        self.sink.emit_now(&AgentEvent::Finish {});
    }
}

fn elapsed_ms(started_at: Instant) -> u64 {
    started_at.elapsed().as_millis() as u64
}

fn transition(tx: &watch::Sender<RunStatus>, next: RunStatus) {
    tx.send_if_modified(|current| {
        if current.is_terminal() {
            return false;
        }
        if next == RunStatus::Streaming && *current != RunStatus::Starting {
            return false;
        }
        *current = next;
        true
    });
}
