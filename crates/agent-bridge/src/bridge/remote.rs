//! Remote (streaming backend) bridge
//!
//! Starts a run with `POST {base}/api/agent/run` and incrementally decodes
//! the SSE response body into events. Suspend-class frames are dispatched
//! concurrently: once a handler resolves, a resume POST carries the response
//! back and its response body is read as a continuation stream alongside any
//! still-open ones. The run ends at the first `finish` frame, or when every
//! stream has drained.

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use futures::StreamExt;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::error::BridgeError;
use crate::event::{AgentEvent, SuspendOutcome};
use crate::protocol::{ResumeBody, StartBody};
use crate::sink::EventSink;

use super::sse::SseDecoder;

/// Fetches a bearer credential for one request. Called per request; the
/// bridge never caches or persists what it returns.
pub type CredentialFetcher =
    Arc<dyn Fn() -> BoxFuture<'static, Result<String, BridgeError>> + Send + Sync>;

/// Transport configuration, injected at construction and immutable for the
/// run's duration.
#[derive(Clone)]
pub struct RemoteConfig {
    pub base_url: String,
    pub fetch_credential: CredentialFetcher,
}

impl RemoteConfig {
    /// Config with a fixed credential. Development/test convenience.
    pub fn with_static_credential(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        let token = token.into();
        Self {
            base_url: base_url.into(),
            fetch_credential: Arc::new(move || {
                let token = token.clone();
                Box::pin(async move { Ok(token) })
            }),
        }
    }
}

pub struct RemoteBridge {
    client: reqwest::Client,
    config: RemoteConfig,
}

/// What a finished suspend task asks the main loop to do next.
enum SuspendFollowUp {
    /// Resume accepted; read this continuation stream.
    Continue(reqwest::Response),
    /// Nothing to resume (cancelled mid-flight).
    Nothing,
    /// The resume POST failed; surface without settling the run.
    ResumeFailed(String),
}

impl RemoteBridge {
    pub fn new(config: RemoteConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/api/agent/run", self.config.base_url.trim_end_matches('/'))
    }

    async fn post(&self, body: &impl Serialize) -> Result<reqwest::Response, BridgeError> {
        let token = (self.config.fetch_credential)().await?;
        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(token)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let retryable = status.is_server_error() || status.as_u16() == 429;
            let text = response.text().await.unwrap_or_default();
            return Err(BridgeError::transport(
                format!("backend returned {status}: {text}"),
                retryable,
            ));
        }
        Ok(response)
    }

    async fn resume(
        &self,
        interaction_id: String,
        response: crate::event::SuspendResponse,
    ) -> Result<reqwest::Response, BridgeError> {
        debug!(interaction_id, "sending resume request");
        self.post(&ResumeBody {
            interaction_id,
            response,
        })
        .await
    }
}

#[async_trait]
impl super::EventBridge for RemoteBridge {
    async fn run(&self, start: StartBody, sink: Arc<EventSink>) -> Result<(), BridgeError> {
        info!(endpoint = %self.endpoint(), "starting remote run");
        let first = self.post(&start).await?;

        let (frame_tx, mut frame_rx) = mpsc::channel::<AgentEvent>(64);
        let mut readers: JoinSet<Result<(), BridgeError>> = JoinSet::new();
        let mut suspends: JoinSet<Result<SuspendFollowUp, BridgeError>> = JoinSet::new();
        readers.spawn(read_stream(first, frame_tx.clone()));

        let mut last_stream_error: Option<BridgeError> = None;

        loop {
            // Deliver frames already buffered before consulting end state.
            while let Ok(event) = frame_rx.try_recv() {
                self.handle_frame(event, &sink, &mut suspends).await;
                if sink.is_closed() {
                    return Ok(());
                }
            }

            if readers.is_empty() && suspends.is_empty() {
                // Every stream drained without a finish frame.
                return if sink.is_settled() {
                    Ok(())
                } else {
                    Err(last_stream_error.unwrap_or_else(|| {
                        BridgeError::transport("stream ended without a terminal event", true)
                    }))
                };
            }

            tokio::select! {
                Some(event) = frame_rx.recv() => {
                    self.handle_frame(event, &sink, &mut suspends).await;
                    if sink.is_closed() {
                        return Ok(());
                    }
                }
                Some(joined) = readers.join_next(), if !readers.is_empty() => {
                    match joined {
                        Ok(Ok(())) => debug!("event stream drained"),
                        Ok(Err(e)) => {
                            warn!(error = %e, "event stream failed");
                            last_stream_error = Some(e);
                        }
                        Err(e) => warn!(error = %e, "stream reader panicked"),
                    }
                }
                Some(joined) = suspends.join_next(), if !suspends.is_empty() => {
                    match joined {
                        Ok(Ok(SuspendFollowUp::Continue(response))) => {
                            readers.spawn(read_stream(response, frame_tx.clone()));
                        }
                        Ok(Ok(SuspendFollowUp::Nothing)) => {}
                        Ok(Ok(SuspendFollowUp::ResumeFailed(message))) => {
                            // Rejects only this interaction; unrelated pending
                            // requests and open streams keep going.
                            let _ = sink
                                .dispatch(AgentEvent::SubagentError { message })
                                .await;
                        }
                        Ok(Err(e)) => {
                            // Handler fault or missing handler: the server is
                            // blocked on an answer we cannot give.
                            let retryable = e.is_retryable();
                            let _ = sink
                                .dispatch(AgentEvent::Error {
                                    message: e.to_string(),
                                    retryable,
                                })
                                .await;
                        }
                        Err(e) => warn!(error = %e, "suspend task panicked"),
                    }
                }
            }
        }
    }
}

impl RemoteBridge {
    async fn handle_frame(
        &self,
        event: AgentEvent,
        sink: &Arc<EventSink>,
        suspends: &mut JoinSet<Result<SuspendFollowUp, BridgeError>>,
    ) {
        if !event.is_suspend() {
            if let Err(e) = sink.dispatch(event).await {
                warn!(error = %e, "dispatch failed");
            }
            return;
        }

        let sink = sink.clone();
        let client = self.client.clone();
        let config = self.config.clone();
        suspends.spawn(async move {
            let request_id = event.request_id().unwrap_or_default().to_string();
            let outcome = match sink.dispatch(event).await {
                Ok(Some(outcome)) => outcome,
                Ok(None) => return Ok(SuspendFollowUp::Nothing),
                Err(e) => return Err(e.into()),
            };

            match outcome {
                SuspendOutcome::Response(response) => {
                    let bridge = RemoteBridge { client, config };
                    match bridge.resume(request_id.clone(), response).await {
                        Ok(continuation) => Ok(SuspendFollowUp::Continue(continuation)),
                        Err(e) => {
                            warn!(request_id, error = %e, "resume request failed");
                            Ok(SuspendFollowUp::ResumeFailed(format!(
                                "resume for interaction {request_id} failed: {e}"
                            )))
                        }
                    }
                }
                SuspendOutcome::Cancelled => Ok(SuspendFollowUp::Nothing),
                SuspendOutcome::Failed(message) => Err(BridgeError::transport(
                    format!("suspend handler for {request_id} failed: {message}"),
                    false,
                )),
            }
        });
    }
}

/// Read one SSE response body to its end, forwarding each decoded event.
async fn read_stream(
    response: reqwest::Response,
    frames: mpsc::Sender<AgentEvent>,
) -> Result<(), BridgeError> {
    let mut body = response.bytes_stream();
    let mut decoder = SseDecoder::new();

    while let Some(chunk) = body.next().await {
        let chunk = chunk.map_err(|e| BridgeError::transport(format!("stream read: {e}"), true))?;
        for event in decoder.push(&chunk) {
            if frames.send(event).await.is_err() {
                // Consumer went away (abort); stop reading.
                return Ok(());
            }
        }
    }

    if decoder.has_partial() {
        warn!("stream ended with a partial frame");
    }
    Ok(())
}
