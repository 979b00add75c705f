//! Remote bridge round-trip against a stub SSE backend.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{json, Value};

use ab_core::segment::Segment;
use agent_bridge::bridge::{EventBridge, RemoteBridge, RemoteConfig};
use agent_bridge::{EventKind, EventSink, RunKind, StartBody, SuspendResponse};

#[derive(Clone, Default)]
struct Recorded {
    bodies: Arc<Mutex<Vec<Value>>>,
    auth: Arc<Mutex<Vec<String>>>,
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn sse(frames: &[Value]) -> String {
    let mut out = String::new();
    for frame in frames {
        out.push_str("data: ");
        out.push_str(&frame.to_string());
        out.push_str("\n\n");
    }
    out
}

fn sse_response(body: String) -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "text/event-stream")], body)
}

async fn spawn_backend(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind stub backend");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    format!("http://{addr}")
}

fn start_body() -> StartBody {
    StartBody {
        kind: RunKind::Content,
        segments: vec![Segment::text("draft a greeting")],
        flags: HashMap::new(),
    }
}

/// Start, suspend on `waitForInput`, resume with the handler's answer, then
/// drain the continuation stream to `finish`.
#[tokio::test]
async fn test_suspend_resume_round_trip() {
    init_tracing();
    let recorded = Recorded::default();

    async fn run_endpoint(
        State(recorded): State<Recorded>,
        headers: HeaderMap,
        Json(body): Json<Value>,
    ) -> impl IntoResponse {
        if let Some(auth) = headers.get(header::AUTHORIZATION) {
            recorded
                .auth
                .lock()
                .unwrap()
                .push(auth.to_str().unwrap_or_default().to_string());
        }
        let is_resume = body.get("interactionId").is_some();
        recorded.bodies.lock().unwrap().push(body);

        if is_resume {
            sse_response(sse(&[
                json!({"type": "content", "content": "Hello, Ada!"}),
                json!({"type": "complete", "summary": "greeting drafted"}),
                json!({"type": "finish"}),
            ]))
        } else {
            sse_response(sse(&[
                json!({"type": "start"}),
                json!({"type": "thought", "content": "asking for a name"}),
                json!({"type": "waitForInput", "requestId": "r1", "title": "Who is this for?"}),
            ]))
        }
    }

    let app = Router::new()
        .route("/api/agent/run", post(run_endpoint))
        .with_state(recorded.clone());
    let base = spawn_backend(app).await;

    let sink = Arc::new(EventSink::new());
    sink.on_sync(EventKind::WaitForInput, |_| {
        Ok(SuspendResponse::Input { input: "hello".into() })
    });
    let seen = Arc::new(Mutex::new(Vec::new()));
    let s = seen.clone();
    sink.observe(move |event| {
        s.lock().unwrap().push(event.kind());
        Ok(())
    });

    let bridge = RemoteBridge::new(RemoteConfig::with_static_credential(&base, "test-token"));
    bridge.run(start_body(), sink.clone()).await.unwrap();

    assert!(sink.is_settled());
    assert!(sink.is_closed());
    assert_eq!(sink.pending_len(), 0);
    assert_eq!(
        *seen.lock().unwrap(),
        vec![
            EventKind::Start,
            EventKind::Thought,
            EventKind::Content,
            EventKind::Complete,
            EventKind::Finish,
        ]
    );

    let bodies = recorded.bodies.lock().unwrap();
    assert_eq!(bodies.len(), 2);
    assert_eq!(bodies[0]["kind"], "content");
    assert_eq!(
        bodies[1],
        json!({"interactionId": "r1", "response": {"input": "hello"}})
    );

    let auth = recorded.auth.lock().unwrap();
    assert_eq!(auth.len(), 2);
    assert!(auth.iter().all(|h| h == "Bearer test-token"));
}

/// A stream that drains without any terminal frame is a retryable transport
/// fault, not a clean completion.
#[tokio::test]
async fn test_stream_drop_without_terminal_is_retryable() {
    init_tracing();
    async fn run_endpoint() -> impl IntoResponse {
        sse_response(sse(&[
            json!({"type": "start"}),
            json!({"type": "thought", "content": "working"}),
        ]))
    }

    let app = Router::new().route("/api/agent/run", post(run_endpoint));
    let base = spawn_backend(app).await;

    let sink = Arc::new(EventSink::new());
    let bridge = RemoteBridge::new(RemoteConfig::with_static_credential(&base, "test-token"));
    let err = bridge
        .run(start_body(), sink.clone())
        .await
        .expect_err("missing terminal frame must fail the run");

    assert!(err.is_retryable());
    assert!(!sink.is_settled());
}

/// Backend 5xx on start classifies as retryable; the sink never sees events.
#[tokio::test]
async fn test_server_error_on_start_is_retryable() {
    init_tracing();
    async fn run_endpoint() -> impl IntoResponse {
        (StatusCode::INTERNAL_SERVER_ERROR, "backend down")
    }

    let app = Router::new().route("/api/agent/run", post(run_endpoint));
    let base = spawn_backend(app).await;

    let sink = Arc::new(EventSink::new());
    let bridge = RemoteBridge::new(RemoteConfig::with_static_credential(&base, "test-token"));
    let err = bridge
        .run(start_body(), sink)
        .await
        .expect_err("5xx must fail the run");

    assert!(err.is_retryable());
}
