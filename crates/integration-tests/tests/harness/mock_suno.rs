//! Mock suno-api backend for integration tests
//!
//! Generation answers with submitted clips; the first status poll reports
//! them complete with audio served by the mock itself.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{Json, Router, routing};
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;

/// Mock generation service with canned clips
pub struct MockSuno {
    addr: SocketAddr,
    shutdown: CancellationToken,
    state: Arc<MockSunoState>,
}

struct MockSunoState {
    base_url: String,
    clips: usize,
    /// Status and body returned by every generation call
    failure: Option<(StatusCode, String)>,
    batches: AtomicU32,
    polls: AtomicU32,
    /// `(path, body)` of every generation call
    requests: Mutex<Vec<(String, Value)>>,
}

/// One recorded generation call
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub path: String,
    pub body: Value,
}

impl MockSuno {
    /// Start a mock producing `clips` tracks per generation
    pub async fn start(clips: usize) -> anyhow::Result<Self> {
        Self::start_inner(clips, None).await
    }

    /// Start a mock whose generation calls fail with `status`
    pub async fn start_failing(status: u16, message: &str) -> anyhow::Result<Self> {
        let status = StatusCode::from_u16(status)?;
        Self::start_inner(0, Some((status, message.to_owned()))).await
    }

    async fn start_inner(clips: usize, failure: Option<(StatusCode, String)>) -> anyhow::Result<Self> {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;

        let state = Arc::new(MockSunoState {
            base_url: format!("http://{addr}"),
            clips,
            failure,
            batches: AtomicU32::new(0),
            polls: AtomicU32::new(0),
            requests: Mutex::new(Vec::new()),
        });

        let app = Router::new()
            .route("/api/generate", routing::post(handle_generate))
            .route("/api/custom_generate", routing::post(handle_custom_generate))
            .route("/api/get", routing::get(handle_get))
            .route("/api/get_limit", routing::get(handle_get_limit))
            .route("/audio/{file}", routing::get(handle_audio))
            .with_state(Arc::clone(&state));

        let shutdown = CancellationToken::new();
        let shutdown_clone = shutdown.clone();

        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    shutdown_clone.cancelled().await;
                })
                .await
                .ok();
        });

        Ok(Self { addr, shutdown, state })
    }

    /// Base URL to configure the provider with
    pub fn base_url(&self) -> String {
        format!("http://{}/", self.addr)
    }

    /// Generation calls received so far
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state
            .requests
            .lock()
            .unwrap()
            .iter()
            .map(|(path, body)| RecordedRequest {
                path: path.clone(),
                body: body.clone(),
            })
            .collect()
    }

    /// Status polls received so far
    pub fn poll_count(&self) -> u32 {
        self.state.polls.load(Ordering::SeqCst)
    }
}

impl Drop for MockSuno {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

async fn handle_generate(State(state): State<Arc<MockSunoState>>, Json(body): Json<Value>) -> Response {
    submit(&state, "/api/generate", body)
}

async fn handle_custom_generate(State(state): State<Arc<MockSunoState>>, Json(body): Json<Value>) -> Response {
    submit(&state, "/api/custom_generate", body)
}

fn submit(state: &MockSunoState, path: &str, body: Value) -> Response {
    state.requests.lock().unwrap().push((path.to_owned(), body));

    if let Some((status, ref message)) = state.failure {
        return (status, message.clone()).into_response();
    }

    let batch = state.batches.fetch_add(1, Ordering::SeqCst);
    let clips: Vec<Value> = (0..state.clips)
        .map(|i| {
            json!({
                "id": format!("mock-{batch}-{i}"),
                "title": "",
                "audio_url": "",
                "status": "submitted",
            })
        })
        .collect();

    Json(clips).into_response()
}

async fn handle_get(
    State(state): State<Arc<MockSunoState>>,
    Query(params): Query<HashMap<String, String>>,
) -> Json<Vec<Value>> {
    state.polls.fetch_add(1, Ordering::SeqCst);

    let clips = params
        .get("ids")
        .map(|ids| {
            ids.split(',')
                .filter(|id| !id.is_empty())
                .map(|id| {
                    json!({
                        "id": id,
                        "title": "",
                        "audio_url": format!("{}/audio/{id}.mp3", state.base_url),
                        "status": "complete",
                    })
                })
                .collect()
        })
        .unwrap_or_default();

    Json(clips)
}

async fn handle_get_limit() -> Json<Value> {
    Json(json!({
        "credits_left": 40,
        "period": "month",
        "monthly_limit": 50,
        "monthly_usage": 10,
    }))
}

async fn handle_audio(Path(file): Path<String>) -> impl IntoResponse {
    (
        [(axum::http::header::CONTENT_TYPE, "audio/mpeg")],
        format!("ID3 mock audio for {file}"),
    )
}
