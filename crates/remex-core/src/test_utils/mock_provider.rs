//! Scriptable in-process provider for exercising dispatch and polling.

use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use tokio::net::TcpListener;

/// Scripted reply to `POST /submissions`.
#[derive(Debug, Clone)]
pub enum DispatchReply {
    /// Asynchronous provider: answer with a submission handle.
    Pending { token: String, region: String },
    /// Synchronous provider: answer with a terminal result body.
    Finished(Value),
    /// Fail the request with the given HTTP status.
    Error(u16),
}

/// One recorded probe request.
#[derive(Debug, Clone)]
pub struct ProbeRecord {
    pub token: String,
    pub region_header: Option<String>,
}

#[derive(Clone)]
struct ProviderState {
    dispatch_replies: Arc<Mutex<VecDeque<DispatchReply>>>,
    dispatch_bodies: Arc<Mutex<Vec<Value>>>,
    dispatch_auth_headers: Arc<Mutex<Vec<Option<String>>>>,
    asset: Arc<Mutex<Option<String>>>,
    asset_hits: Arc<Mutex<u32>>,
    probe_statuses: Arc<Mutex<VecDeque<Value>>>,
    probe_fallback: Arc<Mutex<Option<Value>>>,
    probes: Arc<Mutex<Vec<ProbeRecord>>>,
    catalog: Arc<Mutex<Result<Value, u16>>>,
    language_details: Arc<Mutex<HashMap<i64, Value>>>,
}

impl ProviderState {
    fn new() -> Self {
        Self {
            dispatch_replies: Arc::new(Mutex::new(VecDeque::new())),
            dispatch_bodies: Arc::new(Mutex::new(Vec::new())),
            dispatch_auth_headers: Arc::new(Mutex::new(Vec::new())),
            asset: Arc::new(Mutex::new(None)),
            asset_hits: Arc::new(Mutex::new(0)),
            probe_statuses: Arc::new(Mutex::new(VecDeque::new())),
            probe_fallback: Arc::new(Mutex::new(None)),
            probes: Arc::new(Mutex::new(Vec::new())),
            catalog: Arc::new(Mutex::new(Ok(json!([])))),
            language_details: Arc::new(Mutex::new(HashMap::new())),
        }
    }
}

async fn create_submission_handler(
    State(state): State<ProviderState>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    let auth = headers
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    state.dispatch_auth_headers.lock().unwrap().push(auth);
    state.dispatch_bodies.lock().unwrap().push(body);

    match state.dispatch_replies.lock().unwrap().pop_front() {
        Some(DispatchReply::Pending { token, region }) => {
            (StatusCode::CREATED, Json(json!({ "token": token, "region": region })))
        }
        Some(DispatchReply::Finished(result)) => (StatusCode::CREATED, Json(result)),
        Some(DispatchReply::Error(status)) => (
            StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            Json(json!({ "error": "scripted failure" })),
        ),
        None => {
            log::error!("mock provider ran out of dispatch replies");
            (StatusCode::SERVICE_UNAVAILABLE, Json(json!({ "error": "no reply scripted" })))
        }
    }
}

async fn get_submission_handler(
    State(state): State<ProviderState>,
    Path(token): Path<String>,
    headers: HeaderMap,
) -> (StatusCode, Json<Value>) {
    let region_header = headers
        .get("X-Judge0-Region")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    state.probes.lock().unwrap().push(ProbeRecord { token, region_header });

    let next = state.probe_statuses.lock().unwrap().pop_front();
    let body = next.or_else(|| state.probe_fallback.lock().unwrap().clone());
    match body {
        Some(body) => (StatusCode::OK, Json(body)),
        None => {
            log::error!("mock provider ran out of probe statuses");
            (StatusCode::SERVICE_UNAVAILABLE, Json(json!({ "error": "no status scripted" })))
        }
    }
}

async fn get_asset_handler(State(state): State<ProviderState>) -> (StatusCode, String) {
    *state.asset_hits.lock().unwrap() += 1;
    match state.asset.lock().unwrap().clone() {
        Some(body) => (StatusCode::OK, body),
        None => (StatusCode::NOT_FOUND, String::new()),
    }
}

async fn list_languages_handler(State(state): State<ProviderState>) -> (StatusCode, Json<Value>) {
    match state.catalog.lock().unwrap().clone() {
        Ok(catalog) => (StatusCode::OK, Json(catalog)),
        Err(status) => (
            StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            Json(json!({ "error": "scripted catalog failure" })),
        ),
    }
}

async fn get_language_handler(
    State(state): State<ProviderState>,
    Path(id): Path<i64>,
) -> (StatusCode, Json<Value>) {
    match state.language_details.lock().unwrap().get(&id) {
        Some(detail) => (StatusCode::OK, Json(detail.clone())),
        None => (StatusCode::NOT_FOUND, Json(json!({ "error": "unknown language" }))),
    }
}

pub struct MockProvider {
    addr: SocketAddr,
    shutdown_tx: tokio::sync::oneshot::Sender<()>,
    state: ProviderState,
}

impl MockProvider {
    pub async fn start() -> Self {
        let state = ProviderState::new();

        let app = Router::new()
            .route("/submissions", post(create_submission_handler))
            .route("/submissions/{token}", get(get_submission_handler))
            .route("/languages", get(list_languages_handler))
            .route("/additional_files", get(get_asset_handler))
            .route("/languages/{id}", get(get_language_handler))
            .with_state(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap_or_else(|e| {
            panic!("Failed to bind mock provider to 127.0.0.1:0. Error: {}", e);
        });
        let addr = listener.local_addr().unwrap();
        log::info!("Mock provider listening on {}", addr);

        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    shutdown_rx.await.ok();
                })
                .await
                .unwrap_or_else(|e| {
                    log::error!("Mock provider error: {}", e);
                });
        });

        MockProvider { addr, shutdown_tx, state }
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn enqueue_dispatch(&self, reply: DispatchReply) {
        self.state.dispatch_replies.lock().unwrap().push_back(reply);
    }

    /// Script the bodies returned by consecutive probe requests, in order.
    pub fn script_probes(&self, bodies: Vec<Value>) {
        self.state.probe_statuses.lock().unwrap().extend(bodies);
    }

    /// Body returned by every probe once the scripted sequence is exhausted.
    pub fn set_probe_fallback(&self, body: Value) {
        *self.state.probe_fallback.lock().unwrap() = Some(body);
    }

    pub fn set_catalog(&self, catalog: Value) {
        *self.state.catalog.lock().unwrap() = Ok(catalog);
    }

    pub fn set_catalog_error(&self, status: u16) {
        *self.state.catalog.lock().unwrap() = Err(status);
    }

    pub fn set_language_detail(&self, id: i64, detail: Value) {
        self.state.language_details.lock().unwrap().insert(id, detail);
    }

    pub fn set_asset(&self, body: &str) {
        *self.state.asset.lock().unwrap() = Some(body.to_string());
    }

    pub fn asset_url(&self) -> String {
        format!("{}/additional_files", self.base_url())
    }

    pub fn asset_hits(&self) -> u32 {
        *self.state.asset_hits.lock().unwrap()
    }

    pub fn dispatch_bodies(&self) -> Vec<Value> {
        self.state.dispatch_bodies.lock().unwrap().clone()
    }

    pub fn dispatch_auth_headers(&self) -> Vec<Option<String>> {
        self.state.dispatch_auth_headers.lock().unwrap().clone()
    }

    pub fn probes(&self) -> Vec<ProbeRecord> {
        self.state.probes.lock().unwrap().clone()
    }

    pub async fn shutdown(self) {
        if self.shutdown_tx.send(()).is_err() {
            log::warn!("mock provider shutdown signal already sent");
        }
        tokio::time::sleep(tokio::time::Duration::from_millis(20)).await;
    }
}

/// Shorthand for a non-terminal or terminal status body.
pub fn status_body(id: i64, description: &str) -> Value {
    json!({ "status": { "id": id, "description": description } })
}
