//! Shared fixtures for contract tests.
//!
//! Provides a recording fake [`StoreClient`] with per-phase failure
//! injection, a local webhook receiver bound to an ephemeral port, and
//! settings/incident builders.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use axum::Router;
use serde_json::{json, Value};

use incident_commander::models::incident::{IncidentInput, Severity};
use incident_commander::models::report::StorePhase;
use incident_commander::store::{StoreClient, StoreFuture};
use incident_commander::{AppError, Settings};

pub const WEBHOOK_ROUTE: &str = "/api/incident/execute";

/// The checkout-api incident used across contract tests.
pub fn checkout_incident() -> IncidentInput {
    IncidentInput {
        service: "checkout-api".into(),
        severity: Severity::High,
        summary: "Latency spikes after deploy".into(),
        signals: vec!["p95 latency > 2.5s".into()],
        recent_deploy_sha: Some("abc1234".into()),
    }
}

/// Settings with the store enabled against a placeholder URL.
pub fn store_settings() -> Settings {
    let mut settings = Settings::default();
    settings.store.url = Some("http://localhost:9200".into());
    settings.store.api_key = Some("secret".into());
    settings
}

/// Settings with the webhook pointed at `base_url`.
pub fn webhook_settings(base_url: &str, timeout_seconds: u64) -> Settings {
    let mut settings = Settings::default();
    settings.webhook.base_url = Some(base_url.into());
    settings.webhook.api_key = Some("token".into());
    settings.request_timeout_seconds = timeout_seconds;
    settings
}

// ── Fake store ──────────────────────────────────────────────

/// Store client that records every phase it is asked to run.
pub struct FakeStoreClient {
    ping_ok: bool,
    fail_at: Option<StorePhase>,
    calls: Mutex<Vec<StorePhase>>,
    indexed: Mutex<Vec<(String, Value)>>,
    queries: Mutex<Vec<(String, Vec<Value>)>>,
}

impl FakeStoreClient {
    pub fn healthy() -> Self {
        Self {
            ping_ok: true,
            fail_at: None,
            calls: Mutex::new(Vec::new()),
            indexed: Mutex::new(Vec::new()),
            queries: Mutex::new(Vec::new()),
        }
    }

    pub fn failing_at(phase: StorePhase) -> Self {
        Self {
            fail_at: Some(phase),
            ..Self::healthy()
        }
    }

    pub fn unhealthy() -> Self {
        Self {
            ping_ok: false,
            ..Self::healthy()
        }
    }

    pub fn calls(&self) -> Vec<StorePhase> {
        self.calls.lock().unwrap().clone()
    }

    pub fn indexed(&self) -> Vec<(String, Value)> {
        self.indexed.lock().unwrap().clone()
    }

    pub fn queries(&self) -> Vec<(String, Vec<Value>)> {
        self.queries.lock().unwrap().clone()
    }

    fn enter(&self, phase: StorePhase) -> incident_commander::Result<()> {
        self.calls.lock().unwrap().push(phase);
        if self.fail_at == Some(phase) {
            return Err(AppError::Store(format!("{} failed", phase.as_str())));
        }
        Ok(())
    }
}

impl StoreClient for FakeStoreClient {
    fn ping(&self) -> StoreFuture<'_, bool> {
        Box::pin(async move {
            self.enter(StorePhase::Ping)?;
            Ok(self.ping_ok)
        })
    }

    fn create_index<'a>(&'a self, index: &'a str, _mappings: &'a Value) -> StoreFuture<'a, Value> {
        Box::pin(async move {
            self.enter(StorePhase::CreateIndex)?;
            Ok(json!({ "acknowledged": true, "index": index }))
        })
    }

    fn index_document<'a>(
        &'a self,
        _index: &'a str,
        id: &'a str,
        document: &'a Value,
    ) -> StoreFuture<'a, Value> {
        Box::pin(async move {
            self.enter(StorePhase::IndexDocument)?;
            self.indexed
                .lock()
                .unwrap()
                .push((id.to_owned(), document.clone()));
            Ok(json!({ "result": "created", "_id": id }))
        })
    }

    fn search<'a>(&'a self, _index: &'a str, _body: &'a Value) -> StoreFuture<'a, Value> {
        Box::pin(async move {
            self.enter(StorePhase::SearchRecent)?;
            Ok(json!({
                "hits": {
                    "hits": [
                        {"_source": {"incident_id": "inc-1"}},
                        {"_source": {"incident_id": null}}
                    ]
                }
            }))
        })
    }

    fn query<'a>(&'a self, query: &'a str, params: &'a [Value]) -> StoreFuture<'a, Value> {
        Box::pin(async move {
            self.enter(StorePhase::RunQuery)?;
            self.queries
                .lock()
                .unwrap()
                .push((query.to_owned(), params.to_vec()));
            Ok(json!({
                "columns": [{"name": "incident_count", "type": "long"}],
                "values": [[1]]
            }))
        })
    }
}

// ── Local webhook receiver ──────────────────────────────────

/// One request seen by the webhook receiver.
#[derive(Debug, Clone)]
pub struct CapturedRequest {
    pub headers: HeaderMap,
    pub body: Bytes,
}

#[derive(Clone)]
struct ReceiverState {
    status: StatusCode,
    body: String,
    delay: Duration,
    hits: Arc<AtomicUsize>,
    captured: Arc<Mutex<Vec<CapturedRequest>>>,
}

/// Handle on a running webhook receiver.
pub struct WebhookReceiver {
    pub base_url: String,
    hits: Arc<AtomicUsize>,
    captured: Arc<Mutex<Vec<CapturedRequest>>>,
}

impl WebhookReceiver {
    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }

    pub fn captured(&self) -> Vec<CapturedRequest> {
        self.captured.lock().unwrap().clone()
    }
}

async fn receive(
    State(state): State<ReceiverState>,
    headers: HeaderMap,
    body: Bytes,
) -> (StatusCode, String) {
    state.hits.fetch_add(1, Ordering::SeqCst);
    state
        .captured
        .lock()
        .unwrap()
        .push(CapturedRequest { headers, body });
    if !state.delay.is_zero() {
        tokio::time::sleep(state.delay).await;
    }
    (state.status, state.body.clone())
}

/// Start a receiver on an ephemeral port answering `status` with `body`
/// after `delay`.
pub async fn spawn_receiver(status: StatusCode, body: &str, delay: Duration) -> WebhookReceiver {
    let hits = Arc::new(AtomicUsize::new(0));
    let captured = Arc::new(Mutex::new(Vec::new()));
    let state = ReceiverState {
        status,
        body: body.to_owned(),
        delay,
        hits: Arc::clone(&hits),
        captured: Arc::clone(&captured),
    };
    let app = Router::new()
        .route(WEBHOOK_ROUTE, post(receive))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind ephemeral");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    WebhookReceiver {
        base_url: format!("http://{addr}"),
        hits,
        captured,
    }
}

/// A base URL on which nothing is listening.
pub async fn closed_base_url() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind ephemeral");
    let addr = listener.local_addr().expect("local addr");
    drop(listener);
    format!("http://{addr}")
}

/// A receiver that answers 500 with a declared body longer than what it
/// sends, then holds the connection open so reading the body times out.
pub async fn spawn_stalled_receiver() -> String {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind ephemeral");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        let Ok((mut socket, _)) = listener.accept().await else {
            return;
        };
        let mut request = Vec::new();
        let mut buf = [0_u8; 4096];
        while !request.windows(4).any(|w| w == b"\r\n\r\n") {
            match socket.read(&mut buf).await {
                Ok(0) | Err(_) => return,
                Ok(n) => request.extend_from_slice(&buf[..n]),
            }
        }
        let head = b"HTTP/1.1 500 Internal Server Error\r\ncontent-type: text/plain\r\ncontent-length: 1000\r\n\r\npartial";
        if socket.write_all(head).await.is_err() {
            return;
        }
        let _ = socket.flush().await;
        tokio::time::sleep(Duration::from_secs(5)).await;
        drop(socket);
    });
    format!("http://{addr}")
}
