//! Shared utilities for integration and load testing.
#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU16, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::any,
    Json, Router,
};
use serde_json::{json, Value};
use tokio::net::TcpListener;

use node_balancer::config::ProxyConfig;
use node_balancer::http::HttpServer;
use node_balancer::lifecycle::Shutdown;

/// Programmable behaviour of one mock RPC node.
pub struct NodeState {
    pub name: String,
    pub blockchain_version: String,
    pub jussi_number: AtomicI64,
    /// Non-zero forces every reply to this status.
    pub fail_status: AtomicU16,
    /// GETs numbered at or above this are delayed by `slow_delay`.
    pub slow_gets_after: AtomicU32,
    pub slow_delay: Duration,
    /// Forwarded POSTs get an HTML page instead of JSON.
    pub garbage_posts: AtomicBool,
    pub get_calls: AtomicU32,
    pub version_calls: AtomicU32,
    pub forwarded_posts: AtomicU32,
    /// `x-request-id` seen on the latest forwarded POST.
    pub last_request_id: Mutex<Option<String>>,
}

/// A mock RPC node listening on an ephemeral port.
#[derive(Clone)]
pub struct MockNode {
    pub url: String,
    pub state: Arc<NodeState>,
}

impl MockNode {
    pub async fn start(name: &str, blockchain_version: &str, jussi_number: i64) -> Self {
        let state = Arc::new(NodeState {
            name: name.to_string(),
            blockchain_version: blockchain_version.to_string(),
            jussi_number: AtomicI64::new(jussi_number),
            fail_status: AtomicU16::new(0),
            slow_gets_after: AtomicU32::new(u32::MAX),
            slow_delay: Duration::from_secs(2),
            garbage_posts: AtomicBool::new(false),
            get_calls: AtomicU32::new(0),
            version_calls: AtomicU32::new(0),
            forwarded_posts: AtomicU32::new(0),
            last_request_id: Mutex::new(None),
        });

        let app = Router::new()
            .route("/", any(node_handler))
            .with_state(state.clone());
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Self {
            url: format!("http://{}", addr),
            state,
        }
    }

    pub fn version_calls(&self) -> u32 {
        self.state.version_calls.load(Ordering::SeqCst)
    }

    pub fn get_calls(&self) -> u32 {
        self.state.get_calls.load(Ordering::SeqCst)
    }

    pub fn forwarded_posts(&self) -> u32 {
        self.state.forwarded_posts.load(Ordering::SeqCst)
    }

    /// Delay every GET from the `n`th (zero-based) on.
    pub fn slow_gets_after(&self, n: u32) {
        self.state.slow_gets_after.store(n, Ordering::SeqCst);
    }

    pub fn fail_with(&self, status: u16) {
        self.state.fail_status.store(status, Ordering::SeqCst);
    }

    pub fn last_request_id(&self) -> Option<String> {
        self.state.last_request_id.lock().unwrap().clone()
    }

    pub fn reply_garbage_to_posts(&self) {
        self.state.garbage_posts.store(true, Ordering::SeqCst);
    }
}

async fn node_handler(
    State(state): State<Arc<NodeState>>,
    method: Method,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let forced = state.fail_status.load(Ordering::SeqCst);
    if forced != 0 {
        let status = StatusCode::from_u16(forced).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        return (status, Json(json!({ "error": "forced failure" }))).into_response();
    }

    if method == Method::GET {
        let n = state.get_calls.fetch_add(1, Ordering::SeqCst);
        if n >= state.slow_gets_after.load(Ordering::SeqCst) {
            tokio::time::sleep(state.slow_delay).await;
        }
        return (
            StatusCode::OK,
            Json(json!({
                "status": "OK",
                "jussi_num": state.jussi_number.load(Ordering::SeqCst),
                "node": state.name,
            })),
        )
            .into_response();
    }

    let request: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);
    if request["params"][1] == "get_version" {
        state.version_calls.fetch_add(1, Ordering::SeqCst);
        return (
            StatusCode::OK,
            Json(json!({
                "id": 0,
                "jsonrpc": "2.0",
                "result": { "blockchain_version": state.blockchain_version },
            })),
        )
            .into_response();
    }

    state.forwarded_posts.fetch_add(1, Ordering::SeqCst);
    *state.last_request_id.lock().unwrap() = headers
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    if state.garbage_posts.load(Ordering::SeqCst) {
        return (StatusCode::OK, "<html>upstream maintenance</html>").into_response();
    }
    (
        StatusCode::OK,
        Json(json!({
            "id": request["id"],
            "jsonrpc": "2.0",
            "result": { "node": state.name, "echo": request },
        })),
    )
        .into_response()
}

/// Config pointing at `nodes`, tuned for fast tests.
pub fn test_config(nodes: &[&MockNode]) -> ProxyConfig {
    let mut config = ProxyConfig::default();
    config.nodes = nodes.iter().map(|n| n.url.clone()).collect();
    config.version = "test-1.0".into();
    config.rate_limit.enabled = false;
    config.probe.timeout_ms = 1_000;
    config.probe.min_blockchain_version = "0.23.0".into();
    config.forward.retry_count = 2;
    config.forward.retry_delay_ms = 10;
    config
}

/// Start the balancer on an ephemeral port; returns its base URL.
pub async fn start_balancer(config: ProxyConfig) -> (String, Shutdown) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr: SocketAddr = listener.local_addr().unwrap();
    let server = HttpServer::new(config).unwrap();
    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();

    tokio::spawn(async move {
        let _ = server.run(listener, server_shutdown).await;
    });

    (format!("http://{}", addr), shutdown)
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}
