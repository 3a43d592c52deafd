//! The proxy handler: one node chosen and one forward per inbound request.
//!
//! # Data Flow
//! ```text
//! Inbound request
//!     → method check (405, nothing probed)
//!     → POST body JSON check (400, nothing probed)
//!     → selection cache lookup (when enabled)
//!         hit  → reuse cached node
//!         miss → probe + select (500 when no node survives) → cache store
//!     → dispatch counted against the node
//!     → forward with retry, request ID passed on to the node
//!         ok   → mirror status, selection headers, GET enrichment
//!         fail → error counter, error envelope (500)
//! ```
//!
//! # Design Decisions
//! - Access and total counters move when the node is committed, before the
//!   forward, so the error rate is errors over attempts
//! - A failed forward never takes the process down

use std::net::SocketAddr;
use std::time::Instant;

use axum::{
    body::{self, Body},
    extract::{ConnectInfo, State},
    http::{HeaderMap, Request, StatusCode},
    response::Response,
};
use serde_json::Value;

use crate::cache::{CacheEntry, SelectionKey};
use crate::error::{BalancerError, BalancerResult};
use crate::health::HealthRecord;
use crate::http::request::{client_ip, forward_method, json_body, request_id, X_REQUEST_ID};
use crate::http::response::{
    enrich, error_envelope, error_header, into_object, json_response, reject, reject_error,
    selection_headers, SelectionMeta,
};
use crate::http::server::AppState;
use crate::load_balancer::{probe_and_select, Node};
use crate::observability::metrics;
use crate::observability::stats::Counter;
use crate::resilience::ForwardMethod;

/// The node a request was committed to.
#[derive(Debug, Clone)]
pub struct ChosenNode {
    pub server: String,
    pub version: Value,
    pub blockchain_version: String,
    pub freshness: i64,
}

impl From<&HealthRecord> for ChosenNode {
    fn from(record: &HealthRecord) -> Self {
        Self {
            server: record.server.clone(),
            version: record.version.clone(),
            blockchain_version: record.blockchain_version.clone(),
            freshness: record.freshness,
        }
    }
}

impl From<CacheEntry> for ChosenNode {
    fn from(entry: CacheEntry) -> Self {
        Self {
            server: entry.server,
            version: entry.version,
            blockchain_version: entry.blockchain_version,
            freshness: entry.freshness,
        }
    }
}

/// Cache lookup, then probe and select on a miss.
pub async fn choose_node(state: &AppState, key: SelectionKey) -> BalancerResult<ChosenNode> {
    if let Some(cache) = &state.cache {
        if let Some(entry) = cache.get(&key) {
            tracing::debug!(node = %entry.server, client = %key.client, "Using cached node");
            return Ok(entry.into());
        }
    }

    let selection = probe_and_select(
        &state.nodes,
        &state.prober,
        state.strategy,
        state.config.probe.concurrency,
    )
    .await?;

    if let Some(cache) = &state.cache {
        cache.set(key, CacheEntry::from_record(&selection.selected, Instant::now()));
    }

    Ok(ChosenNode::from(&selection.selected))
}

/// Main proxy handler.
pub async fn proxy_handler(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    request: Request<Body>,
) -> Response {
    let start = Instant::now();
    let method_str = request.method().to_string();
    let req_id = request_id(request.headers()).to_string();

    let Some(method) = forward_method(request.method()) else {
        let e = BalancerError::MethodNotAllowed(method_str.clone());
        tracing::warn!(request_id = %req_id, error = %e, "Request rejected");
        metrics::record_request(&method_str, 405, "none", start);
        return reject_error(&e);
    };

    let mut upstream_headers = HeaderMap::new();
    if let Some(id) = request.headers().get(X_REQUEST_ID) {
        upstream_headers.insert(X_REQUEST_ID, id.clone());
    }

    let ip = client_ip(&addr);

    let payload = match method {
        ForwardMethod::Get => None,
        ForwardMethod::Post => {
            let raw = match body::to_bytes(request.into_body(), usize::MAX).await {
                Ok(raw) => raw,
                Err(e) => {
                    tracing::warn!(request_id = %req_id, error = %e, "Request body rejected");
                    metrics::record_request(&method_str, 413, "none", start);
                    return reject(StatusCode::PAYLOAD_TOO_LARGE, "Payload Too Large");
                }
            };
            match json_body(raw) {
                Some(payload) => Some(payload),
                None => {
                    tracing::warn!(request_id = %req_id, client = %ip, "JSON parse failed");
                    metrics::record_request(&method_str, 400, "none", start);
                    return reject(StatusCode::BAD_REQUEST, "Invalid JSON");
                }
            }
        }
    };

    let chosen = match choose_node(&state, SelectionKey::new(ip.as_str(), method_str.as_str())).await {
        Ok(chosen) => chosen,
        Err(e) => {
            tracing::error!(request_id = %req_id, client = %ip, error = %e, "No valid node found");
            metrics::record_request(&method_str, 500, "none", start);
            return reject_error(&e);
        }
    };

    tracing::info!(
        request_id = %req_id,
        client = %ip,
        method = %method_str,
        node = %chosen.server,
        version = %chosen.blockchain_version,
        jussi_number = chosen.freshness,
        "Chosen node"
    );

    state.stats.record_dispatch(&chosen.server);

    let node = Node::new(chosen.server.as_str());
    let forwarded = state
        .forwarder
        .forward(&node, method, payload, &upstream_headers)
        .await;

    let (status, outcome) = match forwarded {
        Ok(reply) => match serde_json::from_slice::<Value>(&reply.body) {
            Ok(data) => (reply.status, Ok(data)),
            Err(e) => (
                reply.status,
                Err(BalancerError::MalformedPayload {
                    server: chosen.server.clone(),
                    what: "forward",
                    detail: e.to_string(),
                }),
            ),
        },
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, Err(e)),
    };

    let meta = SelectionMeta {
        ip: &ip,
        server: &chosen.server,
        version: &chosen.version,
        proxy_version: &state.config.version,
    };
    let max_age = match method {
        ForwardMethod::Get => state.config.forward.max_age,
        ForwardMethod::Post => None,
    };
    let mut headers = selection_headers(&meta, max_age);

    let data = match outcome {
        Ok(data) => match method {
            ForwardMethod::Get => {
                let mut data = into_object(data);
                data.insert("status_code".into(), Value::from(200));
                Value::Object(data)
            }
            ForwardMethod::Post => data,
        },
        Err(e) => {
            tracing::error!(request_id = %req_id, node = %chosen.server, error = %e, "Forward failed");
            state.stats.increment(Counter::Error, &chosen.server);
            error_header(&mut headers, &e);
            error_envelope(&e, &state.config.version)
        }
    };

    let data = match method {
        ForwardMethod::Get => {
            let mut data = into_object(data);
            enrich(&mut data, &meta, &state.config.nodes, &state.stats.snapshot());
            Value::Object(data)
        }
        ForwardMethod::Post => data,
    };

    metrics::record_request(&method_str, status.as_u16(), &chosen.server, start);
    json_response(status, headers, data)
}
