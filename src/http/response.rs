//! Client response construction.
//!
//! # Responsibilities
//! - Attach selection metadata headers (client, node, version, proxy version)
//! - Enrich GET bodies with the node pool and the stats snapshot
//! - Build error envelopes for forward failures and pre-check rejections
//!
//! # Design Decisions
//! - Every body is JSON, including errors
//! - Header values that cannot be encoded are skipped, never fatal
//! - GET replies that are not objects are wrapped under `result`

use axum::http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{json, Map, Value};

use crate::error::BalancerError;
use crate::observability::stats::StatsSnapshot;

/// Selection metadata shared by headers and GET enrichment.
#[derive(Debug, Clone, Copy)]
pub struct SelectionMeta<'a> {
    pub ip: &'a str,
    pub server: &'a str,
    pub version: &'a Value,
    pub proxy_version: &'a str,
}

fn insert(headers: &mut HeaderMap, name: &'static str, value: &str) {
    match HeaderValue::from_str(value) {
        Ok(v) => {
            headers.insert(HeaderName::from_static(name), v);
        }
        Err(_) => tracing::debug!(header = name, "Skipping unencodable header value"),
    }
}

/// Headers describing the chosen node. `max_age` only applies to GET.
pub fn selection_headers(meta: &SelectionMeta<'_>, max_age: Option<u64>) -> HeaderMap {
    let mut headers = HeaderMap::new();
    insert(&mut headers, "ip", meta.ip);
    insert(&mut headers, "server", meta.server);
    insert(&mut headers, "version", &meta.version.to_string());
    insert(&mut headers, "loadbalancerversion", meta.proxy_version);
    headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
    if let Some(age) = max_age {
        insert(&mut headers, "cache-control", &format!("max-age={age}"));
    }
    headers
}

/// Record the failure detail in the `Error` header.
pub fn error_header(headers: &mut HeaderMap, error: &BalancerError) {
    insert(headers, "error", &Value::String(error.to_string()).to_string());
}

/// Body returned when forwarding failed after every retry.
pub fn error_envelope(error: &BalancerError, proxy_version: &str) -> Value {
    json!({
        "status_code": 500,
        "error": error.to_string(),
        "__load_balancer_version__": proxy_version,
    })
}

/// Coerce a GET reply into an object so it can carry enrichment fields.
pub fn into_object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        other => {
            let mut map = Map::new();
            map.insert("result".to_string(), other);
            map
        }
    }
}

/// Add the selection, the pool and the stats snapshot to a GET body.
pub fn enrich(
    body: &mut Map<String, Value>,
    meta: &SelectionMeta<'_>,
    servers: &[String],
    stats: &StatsSnapshot,
) {
    body.insert("__server__".into(), Value::from(meta.server));
    body.insert("__version__".into(), meta.version.clone());
    body.insert("__servers__".into(), json!(servers));
    body.insert("__ip__".into(), Value::from(meta.ip));
    body.insert("__load_balancer_version__".into(), Value::from(meta.proxy_version));
    body.insert("__stats__".into(), serde_json::to_value(stats).unwrap_or(Value::Null));
}

/// JSON response with extra headers.
pub fn json_response(status: StatusCode, headers: HeaderMap, body: Value) -> Response {
    (status, headers, Json(body)).into_response()
}

/// Plain `{"error": message}` rejection.
pub fn reject(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}

/// Rejection for an error raised before any node was committed.
pub fn reject_error(error: &BalancerError) -> Response {
    match error {
        BalancerError::MethodNotAllowed(_) => {
            reject(StatusCode::METHOD_NOT_ALLOWED, "Method Not Allowed")
        }
        _ => reject(StatusCode::INTERNAL_SERVER_ERROR, "No valid node found"),
    }
}
