//! Inbound request inspection.
//!
//! # Responsibilities
//! - Map the inbound method onto a forward method (HEAD travels as GET)
//! - Identify the client for cache keys, headers and rate limiting
//! - Validate POST bodies as JSON before any node is probed
//!
//! # Design Decisions
//! - Request ID is assigned by the tower-http layer, read back here for logs
//! - An empty POST body is forwarded as `{}`
//! - The validated body is forwarded byte for byte

use std::net::SocketAddr;

use axum::body::Bytes;
use axum::http::{HeaderMap, Method};

use crate::resilience::ForwardMethod;

/// Header carrying the per-request correlation ID.
pub const X_REQUEST_ID: &str = "x-request-id";

/// Forward method for an inbound method, `None` when it is not accepted.
pub fn forward_method(method: &Method) -> Option<ForwardMethod> {
    if method == Method::GET || method == Method::HEAD {
        Some(ForwardMethod::Get)
    } else if method == Method::POST {
        Some(ForwardMethod::Post)
    } else {
        None
    }
}

/// Client address as reported in headers and cache keys.
pub fn client_ip(addr: &SocketAddr) -> String {
    addr.ip().to_string()
}

/// Correlation ID set by the request-id layer, if any.
pub fn request_id(headers: &HeaderMap) -> &str {
    headers
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
}

/// Body to forward for a POST, or `None` when it is not valid JSON.
pub fn json_body(raw: Bytes) -> Option<Bytes> {
    if raw.iter().all(u8::is_ascii_whitespace) {
        return Some(Bytes::from_static(b"{}"));
    }
    serde_json::from_slice::<serde_json::Value>(&raw).ok()?;
    Some(raw)
}
