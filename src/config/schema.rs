//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the balancer.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Root configuration for the node balancer.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ProxyConfig {
    /// Listener configuration (bind address, TLS).
    pub listener: ListenerConfig,

    /// Node URLs eligible for forwarding.
    pub nodes: Vec<String>,

    /// Inbound rate limiting.
    pub rate_limit: RateLimitConfig,

    /// Request size limits.
    pub limits: LimitsConfig,

    /// Node health probing.
    pub probe: ProbeConfig,

    /// Forwarding to the chosen node.
    pub forward: ForwardConfig,

    /// Selection cache.
    pub cache: CacheConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Version tag reported in headers and enriched bodies.
    pub version: String,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            listener: ListenerConfig::default(),
            nodes: Vec::new(),
            rate_limit: RateLimitConfig::default(),
            limits: LimitsConfig::default(),
            probe: ProbeConfig::default(),
            forward: ForwardConfig::default(),
            cache: CacheConfig::default(),
            observability: ObservabilityConfig::default(),
            version: "NA".to_string(),
        }
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Optional TLS configuration.
    pub tls: Option<TlsConfig>,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            tls: None,
        }
    }
}

/// TLS configuration for the listener.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TlsConfig {
    /// Path to certificate file (PEM).
    pub cert_path: String,

    /// Path to private key file (PEM).
    pub key_path: String,
}

/// Fixed-window rate limiting configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Enable rate limiting.
    pub enabled: bool,

    /// Window length in milliseconds.
    pub window_ms: u64,

    /// Maximum requests per client within one window.
    pub max_requests: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            window_ms: 60_000,
            max_requests: 600,
        }
    }
}

/// Request size limits.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Maximum inbound body size in bytes.
    pub max_payload_size: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_payload_size: 2 * 1024 * 1024, // 2MB
        }
    }
}

/// Node health probing configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ProbeConfig {
    /// User agent sent to nodes.
    pub user_agent: String,

    /// Nodes reporting a lower blockchain version are never selected.
    pub min_blockchain_version: String,

    /// Maximum tolerated lag behind the highest jussi number seen.
    pub max_jussi_number_diff: i64,

    /// Per-call deadline in milliseconds (probes and forwards).
    pub timeout_ms: u64,

    /// Simultaneous probes allowed per inbound request.
    pub concurrency: usize,

    /// Selection policy name (first, random, max_freshness, latest_version).
    pub strategy: String,

    /// Accept self-signed or otherwise invalid node certificates.
    pub accept_invalid_certs: bool,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/115.0.0.0 Safari/537.36".to_string(),
            min_blockchain_version: "0.23.0".to_string(),
            max_jussi_number_diff: 100,
            timeout_ms: 3000,
            concurrency: 5,
            strategy: "first".to_string(),
            accept_invalid_certs: true,
        }
    }
}

impl ProbeConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Forwarding configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ForwardConfig {
    /// Attempts per forward, including the first one.
    pub retry_count: u32,

    /// Fixed delay between attempts in milliseconds.
    pub retry_delay_ms: u64,

    /// `Cache-Control: max-age` value attached to GET responses.
    pub max_age: Option<u64>,
}

impl Default for ForwardConfig {
    fn default() -> Self {
        Self {
            retry_count: 3,
            retry_delay_ms: 100,
            max_age: None,
        }
    }
}

impl ForwardConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

/// Selection cache configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Reuse the last chosen node per (client, method).
    pub enabled: bool,

    /// Entry lifetime in seconds.
    pub ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            ttl_secs: 3,
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Request bodies longer than this are truncated in logs.
    pub logging_max_body_len: usize,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            logging_max_body_len: 100,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
