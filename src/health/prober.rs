//! Per-request node health probing.
//!
//! # Responsibilities
//! - Ask a node for its software version and its jussi freshness number,
//!   concurrently and under the per-call deadline
//! - Reject nodes that are unreachable, malformed, too old or lagging
//! - Fold every accepted freshness number into the shared high-water mark
//! - Count each rejection under the matching operational counter
//!
//! # Design Decisions
//! - No internal retry: the breadth of the pool supplies redundancy
//! - Both calls are awaited even if one fails early
//! - Non-timeout transport failures are not counted, only logged

use std::sync::Arc;
use std::time::{Duration, Instant};

use reqwest::header::{CONTENT_TYPE, USER_AGENT};
use reqwest::Client;
use serde_json::{json, Value};

use crate::config::ProbeConfig;
use crate::error::{BalancerError, BalancerResult};
use crate::health::staleness::{lag, SharedStaleness, POISON_FRESHNESS};
use crate::health::version::compare_version;
use crate::load_balancer::node::Node;
use crate::observability::metrics;
use crate::observability::stats::{Counter, StatsAggregator};
use crate::resilience::timeouts::{fetch_with_deadline, Reply};

/// Outcome of a successful probe.
#[derive(Debug, Clone, PartialEq)]
pub struct HealthRecord {
    /// Node address.
    pub server: String,
    /// Raw JSON-RPC reply to the version call.
    pub version: Value,
    /// `result.blockchain_version` extracted from `version`.
    pub blockchain_version: String,
    /// Reported jussi number.
    pub freshness: i64,
    pub latency: Duration,
}

/// JSON-RPC envelope asking a node for its version.
pub fn version_request() -> Value {
    json!({
        "id": 0,
        "jsonrpc": "2.0",
        "method": "call",
        "params": ["login_api", "get_version", []],
    })
}

pub struct NodeProber {
    client: Client,
    config: ProbeConfig,
    staleness: Arc<SharedStaleness>,
    stats: Arc<StatsAggregator>,
}

impl NodeProber {
    pub fn new(
        client: Client,
        config: ProbeConfig,
        staleness: Arc<SharedStaleness>,
        stats: Arc<StatsAggregator>,
    ) -> Self {
        Self {
            client,
            config,
            staleness,
            stats,
        }
    }

    pub fn staleness(&self) -> &SharedStaleness {
        &self.staleness
    }

    /// Probe `node` once and classify the outcome.
    pub async fn probe(&self, node: &Node) -> BalancerResult<HealthRecord> {
        let result = self.check(node).await;
        match &result {
            Ok(record) => {
                tracing::debug!(
                    node = %node,
                    version = %record.blockchain_version,
                    jussi_number = record.freshness,
                    latency = ?record.latency,
                    "Tested OK"
                );
                metrics::record_probe(node.address(), "ok");
            }
            Err(e) => {
                let outcome = if e.is_timeout() {
                    self.stats.increment(Counter::TimedOut, node.address());
                    "timeout"
                } else if e.is_stale() {
                    self.stats.increment(Counter::Stale, node.address());
                    "stale"
                } else if e.is_not_chosen() {
                    self.stats.increment(Counter::NotChosen, node.address());
                    "not_chosen"
                } else {
                    "error"
                };
                tracing::warn!(node = %node, outcome, error = %e, "Probe rejected node");
                metrics::record_probe(node.address(), outcome);
            }
        }
        result
    }

    async fn check(&self, node: &Node) -> BalancerResult<HealthRecord> {
        let url = node.address();
        let start = Instant::now();
        let deadline = self.config.timeout();

        let version_call = self
            .client
            .post(url)
            .header(CONTENT_TYPE, "application/json")
            .header(USER_AGENT, &self.config.user_agent)
            .json(&version_request());
        let freshness_call = self
            .client
            .get(url)
            .header(CONTENT_TYPE, "application/json")
            .header(USER_AGENT, &self.config.user_agent);

        let (version_reply, freshness_reply) = tokio::join!(
            fetch_with_deadline(url, version_call, deadline),
            fetch_with_deadline(url, freshness_call, deadline),
        );
        let version_reply = version_reply?;
        let freshness_reply = freshness_reply?;

        ensure_ok(url, "version", &version_reply)?;
        ensure_ok(url, "jussi_number", &freshness_reply)?;

        let (version, blockchain_version) = parse_version(url, &version_reply.body)?;
        if compare_version(&blockchain_version, &self.config.min_blockchain_version).is_lt() {
            return Err(BalancerError::VersionTooOld {
                server: url.to_string(),
                version: blockchain_version,
                minimum: self.config.min_blockchain_version.clone(),
            });
        }

        let freshness = parse_freshness(url, &freshness_reply.body)?;
        if freshness == POISON_FRESHNESS {
            return Err(BalancerError::PoisonedFreshness {
                server: url.to_string(),
                freshness,
            });
        }

        let high_water = self.staleness.observe(freshness);
        if lag(high_water, freshness) > i128::from(self.config.max_jussi_number_diff) {
            return Err(BalancerError::StaleNode {
                server: url.to_string(),
                freshness,
                high_water,
            });
        }

        Ok(HealthRecord {
            server: url.to_string(),
            version,
            blockchain_version,
            freshness,
            latency: start.elapsed(),
        })
    }
}

fn ensure_ok(url: &str, probe: &'static str, reply: &Reply) -> BalancerResult<()> {
    if reply.status.is_success() {
        Ok(())
    } else {
        Err(BalancerError::UpstreamStatus {
            server: url.to_string(),
            probe,
            status: reply.status.as_u16(),
        })
    }
}

fn is_empty_object(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::Object(map)) => map.is_empty(),
        Some(_) => false,
    }
}

/// Returns the whole reply and the `result.blockchain_version` string.
pub fn parse_version(url: &str, body: &[u8]) -> BalancerResult<(Value, String)> {
    let malformed = |detail: String| BalancerError::MalformedPayload {
        server: url.to_string(),
        what: "version",
        detail,
    };

    let reply: Value = serde_json::from_slice(body).map_err(|e| malformed(e.to_string()))?;
    if is_empty_object(Some(&reply)) || is_empty_object(reply.get("result")) {
        return Err(malformed(reply.to_string()));
    }
    let version = reply
        .pointer("/result/blockchain_version")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| malformed(reply.to_string()))?;
    Ok((reply, version))
}

/// Extracts `jussi_num` from a `{status: "OK", jussi_num: N}` reply.
pub fn parse_freshness(url: &str, body: &[u8]) -> BalancerResult<i64> {
    let malformed = |detail: String| BalancerError::MalformedPayload {
        server: url.to_string(),
        what: "jussi",
        detail,
    };

    let reply: Value = serde_json::from_slice(body).map_err(|e| malformed(e.to_string()))?;
    if is_empty_object(Some(&reply)) {
        return Err(malformed(reply.to_string()));
    }
    if reply.get("status").and_then(Value::as_str) != Some("OK") {
        return Err(malformed(format!("status != \"OK\": {}", reply)));
    }
    reply
        .get("jussi_num")
        .and_then(Value::as_i64)
        .ok_or_else(|| malformed(reply.to_string()))
}
