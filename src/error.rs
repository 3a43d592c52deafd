//! Error taxonomy for probing, selection and forwarding.

use std::time::Duration;
use thiserror::Error;

/// Errors raised while probing nodes, selecting one and forwarding to it.
#[derive(Debug, Clone, Error)]
pub enum BalancerError {
    /// Outbound call exceeded its deadline and was cancelled.
    #[error("request to {url} timed out after {} ms", .elapsed.as_millis())]
    Timeout { url: String, elapsed: Duration },

    /// Transport failure that is not a timeout (connect refused, reset, TLS).
    #[error("request to {url} failed: {reason}")]
    Network { url: String, reason: String },

    /// Node answered a probe with a non-OK status.
    #[error("server {server} ({probe}) responded with status: {status}")]
    UpstreamStatus {
        server: String,
        probe: &'static str,
        status: u16,
    },

    /// Reply was missing, empty or did not have the expected shape.
    #[error("server {server} returned an invalid {what} response: {detail}")]
    MalformedPayload {
        server: String,
        what: &'static str,
        detail: String,
    },

    /// Node runs a version below the configured floor.
    #[error("server {server} version = {version}: but min version is {minimum}")]
    VersionTooOld {
        server: String,
        version: String,
        minimum: String,
    },

    /// Node reported the poison freshness value.
    #[error("server {server} reported invalid jussi_number value ({freshness})")]
    PoisonedFreshness { server: String, freshness: i64 },

    /// Node lags the high-water mark by more than the drift budget.
    #[error("server {server} is too far behind: jussi_number {freshness} vs latest {high_water} - diff {}", crate::health::staleness::lag(*.high_water, *.freshness))]
    StaleNode {
        server: String,
        freshness: i64,
        high_water: i64,
    },

    /// Every probe failed, nothing left to select from.
    #[error("no valid node found")]
    NoHealthyNode,

    /// Strategy name did not match any known policy.
    #[error("unknown strategy name: {0}")]
    UnknownStrategy(String),

    /// Outbound HTTP client could not be constructed.
    #[error("failed to build HTTP client: {0}")]
    HttpClient(String),

    /// Inbound method is neither GET, HEAD nor POST.
    #[error("method not allowed: {0}")]
    MethodNotAllowed(String),
}

impl BalancerError {
    /// Stale covers both the poison sentinel and excessive lag.
    pub fn is_stale(&self) -> bool {
        matches!(
            self,
            BalancerError::PoisonedFreshness { .. } | BalancerError::StaleNode { .. }
        )
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, BalancerError::Timeout { .. })
    }

    /// Failures that make a reachable node ineligible for selection.
    pub fn is_not_chosen(&self) -> bool {
        matches!(
            self,
            BalancerError::UpstreamStatus { .. }
                | BalancerError::MalformedPayload { .. }
                | BalancerError::VersionTooOld { .. }
        )
    }
}

/// Result type for balancer operations.
pub type BalancerResult<T> = Result<T, BalancerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification_is_disjoint() {
        let timeout = BalancerError::Timeout {
            url: "http://a".into(),
            elapsed: Duration::from_millis(5),
        };
        assert!(timeout.is_timeout());
        assert!(!timeout.is_stale());
        assert!(!timeout.is_not_chosen());

        let stale = BalancerError::StaleNode {
            server: "http://a".into(),
            freshness: 10,
            high_water: 500,
        };
        assert!(stale.is_stale());
        assert!(!stale.is_not_chosen());

        let old = BalancerError::VersionTooOld {
            server: "http://a".into(),
            version: "0.22.0".into(),
            minimum: "0.23.0".into(),
        };
        assert!(old.is_not_chosen());
    }

    #[test]
    fn stale_message_carries_the_gap() {
        let err = BalancerError::StaleNode {
            server: "http://a".into(),
            freshness: 100,
            high_water: 250,
        };
        assert!(err.to_string().ends_with("diff 150"));

        let extreme = BalancerError::StaleNode {
            server: "http://a".into(),
            freshness: i64::MIN,
            high_water: 1_000,
        };
        assert!(extreme.to_string().ends_with("diff 9223372036854776808"));
    }
}
