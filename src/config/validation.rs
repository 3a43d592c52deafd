//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate node URLs and value ranges (timeouts > 0, retries > 0)
//! - Resolve the strategy name so unknown policies fail at startup
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ProxyConfig → Result<(), Vec<ValidationError>>

use std::str::FromStr;

use thiserror::Error;
use url::Url;

use crate::config::schema::ProxyConfig;
use crate::error::BalancerError;
use crate::load_balancer::strategy::Strategy;

/// A single semantic problem in the configuration.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("no nodes configured")]
    NoNodes,

    #[error("invalid node address '{address}': {reason}")]
    InvalidNode { address: String, reason: String },

    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },

    #[error("min_blockchain_version '{0}' is not a dotted version")]
    MinVersion(String),

    #[error(transparent)]
    Strategy(BalancerError),
}

pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.nodes.is_empty() {
        errors.push(ValidationError::NoNodes);
    }
    for address in &config.nodes {
        match Url::parse(address) {
            Ok(url) if url.scheme() == "http" || url.scheme() == "https" => {}
            Ok(url) => errors.push(ValidationError::InvalidNode {
                address: address.clone(),
                reason: format!("unsupported scheme '{}'", url.scheme()),
            }),
            Err(e) => errors.push(ValidationError::InvalidNode {
                address: address.clone(),
                reason: e.to_string(),
            }),
        }
    }

    if config.forward.retry_count == 0 {
        errors.push(ValidationError::Zero { field: "forward.retry_count" });
    }
    if config.probe.concurrency == 0 {
        errors.push(ValidationError::Zero { field: "probe.concurrency" });
    }
    if config.probe.timeout_ms == 0 {
        errors.push(ValidationError::Zero { field: "probe.timeout_ms" });
    }
    if config.rate_limit.enabled && config.rate_limit.window_ms == 0 {
        errors.push(ValidationError::Zero { field: "rate_limit.window_ms" });
    }

    let min = &config.probe.min_blockchain_version;
    if min.is_empty() || min.split('.').any(|part| part.parse::<u64>().is_err()) {
        errors.push(ValidationError::MinVersion(min.clone()));
    }

    if let Err(e) = Strategy::from_str(&config.probe.strategy) {
        errors.push(ValidationError::Strategy(e));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> ProxyConfig {
        ProxyConfig {
            nodes: vec!["https://api.example.com".into()],
            ..ProxyConfig::default()
        }
    }

    #[test]
    fn default_with_nodes_is_valid() {
        assert!(validate_config(&valid()).is_ok());
    }

    #[test]
    fn collects_every_error() {
        let mut config = valid();
        config.nodes = vec!["ftp://x.example.com".into(), "not a url".into()];
        config.forward.retry_count = 0;
        config.probe.min_blockchain_version = "0.x".into();
        config.probe.strategy = "fastest".into();

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 5);
    }

    #[test]
    fn empty_pool_rejected() {
        let errors = validate_config(&ProxyConfig::default()).unwrap_err();
        assert!(matches!(errors[0], ValidationError::NoNodes));
    }
}
