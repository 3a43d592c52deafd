//! Deadline-bound outbound calls.
//!
//! # Responsibilities
//! - Issue one outbound call and race it against a timer
//! - Read the full reply body inside the same deadline
//! - Report latency on success, elapsed time on timeout
//!
//! # Design Decisions
//! - Uses Tokio's timeout facilities; dropping the losing future cancels the
//!   call and the timer together, on both paths
//! - Timeout errors are distinct from other transport errors

use std::time::{Duration, Instant};

use axum::body::Bytes;
use axum::http::StatusCode;
use reqwest::{Client, RequestBuilder};
use tokio::time;

use crate::config::ProbeConfig;
use crate::error::{BalancerError, BalancerResult};

/// A fully-read reply from a node.
#[derive(Debug, Clone)]
pub struct Reply {
    pub status: StatusCode,
    pub body: Bytes,
    pub latency: Duration,
}

/// Send `request` to `url` and wait at most `deadline` for the complete reply.
pub async fn fetch_with_deadline(
    url: &str,
    request: RequestBuilder,
    deadline: Duration,
) -> BalancerResult<Reply> {
    let start = Instant::now();
    let call = async {
        let response = request.send().await?;
        let status = response.status();
        let body = response.bytes().await?;
        Ok::<_, reqwest::Error>((status, body))
    };

    match time::timeout(deadline, call).await {
        Ok(Ok((status, body))) => Ok(Reply {
            status,
            body,
            latency: start.elapsed(),
        }),
        Ok(Err(e)) if e.is_timeout() => Err(BalancerError::Timeout {
            url: url.to_string(),
            elapsed: start.elapsed(),
        }),
        Ok(Err(e)) => Err(BalancerError::Network {
            url: url.to_string(),
            reason: e.to_string(),
        }),
        Err(_) => Err(BalancerError::Timeout {
            url: url.to_string(),
            elapsed: start.elapsed(),
        }),
    }
}

/// Build the outbound client shared by probes and forwards.
///
/// No client-level timeout: every call is bounded by [`fetch_with_deadline`].
pub fn build_client(config: &ProbeConfig) -> BalancerResult<Client> {
    Client::builder()
        .danger_accept_invalid_certs(config.accept_invalid_certs)
        .user_agent(config.user_agent.as_str())
        .build()
        .map_err(|e| BalancerError::HttpClient(e.to_string()))
}
