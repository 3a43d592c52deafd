//! Retry logic and client-facing forwarding.
//!
//! # Responsibilities
//! - Execute an operation up to a fixed number of attempts
//! - Sleep a fixed delay between attempts
//! - Forward GET/POST requests to the chosen node through the deadline fetcher
//!
//! # Design Decisions
//! - Backoff is fixed, not exponential: the pool is small and the delay short
//! - The last error is propagated unchanged once attempts are exhausted
//! - Only forwarding retries; node probes never do

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use axum::body::Bytes;
use axum::http::StatusCode;
use reqwest::header::{HeaderMap, CONTENT_TYPE, USER_AGENT};
use reqwest::Client;

use crate::config::{ForwardConfig, ProbeConfig};
use crate::error::BalancerResult;
use crate::load_balancer::node::Node;
use crate::observability::logging::truncate_for_log;
use crate::resilience::timeouts::fetch_with_deadline;

/// Fixed-count, fixed-delay retry.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempts including the first one. Zero behaves like one.
    pub attempts: u32,
    /// Delay between consecutive attempts.
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn new(attempts: u32, delay: Duration) -> Self {
        Self { attempts, delay }
    }

    /// Run `op` until it succeeds or the attempts run out.
    pub async fn run<F, Fut, T, E>(&self, target: &str, mut op: F) -> Result<T, E>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        let attempts = self.attempts.max(1);
        let mut attempt = 1;
        loop {
            match op(attempt).await {
                Ok(value) => return Ok(value),
                Err(e) if attempt < attempts => {
                    tracing::info!(target_url = %target, attempt, error = %e, delay = ?self.delay, "Retrying");
                    tokio::time::sleep(self.delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    tracing::warn!(target_url = %target, attempts, error = %e, "Giving up after retries");
                    return Err(e);
                }
            }
        }
    }
}

/// Method used to forward to a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForwardMethod {
    Get,
    Post,
}

/// Status and raw body returned by the node.
#[derive(Debug, Clone)]
pub struct Forwarded {
    pub status: StatusCode,
    pub body: Bytes,
}

/// Forwards client requests to a node with bounded retry.
#[derive(Debug, Clone)]
pub struct Forwarder {
    client: Client,
    user_agent: String,
    timeout: Duration,
    policy: RetryPolicy,
    log_body_len: usize,
}

impl Forwarder {
    pub fn new(client: Client, probe: &ProbeConfig, forward: &ForwardConfig, log_body_len: usize) -> Self {
        Self {
            client,
            user_agent: probe.user_agent.clone(),
            timeout: probe.timeout(),
            policy: RetryPolicy::new(forward.retry_count, forward.retry_delay()),
            log_body_len,
        }
    }

    /// Forward to `node`; `body` is only sent for POST. `extra_headers` go out
    /// on every attempt.
    pub async fn forward(
        &self,
        node: &Node,
        method: ForwardMethod,
        body: Option<Bytes>,
        extra_headers: &HeaderMap,
    ) -> BalancerResult<Forwarded> {
        let url = node.address();
        self.policy
            .run(url, move |attempt| {
                let body = body.clone();
                async move {
                    let mut request = match method {
                        ForwardMethod::Get => {
                            tracing::debug!(node = %url, attempt, "GET: Forwarding");
                            self.client.get(url)
                        }
                        ForwardMethod::Post => {
                            let body = body.unwrap_or_else(|| Bytes::from_static(b"{}"));
                            tracing::debug!(
                                node = %url,
                                attempt,
                                body = %truncate_for_log(&String::from_utf8_lossy(&body), self.log_body_len),
                                "POST: Forwarding"
                            );
                            self.client.post(url).body(body)
                        }
                    };
                    request = request
                        .headers(extra_headers.clone())
                        .header(CONTENT_TYPE, "application/json")
                        .header(USER_AGENT, &self.user_agent);

                    let reply = fetch_with_deadline(url, request, self.timeout).await?;
                    tracing::debug!(node = %url, status = %reply.status, latency = ?reply.latency, "Forward reply");
                    Ok(Forwarded {
                        status: reply.status,
                        body: reply.body,
                    })
                }
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Instant;

    #[tokio::test]
    async fn succeeds_first_time_without_retry() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::new(3, Duration::from_millis(100));
        let start = Instant::now();
        let out: Result<u32, String> = policy
            .run("n", |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok(7) }
            })
            .await;
        assert_eq!(out.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(start.elapsed() < Duration::from_millis(100));
    }

    #[tokio::test]
    async fn retries_count_minus_one_times_then_propagates_last_error() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::new(3, Duration::from_millis(20));
        let start = Instant::now();
        let out: Result<(), String> = policy
            .run("n", |attempt| {
                calls.fetch_add(1, Ordering::SeqCst);
                async move { Err(format!("failure {attempt}")) }
            })
            .await;
        assert_eq!(out.unwrap_err(), "failure 3");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        // two fixed delays between three attempts
        assert!(start.elapsed() >= Duration::from_millis(40));
    }

    #[tokio::test]
    async fn recovers_on_second_attempt() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::new(2, Duration::from_millis(1));
        let out: Result<&str, &str> = policy
            .run("n", |attempt| {
                calls.fetch_add(1, Ordering::SeqCst);
                async move { if attempt == 1 { Err("network error") } else { Ok("OK") } }
            })
            .await;
        assert_eq!(out.unwrap(), "OK");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn zero_attempts_still_tries_once() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::new(0, Duration::from_millis(1));
        let _: Result<(), &str> = policy
            .run("n", |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err("down") }
            })
            .await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
