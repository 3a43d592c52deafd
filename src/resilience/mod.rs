//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Call to a node:
//!     → timeouts.rs (deadline per call, body included)
//!     → forwarding only: retries.rs (fixed count, fixed delay)
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every external call has a deadline
//! - Probes never retry; client forwards do
//! - Exhausted retries surface as an error envelope, never a crash

pub mod retries;
pub mod timeouts;

pub use retries::{ForwardMethod, Forwarded, Forwarder, RetryPolicy};
pub use timeouts::{build_client, fetch_with_deadline, Reply};
