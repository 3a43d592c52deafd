//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → arrival recorded for rolling rates
//!     → rate_limit.rs (per-client fixed window, 429 when full)
//!     → body limit layer (413 above max_payload_size)
//!     → proxy handler
//! ```
//!
//! # Design Decisions
//! - Pre-checks reject before any node is probed
//! - Fail closed: reject on any pre-check failure

pub mod rate_limit;
