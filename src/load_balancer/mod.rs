//! Load balancing subsystem.
//!
//! # Data Flow
//! ```text
//! Inbound request (cache miss)
//!     → node.rs (shuffle the configured pool)
//!     → health prober, one probe per node, bounded per request
//!     → racer.rs (collect survivors, sorted by probe latency)
//!     → strategy.rs (first / random / max_freshness / latest_version)
//!     → chosen HealthRecord, or NoHealthyNode
//! ```
//!
//! # Design Decisions
//! - Health is judged fresh on every request, not by a background loop
//! - Strategy is a closed enum resolved at config load
//! - The probe ceiling is per request, never global

pub mod node;
pub mod racer;
pub mod selector;
pub mod strategy;

pub use node::{Node, NodePool};
pub use selector::{probe_and_select, Selection};
pub use strategy::Strategy;
