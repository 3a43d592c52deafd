//! Health checking subsystem.
//!
//! # Data Flow
//! ```text
//! Probe (prober.rs), per node and per request:
//!     version call (POST) ┐
//!                         ├→ both replies OK and well-formed?
//!     freshness call (GET)┘
//!     → version >= floor (version.rs)
//!     → freshness != poison, fold into high-water mark (staleness.rs)
//!     → lag within drift budget
//!     → HealthRecord
//! ```
//!
//! # Design Decisions
//! - A node is healthy only for the request that probed it
//! - Rejections feed the not-chosen, stale and timed-out counters
//! - The high-water mark is shared by all requests for the process lifetime

pub mod prober;
pub mod staleness;
pub mod version;

pub use prober::{HealthRecord, NodeProber};
pub use staleness::SharedStaleness;
