//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events)
//!     → metrics.rs (Prometheus counters, histograms)
//!     → stats.rs (in-process counters served under __stats__)
//! ```
//!
//! # Design Decisions
//! - Request ID flows through the trace layer into every log line
//! - Metrics are cheap and optional; stats are always kept

pub mod logging;
pub mod metrics;
pub mod stats;
