//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Startup
//!     → tls.rs (both PEM files present?)
//!         yes → HTTPS listener via axum-server
//!         no  → warning, plain TCP listener
//!     → Hand off to HTTP layer
//! ```
//!
//! # Design Decisions
//! - TLS is optional and decided once at startup
//! - Missing certificates degrade to HTTP instead of refusing to start

pub mod tls;
