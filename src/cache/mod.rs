//! Caching subsystem.
//!
//! # Data Flow
//! ```text
//! Inbound request (client, method)
//!     → selection.rs lookup
//!     → hit: reuse the cached node, skip probing
//!     → miss: probe + select, then store the choice
//! ```
//!
//! # Design Decisions
//! - Disabled unless configured; entries live a few seconds at most
//! - In-memory only, gone on restart

pub mod selection;

pub use selection::{CacheEntry, SelectionCache, SelectionKey};
