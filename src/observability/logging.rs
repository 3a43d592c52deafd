//! Structured logging.
//!
//! # Responsibilities
//! - Initialize logging subsystem
//! - Keep request bodies in logs short
//!
//! # Design Decisions
//! - Uses tracing crate for structured logging
//! - Log level from config, overridden by `RUST_LOG` when set

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install the global subscriber. Later calls are ignored.
pub fn init(log_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("node_balancer={log_level},tower_http={log_level}").into());

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}

/// Cut `s` to at most `max` characters, marking the cut with `...`.
pub fn truncate_for_log(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &s[..idx]),
        None => s.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_strings_untouched() {
        assert_eq!(truncate_for_log("abc", 3), "abc");
        assert_eq!(truncate_for_log("", 0), "");
    }

    #[test]
    fn long_strings_cut() {
        assert_eq!(truncate_for_log("abcdef", 3), "abc...");
    }

    #[test]
    fn cuts_on_char_boundary() {
        assert_eq!(truncate_for_log("ééé", 2), "éé...");
    }
}
