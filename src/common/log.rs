//! Structured logging emitting JSON lines through `tracing`.
//!
//! Call sites attach an `ev` field naming the event plus `code` / `dur_ms`
//! where they apply, so log lines stay greppable by event.

use tracing_subscriber::EnvFilter;

/// Install the global subscriber. `RUST_LOG` wins over `default_level`.
///
/// Returns `false` when a subscriber was already installed (tests, embedding).
pub fn init(default_level: &str) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .json()
        .with_current_span(false)
        .with_target(true)
        .with_env_filter(filter)
        .try_init()
        .is_ok()
}
