//! Tracing subscriber configuration for routing nodes.
//!
//! Log levels follow these conventions:
//! - ERROR: Unrecoverable failures
//! - WARN: Recoverable errors, suppressed or malformed traffic
//! - INFO: Lifecycle events (interfaces up, shutdown)
//! - DEBUG: Route table changes, discovery progress
//! - TRACE: Wire-level frames and drop decisions

use tracing_subscriber::EnvFilter;

/// `RUST_LOG` wins when set; otherwise the configured level applies.
fn filter(env_directives: Option<String>, default_level: &str) -> EnvFilter {
    match env_directives {
        Some(directives) => EnvFilter::new(directives),
        None => EnvFilter::new(default_level),
    }
}

fn filter_from_env(default_level: &str) -> EnvFilter {
    filter(std::env::var(EnvFilter::DEFAULT_ENV).ok(), default_level)
}

/// Initialize the tracing subscriber with sensible defaults.
///
/// Log level can be controlled via the `RUST_LOG` environment variable;
/// the configured `[logging] level` applies when it is not set.
pub fn init(default_level: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(filter_from_env(default_level))
        .init();
}

/// Initialize the tracing subscriber with JSON output.
///
/// Useful for structured logging in containerized environments.
/// Activated by setting `RUST_LOG_FORMAT=json`.
pub fn init_json(default_level: &str) {
    tracing_subscriber::fmt()
        .json()
        .with_env_filter(filter_from_env(default_level))
        .init();
}

/// Initialize the tracing subscriber for tests.
///
/// Uses `try_init` to avoid panicking if called multiple times.
pub fn init_for_tests() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter_from_env("debug"))
        .with_test_writer()
        .try_init();
}
