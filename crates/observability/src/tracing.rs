//! Tracing/logging initialization.
//!
//! JSON lines on stdout, filtered by `RUST_LOG` when set.

use tracing_subscriber::EnvFilter;

/// Default directive when `RUST_LOG` is unset.
pub const DEFAULT_DIRECTIVE: &str = "info";

/// Initialize tracing/logging for the process.
///
/// Safe to call multiple times (subsequent calls are no-ops).
pub fn init() {
    init_with_default(DEFAULT_DIRECTIVE);
}

/// Like [`init`], with a caller-chosen fallback filter (e.g. `"bloodbank_api=debug"`).
pub fn init_with_default(default_directive: &str) {
    let filter = build_filter(std::env::var("RUST_LOG").ok().as_deref(), default_directive);

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .json()
        .with_timer(tracing_subscriber::fmt::time::SystemTime)
        .with_target(false)
        .try_init();
}

fn build_filter(from_env: Option<&str>, default_directive: &str) -> EnvFilter {
    from_env
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .or_else(|| EnvFilter::try_new(default_directive).ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_DIRECTIVE))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_directives_take_precedence() {
        let filter = build_filter(Some("warn"), "debug");
        assert_eq!(filter.to_string(), "warn");
    }

    #[test]
    fn invalid_env_falls_back_to_default() {
        let filter = build_filter(Some("=[not a directive"), "debug");
        assert_eq!(filter.to_string(), "debug");
    }

    #[test]
    fn repeated_init_is_a_no_op() {
        init();
        init_with_default("trace");
    }
}
