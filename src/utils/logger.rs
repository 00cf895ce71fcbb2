//! Subscriber setup for the `oatmeal` binary.
//!
//! Everything is written to stderr; stdout carries only the traversal output.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn env_filter(fallback: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback))
}

/// Compact console logs. `verbose` enables the engine's debug events
/// (traversal spans, model resolution, dedup index size).
pub fn init_cli_logger(verbose: bool) {
    let filter = env_filter(if verbose { "oatmeal=debug,info" } else { "oatmeal=info" });

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(verbose)
                .with_file(false)
                .with_line_number(false)
                .compact(),
        )
        .init();
}

/// One JSON object per event, with the enclosing `serialize`/`deserialize`
/// span attached, for piping into a log collector.
pub fn init_json_logger() {
    tracing_subscriber::registry()
        .with(env_filter("oatmeal=info"))
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .json()
                .with_current_span(true)
                .with_span_list(false),
        )
        .init();
}
