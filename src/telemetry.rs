//! Logging initialization.
//!
//! Controlled by two environment variables:
//! - `ELM_BENCH_LOG`: an `EnvFilter` directive (e.g. `elm_bench=debug`).
//!   When unset, the `-v` count picks the level: warn, info, debug, trace.
//! - `ELM_BENCH_LOG_FORMAT=json`: JSON lines with span close events instead
//!   of the compact human format.
//!
//! Everything goes to stderr; stdout carries only the report.

use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt as _;
use tracing_subscriber::util::SubscriberInitExt as _;

/// Filter directive variable.
pub const LOG_ENV: &str = "ELM_BENCH_LOG";

/// Output format variable.
pub const LOG_FORMAT_ENV: &str = "ELM_BENCH_LOG_FORMAT";

/// Default level for a given number of `-v` flags.
#[must_use]
pub const fn level_for(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

fn filter(verbosity: u8) -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(level_for(verbosity)))
}

/// Install the global subscriber. Call once, early in `main`.
pub fn init(verbosity: u8) {
    let json = std::env::var(LOG_FORMAT_ENV).is_ok_and(|v| v.eq_ignore_ascii_case("json"));
    let registry = tracing_subscriber::registry().with(filter(verbosity));

    let result = if json {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr)
                    .with_span_events(FmtSpan::CLOSE),
            )
            .try_init()
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .compact()
                    .with_target(false)
                    .with_writer(std::io::stderr),
            )
            .try_init()
    };
    if let Err(e) = result {
        eprintln!("warning: logging already initialized: {e}");
    }
}
