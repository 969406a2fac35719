//! Tracing subscriber setup.
//!
//! The engine logs through `tracing` macros only; hosts that want output call
//! [`init_tracing`] once at startup. The filter is read from `REMENDAR_LOG`
//! (same syntax as `RUST_LOG`) and falls back to the supplied directive.

use tracing::Subscriber;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::EnvFilter;

/// Environment variable holding the log filter
pub const LOG_ENV_VAR: &str = "REMENDAR_LOG";

/// Build the filter from `REMENDAR_LOG`, or `default_directive` when unset or invalid
#[must_use]
pub fn env_filter(default_directive: &str) -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV_VAR).unwrap_or_else(|_| EnvFilter::new(default_directive))
}

/// Install a stderr fmt subscriber.
///
/// Returns `false` when a global subscriber was already installed, which
/// happens routinely when several tests in one binary call this.
pub fn init_tracing(default_directive: &str) -> bool {
    tracing::subscriber::set_global_default(build_subscriber(env_filter(default_directive))).is_ok()
}

fn build_subscriber(filter: EnvFilter) -> impl Subscriber + Send + Sync + 'static {
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_span_events(FmtSpan::CLOSE)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish()
}
