//! Diagnostic logging to stderr.

use tracing_subscriber::EnvFilter;

/// Overrides the filter, e.g. `EXPERT_MODE_LOG=expert_mode=trace`.
pub const LOG_ENV: &str = "EXPERT_MODE_LOG";

pub fn default_directive(verbose: bool) -> &'static str {
    if verbose {
        "expert_mode=debug"
    } else {
        "expert_mode=warn"
    }
}

/// Installs the global subscriber. Calling it twice is harmless.
pub fn init(verbose: bool) {
    let filter = EnvFilter::try_from_env(LOG_ENV)
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbose)));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
