//! Diagnostic tracing for simulation runs.
//!
//! Tracing goes to stderr and is controlled by `RUST_LOG`. Run artifacts
//! (`report.json`, `world.json`) are written separately by `io::report` and
//! are unaffected by the filter.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Default filter when `RUST_LOG` is unset.
pub const DEFAULT_FILTER: &str = "marketsim=info,warn";

/// Install the global subscriber: env filter plus compact stderr output.
///
/// ```bash
/// RUST_LOG=marketsim=debug marketsim run --seed 7
/// ```
pub fn init() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .init();
}
