//! Logging initialization for Chopin.
//!
//! Call [`init_logging`] once at process start, before [`crate::Server::serve`]
//! is invoked. The log level is controlled by the `RUST_LOG` environment
//! variable; it defaults to `info` when unset.
//!
//! ```no_run
//! chopin::logging::init_logging();
//! ```
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Install a `tracing` subscriber with sensible defaults.
///
/// # Panics
///
/// Panics if a global subscriber has already been installed.
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}
