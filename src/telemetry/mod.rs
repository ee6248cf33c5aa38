//! Logging initialization.
//!
//! Sets up a tracing-subscriber registry with an env filter and a compact
//! fmt layer on stderr. `RUST_LOG` wins over the configured level.

pub mod span;

pub use span::{start_node_span, start_run_span};

use crate::error::{Error, Result};

/// Configuration for telemetry initialization.
pub struct TelemetryConfig {
    /// Filter directive used when `RUST_LOG` is unset (e.g. "info").
    pub log_level: String,
    /// Colored output. Off when logs go to a file or journal.
    pub ansi: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            ansi: true,
        }
    }
}

/// Install the global tracing subscriber.
///
/// # Errors
///
/// Returns an error if the level directive does not parse or a global
/// subscriber was already set.
pub fn init_telemetry(config: TelemetryConfig) -> Result<()> {
    use tracing_subscriber::EnvFilter;
    use tracing_subscriber::layer::SubscriberExt as _;
    use tracing_subscriber::util::SubscriberInitExt as _;

    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.log_level).map_err(|e| {
            Error::Config(format!("bad log level {:?}: {e}", config.log_level))
        })?,
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .compact()
                .with_ansi(config.ansi)
                .with_writer(std::io::stderr),
        )
        .try_init()
        .map_err(|e| Error::Other(format!("failed to init tracing subscriber: {e}")))
}
