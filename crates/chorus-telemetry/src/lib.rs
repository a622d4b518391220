//! Logging for chorus
//!
//! Installs a `tracing-subscriber` registry with an env filter and either a
//! human-readable or a JSON formatting layer.

use chorus_config::{LogFormat, TelemetryConfig};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Guard returned by [`init`]; hold it for the lifetime of the application
pub struct TelemetryGuard {
    format: LogFormat,
}

impl TelemetryGuard {
    /// Format the subscriber was installed with
    #[must_use]
    pub const fn format(&self) -> LogFormat {
        self.format
    }
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        tracing::debug!("telemetry shut down");
    }
}

/// Initialize logging from configuration
///
/// `RUST_LOG` takes precedence over the configured filter. An invalid
/// filter falls back to `info`.
///
/// # Errors
///
/// Returns an error if a global subscriber is already installed
pub fn init(config: &TelemetryConfig) -> anyhow::Result<TelemetryGuard> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_filter))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(filter);

    match config.format {
        LogFormat::Json => {
            let fmt_layer = tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(true)
                .with_target(true);

            registry
                .with(fmt_layer)
                .try_init()
                .map_err(|e| anyhow::anyhow!("failed to install log subscriber: {e}"))?;
        }
        LogFormat::Pretty => {
            let fmt_layer = tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_thread_ids(false)
                .with_file(false)
                .with_line_number(false);

            registry
                .with(fmt_layer)
                .try_init()
                .map_err(|e| anyhow::anyhow!("failed to install log subscriber: {e}"))?;
        }
    }

    Ok(TelemetryGuard { format: config.format })
}
