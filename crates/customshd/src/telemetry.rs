//! Structured logging for the daemon.
//!
//! Events go to standard error, either as one JSON object per line or in the
//! compact human format, filtered by the configured `tracing` directive.
//! Worker thread names are included so contention can be followed per
//! worker.

use std::io::{self, IsTerminal};

use once_cell::sync::OnceCell;
use tracing::subscriber::SetGlobalDefaultError;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::{self, time::UtcTime};

use customsh_config::{Config, LogFormat};

static TELEMETRY: OnceCell<()> = OnceCell::new();

/// Errors encountered while configuring telemetry.
#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    /// The configured filter directive did not parse.
    #[error("invalid log filter '{filter}': {message}")]
    Filter {
        /// Directive as configured.
        filter: String,
        /// Parser diagnostic.
        message: String,
    },
    /// Another global subscriber was installed first.
    #[error("failed to install telemetry subscriber: {0}")]
    Subscriber(#[source] SetGlobalDefaultError),
}

/// Installs the global subscriber on first use; later calls are no-ops.
///
/// # Errors
///
/// Returns [`TelemetryError`] when the filter is invalid or another
/// subscriber already owns the global slot.
pub fn initialise(config: &Config) -> Result<(), TelemetryError> {
    TELEMETRY
        .get_or_try_init(|| install(config.log_filter(), config.log_format()))
        .map(|&()| ())
}

fn install(directive: &str, format: LogFormat) -> Result<(), TelemetryError> {
    let filter = EnvFilter::try_new(directive).map_err(|error| TelemetryError::Filter {
        filter: directive.to_owned(),
        message: error.to_string(),
    })?;
    let builder = fmt::Subscriber::builder()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(true)
        .with_writer(io::stderr)
        .with_ansi(io::stderr().is_terminal())
        .with_timer(UtcTime::rfc_3339());

    match format {
        LogFormat::Json => {
            tracing::subscriber::set_global_default(builder.json().flatten_event(true).finish())
        }
        LogFormat::Compact => tracing::subscriber::set_global_default(builder.compact().finish()),
    }
    .map_err(TelemetryError::Subscriber)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_malformed_filter() {
        let error = install("customshd=notalevel", LogFormat::Compact).expect_err("bad filter");
        assert!(matches!(error, TelemetryError::Filter { .. }));
    }
}
