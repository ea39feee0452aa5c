use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use signal_hook::consts::signal::{SIGHUP, SIGINT, SIGQUIT, SIGTERM};
use thiserror::Error;
use tracing::info;

use super::PROCESS_TARGET;

/// Shared run/stop state observed by the event loop.
///
/// Clones observe the same flag. Stopping is one-way.
#[derive(Debug, Clone, Default)]
pub struct RunFlag {
    stopped: Arc<AtomicBool>,
}

impl RunFlag {
    /// Creates a flag in the running state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` until [`RunFlag::stop`] is called or a registered
    /// signal arrives.
    #[must_use]
    pub fn is_running(&self) -> bool {
        !self.stopped.load(Ordering::SeqCst)
    }

    /// Requests shutdown.
    pub fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }

    fn signal_target(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stopped)
    }
}

/// Abstraction over shutdown notification mechanisms.
pub trait ShutdownSignal: Send + Sync {
    /// Arranges for `flag` to be stopped when shutdown is requested.
    ///
    /// # Errors
    ///
    /// Returns [`ShutdownError`] when the notification cannot be installed.
    fn install(&self, flag: &RunFlag) -> Result<(), ShutdownError>;
}

/// Errors reported by shutdown signal installation.
#[derive(Debug, Error)]
pub enum ShutdownError {
    /// Installing signal handlers failed.
    #[error("failed to install signal handlers: {source}")]
    Install {
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
}

/// Stops the flag on `SIGTERM`, `SIGINT`, `SIGQUIT` or `SIGHUP`.
///
/// The handler only stores to an atomic, which is async-signal-safe.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemShutdownSignal;

impl ShutdownSignal for SystemShutdownSignal {
    fn install(&self, flag: &RunFlag) -> Result<(), ShutdownError> {
        for signal in [SIGTERM, SIGINT, SIGQUIT, SIGHUP] {
            signal_hook::flag::register(signal, flag.signal_target())
                .map_err(|source| ShutdownError::Install { source })?;
        }
        info!(target: PROCESS_TARGET, "shutdown signal handlers installed");
        Ok(())
    }
}
