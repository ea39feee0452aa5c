//! Detaches the daemon from its controlling terminal.

use std::ffi::OsStr;

use daemonize_me::Daemon;
use thiserror::Error;
use tracing::info;

use super::PROCESS_TARGET;

/// Working directory of the detached process.
const DAEMON_WORK_DIR: &str = "/";

/// Abstraction over daemonisation strategies.
pub trait Daemonizer: Send + Sync {
    /// Detaches the process into the background. Only the child returns.
    ///
    /// # Errors
    ///
    /// Returns [`DaemonizeError`] when the process cannot be detached.
    fn daemonize(&self) -> Result<(), DaemonizeError>;
}

/// Errors surfaced by the daemonisation backend.
#[derive(Debug, Error)]
pub enum DaemonizeError {
    /// System-level daemonisation failed.
    #[error("{0}")]
    System(#[from] daemonize_me::DaemonError),
}

/// Daemoniser that forks, starts a new session and changes to `/`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemDaemonizer;

impl Daemonizer for SystemDaemonizer {
    fn daemonize(&self) -> Result<(), DaemonizeError> {
        info!(
            target: PROCESS_TARGET,
            work_dir = DAEMON_WORK_DIR,
            "daemonising into background"
        );
        Daemon::new()
            .work_dir(DAEMON_WORK_DIR)
            .name(OsStr::new(env!("CARGO_PKG_NAME")))
            .start()?;
        info!(
            target: PROCESS_TARGET,
            pid = std::process::id(),
            "daemon process detached; continuing in child"
        );
        Ok(())
    }
}
