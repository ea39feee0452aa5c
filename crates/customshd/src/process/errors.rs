//! Defines the unified error surface for daemon launch and supervision.

use std::sync::Arc;

use ortho_config::OrthoError;
use thiserror::Error;

use customsh_config::ConfigError;

use crate::dispatch::WorkerError;
use crate::registry::RegistryError;
use crate::telemetry::TelemetryError;
use crate::transport::ListenerError;

use super::daemonizer::DaemonizeError;
use super::namespace::NamespaceError;
use super::shutdown::ShutdownError;

/// Errors surfaced while launching or supervising the daemon process.
#[derive(Debug, Error)]
pub enum LaunchError {
    /// Configuration failed to load.
    #[error("failed to load configuration: {source}")]
    Config {
        /// Underlying loader error.
        #[source]
        source: Arc<OrthoError>,
    },
    /// Configuration loaded but holds unusable values.
    #[error("invalid configuration: {source}")]
    InvalidConfig {
        /// The rejected setting.
        #[source]
        source: ConfigError,
    },
    /// Logging could not be set up.
    #[error("failed to initialise telemetry: {source}")]
    Telemetry {
        /// Underlying telemetry error.
        #[source]
        source: TelemetryError,
    },
    /// Daemonisation failed.
    #[error("failed to daemonise: {source}")]
    Daemonize {
        /// Underlying daemonisation error.
        #[source]
        source: DaemonizeError,
    },
    /// Installing shutdown handling failed.
    #[error("failed to install shutdown handling: {source}")]
    Shutdown {
        /// Underlying shutdown error.
        #[source]
        source: ShutdownError,
    },
    /// Module registration failed.
    #[error("module registration failed: {source}")]
    Registry {
        /// Underlying registry error.
        #[source]
        source: RegistryError,
    },
    /// Switching network namespaces failed.
    #[error("network namespace switch failed: {source}")]
    Namespace {
        /// Underlying namespace error.
        #[source]
        source: NamespaceError,
    },
    /// Listener setup or the event loop failed.
    #[error("daemon socket listener failed: {source}")]
    Listener {
        /// Underlying listener error.
        #[source]
        source: ListenerError,
    },
    /// No listener endpoint was configured.
    #[error("no listener endpoints configured")]
    NoListeners,
    /// Worker threads could not be started or stopped cleanly.
    #[error("worker pool failed: {source}")]
    Workers {
        /// Underlying worker error.
        #[source]
        source: WorkerError,
    },
}

impl From<Arc<OrthoError>> for LaunchError {
    fn from(source: Arc<OrthoError>) -> Self {
        Self::Config { source }
    }
}

impl From<ConfigError> for LaunchError {
    fn from(source: ConfigError) -> Self {
        Self::InvalidConfig { source }
    }
}

impl From<TelemetryError> for LaunchError {
    fn from(source: TelemetryError) -> Self {
        Self::Telemetry { source }
    }
}

impl From<DaemonizeError> for LaunchError {
    fn from(source: DaemonizeError) -> Self {
        Self::Daemonize { source }
    }
}

impl From<ShutdownError> for LaunchError {
    fn from(source: ShutdownError) -> Self {
        Self::Shutdown { source }
    }
}

impl From<RegistryError> for LaunchError {
    fn from(source: RegistryError) -> Self {
        Self::Registry { source }
    }
}

impl From<NamespaceError> for LaunchError {
    fn from(source: NamespaceError) -> Self {
        Self::Namespace { source }
    }
}

impl From<ListenerError> for LaunchError {
    fn from(source: ListenerError) -> Self {
        Self::Listener { source }
    }
}

impl From<WorkerError> for LaunchError {
    fn from(source: WorkerError) -> Self {
        Self::Workers { source }
    }
}
