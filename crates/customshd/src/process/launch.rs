//! Supervises daemon launch sequencing.

use std::env;
use std::sync::Arc;

use ortho_config::{OrthoConfig, OrthoError};
use tracing::{debug, info, warn};

use customsh_config::{Config, ListenerEndpoint};

use crate::modules;
use crate::registry::{ModuleRegistry, RegistryBuilder};
use crate::service::Service;
use crate::telemetry;
use crate::transport::BoundListener;

use super::daemonizer::{Daemonizer, SystemDaemonizer};
use super::errors::LaunchError;
use super::namespace::NetNamespace;
use super::shutdown::{RunFlag, ShutdownSignal, SystemShutdownSignal};
use super::{FOREGROUND_ENV_VAR, PROCESS_TARGET};

/// Launch mode for the daemon.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaunchMode {
    /// Fork into the background and detach from the controlling terminal.
    Background,
    /// Remain attached to the terminal; used for debugging and tests.
    Foreground,
}

impl LaunchMode {
    fn detect() -> Self {
        if env::var_os(FOREGROUND_ENV_VAR).is_some() {
            Self::Foreground
        } else {
            Self::Background
        }
    }
}

/// Trait abstracting configuration loading for testability.
pub trait ConfigLoader: Send + Sync {
    /// Loads the daemon configuration.
    ///
    /// # Errors
    ///
    /// Returns the loader's error when any configuration layer is invalid.
    fn load(&self) -> Result<Config, Arc<OrthoError>>;
}

/// Loader that layers defaults, file, environment and command line.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemConfigLoader;

impl ConfigLoader for SystemConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        Config::load()
    }
}

/// Collaborators required to launch the daemon.
pub(crate) struct LaunchPlan<L, D, S> {
    pub(crate) mode: LaunchMode,
    pub(crate) loader: L,
    pub(crate) daemonizer: D,
    pub(crate) shutdown: S,
    pub(crate) run: RunFlag,
}

/// Runs the daemon using the production collaborators.
///
/// # Errors
///
/// Returns [`LaunchError`] when any startup step fails or the event loop
/// stops abnormally.
pub fn run_daemon() -> Result<(), LaunchError> {
    run_daemon_with(LaunchPlan {
        mode: LaunchMode::detect(),
        loader: SystemConfigLoader,
        daemonizer: SystemDaemonizer,
        shutdown: SystemShutdownSignal,
        run: RunFlag::new(),
    })
}

/// Runs the daemon with injected collaborators.
pub(crate) fn run_daemon_with<L, D, S>(plan: LaunchPlan<L, D, S>) -> Result<(), LaunchError>
where
    L: ConfigLoader,
    D: Daemonizer,
    S: ShutdownSignal,
{
    let LaunchPlan {
        mode,
        loader,
        daemonizer,
        shutdown,
        run,
    } = plan;

    let config = loader.load()?;
    config.validate()?;
    telemetry::initialise(&config)?;
    info!(
        target: PROCESS_TARGET,
        ?mode,
        "starting daemon runtime"
    );
    // Forking is only sound while the process is single-threaded.
    if matches!(mode, LaunchMode::Background) {
        daemonizer.daemonize()?;
    }
    shutdown.install(&run)?;

    let registry = Arc::new(build_registry()?);
    info!(
        target: PROCESS_TARGET,
        modules = registry.len(),
        "module registry finalised"
    );
    for module in registry.modules() {
        debug!(
            target: PROCESS_TARGET,
            prefix = %String::from_utf8_lossy(module.prefix()),
            convention = %module.convention(),
            "module registered"
        );
    }
    let service = Service::start(&config, registry)?;
    let listeners = match bind_listeners(&config.listener_endpoints()) {
        Ok(listeners) => listeners,
        Err(error) => {
            if let Err(stop_error) = service.stop() {
                warn!(target: PROCESS_TARGET, error = %stop_error, "worker shutdown failed");
            }
            return Err(error);
        }
    };
    service.run(listeners, &run)
}

/// Registers every built-in module and freezes the registry.
///
/// # Errors
///
/// Returns [`LaunchError::Registry`] when registration is inconsistent.
pub fn build_registry() -> Result<ModuleRegistry, LaunchError> {
    let mut builder = RegistryBuilder::new();
    modules::register_builtin(&mut builder)?;
    Ok(builder.finalize()?)
}

/// Binds each endpoint, inside its network namespace when one is named.
///
/// An endpoint that fails to bind is logged and skipped as long as at least
/// one other endpoint binds. Namespace failures are always fatal because the
/// calling thread may be left in the wrong namespace.
///
/// # Errors
///
/// Returns [`LaunchError::Namespace`] on a namespace failure and
/// [`LaunchError::Listener`] with the last bind error when nothing bound.
pub fn bind_listeners(endpoints: &[ListenerEndpoint]) -> Result<Vec<BoundListener>, LaunchError> {
    let mut listeners = Vec::with_capacity(endpoints.len());
    let mut last_error = None;
    for endpoint in endpoints {
        let bound = match endpoint.namespace() {
            Some(namespace) => {
                let scope = NetNamespace::enter(namespace)?;
                let bound = BoundListener::bind(endpoint);
                scope.leave()?;
                bound
            }
            None => BoundListener::bind(endpoint),
        };
        match bound {
            Ok(listener) => listeners.push(listener),
            Err(error) => {
                warn!(
                    target: PROCESS_TARGET,
                    endpoint = %endpoint,
                    error = %error,
                    "listener unavailable"
                );
                last_error = Some(error);
            }
        }
    }
    if listeners.is_empty() {
        return Err(last_error.map_or(LaunchError::NoListeners, LaunchError::from));
    }
    Ok(listeners)
}
