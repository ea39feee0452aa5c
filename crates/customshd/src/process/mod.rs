//! Process lifecycle: daemonisation, shutdown signals, namespace switching
//! and the launch sequence that ties them together.

pub(crate) mod daemonizer;
mod errors;
pub(crate) mod launch;
pub(crate) mod namespace;
pub(crate) mod shutdown;

pub use daemonizer::{DaemonizeError, Daemonizer, SystemDaemonizer};
pub use errors::LaunchError;
pub use launch::{
    ConfigLoader, LaunchMode, SystemConfigLoader, bind_listeners, build_registry, run_daemon,
};
pub use namespace::{NETNS_RUN_DIR, NamespaceError, NetNamespace, namespace_path};
pub use shutdown::{RunFlag, ShutdownError, ShutdownSignal, SystemShutdownSignal};

pub(crate) const PROCESS_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::process");
pub(crate) const FOREGROUND_ENV_VAR: &str = "CUSTOMSH_FOREGROUND";
