//! The `customshd` command-dispatch daemon.
//!
//! Clients connect to a Unix stream socket, send one length-prefixed
//! command and receive one reply. The daemon routes each command to the
//! handler registered under the longest matching prefix:
//!
//! 1. [`transport`] accepts connections on every configured listener and
//!    reassembles request frames on a single edge-triggered event loop.
//! 2. Completed requests are queued for a fixed pool of workers
//!    ([`dispatch`]).
//! 3. Workers resolve the command in the frozen [`registry`] and invoke the
//!    handler. Guarded handlers hold their module's lock for the duration of
//!    the call; a worker that finds it taken requeues the request instead of
//!    waiting.
//!
//! Unknown commands and rejected arguments get no reply: the connection is
//! simply closed.
//!
//! ```no_run
//! use customshd::registry::{Args, HandlerResult, RegistryBuilder};
//!
//! # fn main() -> Result<(), customshd::registry::RegistryError> {
//! let mut builder = RegistryBuilder::new();
//! builder.unguarded(()).bind("ping", |_: &(), _: &Args<'_>, out: &mut Vec<u8>| -> HandlerResult {
//!     out.extend_from_slice(b"pong");
//!     Ok(())
//! });
//! let registry = builder.finalize()?;
//! assert!(registry.resolve(b"ping").is_ok());
//! # Ok(())
//! # }
//! ```

pub mod dispatch;
pub mod modules;
mod process;
pub mod registry;
mod service;
pub mod subprocess;
mod telemetry;
pub mod transport;

pub use process::{
    ConfigLoader, DaemonizeError, Daemonizer, LaunchError, LaunchMode, NETNS_RUN_DIR,
    NamespaceError, NetNamespace, RunFlag, ShutdownError, ShutdownSignal, SystemConfigLoader,
    SystemDaemonizer, SystemShutdownSignal, bind_listeners, build_registry, namespace_path,
    run_daemon,
};
pub use service::Service;
pub use telemetry::{TelemetryError, initialise as initialise_telemetry};

#[cfg(test)]
mod tests;
