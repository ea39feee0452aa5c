//! The running daemon: worker pool plus event loop over a frozen registry.

use std::sync::Arc;

use tracing::info;

use customsh_config::Config;

use crate::dispatch::{DispatchQueue, DispatchSettings, Dispatcher, WorkerPool};
use crate::process::{LaunchError, RunFlag};
use crate::registry::ModuleRegistry;
use crate::transport::{BoundListener, Reactor, ReactorSettings};

const SERVICE_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::service");

/// Workers started and waiting for requests.
#[derive(Debug)]
pub struct Service {
    queue: Arc<DispatchQueue>,
    pool: WorkerPool,
    reactor: ReactorSettings,
}

impl Service {
    /// Starts `config.workers` workers serving `registry`.
    ///
    /// # Errors
    ///
    /// Returns [`LaunchError::Workers`] when a worker thread cannot start.
    pub fn start(config: &Config, registry: Arc<ModuleRegistry>) -> Result<Self, LaunchError> {
        let queue = Arc::new(DispatchQueue::new());
        let dispatcher = Arc::new(Dispatcher::new(
            registry,
            Arc::clone(&queue),
            DispatchSettings::from_config(config),
        ));
        let pool = WorkerPool::spawn(config.workers, &dispatcher)?;
        info!(
            target: SERVICE_TARGET,
            workers = pool.len(),
            "worker pool ready"
        );
        Ok(Self {
            queue,
            pool,
            reactor: ReactorSettings::from_config(config),
        })
    }

    /// Runs the event loop over `listeners` until `run` is stopped, then
    /// drains the queue and joins the workers. Listener socket files are
    /// removed before the workers are joined.
    ///
    /// # Errors
    ///
    /// Returns the event loop's failure in preference to a worker failure.
    pub fn run(self, listeners: Vec<BoundListener>, run: &RunFlag) -> Result<(), LaunchError> {
        let served = Reactor::new(listeners, Arc::clone(&self.queue), self.reactor)
            .and_then(|mut reactor| reactor.run(run));
        let stopped = self.stop();
        served?;
        stopped
    }

    /// Closes the queue and waits for the workers to finish what is queued.
    ///
    /// # Errors
    ///
    /// Returns [`LaunchError::Workers`] when a worker panicked.
    pub fn stop(self) -> Result<(), LaunchError> {
        self.queue.close();
        self.pool.join()?;
        info!(target: SERVICE_TARGET, "shutdown sequence completed");
        Ok(())
    }
}
