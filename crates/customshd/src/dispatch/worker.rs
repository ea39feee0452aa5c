//! Worker threads that resolve, invoke and answer queued requests.

use std::os::fd::AsRawFd;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use customsh_config::Config;
use customsh_protocol::{ProtocolError, Reply};
use tracing::{debug, trace, warn};

use crate::registry::{InvokeError, Module, ModuleRegistry};

use super::{DISPATCH_TARGET, DispatchError, DispatchQueue, Request, WorkerError};

/// Tunables applied to every request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchSettings {
    /// Requeues allowed on contention before the request is dropped.
    pub retry_limit: Option<u32>,
    /// Write timeout applied while sending a reply.
    pub reply_timeout: Option<Duration>,
}

impl DispatchSettings {
    /// Derives the settings from the daemon configuration.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            retry_limit: config.lock_retry_limit(),
            reply_timeout: Some(config.reply_timeout()).filter(|timeout| !timeout.is_zero()),
        }
    }
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// What happened to one dequeued request.
#[derive(Debug)]
pub(crate) enum Outcome {
    /// A reply with this status was written.
    Replied { status: i32 },
    /// The module was busy; the request went back on the queue.
    Requeued { retries: u32 },
    /// The connection was closed without a reply.
    Dropped(DispatchError),
}

/// Shared context for all workers.
#[derive(Debug)]
pub struct Dispatcher {
    registry: Arc<ModuleRegistry>,
    queue: Arc<DispatchQueue>,
    settings: DispatchSettings,
}

impl Dispatcher {
    /// Creates a dispatcher draining `queue` against `registry`.
    #[must_use]
    pub const fn new(
        registry: Arc<ModuleRegistry>,
        queue: Arc<DispatchQueue>,
        settings: DispatchSettings,
    ) -> Self {
        Self {
            registry,
            queue,
            settings,
        }
    }

    /// The queue this dispatcher consumes.
    #[must_use]
    pub const fn queue(&self) -> &Arc<DispatchQueue> {
        &self.queue
    }

    fn run(&self) {
        while let Some(request) = self.queue.pop() {
            let fd = request.as_raw_fd();
            match self.process(request) {
                Outcome::Replied { status } => {
                    debug!(target: DISPATCH_TARGET, fd, status, "reply sent");
                }
                Outcome::Requeued { retries } => {
                    trace!(target: DISPATCH_TARGET, fd, retries, "module busy; request requeued");
                }
                Outcome::Dropped(error) => {
                    warn!(target: DISPATCH_TARGET, fd, error = %error, "request dropped");
                }
            }
        }
        debug!(target: DISPATCH_TARGET, "dispatch queue closed; worker exiting");
    }

    pub(crate) fn process(&self, mut request: Request) -> Outcome {
        let module = match self.resolve(&mut request) {
            Ok(module) => module,
            Err(error) => return Outcome::Dropped(error),
        };

        let mut out = Vec::new();
        let invoked = panic::catch_unwind(AssertUnwindSafe(|| {
            module.invoke(module.remaining(request.command()), &mut out)
        }));
        match invoked {
            Ok(Ok(())) => self.reply(request, &Reply::success(out)),
            Ok(Err(InvokeError::Failed { status, message })) => {
                self.reply(request, &Reply::failure(status, message.into_bytes()))
            }
            Ok(Err(InvokeError::BadArgument)) => {
                Outcome::Dropped(DispatchError::bad_argument(module.prefix()))
            }
            Ok(Err(InvokeError::Locked)) => self.requeue(request, &module),
            Err(_) => Outcome::Dropped(DispatchError::handler_panic(module.prefix())),
        }
    }

    /// Resolves the command once; retries reuse the cached module.
    fn resolve(&self, request: &mut Request) -> Result<Arc<Module>, DispatchError> {
        if let Some(cached) = request.module() {
            return Ok(Arc::clone(cached));
        }
        let resolved = Arc::clone(self.registry.resolve(request.command())?);
        let convention = resolved.convention();
        trace!(
            target: DISPATCH_TARGET,
            prefix = %String::from_utf8_lossy(resolved.prefix()),
            %convention,
            pattern = convention.has_pattern(),
            "command resolved"
        );
        request.remember_module(Arc::clone(&resolved));
        Ok(resolved)
    }

    fn requeue(&self, mut request: Request, module: &Module) -> Outcome {
        if let Some(limit) = self.settings.retry_limit
            && request.retries() >= limit
        {
            return Outcome::Dropped(DispatchError::retry_limit(
                module.prefix(),
                request.retries(),
            ));
        }
        let retries = request.record_retry();
        self.queue.push(request);
        thread::yield_now();
        Outcome::Requeued { retries }
    }

    fn reply(&self, mut request: Request, reply: &Reply) -> Outcome {
        let stream = request.stream_mut();
        if let Err(error) = stream.set_write_timeout(self.settings.reply_timeout) {
            return Outcome::Dropped(DispatchError::Reply(ProtocolError::Io(error)));
        }
        match reply.write_to(stream) {
            Ok(()) => Outcome::Replied {
                status: reply.status,
            },
            Err(error) => Outcome::Dropped(DispatchError::Reply(error)),
        }
    }
}

/// Fixed-size set of worker threads sharing one [`Dispatcher`].
#[derive(Debug)]
pub struct WorkerPool {
    workers: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Starts `count` workers named `customsh-worker-N`.
    ///
    /// # Errors
    ///
    /// Returns [`WorkerError::Spawn`] when a thread cannot be started. The
    /// queue is closed and any workers already running are joined first.
    pub fn spawn(count: usize, dispatcher: &Arc<Dispatcher>) -> Result<Self, WorkerError> {
        let mut pool = Self {
            workers: Vec::with_capacity(count),
        };
        for index in 0..count {
            let worker = Arc::clone(dispatcher);
            let spawned = thread::Builder::new()
                .name(format!("customsh-worker-{index}"))
                .spawn(move || worker.run());
            match spawned {
                Ok(handle) => pool.workers.push(handle),
                Err(source) => {
                    dispatcher.queue().close();
                    if let Err(error) = pool.join() {
                        warn!(target: DISPATCH_TARGET, error = %error, "worker failed during startup");
                    }
                    return Err(WorkerError::Spawn { index, source });
                }
            }
        }
        debug!(target: DISPATCH_TARGET, workers = count, "worker pool started");
        Ok(pool)
    }

    /// Number of running workers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.workers.len()
    }

    /// Returns `true` when the pool has no workers.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }

    /// Waits for every worker to exit. Workers exit once their queue has
    /// been closed and drained.
    ///
    /// # Errors
    ///
    /// Returns [`WorkerError::Panicked`] when any worker panicked.
    pub fn join(self) -> Result<(), WorkerError> {
        let count = self
            .workers
            .into_iter()
            .map(JoinHandle::join)
            .filter(Result::is_err)
            .count();
        if count == 0 {
            Ok(())
        } else {
            Err(WorkerError::Panicked { count })
        }
    }
}
