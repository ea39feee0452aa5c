//! Request hand-off from the event loop to the worker pool.
//!
//! Completed frames become [`Request`]s on the [`DispatchQueue`]. Workers pop
//! them, resolve the command against the registry, invoke the handler and
//! write the reply. A guarded module that is already in use sends the request
//! back to the tail of the queue rather than blocking the worker.

mod errors;
mod queue;
mod request;
mod worker;

pub use self::errors::{DispatchError, WorkerError};
pub use self::queue::DispatchQueue;
pub use self::request::Request;
pub use self::worker::{DispatchSettings, Dispatcher, WorkerPool};

const DISPATCH_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::dispatch");
