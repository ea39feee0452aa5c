//! Reasons a request is dropped without a reply.

use customsh_protocol::ProtocolError;
use thiserror::Error;

use crate::registry::ResolveError;

/// Per-request failures. None of them is reported to the client; the
/// connection is closed instead.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// No registered prefix matched the command.
    #[error(transparent)]
    NotFound(#[from] ResolveError),
    /// The argument did not match the handler's pattern.
    #[error("argument for '{prefix}' rejected by its pattern")]
    BadArgument {
        /// Prefix of the rejecting handler.
        prefix: String,
    },
    /// The handler stayed locked for more retries than allowed.
    #[error("'{prefix}' still locked after {retries} retries")]
    RetryLimit {
        /// Prefix of the contended handler.
        prefix: String,
        /// Retries performed before giving up.
        retries: u32,
    },
    /// The handler panicked.
    #[error("handler for '{prefix}' panicked")]
    HandlerPanic {
        /// Prefix of the failing handler.
        prefix: String,
    },
    /// Writing the reply failed.
    #[error("failed to write reply: {0}")]
    Reply(#[source] ProtocolError),
}

impl DispatchError {
    /// Creates a bad argument error for the handler bound to `prefix`.
    pub fn bad_argument(prefix: &[u8]) -> Self {
        Self::BadArgument {
            prefix: lossy(prefix),
        }
    }

    /// Creates a retry limit error.
    pub fn retry_limit(prefix: &[u8], retries: u32) -> Self {
        Self::RetryLimit {
            prefix: lossy(prefix),
            retries,
        }
    }

    /// Creates a handler panic error.
    pub fn handler_panic(prefix: &[u8]) -> Self {
        Self::HandlerPanic {
            prefix: lossy(prefix),
        }
    }
}

fn lossy(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

/// Failures managing the worker threads.
#[derive(Debug, Error)]
pub enum WorkerError {
    /// The operating system refused to start a worker thread.
    #[error("failed to spawn worker {index}: {source}")]
    Spawn {
        /// Zero-based index of the worker that failed to start.
        index: usize,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },
    /// One or more workers terminated by panicking.
    #[error("{count} worker thread(s) panicked")]
    Panicked {
        /// Number of workers that panicked.
        count: usize,
    },
}
