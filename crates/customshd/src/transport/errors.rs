//! Error types for listener and connection handling.

use std::io;

use thiserror::Error;

use super::framer::FrameError;

/// Errors surfaced while binding listeners or running the event loop.
#[derive(Debug, Error)]
pub enum ListenerError {
    /// The listener address could not be converted into a socket address.
    #[error("invalid unix socket address {endpoint}: {source}")]
    Address {
        /// Listener as configured.
        endpoint: String,
        /// Underlying conversion error.
        #[source]
        source: io::Error,
    },
    /// The socket directory could not be prepared.
    #[error("failed to prepare socket directory for {endpoint}: {source}")]
    Prepare {
        /// Listener as configured.
        endpoint: String,
        /// Underlying filesystem error.
        #[source]
        source: customsh_config::SocketPreparationError,
    },
    /// Binding the socket failed.
    #[error("failed to bind unix listener at {endpoint}: {source}")]
    BindUnix {
        /// Listener as configured.
        endpoint: String,
        /// Underlying bind error.
        #[source]
        source: io::Error,
    },
    /// Another process is accepting on the socket path.
    #[error("existing unix socket {path} is already in use")]
    UnixInUse {
        /// Socket path.
        path: String,
    },
    /// The path exists but is not a socket.
    #[error("unix socket path {path} is not a socket")]
    UnixNotSocket {
        /// Offending path.
        path: String,
    },
    /// Reading metadata for an existing path failed.
    #[error("failed to read metadata for unix socket {path}: {source}")]
    UnixMetadata {
        /// Socket path.
        path: String,
        /// Underlying filesystem error.
        #[source]
        source: io::Error,
    },
    /// Probing an existing socket failed unexpectedly.
    #[error("failed to connect to existing unix socket {path}: {source}")]
    UnixConnect {
        /// Socket path.
        path: String,
        /// Underlying connect error.
        #[source]
        source: io::Error,
    },
    /// Removing a stale socket file failed.
    #[error("failed to remove stale unix socket {path}: {source}")]
    UnixCleanup {
        /// Socket path.
        path: String,
        /// Underlying filesystem error.
        #[source]
        source: io::Error,
    },
    /// Switching the socket to non-blocking mode failed.
    #[error("failed to enable non-blocking listener: {source}")]
    NonBlocking {
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// Creating the readiness poller failed.
    #[error("failed to create event poller: {source}")]
    Poller {
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// Registering a listener with the poller failed.
    #[error("failed to register listener {endpoint} for readiness: {source}")]
    Register {
        /// Listener as configured.
        endpoint: String,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// Waiting for readiness failed for a reason other than interruption.
    #[error("event wait failed: {source}")]
    Wait {
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
}

/// Reasons a partially-read connection is closed without a reply.
#[derive(Debug, Error)]
pub(crate) enum ConnectionError {
    /// The frame violated the framing rules.
    #[error(transparent)]
    Frame(#[from] FrameError),
    /// Reading from the peer failed.
    #[error("read failed: {0}")]
    Read(#[from] io::Error),
}
