//! Client failures and the exit codes they map to.

use std::io;

use customsh_protocol::ProtocolError;
use thiserror::Error;

/// Exit code for a socket that could not be reached.
pub const EXIT_CONNECT: u8 = 3;
/// Exit code for a request that could not be sent.
pub const EXIT_SEND: u8 = 4;
/// Exit code for a reply that could not be read or decoded.
pub const EXIT_RECEIVE: u8 = 5;
/// Exit code for a server that closed the connection without replying.
pub const EXIT_CLOSED: u8 = 6;
/// Exit code for local input or output failures.
pub const EXIT_LOCAL: u8 = 1;

/// Errors raised while exchanging commands with the daemon.
#[derive(Debug, Error)]
pub enum AppError {
    /// The socket address could not be used or connected to.
    #[error("failed to connect to {address}: {source}")]
    Connect {
        /// Address as given on the command line.
        address: String,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// The request frame could not be built or written.
    #[error("failed to send request: {source}")]
    Send {
        /// Underlying framing or IO error.
        #[source]
        source: ProtocolError,
    },
    /// The reply could not be read.
    #[error("failed to receive reply: {source}")]
    Receive {
        /// Underlying framing or IO error.
        #[source]
        source: ProtocolError,
    },
    /// The daemon closed the connection without a reply, which it does for
    /// unknown commands and rejected arguments.
    #[error("server closed the connection without replying")]
    Closed,
    /// Standard input could not be read.
    #[error("failed to read commands from stdin: {source}")]
    Stdin {
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// The reply could not be written to standard output.
    #[error("failed to write reply: {source}")]
    Output {
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
}

impl AppError {
    /// Process exit code for this failure.
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::Connect { .. } => EXIT_CONNECT,
            Self::Send { .. } => EXIT_SEND,
            Self::Receive { .. } => EXIT_RECEIVE,
            Self::Closed => EXIT_CLOSED,
            Self::Stdin { .. } | Self::Output { .. } => EXIT_LOCAL,
        }
    }
}
