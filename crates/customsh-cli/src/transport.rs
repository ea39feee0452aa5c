//! One request, one reply, one connection.

use std::io::Write;
use std::os::unix::net::UnixStream;

use customsh_config::UnixAddress;
use customsh_protocol::{ProtocolError, Reply, encode_request};

use crate::errors::AppError;

/// Sends `command` to the daemon at `address` and waits for its reply.
///
/// # Errors
///
/// Returns [`AppError::Closed`] when the daemon hangs up without replying,
/// otherwise the connect, send or receive failure.
pub fn exchange(address: &UnixAddress, command: &[u8]) -> Result<Reply, AppError> {
    let mut stream = address
        .to_socket_addr()
        .and_then(|socket_addr| UnixStream::connect_addr(&socket_addr))
        .map_err(|source| AppError::Connect {
            address: address.to_string(),
            source,
        })?;
    let frame = encode_request(command).map_err(|source| AppError::Send { source })?;
    stream.write_all(&frame).map_err(|source| AppError::Send {
        source: ProtocolError::Io(source),
    })?;
    Reply::read_from(&mut stream).map_err(|error| match error {
        ProtocolError::Closed => AppError::Closed,
        source => AppError::Receive { source },
    })
}
