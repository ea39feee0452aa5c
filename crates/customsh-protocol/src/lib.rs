//! Wire framing shared by the `customshd` daemon and its clients.
//!
//! Every exchange is one request followed by one reply on a fresh stream
//! connection:
//!
//! ```text
//! request:  u32 length | length bytes of command text
//! reply:    i32 status | u32 payload length | payload bytes
//! ```
//!
//! All integers are little-endian. A status of zero signals success; any
//! other value is a handler-specific failure code. Requests that cannot be
//! routed are never answered: the daemon simply closes the connection.
#![expect(
    clippy::little_endian_bytes,
    reason = "the wire format is little-endian on every host"
)]

use std::io::{self, Read, Write};

use thiserror::Error;

/// Size of the length prefix that opens a request frame.
pub const LENGTH_PREFIX_BYTES: usize = 4;

/// Size of the fixed reply header (status plus payload length).
pub const REPLY_HEADER_BYTES: usize = 8;

/// Status reported for a successful handler invocation.
pub const STATUS_OK: i32 = 0;

/// Errors raised while encoding or decoding frames.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The command text does not fit in the 32-bit length prefix.
    #[error("command of {len} bytes exceeds the 32-bit frame limit")]
    CommandTooLarge {
        /// Length of the rejected command.
        len: usize,
    },
    /// The payload does not fit in the 32-bit length field.
    #[error("payload of {len} bytes exceeds the 32-bit frame limit")]
    PayloadTooLarge {
        /// Length of the rejected payload.
        len: usize,
    },
    /// The peer closed the stream before a complete reply header arrived.
    #[error("connection closed before the reply header was complete")]
    Closed,
    /// The peer closed the stream part-way through the payload.
    #[error("reply payload truncated: expected {expected} bytes, received {received}")]
    Truncated {
        /// Declared payload length.
        expected: usize,
        /// Bytes received before end of stream.
        received: usize,
    },
    /// Underlying stream failure.
    #[error("transport error: {0}")]
    Io(#[from] io::Error),
}

/// Encodes a command into a complete request frame.
///
/// # Errors
///
/// Returns [`ProtocolError::CommandTooLarge`] when the command length does
/// not fit in a `u32`.
pub fn encode_request(command: &[u8]) -> Result<Vec<u8>, ProtocolError> {
    let len = u32::try_from(command.len())
        .map_err(|_| ProtocolError::CommandTooLarge { len: command.len() })?;
    let mut frame = Vec::with_capacity(LENGTH_PREFIX_BYTES + command.len());
    frame.extend_from_slice(&len.to_le_bytes());
    frame.extend_from_slice(command);
    Ok(frame)
}

/// Decodes the declared command length from a request header.
#[must_use]
pub const fn read_request_length(header: [u8; LENGTH_PREFIX_BYTES]) -> u32 {
    u32::from_le_bytes(header)
}

/// A reply frame: status code plus payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    /// Zero on success, otherwise a handler-specific failure code.
    pub status: i32,
    /// Bytes produced by the handler.
    pub payload: Vec<u8>,
}

impl Reply {
    /// Builds a successful reply.
    #[must_use]
    pub const fn success(payload: Vec<u8>) -> Self {
        Self {
            status: STATUS_OK,
            payload,
        }
    }

    /// Builds a reply carrying a handler-specific failure code.
    #[must_use]
    pub const fn failure(status: i32, payload: Vec<u8>) -> Self {
        Self { status, payload }
    }

    /// Returns `true` when the status signals success.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.status == STATUS_OK
    }

    /// Serialises the reply into `writer` and flushes it.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::PayloadTooLarge`] when the payload length
    /// does not fit in a `u32`, or [`ProtocolError::Io`] on write failure.
    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<(), ProtocolError> {
        let len = u32::try_from(self.payload.len()).map_err(|_| ProtocolError::PayloadTooLarge {
            len: self.payload.len(),
        })?;
        let mut header = [0_u8; REPLY_HEADER_BYTES];
        let (status_bytes, len_bytes) = header.split_at_mut(4);
        status_bytes.copy_from_slice(&self.status.to_le_bytes());
        len_bytes.copy_from_slice(&len.to_le_bytes());
        writer.write_all(&header)?;
        writer.write_all(&self.payload)?;
        writer.flush()?;
        Ok(())
    }

    /// Reads one reply from `reader`.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::Closed`] when the stream ends before the
    /// header is complete, [`ProtocolError::Truncated`] when it ends inside
    /// the payload, and [`ProtocolError::Io`] for other read failures.
    pub fn read_from<R: Read>(reader: &mut R) -> Result<Self, ProtocolError> {
        let mut status = [0_u8; 4];
        let mut len = [0_u8; 4];
        read_header_field(reader, &mut status)?;
        read_header_field(reader, &mut len)?;
        let expected = u32::from_le_bytes(len) as usize;

        let mut payload = Vec::with_capacity(expected);
        let received = reader.take(expected as u64).read_to_end(&mut payload)?;
        if received < expected {
            return Err(ProtocolError::Truncated { expected, received });
        }
        Ok(Self {
            status: i32::from_le_bytes(status),
            payload,
        })
    }
}

fn read_header_field<R: Read>(reader: &mut R, field: &mut [u8; 4]) -> Result<(), ProtocolError> {
    reader.read_exact(field).map_err(|error| {
        if error.kind() == io::ErrorKind::UnexpectedEof {
            ProtocolError::Closed
        } else {
            ProtocolError::Io(error)
        }
    })
}
