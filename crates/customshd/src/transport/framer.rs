//! Incremental request framing for a single connection.

use bytes::{Bytes, BytesMut};
use customsh_protocol::{LENGTH_PREFIX_BYTES, read_request_length};
use thiserror::Error;

/// Framing violations that terminate a connection.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FrameError {
    /// The declared command length exceeds the configured ceiling.
    #[error("declared request length {declared} exceeds the {limit} byte limit")]
    TooLarge { declared: u32, limit: u32 },
}

/// Outcome of feeding bytes into a [`Framer`].
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Progress {
    /// More bytes are needed.
    Incomplete,
    /// The command text of a complete frame.
    Complete(Bytes),
}

/// Accumulates one request frame across arbitrarily fragmented reads.
///
/// The length prefix is decoded once all four header bytes have arrived;
/// bytes beyond the declared frame are ignored.
#[derive(Debug)]
pub(crate) struct Framer {
    buffer: BytesMut,
    frame_len: Option<usize>,
    limit: u32,
}

impl Framer {
    pub(crate) fn new(limit: u32) -> Self {
        Self {
            buffer: BytesMut::with_capacity(LENGTH_PREFIX_BYTES),
            frame_len: None,
            limit,
        }
    }

    pub(crate) fn push(&mut self, chunk: &[u8]) -> Result<Progress, FrameError> {
        self.buffer.extend_from_slice(chunk);
        let frame_len = match self.frame_len {
            Some(frame_len) => frame_len,
            None => match self.decode_header()? {
                Some(frame_len) => frame_len,
                None => return Ok(Progress::Incomplete),
            },
        };
        if self.buffer.len() < frame_len {
            return Ok(Progress::Incomplete);
        }
        let mut frame = self.buffer.split_to(frame_len);
        let command = frame.split_off(LENGTH_PREFIX_BYTES);
        Ok(Progress::Complete(command.freeze()))
    }

    /// Bytes held for the frame in progress.
    pub(crate) fn buffered(&self) -> usize {
        self.buffer.len()
    }

    fn decode_header(&mut self) -> Result<Option<usize>, FrameError> {
        let Some(header) = self
            .buffer
            .get(..LENGTH_PREFIX_BYTES)
            .and_then(|bytes| <[u8; LENGTH_PREFIX_BYTES]>::try_from(bytes).ok())
        else {
            return Ok(None);
        };
        let declared = read_request_length(header);
        if declared > self.limit {
            return Err(FrameError::TooLarge {
                declared,
                limit: self.limit,
            });
        }
        let frame_len = LENGTH_PREFIX_BYTES.saturating_add(declared as usize);
        self.buffer
            .reserve(frame_len.saturating_sub(self.buffer.len()));
        self.frame_len = Some(frame_len);
        Ok(Some(frame_len))
    }
}
