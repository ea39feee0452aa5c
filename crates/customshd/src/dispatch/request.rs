//! A framed command paired with the connection awaiting its reply.

use std::os::fd::{AsRawFd, RawFd};
use std::os::unix::net::UnixStream;
use std::sync::Arc;

use bytes::Bytes;

use crate::registry::Module;

/// One complete request, owned by exactly one stage of the pipeline.
///
/// The connection closes when the request is dropped, so every path that
/// abandons a request also abandons its client.
#[derive(Debug)]
pub struct Request {
    stream: UnixStream,
    command: Bytes,
    module: Option<Arc<Module>>,
    retries: u32,
}

impl Request {
    /// Pairs a blocking stream with the command read from it.
    #[must_use]
    pub const fn new(stream: UnixStream, command: Bytes) -> Self {
        Self {
            stream,
            command,
            module: None,
            retries: 0,
        }
    }

    /// Command text as received, without any terminator.
    #[must_use]
    pub fn command(&self) -> &[u8] {
        &self.command
    }

    /// Number of times the request has been requeued on contention.
    #[must_use]
    pub const fn retries(&self) -> u32 {
        self.retries
    }

    pub(crate) fn module(&self) -> Option<&Arc<Module>> {
        self.module.as_ref()
    }

    pub(crate) fn remember_module(&mut self, module: Arc<Module>) {
        self.module = Some(module);
    }

    pub(crate) fn record_retry(&mut self) -> u32 {
        self.retries = self.retries.saturating_add(1);
        self.retries
    }

    pub(crate) fn stream_mut(&mut self) -> &mut UnixStream {
        &mut self.stream
    }
}

impl AsRawFd for Request {
    fn as_raw_fd(&self) -> RawFd {
        self.stream.as_raw_fd()
    }
}
