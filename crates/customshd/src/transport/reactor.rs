//! Edge-triggered readiness loop that accepts connections and frames
//! requests.
//!
//! A single thread owns every listener and every connection still being
//! read. Each connection is registered under a token derived from its file
//! descriptor. Once a frame completes, the connection is removed from the
//! poller, switched back to blocking mode and handed to the dispatch queue
//! together with its command; the loop never touches it again.
//!
//! Listeners are edge-triggered too, so an accept that fails for a reason
//! other than `WouldBlock` (descriptor exhaustion, for one) would leave any
//! queued connections unannounced. Such a listener is marked stalled and its
//! accept loop is retried after the next readiness wait, new edge or not.

use std::collections::{HashMap, HashSet};
use std::io::{self, Read};
use std::os::fd::{AsRawFd, RawFd};
use std::os::unix::net::UnixStream;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use customsh_config::Config;
use mio::unix::SourceFd;
use mio::{Events, Interest, Poll, Token};
use tracing::{debug, info, trace, warn};

use crate::dispatch::{DispatchQueue, Request};
use crate::process::RunFlag;

use super::errors::ConnectionError;
use super::framer::{Framer, Progress};
use super::{BoundListener, LISTENER_TARGET, ListenerError};

const EVENT_CAPACITY: usize = 128;
const READ_CHUNK_BYTES: usize = 512;

/// Event loop tunables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReactorSettings {
    /// Upper bound on one readiness wait, and so on shutdown latency.
    pub poll_interval: Duration,
    /// Largest command length a client may declare.
    pub max_request_bytes: u32,
}

impl ReactorSettings {
    /// Derives the settings from the daemon configuration.
    #[must_use]
    pub const fn from_config(config: &Config) -> Self {
        Self {
            poll_interval: config.poll_interval(),
            max_request_bytes: config.max_request_bytes,
        }
    }
}

#[derive(Debug)]
struct Connection {
    stream: UnixStream,
    framer: Framer,
}

enum Drained {
    Pending,
    Complete(Bytes),
    Closed,
}

impl Connection {
    /// Reads until the socket would block, the peer closes, or a frame
    /// completes. Edge-triggered readiness is not repeated for data that
    /// was left unread.
    fn drain(&mut self) -> Result<Drained, ConnectionError> {
        let mut chunk = [0_u8; READ_CHUNK_BYTES];
        loop {
            match self.stream.read(&mut chunk) {
                Ok(0) => return Ok(Drained::Closed),
                Ok(read) => {
                    let bytes = chunk.get(..read).unwrap_or_default();
                    if let Progress::Complete(command) = self.framer.push(bytes)? {
                        return Ok(Drained::Complete(command));
                    }
                }
                Err(error) if error.kind() == io::ErrorKind::WouldBlock => {
                    return Ok(Drained::Pending);
                }
                Err(error) if error.kind() == io::ErrorKind::Interrupted => {}
                Err(error) => return Err(error.into()),
            }
        }
    }
}

/// Accepts connections on every listener and frames their requests.
#[derive(Debug)]
pub struct Reactor {
    poll: Poll,
    listeners: HashMap<Token, BoundListener>,
    connections: HashMap<Token, Connection>,
    stalled: HashSet<Token>,
    queue: Arc<DispatchQueue>,
    settings: ReactorSettings,
}

impl Reactor {
    /// Registers `listeners` for readiness. Completed requests are pushed
    /// onto `queue`.
    ///
    /// # Errors
    ///
    /// Returns [`ListenerError`] when the poller cannot be created or a
    /// listener cannot be registered.
    pub fn new(
        listeners: Vec<BoundListener>,
        queue: Arc<DispatchQueue>,
        settings: ReactorSettings,
    ) -> Result<Self, ListenerError> {
        let poll = Poll::new().map_err(|source| ListenerError::Poller { source })?;
        let mut registered = HashMap::with_capacity(listeners.len());
        for listener in listeners {
            let fd = listener.as_raw_fd();
            let registration = token_for(fd)
                .ok_or_else(|| io::Error::from(io::ErrorKind::InvalidInput))
                .and_then(|token| {
                    poll.registry()
                        .register(&mut SourceFd(&fd), token, Interest::READABLE)
                        .map(|()| token)
                });
            match registration {
                Ok(token) => {
                    registered.insert(token, listener);
                }
                Err(source) => {
                    return Err(ListenerError::Register {
                        endpoint: listener.endpoint().to_string(),
                        source,
                    });
                }
            }
        }
        Ok(Self {
            poll,
            listeners: registered,
            connections: HashMap::new(),
            stalled: HashSet::new(),
            queue,
            settings,
        })
    }

    /// Number of accepted connections whose request is still incomplete.
    #[must_use]
    pub fn pending_connections(&self) -> usize {
        self.connections.len()
    }

    /// Runs until `run` is stopped. The flag is checked at least once per
    /// poll interval.
    ///
    /// # Errors
    ///
    /// Returns [`ListenerError::Wait`] when waiting for readiness fails for
    /// any reason other than signal interruption.
    pub fn run(&mut self, run: &RunFlag) -> Result<(), ListenerError> {
        let mut events = Events::with_capacity(EVENT_CAPACITY);
        info!(
            target: LISTENER_TARGET,
            listeners = self.listeners.len(),
            "event loop running"
        );
        while run.is_running() {
            self.turn(&mut events)?;
        }
        info!(
            target: LISTENER_TARGET,
            abandoned = self.pending_connections(),
            "event loop stopped"
        );
        Ok(())
    }

    /// One readiness wait followed by servicing whatever it reported, then
    /// a retry of every listener that stalled before the wait.
    fn turn(&mut self, events: &mut Events) -> Result<(), ListenerError> {
        let retry: Vec<Token> = self.stalled.drain().collect();
        match self.poll.poll(events, Some(self.settings.poll_interval)) {
            Ok(()) => {}
            Err(source) if source.kind() == io::ErrorKind::Interrupted => events.clear(),
            Err(source) => return Err(ListenerError::Wait { source }),
        }
        for event in events.iter() {
            let token = event.token();
            if self.listeners.contains_key(&token) {
                self.accept_all(token);
            } else {
                self.service(token, event.is_error());
            }
        }
        for token in retry {
            self.accept_all(token);
        }
        Ok(())
    }

    fn accept_all(&mut self, token: Token) {
        loop {
            let accepted = match self.listeners.get(&token) {
                Some(listener) => listener.accept(),
                None => return,
            };
            match accepted {
                Ok(stream) => self.track(stream),
                Err(error) if error.kind() == io::ErrorKind::WouldBlock => return,
                Err(error) if error.kind() == io::ErrorKind::Interrupted => {}
                Err(error) => {
                    warn!(
                        target: LISTENER_TARGET,
                        error = %error,
                        "socket accept error, retrying after the next wait"
                    );
                    self.stalled.insert(token);
                    return;
                }
            }
        }
    }

    fn track(&mut self, stream: UnixStream) {
        let fd = stream.as_raw_fd();
        let Some(token) = token_for(fd) else {
            return;
        };
        let registered = stream.set_nonblocking(true).and_then(|()| {
            self.poll
                .registry()
                .register(&mut SourceFd(&fd), token, Interest::READABLE)
        });
        if let Err(error) = registered {
            warn!(
                target: LISTENER_TARGET,
                fd,
                error = %error,
                "failed to watch accepted connection"
            );
            return;
        }
        trace!(target: LISTENER_TARGET, fd, "connection accepted");
        let framer = Framer::new(self.settings.max_request_bytes);
        self.connections
            .insert(token, Connection { stream, framer });
    }

    fn service(&mut self, token: Token, errored: bool) {
        let Some(mut connection) = self.connections.remove(&token) else {
            return;
        };
        let fd = connection.stream.as_raw_fd();
        if errored {
            debug!(target: LISTENER_TARGET, fd, "connection error reported");
            self.discard(&connection);
            return;
        }
        match connection.drain() {
            Ok(Drained::Pending) => {
                self.connections.insert(token, connection);
            }
            Ok(Drained::Complete(command)) => self.hand_off(connection, command),
            Ok(Drained::Closed) => {
                debug!(
                    target: LISTENER_TARGET,
                    fd,
                    buffered = connection.framer.buffered(),
                    "peer closed before completing a request"
                );
                self.discard(&connection);
            }
            Err(error) => {
                debug!(
                    target: LISTENER_TARGET,
                    fd,
                    error = %error,
                    "closing connection"
                );
                self.discard(&connection);
            }
        }
    }

    fn hand_off(&self, connection: Connection, command: Bytes) {
        let fd = connection.stream.as_raw_fd();
        let detached = self
            .poll
            .registry()
            .deregister(&mut SourceFd(&fd))
            .and_then(|()| connection.stream.set_nonblocking(false));
        if let Err(error) = detached {
            warn!(
                target: LISTENER_TARGET,
                fd,
                error = %error,
                "failed to detach completed connection"
            );
            return;
        }
        debug!(
            target: LISTENER_TARGET,
            fd,
            len = command.len(),
            "request framed"
        );
        self.queue.push(Request::new(connection.stream, command));
    }

    fn discard(&self, connection: &Connection) {
        let fd = connection.stream.as_raw_fd();
        if let Err(error) = self.poll.registry().deregister(&mut SourceFd(&fd)) {
            trace!(target: LISTENER_TARGET, fd, error = %error, "deregister failed");
        }
    }
}

fn token_for(fd: RawFd) -> Option<Token> {
    usize::try_from(fd).ok().map(Token)
}
