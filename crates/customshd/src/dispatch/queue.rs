//! Blocking multi-producer, multi-consumer request queue.

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

use super::Request;

#[derive(Debug, Default)]
struct QueueState {
    pending: VecDeque<Request>,
    closed: bool,
}

/// FIFO hand-off between the event loop and the worker pool.
///
/// [`DispatchQueue::pop`] blocks while the queue is empty. Once closed, the
/// queue still yields every request already pushed and then returns `None`
/// to each waiting consumer.
#[derive(Debug, Default)]
pub struct DispatchQueue {
    state: Mutex<QueueState>,
    available: Condvar,
}

impl DispatchQueue {
    /// Creates an open, empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `request` and wakes one consumer. Requests pushed after
    /// [`DispatchQueue::close`] are dropped, closing their connections.
    pub fn push(&self, request: Request) {
        let mut state = self.lock();
        if state.closed {
            return;
        }
        state.pending.push_back(request);
        drop(state);
        self.available.notify_one();
    }

    /// Removes the oldest request, waiting until one is available.
    ///
    /// Returns `None` once the queue is closed and drained.
    pub fn pop(&self) -> Option<Request> {
        let mut state = self.lock();
        loop {
            if let Some(request) = state.pending.pop_front() {
                return Some(request);
            }
            if state.closed {
                return None;
            }
            state = self
                .available
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Stops accepting requests and wakes every consumer.
    pub fn close(&self) {
        self.lock().closed = true;
        self.available.notify_all();
    }

    /// Number of requests waiting for a worker.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().pending.len()
    }

    /// Returns `true` when no request is waiting.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
