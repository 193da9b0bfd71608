//! Bounded hand-off queue between the file writer and its consumers.
//!
//! The writer `put`s each finished file and calls `complete` once when it is
//! done. Consumers `take` until they observe completion. The completion
//! marker stays visible, so every consumer stops, not just the first.

use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::fmt;

use crate::config::{AlignerConfig, DEFAULT_QUEUE_CAPACITY};

/// Returned by [`WorkQueue::put`] after completion, handing the value back.
pub struct QueueClosed<T>(pub T);

impl<T> fmt::Debug for QueueClosed<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("QueueClosed(..)")
    }
}

impl<T> fmt::Display for QueueClosed<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("work queue already completed")
    }
}

impl<T> std::error::Error for QueueClosed<T> {}

#[derive(Debug)]
struct QueueState<T> {
    items: VecDeque<T>,
    completed: bool,
}

/// Fixed-capacity blocking FIFO with a single completion marker.
#[derive(Debug)]
pub struct WorkQueue<T> {
    state: Mutex<QueueState<T>>,
    not_full: Condvar,
    not_empty: Condvar,
    capacity: usize,
}

impl<T> WorkQueue<T> {
    /// Queue holding at most `capacity` items. A capacity of zero is raised
    /// to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            state: Mutex::new(QueueState {
                items: VecDeque::with_capacity(capacity),
                completed: false,
            }),
            not_full: Condvar::new(),
            not_empty: Condvar::new(),
            capacity,
        }
    }

    /// Queue sized by [`AlignerConfig::queue_capacity`].
    pub fn from_config(config: &AlignerConfig) -> Self {
        Self::new(config.queue_capacity)
    }

    /// Enqueue a value, blocking while the queue is full.
    pub fn put(&self, value: T) -> Result<(), QueueClosed<T>> {
        let mut state = self.state.lock();
        while state.items.len() >= self.capacity && !state.completed {
            self.not_full.wait(&mut state);
        }
        if state.completed {
            return Err(QueueClosed(value));
        }
        state.items.push_back(value);
        self.not_empty.notify_one();
        Ok(())
    }

    /// Dequeue a value, blocking while the queue is empty.
    ///
    /// Returns `None` once every value put before completion was taken.
    pub fn take(&self) -> Option<T> {
        let mut state = self.state.lock();
        loop {
            if let Some(value) = state.items.pop_front() {
                self.not_full.notify_one();
                return Some(value);
            }
            if state.completed {
                return None;
            }
            self.not_empty.wait(&mut state);
        }
    }

    /// Dequeue without blocking.
    pub fn try_take(&self) -> Option<T> {
        let mut state = self.state.lock();
        let value = state.items.pop_front();
        if value.is_some() {
            self.not_full.notify_one();
        }
        value
    }

    /// Mark the queue complete. Later calls have no effect.
    pub fn complete(&self) {
        let mut state = self.state.lock();
        if state.completed {
            return;
        }
        state.completed = true;
        self.not_empty.notify_all();
        self.not_full.notify_all();
    }

    /// Whether `complete` was called.
    pub fn is_completed(&self) -> bool {
        self.state.lock().completed
    }

    /// Number of queued values.
    pub fn len(&self) -> usize {
        self.state.lock().items.len()
    }

    /// Whether no value is queued.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Maximum number of queued values.
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl<T> Default for WorkQueue<T> {
    fn default() -> Self {
        Self::new(DEFAULT_QUEUE_CAPACITY)
    }
}
