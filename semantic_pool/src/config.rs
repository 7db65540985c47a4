//! [`PoolConfig`] and defaults.

use std::num::NonZeroUsize;

use serde::{Deserialize, Serialize};

/// Default name prefix for worker threads.
pub const DEFAULT_THREAD_NAME: &str = "semantic-worker";

/// Configuration for a [`WorkerPool`](crate::WorkerPool).
///
/// All fields have defaults, so a partial serialized config (e.g. `{"workers": 4}`) is valid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Number of worker threads. Zero is treated as one.
    pub workers: usize,
    /// Maximum number of queued (not yet running) tasks. `None` for an unbounded queue.
    ///
    /// When the queue is full, [`WorkerPool::submit`](crate::WorkerPool::submit) fails with
    /// [`PoolError::Saturated`](crate::PoolError::Saturated) instead of blocking.
    pub queue_capacity: Option<usize>,
    /// Name prefix for worker threads, suffixed by the worker index.
    pub thread_name: String,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            workers: available_parallelism(),
            queue_capacity: None,
            thread_name: DEFAULT_THREAD_NAME.to_owned(),
        }
    }
}

impl PoolConfig {
    /// Sets the number of worker threads.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Bounds the task queue to `capacity` pending tasks.
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = Some(capacity);
        self
    }

    /// Sets the worker thread name prefix.
    pub fn with_thread_name(mut self, thread_name: impl Into<String>) -> Self {
        self.thread_name = thread_name.into();
        self
    }

    pub(crate) fn worker_count(&self) -> usize {
        self.workers.max(1)
    }
}

/// Hardware parallelism as reported by the OS, or `1` if unavailable.
pub fn available_parallelism() -> usize {
    std::thread::available_parallelism()
        .map(NonZeroUsize::get)
        .unwrap_or(1)
}
