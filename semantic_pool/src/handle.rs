//! [`TaskHandle`], the caller's half of a submitted task.

use std::panic;
use std::thread;
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};

use crate::PoolError;

/// Creates a linked completion/handle pair for one task.
pub(crate) fn channel<T>() -> (Completion<T>, TaskHandle<T>) {
    let (sender, receiver) = crossbeam_channel::bounded(1);
    (Completion { sender }, TaskHandle { receiver })
}

/// The worker's half: delivers the task's outcome exactly once.
pub(crate) struct Completion<T> {
    sender: Sender<thread::Result<T>>,
}
impl<T> Completion<T> {
    pub(crate) fn complete(self, result: thread::Result<T>) {
        // The handle may have been dropped, in which case nobody wants the value.
        let _ = self.sender.send(result);
    }
}

/// A handle to the eventual result of a task submitted to a [`WorkerPool`](crate::WorkerPool).
///
/// Dropping the handle detaches the task; it still runs to completion.
#[must_use = "dropping a task handle discards the task's result"]
pub struct TaskHandle<T> {
    receiver: Receiver<thread::Result<T>>,
}

impl<T> TaskHandle<T> {
    /// Blocks until the task finishes and returns its value.
    ///
    /// If the task panicked, the panic is resumed on the calling thread with its original payload.
    pub fn join(self) -> Result<T, PoolError> {
        match self.try_join()? {
            Ok(value) => Ok(value),
            Err(payload) => panic::resume_unwind(payload),
        }
    }

    /// Blocks until the task finishes, returning the panic payload instead of resuming it.
    ///
    /// Mirrors [`std::thread::JoinHandle::join`].
    pub fn try_join(self) -> Result<thread::Result<T>, PoolError> {
        self.receiver.recv().map_err(|_| PoolError::Dropped)
    }

    /// Like [`Self::join`], but gives up after `timeout`.
    ///
    /// The task itself is not interrupted; its result is discarded once it finishes.
    pub fn join_timeout(self, timeout: Duration) -> Result<T, PoolError> {
        match self.receiver.recv_timeout(timeout) {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(payload)) => panic::resume_unwind(payload),
            Err(RecvTimeoutError::Timeout) => Err(PoolError::Timeout(timeout)),
            Err(RecvTimeoutError::Disconnected) => Err(PoolError::Dropped),
        }
    }

    /// Waits up to `timeout` for the task, returning `fallback()` if it did not finish in time
    /// (or was dropped).
    pub fn join_or(self, timeout: Duration, fallback: impl FnOnce() -> T) -> T {
        match self.join_timeout(timeout) {
            Ok(value) => value,
            Err(err) => {
                tracing::debug!(%err, "Task did not complete, using fallback.");
                fallback()
            }
        }
    }

    /// Returns `true` if the task has finished (successfully or by panicking).
    pub fn is_finished(&self) -> bool {
        !self.receiver.is_empty()
    }
}
