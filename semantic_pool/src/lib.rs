#![warn(missing_docs)]

//! A fixed-size worker pool with a FIFO task queue.
//!
//! Tasks are submitted with [`WorkerPool::submit`], which never blocks: a shut down pool or a full
//! bounded queue is reported immediately as a [`PoolError`]. Each submission returns a
//! [`TaskHandle`] which can be joined, optionally with a timeout and fallback.
//!
//! [`WorkerPool::shutdown`] (also run on [`Drop`]) stops accepting work, lets the workers drain
//! everything already queued, then joins the worker threads.

use std::panic::{self, AssertUnwindSafe};
use std::sync::{Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender, TrySendError};

mod config;
pub use config::{DEFAULT_THREAD_NAME, PoolConfig, available_parallelism};

mod handle;
pub use handle::TaskHandle;

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Errors reported by a [`WorkerPool`] or a [`TaskHandle`].
#[derive(Debug, thiserror::Error)]
pub enum PoolError {
    /// The pool no longer accepts work.
    #[error("worker pool has been shut down")]
    Shutdown,
    /// The bounded task queue is full.
    #[error("worker pool queue is full (capacity {capacity})")]
    Saturated {
        /// The configured queue capacity.
        capacity: usize,
    },
    /// A join deadline elapsed before the task finished.
    #[error("task did not finish within {0:?}")]
    Timeout(Duration),
    /// The task was dropped without producing a value.
    #[error("task was dropped before producing a value")]
    Dropped,
    /// A worker thread could not be spawned.
    #[error("failed to spawn worker thread")]
    Spawn(#[from] std::io::Error),
}

/// A bounded set of worker threads consuming a FIFO queue of tasks.
pub struct WorkerPool {
    config: PoolConfig,
    /// `None` once shut down.
    sender: Mutex<Option<Sender<Job>>>,
    /// Kept only to report the queue length.
    receiver: Receiver<Job>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl WorkerPool {
    /// Starts a pool as described by `config`.
    pub fn new(config: PoolConfig) -> Result<Self, PoolError> {
        let (sender, receiver) = match config.queue_capacity {
            Some(capacity) => crossbeam_channel::bounded::<Job>(capacity),
            None => crossbeam_channel::unbounded::<Job>(),
        };

        let workers = (0..config.worker_count())
            .map(|index| {
                let receiver = receiver.clone();
                thread::Builder::new()
                    .name(format!("{}-{}", config.thread_name, index))
                    .spawn(move || run_worker(index, receiver))
            })
            .collect::<Result<Vec<_>, _>>()?;

        tracing::debug!(
            workers = workers.len(),
            queue_capacity = ?config.queue_capacity,
            "Started worker pool."
        );

        Ok(Self {
            config,
            sender: Mutex::new(Some(sender)),
            receiver,
            workers: Mutex::new(workers),
        })
    }

    /// Starts a pool with `workers` threads and otherwise default configuration.
    pub fn with_workers(workers: usize) -> Result<Self, PoolError> {
        Self::new(PoolConfig::default().with_workers(workers))
    }

    /// The configuration this pool was started with.
    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Number of worker threads.
    pub fn workers(&self) -> usize {
        self.config.worker_count()
    }

    /// Number of tasks waiting in the queue (not counting running tasks).
    pub fn queued(&self) -> usize {
        self.receiver.len()
    }

    /// Returns `true` once [`Self::shutdown`] has been called.
    pub fn is_shutdown(&self) -> bool {
        self.sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }

    /// Queues `task` and returns a handle to its result.
    ///
    /// Fails synchronously with [`PoolError::Shutdown`] after shutdown, or with
    /// [`PoolError::Saturated`] when a bounded queue is full.
    pub fn submit<T, F>(&self, task: F) -> Result<TaskHandle<T>, PoolError>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let guard = self.sender.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(sender) = guard.as_ref() else {
            tracing::debug!("Rejected task, pool is shut down.");
            return Err(PoolError::Shutdown);
        };

        let (completion, handle) = handle::channel();
        let job: Job = Box::new(move || {
            completion.complete(panic::catch_unwind(AssertUnwindSafe(task)));
        });

        sender.try_send(job).map_err(|err| match err {
            TrySendError::Full(_) => {
                let capacity = self.config.queue_capacity.unwrap_or_default();
                tracing::debug!(capacity, "Rejected task, queue is full.");
                PoolError::Saturated { capacity }
            }
            TrySendError::Disconnected(_) => PoolError::Shutdown,
        })?;
        Ok(handle)
    }

    /// Stops accepting tasks, waits for all queued tasks to run, then joins the workers.
    ///
    /// Idempotent. Must not be called from one of this pool's own tasks.
    pub fn shutdown(&self) {
        let Some(sender) = self
            .sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        else {
            return;
        };
        tracing::debug!(queued = sender.len(), "Shutting down worker pool.");
        // Workers exit once the queue is empty and disconnected.
        drop(sender);

        let workers = std::mem::take(
            &mut *self
                .workers
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        );
        for worker in workers {
            if worker.join().is_err() {
                tracing::debug!("Worker thread exited by panic.");
            }
        }
        tracing::debug!("Worker pool shut down.");
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run_worker(index: usize, receiver: Receiver<Job>) {
    tracing::trace!(index, "Worker started.");
    // Panics are caught inside each job, so the loop only ends on disconnect.
    for job in receiver.iter() {
        job();
    }
    tracing::trace!(index, "Worker exiting.");
}

#[cfg(test)]
mod test {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[test]
    fn test_submit_join() {
        let pool = WorkerPool::with_workers(2).unwrap();
        let handles = (0..8)
            .map(|i| pool.submit(move || i * i).unwrap())
            .collect::<Vec<_>>();
        let results = handles
            .into_iter()
            .map(|handle| handle.join().unwrap())
            .collect::<Vec<_>>();
        assert_eq!(vec![0, 1, 4, 9, 16, 25, 36, 49], results);
    }

    #[test]
    fn test_shutdown_drains_queue() {
        let pool = WorkerPool::with_workers(1).unwrap();
        let counter = Arc::new(AtomicUsize::new(0));
        for _ in 0..32 {
            let counter = counter.clone();
            let _ = pool.submit(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            });
        }
        pool.shutdown();
        assert_eq!(32, counter.load(Ordering::SeqCst));
        assert!(pool.is_shutdown());
    }

    #[test]
    fn test_submit_after_shutdown() {
        let pool = WorkerPool::with_workers(1).unwrap();
        pool.shutdown();
        pool.shutdown();
        assert!(matches!(pool.submit(|| ()), Err(PoolError::Shutdown)));
    }

    #[test]
    fn test_saturated() {
        let pool = WorkerPool::new(PoolConfig::default().with_workers(1).with_queue_capacity(1))
            .unwrap();
        let (release_send, release_recv) = crossbeam_channel::bounded::<()>(0);
        let (started_send, started_recv) = crossbeam_channel::bounded::<()>(0);

        // Occupy the only worker.
        let blocker = pool
            .submit(move || {
                started_send.send(()).unwrap();
                release_recv.recv().unwrap();
            })
            .unwrap();
        started_recv.recv().unwrap();

        // Fill the single queue slot.
        let queued = pool.submit(|| 1).unwrap();
        assert_eq!(1, pool.queued());

        let err = pool.submit(|| 2).err().unwrap();
        assert!(matches!(err, PoolError::Saturated { capacity: 1 }));

        release_send.send(()).unwrap();
        blocker.join().unwrap();
        assert_eq!(1, queued.join().unwrap());
    }

    #[test]
    fn test_panic_payload() {
        let pool = WorkerPool::with_workers(1).unwrap();
        let handle = pool.submit(|| -> usize { panic!("boom") }).unwrap();
        let payload = handle.try_join().unwrap().unwrap_err();
        assert_eq!(Some(&"boom"), payload.downcast_ref::<&str>());

        // The worker survives.
        assert_eq!(7, pool.submit(|| 7).unwrap().join().unwrap());
    }

    #[test]
    fn test_join_or_fallback() {
        let pool = WorkerPool::with_workers(1).unwrap();
        let (release_send, release_recv) = crossbeam_channel::bounded::<()>(0);
        let handle = pool
            .submit(move || {
                release_recv.recv().unwrap();
                1
            })
            .unwrap();
        assert_eq!(-1, handle.join_or(Duration::from_millis(10), || -1));
        release_send.send(()).unwrap();
    }
}
