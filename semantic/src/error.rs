use semantic_pool::PoolError;

/// Engine-level faults.
///
/// Panics raised by user callbacks are not represented here: they propagate to the caller of the
/// terminal operation unchanged.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A shard of a parallel fold could not be submitted to the worker pool.
    #[error("failed to schedule shard {shard} of {shards}")]
    Schedule {
        /// Index of the shard which was rejected.
        shard: usize,
        /// Total number of shards in the fold.
        shards: usize,
        /// Why the pool rejected it.
        #[source]
        source: PoolError,
    },
    /// [`crate::init_default_pool`] was called after the default pool already existed.
    #[error("the default worker pool is already initialized")]
    PoolAlreadyInitialized,
    /// The worker pool itself failed.
    #[error(transparent)]
    Pool(#[from] PoolError),
}
