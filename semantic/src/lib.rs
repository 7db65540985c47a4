#![warn(missing_docs)]

//! Lazy, timestamped stream pipelines.
//!
//! A [`Stream`] is an immutable handle over a [`Generator`]: every transformation wraps the
//! previous generator and nothing runs until the stream is materialized. Materialization picks how
//! timestamps are interpreted:
//!
//! * [`Unordered`] folds straight over the generator and ignores timestamps.
//! * [`Ordered`] snapshots every element once, keyed by its [canonical rank](canonical_rank).
//! * [`Window`] and [`Statistics`] are views over an ordered snapshot.
//!
//! Every terminal operation of [`Materialized`] is a [`Collector`], run sequentially or split
//! into disjoint shards on a [`WorkerPool`] depending on the stream's concurrency.
//!
//! ```rust
//! use semantic::Materialized;
//!
//! let reversed = semantic::of([1, 2, 3, 4, 5]).reverse().to_ordered().to_vector();
//! assert_eq!(vec![5, 4, 3, 2, 1], reversed);
//! ```

use std::sync::OnceLock;

pub use semantic_pool::{PoolConfig, PoolError, TaskHandle, WorkerPool};

mod collector;
pub use collector::{CancelScope, Collector};

pub mod collectors;

mod error;
pub use error::Error;

mod factory;
pub use factory::*;

mod fold;
pub use fold::Source;

mod generator;
pub use generator::Generator;

mod materialize;
pub use materialize::{Frequency, Materialized, Ordered, Statistics, Unordered, Window, Windows};

mod numeric;
pub use numeric::Numeric;

mod stream;
pub use stream::Stream;

/// A logical ordering key carried by every element. Not required to be unique, contiguous, or
/// non-negative.
pub type Timestamp = i64;

/// Wraps `timestamp` into `[0, population)`, i.e. `((t mod N) + N) mod N`.
///
/// An empty population has no ranks; `0` is returned.
pub fn canonical_rank(timestamp: Timestamp, population: usize) -> usize {
    if population == 0 {
        return 0;
    }
    // Widened so neither operand can overflow.
    i128::from(timestamp).rem_euclid(population as i128) as usize
}

static DEFAULT_POOL: OnceLock<WorkerPool> = OnceLock::new();

/// Configures the process-wide pool used by parallel terminal operations.
///
/// Must run before the first parallel fold. Returns [`Error::PoolAlreadyInitialized`] if the
/// default pool already exists.
pub fn init_default_pool(config: PoolConfig) -> Result<(), Error> {
    if DEFAULT_POOL.get().is_some() {
        return Err(Error::PoolAlreadyInitialized);
    }
    let pool = WorkerPool::new(config)?;
    DEFAULT_POOL
        .set(pool)
        .map_err(|_duplicate| Error::PoolAlreadyInitialized)?;
    tracing::debug!("Default worker pool configured.");
    Ok(())
}

/// The process-wide pool, created with [`PoolConfig::default`] on first use.
pub fn default_pool() -> Result<&'static WorkerPool, Error> {
    if let Some(pool) = DEFAULT_POOL.get() {
        return Ok(pool);
    }
    let pool = WorkerPool::new(PoolConfig::default())?;
    // Losing a race drops (and shuts down) our pool in favor of the winner's.
    if DEFAULT_POOL.set(pool).is_ok() {
        tracing::debug!("Default worker pool created.");
    }
    Ok(DEFAULT_POOL
        .get()
        .unwrap_or_else(|| unreachable!("default pool was just initialized")))
}
