//! Sequential and sharded execution of a [`Collector`] over a [`Source`].

use std::cell::Cell;
use std::ops::Range;
use std::panic;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use semantic_pool::{PoolError, WorkerPool};

use crate::collector::{CancelScope, Collector};
use crate::generator::Generator;
use crate::materialize::Entry;
use crate::Error;

/// What a materialization folds over: either a live generator or an ordered snapshot.
///
/// Cheap to clone; both variants are reference counted.
pub struct Source<E> {
    kind: SourceKind<E>,
}

enum SourceKind<E> {
    /// Sharded by stride over the running production position.
    Generator(Generator<E>),
    /// Sharded by contiguous index ranges.
    Snapshot(Arc<[Entry<E>]>),
}

impl<E> Clone for Source<E> {
    fn clone(&self) -> Self {
        let kind = match &self.kind {
            SourceKind::Generator(generator) => SourceKind::Generator(generator.clone()),
            SourceKind::Snapshot(entries) => SourceKind::Snapshot(Arc::clone(entries)),
        };
        Self { kind }
    }
}

/// One partition of a sharded fold: shard `index` of `count`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Shard {
    pub(crate) index: usize,
    pub(crate) count: usize,
}

impl Shard {
    pub(crate) const WHOLE: Self = Self { index: 0, count: 1 };

    /// Returns `true` if the element at production `position` belongs to this shard.
    fn owns(&self, position: usize) -> bool {
        position % self.count == self.index
    }

    /// This shard's contiguous slice of `0..len`.
    fn range(&self, len: usize) -> Range<usize> {
        (self.index * len / self.count)..((self.index + 1) * len / self.count)
    }
}

/// Stop state shared between all shards of one fold.
struct Signal {
    stop: AtomicBool,
    /// Lowest fold position at which any shard interrupted with [`CancelScope::Earliest`].
    earliest: AtomicUsize,
}

impl Signal {
    fn new() -> Self {
        Self {
            stop: AtomicBool::new(false),
            earliest: AtomicUsize::new(usize::MAX),
        }
    }

    fn stop(&self) {
        self.stop.store(true, Ordering::Relaxed);
    }
}

/// Stop state for a single shard, backed by the [`Signal`] shared between all shards.
struct Halt<'a> {
    local: Cell<bool>,
    signal: &'a Signal,
}

impl<'a> Halt<'a> {
    fn new(signal: &'a Signal) -> Self {
        Self {
            local: Cell::new(false),
            signal,
        }
    }

    /// Returns `true` if nothing at fold `position` or later can change the result.
    fn is_set(&self, position: usize) -> bool {
        self.local.get()
            || self.signal.stop.load(Ordering::Relaxed)
            || position > self.signal.earliest.load(Ordering::Relaxed)
    }

    fn raise(&self, scope: CancelScope, position: usize) {
        self.local.set(true);
        match scope {
            CancelScope::Global => self.signal.stop(),
            CancelScope::Earliest => {
                self.signal.earliest.fetch_min(position, Ordering::Relaxed);
            }
        }
    }
}

/// A single accumulator being threaded through one shard.
struct Folding<'a, E, A, R> {
    collector: &'a Collector<E, A, R>,
    halt: &'a Halt<'a>,
    accumulator: A,
}

impl<'a, E, A, R> Folding<'a, E, A, R> {
    fn new(collector: &'a Collector<E, A, R>, halt: &'a Halt<'a>) -> Self {
        Self {
            collector,
            halt,
            accumulator: collector.identity(),
        }
    }

    fn offer(&mut self, element: E, position: usize) {
        if self.halt.is_set(position) {
            return;
        }
        self.collector
            .accumulate(&mut self.accumulator, element, position);
        if self.collector.interrupted(&self.accumulator) {
            self.halt.raise(self.collector.cancel_scope(), position);
        }
    }

    fn into_accumulator(self) -> A {
        self.accumulator
    }
}

impl<E> Source<E> {
    pub(crate) fn from_generator(generator: Generator<E>) -> Self {
        Self {
            kind: SourceKind::Generator(generator),
        }
    }

    pub(crate) fn from_snapshot(entries: Arc<[Entry<E>]>) -> Self {
        Self {
            kind: SourceKind::Snapshot(entries),
        }
    }

    fn kind_name(&self) -> &'static str {
        match &self.kind {
            SourceKind::Generator(_) => "generator",
            SourceKind::Snapshot(_) => "snapshot",
        }
    }

    /// Upper bound on useful shards: a snapshot never needs more shards than entries.
    fn max_shards(&self, requested: usize) -> usize {
        match &self.kind {
            SourceKind::Generator(_) => requested,
            SourceKind::Snapshot(entries) => requested.min(entries.len()).max(1),
        }
    }
}

impl<E: Clone + 'static> Source<E> {
    /// Folds every element owned by `shard`, stopping early once interrupted or once `signal`
    /// shows another shard has decided the result.
    fn fold_shard<A, R>(&self, shard: Shard, collector: &Collector<E, A, R>, signal: &Signal) -> A {
        let halt = Halt::new(signal);
        let mut folding = Folding::new(collector, &halt);
        match &self.kind {
            SourceKind::Generator(generator) => {
                let position = Cell::new(0_usize);
                generator.generate_with(
                    &mut |element, _| {
                        let current = position.replace(position.get() + 1);
                        if shard.owns(current) {
                            folding.offer(element, current);
                        }
                    },
                    &|_| false,
                    &|| halt.is_set(position.get()),
                );
            }
            SourceKind::Snapshot(entries) => {
                let range = shard.range(entries.len());
                for (index, entry) in range.clone().zip(&entries[range]) {
                    if halt.is_set(index) {
                        break;
                    }
                    folding.offer(entry.value.clone(), index);
                }
            }
        }
        folding.into_accumulator()
    }
}

/// Runs `collector` over the whole source on the calling thread.
pub(crate) fn run_sequential<E, A, R>(source: &Source<E>, collector: &Collector<E, A, R>) -> R
where
    E: Clone + 'static,
{
    let signal = Signal::new();
    let accumulator = source.fold_shard(Shard::WHOLE, collector, &signal);
    collector.finish(accumulator)
}

/// Runs `collector` as `shards` disjoint shards on `pool`, combining the partials in shard order.
///
/// A rejected submission is returned immediately as [`Error::Schedule`]. If any shard panics, the
/// remaining shards are signalled to stop, all partials are discarded, and the first panic is
/// resumed on the calling thread.
pub(crate) fn run_sharded<E, A, R>(
    source: Source<E>,
    shards: usize,
    pool: &WorkerPool,
    collector: Collector<E, A, R>,
) -> Result<R, Error>
where
    E: Clone + Send + Sync + 'static,
    A: Send + 'static,
    R: 'static,
{
    let shards = source.max_shards(shards);
    tracing::debug!(shards, source = source.kind_name(), "Dispatching sharded fold.");

    let collector = Arc::new(collector);
    let signal = Arc::new(Signal::new());

    let mut handles = Vec::with_capacity(shards);
    for index in 0..shards {
        let shard = Shard {
            index,
            count: shards,
        };
        let task = {
            let source = source.clone();
            let collector = Arc::clone(&collector);
            let signal = Arc::clone(&signal);
            move || source.fold_shard(shard, collector.as_ref(), signal.as_ref())
        };
        match pool.submit(task) {
            Ok(handle) => handles.push(handle),
            Err(source) => {
                // Already-running shards have nothing to report to.
                signal.stop();
                tracing::debug!(shard = index, shards, %source, "Shard rejected by worker pool.");
                return Err(Error::Schedule {
                    shard: index,
                    shards,
                    source,
                });
            }
        }
    }

    let mut combined: Option<A> = None;
    let mut fault: Option<Fault> = None;
    for (index, handle) in handles.into_iter().enumerate() {
        match handle.try_join() {
            Ok(Ok(partial)) => {
                tracing::trace!(shard = index, "Shard completed.");
                if fault.is_none() {
                    combined = Some(match combined.take() {
                        Some(accumulator) => collector.combine(accumulator, partial),
                        None => partial,
                    });
                }
            }
            Ok(Err(payload)) => {
                signal.stop();
                tracing::debug!(shard = index, "Shard panicked.");
                if fault.is_none() {
                    fault = Some(Fault::Panic(payload));
                }
            }
            Err(err) => {
                signal.stop();
                tracing::debug!(shard = index, %err, "Shard lost.");
                if fault.is_none() {
                    fault = Some(Fault::Pool(err));
                }
            }
        }
    }

    match fault {
        Some(Fault::Panic(payload)) => panic::resume_unwind(payload),
        Some(Fault::Pool(err)) => Err(err.into()),
        None => {
            let accumulator = combined.unwrap_or_else(|| collector.identity());
            Ok(collector.finish(accumulator))
        }
    }
}

enum Fault {
    Panic(Box<dyn std::any::Any + Send>),
    Pool(PoolError),
}
