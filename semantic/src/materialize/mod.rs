//! Materializations and the terminal operations they share.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashSet, LinkedList};
use std::fmt::Display;
use std::hash::Hash;
use std::io;

use semantic_pool::WorkerPool;

use crate::collector::Collector;
use crate::fold::{self, Source};
use crate::{Error, collectors};

mod ordered;
pub use ordered::Ordered;

mod statistics;
pub use statistics::{Frequency, Statistics};

mod unordered;
pub use unordered::Unordered;

mod window;
pub use window::{Window, Windows};

/// One element of an ordered snapshot, tagged with its canonical rank.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Entry<E> {
    pub(crate) rank: usize,
    pub(crate) value: E,
}

/// A materialized stream, ready for terminal operations.
///
/// Every terminal operation is a [`Collector`] run through [`Self::collect`]. With a concurrency
/// of one the fold runs on the calling thread; otherwise it is split into disjoint shards on a
/// worker pool and the shard results are combined in shard order.
pub trait Materialized<E>
where
    E: Clone + Send + Sync + 'static,
{
    /// What terminal operations fold over.
    #[doc(hidden)]
    fn source(&self) -> Source<E>;

    /// How many shards terminal operations are split into.
    fn concurrency(&self) -> usize;

    /// Runs `collector`, using `pool` when the concurrency is above one.
    ///
    /// A shard rejected by the pool is reported as [`Error::Schedule`] without waiting on the
    /// shards already submitted. A panic in any shard is re-raised here.
    fn try_collect_in<A, R>(
        &self,
        pool: &WorkerPool,
        collector: Collector<E, A, R>,
    ) -> Result<R, Error>
    where
        A: Send + 'static,
        R: 'static,
    {
        let source = self.source();
        match self.concurrency() {
            0 | 1 => Ok(fold::run_sequential(&source, &collector)),
            shards => fold::run_sharded(source, shards, pool, collector),
        }
    }

    /// Runs `collector`, using the [default pool](crate::default_pool) when the concurrency is
    /// above one.
    fn try_collect<A, R>(&self, collector: Collector<E, A, R>) -> Result<R, Error>
    where
        A: Send + 'static,
        R: 'static,
    {
        if self.concurrency() <= 1 {
            return Ok(fold::run_sequential(&self.source(), &collector));
        }
        self.try_collect_in(crate::default_pool()?, collector)
    }

    /// Runs `collector`.
    ///
    /// # Panics
    /// If a parallel fold cannot be scheduled on the default pool. Use [`Self::try_collect`] to
    /// handle that instead.
    fn collect<A, R>(&self, collector: Collector<E, A, R>) -> R
    where
        A: Send + 'static,
        R: 'static,
    {
        self.try_collect(collector)
            .unwrap_or_else(|err| panic!("Parallel fold failed: {}.", err))
    }

    /// Number of elements.
    fn count(&self) -> usize {
        self.collect(collectors::count())
    }

    /// `true` if any element satisfies `predicate`.
    fn any_match(&self, predicate: impl Fn(&E) -> bool + Send + Sync + 'static) -> bool {
        self.collect(collectors::any_match(predicate))
    }

    /// `true` if every element satisfies `predicate`, including when there are none.
    fn all_match(&self, predicate: impl Fn(&E) -> bool + Send + Sync + 'static) -> bool {
        self.collect(collectors::all_match(predicate))
    }

    /// `true` if no element satisfies `predicate`.
    fn none_match(&self, predicate: impl Fn(&E) -> bool + Send + Sync + 'static) -> bool {
        self.collect(collectors::none_match(predicate))
    }

    /// The first element, by rank for ordered sources and in production order otherwise.
    fn find_first(&self) -> Option<E> {
        self.collect(collectors::find_first())
    }

    /// Some element, whichever shard finds one first.
    fn find_any(&self) -> Option<E> {
        self.collect(collectors::find_any())
    }

    /// See [`collectors::reduce`].
    fn reduce(&self, reducer: impl Fn(E, E) -> E + Send + Sync + 'static) -> Option<E> {
        self.collect(collectors::reduce(reducer))
    }

    /// See [`collectors::fold`].
    fn fold<A>(
        &self,
        identity: impl Fn() -> A + Send + Sync + 'static,
        accumulator: impl Fn(&mut A, E) + Send + Sync + 'static,
        combiner: impl Fn(A, A) -> A + Send + Sync + 'static,
    ) -> A
    where
        A: Send + 'static,
    {
        self.collect(collectors::fold(identity, accumulator, combiner))
    }

    /// Calls `consumer` with every element. Parallel streams call it from worker threads.
    fn for_each(&self, consumer: impl Fn(E) + Send + Sync + 'static) {
        self.collect(collectors::for_each(consumer))
    }

    /// Collects into a [`Vec`].
    fn to_vector(&self) -> Vec<E> {
        self.collect(collectors::to_vector())
    }

    /// Collects into a [`LinkedList`].
    fn to_list(&self) -> LinkedList<E> {
        self.collect(collectors::to_list())
    }

    /// Collects into a [`BTreeSet`].
    fn to_set(&self) -> BTreeSet<E>
    where
        E: Ord,
    {
        self.collect(collectors::to_set())
    }

    /// Collects into a [`HashSet`].
    fn to_unordered_set(&self) -> HashSet<E>
    where
        E: Hash + Eq,
    {
        self.collect(collectors::to_unordered_set())
    }

    /// See [`collectors::to_map`].
    fn to_map<K, V>(
        &self,
        key: impl Fn(&E) -> K + Send + Sync + 'static,
        value: impl Fn(E) -> V + Send + Sync + 'static,
    ) -> BTreeMap<K, V>
    where
        K: Ord + Send + 'static,
        V: Send + 'static,
    {
        self.collect(collectors::to_map(key, value))
    }

    /// See [`collectors::group`].
    fn group<K>(&self, classifier: impl Fn(&E) -> K + Send + Sync + 'static) -> BTreeMap<K, Vec<E>>
    where
        K: Ord + Send + 'static,
    {
        self.collect(collectors::group(classifier))
    }

    /// See [`collectors::group_by`].
    fn group_by<K, V>(
        &self,
        key: impl Fn(&E) -> K + Send + Sync + 'static,
        value: impl Fn(E) -> V + Send + Sync + 'static,
    ) -> BTreeMap<K, Vec<V>>
    where
        K: Ord + Send + 'static,
        V: Send + 'static,
    {
        self.collect(collectors::group_by(key, value))
    }

    /// See [`collectors::partition`].
    fn partition(&self, size: usize) -> Vec<Vec<E>> {
        self.collect(collectors::partition(size))
    }

    /// See [`collectors::partition_by`].
    fn partition_by(
        &self,
        classifier: impl Fn(&E) -> usize + Send + Sync + 'static,
    ) -> Vec<Vec<E>> {
        self.collect(collectors::partition_by(classifier))
    }

    /// Renders every element separated by `delimiter`.
    fn join(&self, delimiter: &str) -> String
    where
        E: Display,
    {
        self.join_with(delimiter, "", "")
    }

    /// Renders every element separated by `delimiter`, wrapped in `prefix` and `suffix`.
    fn join_with(&self, delimiter: &str, prefix: &str, suffix: &str) -> String
    where
        E: Display,
    {
        self.collect(collectors::join(delimiter, prefix, suffix))
    }

    /// See [`collectors::maximum`].
    fn maximum(
        &self,
        comparator: impl Fn(&E, &E) -> Ordering + Send + Sync + 'static,
    ) -> Option<E> {
        self.collect(collectors::maximum(comparator))
    }

    /// See [`collectors::minimum`].
    fn minimum(
        &self,
        comparator: impl Fn(&E, &E) -> Ordering + Send + Sync + 'static,
    ) -> Option<E> {
        self.collect(collectors::minimum(comparator))
    }

    /// Writes every element to `writer` as `[a,b,c]`.
    fn write_to(&self, writer: &mut impl io::Write) -> io::Result<()>
    where
        E: Display,
    {
        writer.write_all(self.join_with(",", "[", "]").as_bytes())
    }
}
