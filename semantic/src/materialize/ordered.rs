use std::cmp::Ordering;
use std::fmt::{self, Debug};
use std::sync::Arc;

use crate::fold::Source;
use crate::generator::Generator;
use crate::materialize::{Entry, Materialized, Statistics, Window};
use crate::numeric::Numeric;
use crate::stream::Stream;
use crate::{Timestamp, canonical_rank};

pub(crate) type Tiebreak<E> = Arc<dyn Fn(&E, &E) -> Ordering + Send + Sync>;

/// An eager snapshot of a stream, sorted by canonical rank.
///
/// Built by running the pipeline exactly once. Each element's timestamp is wrapped into
/// `[0, N)` (see [`canonical_rank`](crate::canonical_rank)) where `N` is the number of elements
/// produced. Elements which land on the same rank are all kept, ordered among themselves by a
/// tiebreak on the values (their natural order for [`Stream::to_ordered`]), then by production
/// order. Every terminal operation reads the snapshot; none re-runs the pipeline.
pub struct Ordered<E> {
    entries: Arc<[Entry<E>]>,
    concurrency: usize,
    tiebreak: Tiebreak<E>,
}

impl<E> Clone for Ordered<E> {
    fn clone(&self) -> Self {
        Self {
            entries: Arc::clone(&self.entries),
            concurrency: self.concurrency,
            tiebreak: Arc::clone(&self.tiebreak),
        }
    }
}

impl<E: Debug> Debug for Ordered<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.entries.iter().map(|entry| &entry.value))
            .finish()
    }
}

impl<E> Ordered<E>
where
    E: Clone + Send + Sync + 'static,
{
    pub(crate) fn new(generator: &Generator<E>, concurrency: usize, tiebreak: Tiebreak<E>) -> Self {
        let entries = build_snapshot(generator, &*tiebreak);
        tracing::debug!(population = entries.len(), concurrency, "Built ordered snapshot.");
        Self {
            entries,
            concurrency,
            tiebreak,
        }
    }

    /// Number of elements in the snapshot.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the snapshot is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Elements in rank order.
    pub fn iter(&self) -> impl ExactSizeIterator<Item = &E> {
        self.entries.iter().map(|entry| &entry.value)
    }

    /// `(rank, element)` pairs in rank order. Colliding ranks appear more than once.
    pub fn entries(&self) -> impl ExactSizeIterator<Item = (usize, &E)> {
        self.entries.iter().map(|entry| (entry.rank, &entry.value))
    }

    /// The element at `index` in rank order.
    pub fn get(&self, index: usize) -> Option<&E> {
        self.entries.get(index).map(|entry| &entry.value)
    }

    /// Re-emits the snapshot as a lazy stream, timestamped `0..len` in rank order.
    pub fn stream(&self) -> Stream<E> {
        let entries = Arc::clone(&self.entries);
        let generator = Generator::new(move |push, cancel| {
            for (index, entry) in entries.iter().enumerate() {
                if cancel(&entry.value) {
                    break;
                }
                push(entry.value.clone(), index as Timestamp);
            }
        });
        Stream::new(generator, self.concurrency)
    }

    /// Replaces the snapshot by materializing `stream` with the same tiebreak.
    pub fn reassign(&mut self, stream: Stream<E>) {
        self.entries = build_snapshot(stream.generator(), &*self.tiebreak);
        self.concurrency = stream.concurrency();
        tracing::debug!(population = self.entries.len(), "Reassigned ordered snapshot.");
    }

    /// Views this snapshot as windows.
    pub fn into_window(self) -> Window<E> {
        Window::new(self)
    }

    /// Views this snapshot as a numeric population.
    pub fn into_statistics(self) -> Statistics<E, E>
    where
        E: Numeric,
    {
        Statistics::new(self, Arc::new(|element: &E| *element))
    }

    /// Views this snapshot as the population of `mapper(element)`.
    pub fn into_statistics_by<D: Numeric>(
        self,
        mapper: impl Fn(&E) -> D + Send + Sync + 'static,
    ) -> Statistics<E, D> {
        Statistics::new(self, Arc::new(mapper))
    }

    pub(crate) fn snapshot(&self) -> &[Entry<E>] {
        &self.entries
    }
}

impl<E> Materialized<E> for Ordered<E>
where
    E: Clone + Send + Sync + 'static,
{
    fn source(&self) -> Source<E> {
        Source::from_snapshot(Arc::clone(&self.entries))
    }

    fn concurrency(&self) -> usize {
        self.concurrency
    }

    fn count(&self) -> usize {
        self.len()
    }
}

/// Runs `generator` once and sorts its output by `(canonical rank, tiebreak)`.
fn build_snapshot<E: 'static>(
    generator: &Generator<E>,
    tiebreak: &(dyn Fn(&E, &E) -> Ordering + Send + Sync),
) -> Arc<[Entry<E>]> {
    let mut produced = Vec::new();
    generator.generate(
        &mut |value, timestamp| produced.push((value, timestamp)),
        &|_| false,
    );

    let population = produced.len();
    let mut entries = produced
        .into_iter()
        .map(|(value, timestamp)| Entry {
            rank: canonical_rank(timestamp, population),
            value,
        })
        .collect::<Vec<_>>();
    // Stable, so equal values keep production order.
    entries.sort_by(|a, b| a.rank.cmp(&b.rank).then_with(|| tiebreak(&a.value, &b.value)));
    entries.into()
}
