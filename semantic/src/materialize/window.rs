use std::sync::Arc;

use crate::Timestamp;
use crate::fold::Source;
use crate::generator::Generator;
use crate::materialize::{Entry, Materialized, Ordered};
use crate::stream::Stream;

/// An ordered snapshot which can be cut into windows of consecutive canonical ranks.
///
/// Windows are always computed from the snapshot; the pipeline is never re-run.
#[derive(Clone)]
pub struct Window<E> {
    ordered: Ordered<E>,
}

impl<E> Window<E>
where
    E: Clone + Send + Sync + 'static,
{
    pub(crate) fn new(ordered: Ordered<E>) -> Self {
        Self { ordered }
    }

    /// The underlying ordered snapshot.
    pub fn ordered(&self) -> &Ordered<E> {
        &self.ordered
    }

    /// Unwraps the underlying ordered snapshot.
    pub fn into_ordered(self) -> Ordered<E> {
        self.ordered
    }

    /// Non-overlapping windows, each covering ranks `[start, start + size)`.
    ///
    /// Each window starts at the rank of the first element not yet placed in a window, so gaps in
    /// the rank domain are skipped rather than producing empty windows.
    ///
    /// # Panics
    /// If `size` is zero.
    pub fn get_tumbling_windows(&self, size: usize) -> Windows<E> {
        assert!(size > 0, "window size must be positive");
        let entries = self.ordered.snapshot();
        let mut windows = Vec::new();
        let mut next = 0;
        while let Some(first) = entries.get(next) {
            let end = first.rank.saturating_add(size);
            let stop = next + entries[next..].partition_point(|entry| entry.rank < end);
            windows.push(values(&entries[next..stop]));
            next = stop;
        }
        tracing::trace!(size, windows = windows.len(), "Computed tumbling windows.");
        Windows::new(windows, self.ordered.concurrency())
    }

    /// Windows covering ranks `[j * step, j * step + size)` for `j = 0, 1, ...`.
    ///
    /// Windows overlap when `step < size` and skip ranks when `step > size`. The last window is
    /// the first one reaching the end of the rank domain. A window over unoccupied ranks is empty.
    ///
    /// # Panics
    /// If `size` or `step` is zero.
    pub fn get_sliding_windows(&self, size: usize, step: usize) -> Windows<E> {
        assert!(size > 0, "window size must be positive");
        assert!(step > 0, "window step must be positive");
        let entries = self.ordered.snapshot();
        let domain = entries.len();
        let mut windows = Vec::new();
        let mut start = 0_usize;
        while start < domain {
            let end = start.saturating_add(size);
            let lo = entries.partition_point(|entry| entry.rank < start);
            let hi = entries.partition_point(|entry| entry.rank < end);
            windows.push(values(&entries[lo..hi]));
            if end >= domain {
                break;
            }
            start = start.saturating_add(step);
        }
        tracing::trace!(size, step, windows = windows.len(), "Computed sliding windows.");
        Windows::new(windows, self.ordered.concurrency())
    }
}

fn values<E: Clone>(entries: &[Entry<E>]) -> Vec<E> {
    entries.iter().map(|entry| entry.value.clone()).collect()
}

impl<E> Materialized<E> for Window<E>
where
    E: Clone + Send + Sync + 'static,
{
    fn source(&self) -> Source<E> {
        self.ordered.source()
    }

    fn concurrency(&self) -> usize {
        self.ordered.concurrency()
    }

    fn count(&self) -> usize {
        self.ordered.len()
    }
}

/// The windows cut from a [`Window`], in window order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Windows<E> {
    windows: Vec<Vec<E>>,
    concurrency: usize,
}

impl<E> Windows<E> {
    fn new(windows: Vec<Vec<E>>, concurrency: usize) -> Self {
        Self {
            windows,
            concurrency,
        }
    }

    /// Number of windows.
    pub fn len(&self) -> usize {
        self.windows.len()
    }

    /// Returns `true` if there are no windows.
    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }

    /// Each window's elements.
    pub fn iter(&self) -> impl ExactSizeIterator<Item = &[E]> {
        self.windows.iter().map(Vec::as_slice)
    }

    /// The window at `index`.
    pub fn get(&self, index: usize) -> Option<&[E]> {
        self.windows.get(index).map(Vec::as_slice)
    }

    /// Maps each window to a single value.
    pub fn map<T>(&self, f: impl FnMut(&[E]) -> T) -> Vec<T> {
        self.iter().map(f).collect()
    }

    /// Keeps only the windows satisfying `predicate`.
    pub fn filter(mut self, mut predicate: impl FnMut(&[E]) -> bool) -> Self {
        self.windows.retain(|window| predicate(window));
        self
    }

    /// Folds each window separately, starting each from `identity()`.
    pub fn aggregate<A>(&self, identity: impl Fn() -> A, mut f: impl FnMut(A, &E) -> A) -> Vec<A> {
        self.windows
            .iter()
            .map(|window| window.iter().fold(identity(), &mut f))
            .collect()
    }

    /// Unwraps the windows.
    pub fn into_inner(self) -> Vec<Vec<E>> {
        self.windows
    }
}

impl<E> Windows<E>
where
    E: Clone + Send + Sync + 'static,
{
    /// Re-emits every window's elements, window by window, as a stream timestamped from `0`.
    ///
    /// Elements shared by overlapping windows are emitted once per window.
    pub fn stream(&self) -> Stream<E> {
        let windows: Arc<[Vec<E>]> = self.windows.clone().into();
        let generator = Generator::new(move |push, cancel| {
            let elements = windows.iter().flatten();
            for (timestamp, element) in (0 as Timestamp..).zip(elements) {
                if cancel(element) {
                    break;
                }
                push(element.clone(), timestamp);
            }
        });
        Stream::new(generator, self.concurrency)
    }
}

impl<E> IntoIterator for Windows<E> {
    type Item = Vec<E>;
    type IntoIter = std::vec::IntoIter<Vec<E>>;

    fn into_iter(self) -> Self::IntoIter {
        self.windows.into_iter()
    }
}
