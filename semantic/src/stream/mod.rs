//! The [`Stream`] handle and its lazy transformations.

use std::cell::Cell;
use std::cmp::Ordering;
use std::hash::Hash;
use std::sync::Arc;

use rand::SeedableRng;
use rand::rngs::SmallRng;
use rand::seq::SliceRandom;
use rustc_hash::FxHashSet;

use crate::Timestamp;
use crate::generator::Generator;
use crate::materialize::{Ordered, Statistics, Unordered, Window};
use crate::numeric::Numeric;

mod relay;
use relay::relay;

/// An immutable handle over a [`Generator`] and a concurrency level.
///
/// Transformations never run anything: each returns a new handle whose generator wraps this one's,
/// keeping the same concurrency. Handles are cheap to clone and many may branch from one ancestor.
/// Work happens only once a handle is materialized ([`Self::to_unordered`], [`Self::to_ordered`],
/// ...).
///
/// Transformations which assign timestamps only matter to ordered materializations; an
/// [`Unordered`] materialization ignores them.
pub struct Stream<E> {
    generator: Generator<E>,
    concurrency: usize,
}

impl<E> Clone for Stream<E> {
    fn clone(&self) -> Self {
        Self {
            generator: self.generator.clone(),
            concurrency: self.concurrency,
        }
    }
}

impl<E> std::fmt::Debug for Stream<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stream")
            .field("concurrency", &self.concurrency)
            .finish_non_exhaustive()
    }
}

impl<E: 'static> From<Generator<E>> for Stream<E> {
    fn from(generator: Generator<E>) -> Self {
        Self::new(generator, 1)
    }
}

impl<E> FromIterator<E> for Stream<E>
where
    E: Clone + Send + Sync + 'static,
{
    fn from_iter<I: IntoIterator<Item = E>>(iter: I) -> Self {
        crate::of(iter)
    }
}

impl<E: 'static> Stream<E> {
    pub(crate) fn new(generator: Generator<E>, concurrency: usize) -> Self {
        Self {
            generator,
            concurrency,
        }
    }

    /// The generator behind this handle.
    pub fn generator(&self) -> &Generator<E> {
        &self.generator
    }

    /// How many shards terminal operations will be split into.
    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Sets the concurrency to the available hardware parallelism.
    pub fn parallel(self) -> Self {
        self.parallel_with(semantic_pool::available_parallelism())
    }

    /// Sets the concurrency to `concurrency`, at least one.
    pub fn parallel_with(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Sets the concurrency to one.
    pub fn sequential(self) -> Self {
        self.parallel_with(1)
    }

    /// Wraps `generator` in a handle with this handle's concurrency.
    fn chain<T: 'static>(&self, generator: Generator<T>) -> Stream<T> {
        Stream::new(generator, self.concurrency)
    }

    /// Applies `mapper` to each element. Timestamps are kept.
    pub fn map<T: 'static>(self, mapper: impl Fn(E) -> T + Send + Sync + 'static) -> Stream<T> {
        let parent = self.generator.clone();
        self.chain(Generator::staged(move |push, cancel, halted| {
            relay(&parent, push, cancel, halted, |element, timestamp, out| {
                out.emit(mapper(element), timestamp)
            });
        }))
    }

    /// Keeps elements satisfying `predicate`. Timestamps are kept.
    pub fn filter(self, predicate: impl Fn(&E) -> bool + Send + Sync + 'static) -> Self {
        let parent = self.generator.clone();
        self.chain(Generator::staged(move |push, cancel, halted| {
            relay(&parent, push, cancel, halted, |element, timestamp, out| {
                if predicate(&element) {
                    out.emit(element, timestamp);
                }
            });
        }))
    }

    /// Replaces each element with every item of `mapper(element)`.
    ///
    /// Items are timestamped by their position in the flattened output.
    pub fn flat_map<T, I>(self, mapper: impl Fn(E) -> I + Send + Sync + 'static) -> Stream<T>
    where
        T: 'static,
        I: IntoIterator<Item = T>,
    {
        let parent = self.generator.clone();
        self.chain(Generator::staged(move |push, cancel, halted| {
            let mut position: Timestamp = 0;
            relay(&parent, push, cancel, halted, |element, _, out| {
                for item in mapper(element) {
                    if out.is_halted() {
                        break;
                    }
                    out.emit(item, position);
                    position += 1;
                }
            });
        }))
    }

    /// Drops the first `n` elements and shifts the timestamps of the rest down by `n`.
    pub fn skip(self, n: usize) -> Self {
        let shift = Timestamp::try_from(n).unwrap_or(Timestamp::MAX);
        let parent = self.generator.clone();
        self.chain(Generator::staged(move |push, cancel, halted| {
            let mut skipped = 0;
            relay(&parent, push, cancel, halted, |element, timestamp, out| {
                if skipped < n {
                    skipped += 1;
                } else {
                    out.emit(element, timestamp.wrapping_sub(shift));
                }
            });
        }))
    }

    /// Keeps at most the first `n` elements, then stops the source.
    pub fn limit(self, n: usize) -> Self {
        let parent = self.generator.clone();
        self.chain(Generator::staged(move |push, cancel, halted| {
            if 0 == n {
                return;
            }
            let mut taken = 0;
            relay(&parent, push, cancel, halted, |element, timestamp, out| {
                out.emit(element, timestamp);
                taken += 1;
                if taken >= n {
                    out.halt();
                }
            });
        }))
    }

    /// Keeps elements while `predicate` holds, stopping the source at the first one that fails.
    pub fn take_while(self, predicate: impl Fn(&E) -> bool + Send + Sync + 'static) -> Self {
        let parent = self.generator.clone();
        self.chain(Generator::staged(move |push, cancel, halted| {
            relay(&parent, push, cancel, halted, |element, timestamp, out| {
                if predicate(&element) {
                    out.emit(element, timestamp);
                } else {
                    out.halt();
                }
            });
        }))
    }

    /// Drops elements while `predicate` holds, then keeps everything after.
    pub fn drop_while(self, predicate: impl Fn(&E) -> bool + Send + Sync + 'static) -> Self {
        let parent = self.generator.clone();
        self.chain(Generator::staged(move |push, cancel, halted| {
            let mut dropping = true;
            relay(&parent, push, cancel, halted, |element, timestamp, out| {
                if dropping && predicate(&element) {
                    return;
                }
                dropping = false;
                out.emit(element, timestamp);
            });
        }))
    }

    /// Drops elements equal to an earlier one. The seen set lives for one traversal.
    pub fn distinct(self) -> Self
    where
        E: Hash + Eq + Clone,
    {
        self.distinct_by(E::clone)
    }

    /// Drops elements whose `key` equals an earlier element's.
    pub fn distinct_by<K>(self, key: impl Fn(&E) -> K + Send + Sync + 'static) -> Self
    where
        K: Hash + Eq,
    {
        let parent = self.generator.clone();
        self.chain(Generator::staged(move |push, cancel, halted| {
            let mut seen = FxHashSet::default();
            relay(&parent, push, cancel, halted, |element, timestamp, out| {
                if seen.insert(key(&element)) {
                    out.emit(element, timestamp);
                }
            });
        }))
    }

    /// Replaces each timestamp with `redirector(element, timestamp)`.
    pub fn redirect(
        self,
        redirector: impl Fn(&E, Timestamp) -> Timestamp + Send + Sync + 'static,
    ) -> Self {
        let parent = self.generator.clone();
        self.chain(Generator::staged(move |push, cancel, halted| {
            relay(&parent, push, cancel, halted, |element, timestamp, out| {
                let timestamp = redirector(&element, timestamp);
                out.emit(element, timestamp);
            });
        }))
    }

    /// Adds `offset` to every timestamp, wrapping on overflow.
    pub fn translate(self, offset: Timestamp) -> Self {
        self.redirect(move |_, timestamp| timestamp.wrapping_add(offset))
    }

    /// Maps each timestamp `t` to `-t - 1`, reversing the order of a `0..N` domain once ordered.
    pub fn reverse(self) -> Self {
        self.redirect(|_, timestamp| !timestamp)
    }

    /// Buffers the whole source, then emits it in a random order timestamped `0..`.
    ///
    /// Each traversal draws a fresh permutation. Never terminates on an infinite source.
    pub fn shuffle(self) -> Self {
        let parent = self.generator.clone();
        self.chain(Generator::staged(move |push, cancel, halted| {
            let mut buffer = drain(&parent, halted);
            buffer.shuffle(&mut SmallRng::from_entropy());
            replay(buffer, push, cancel, halted);
        }))
    }

    /// Buffers the whole source, then emits it sorted, timestamped `0..`.
    ///
    /// Never terminates on an infinite source.
    pub fn sorted(self) -> Self
    where
        E: Ord,
    {
        self.sorted_by(E::cmp)
    }

    /// Like [`Self::sorted`] with a custom comparator. Equal elements keep production order.
    pub fn sorted_by(
        self,
        comparator: impl Fn(&E, &E) -> Ordering + Send + Sync + 'static,
    ) -> Self {
        let parent = self.generator.clone();
        self.chain(Generator::staged(move |push, cancel, halted| {
            let mut buffer = drain(&parent, halted);
            buffer.sort_by(|a, b| comparator(a, b));
            replay(buffer, push, cancel, halted);
        }))
    }

    /// Appends `other` after this stream.
    ///
    /// `other`'s timestamps are offset by the number of elements this stream produced. If
    /// downstream cancels during this stream, `other` never runs.
    pub fn concat(self, other: Stream<E>) -> Self {
        let first = self.generator.clone();
        let second = other.generator;
        self.chain(Generator::staged(move |push, cancel, halted| {
            let mut count: Timestamp = 0;
            let cancelled = Cell::new(false);
            first.generate_with(
                &mut |element, timestamp| {
                    count += 1;
                    push(element, timestamp);
                },
                &|element| {
                    let stop = cancel(element);
                    cancelled.set(stop);
                    stop
                },
                halted,
            );
            if cancelled.get() || halted() {
                return;
            }
            let offset = count;
            second.generate_with(
                &mut |element, timestamp| push(element, timestamp.wrapping_add(offset)),
                cancel,
                halted,
            );
        }))
    }

    /// Keeps the elements at production positions `[min(start, end), max(start, end))`, shifting
    /// their timestamps down by the lower bound. The source stops at the upper bound.
    pub fn sub(self, start: usize, end: usize) -> Self {
        let (lower, upper) = (start.min(end), start.max(end));
        let shift = Timestamp::try_from(lower).unwrap_or(Timestamp::MAX);
        let parent = self.generator.clone();
        self.chain(Generator::staged(move |push, cancel, halted| {
            if lower == upper {
                return;
            }
            let mut position = 0;
            relay(&parent, push, cancel, halted, |element, timestamp, out| {
                if position >= lower {
                    out.emit(element, timestamp.wrapping_sub(shift));
                }
                position += 1;
                if position >= upper {
                    out.halt();
                }
            });
        }))
    }

    /// Calls `observer` with each element as it passes through.
    pub fn peek(self, observer: impl Fn(&E) + Send + Sync + 'static) -> Self {
        let parent = self.generator.clone();
        self.chain(Generator::staged(move |push, cancel, halted| {
            relay(&parent, push, cancel, halted, |element, timestamp, out| {
                observer(&element);
                out.emit(element, timestamp);
            });
        }))
    }

    /// Replaces each timestamp with the element's production position.
    pub fn reindex(self) -> Self {
        let parent = self.generator.clone();
        self.chain(Generator::staged(move |push, cancel, halted| {
            let mut position: Timestamp = 0;
            relay(&parent, push, cancel, halted, |element, _, out| {
                out.emit(element, position);
                position += 1;
            });
        }))
    }

    /// Materializes without ordering: terminal operations fold directly over the generator.
    pub fn to_unordered(self) -> Unordered<E> {
        Unordered::new(self.generator, self.concurrency)
    }
}

impl<E> Stream<E>
where
    E: Clone + Send + Sync + 'static,
{
    /// Runs the pipeline once into a snapshot ordered by canonical rank, breaking rank ties by
    /// the elements' natural order.
    pub fn to_ordered(self) -> Ordered<E>
    where
        E: Ord,
    {
        self.to_ordered_by(E::cmp)
    }

    /// Like [`Self::to_ordered`], breaking rank ties with `tiebreak`.
    pub fn to_ordered_by(
        self,
        tiebreak: impl Fn(&E, &E) -> Ordering + Send + Sync + 'static,
    ) -> Ordered<E> {
        Ordered::new(&self.generator, self.concurrency, Arc::new(tiebreak))
    }

    /// Runs the pipeline once into a snapshot which can be cut into windows.
    pub fn to_window(self) -> Window<E>
    where
        E: Ord,
    {
        self.to_ordered().into_window()
    }

    /// Runs the pipeline once into a numeric population.
    pub fn to_statistics(self) -> Statistics<E, E>
    where
        E: Numeric,
    {
        self.to_ordered_by(E::total_cmp).into_statistics()
    }

    /// Runs the pipeline once into the population of `mapper(element)`.
    ///
    /// Rank ties are broken by the mapped values.
    pub fn to_statistics_by<D: Numeric>(
        self,
        mapper: impl Fn(&E) -> D + Send + Sync + 'static,
    ) -> Statistics<E, D> {
        let mapper = Arc::new(mapper);
        let key = Arc::clone(&mapper);
        self.to_ordered_by(move |a, b| key(a).total_cmp(&key(b)))
            .into_statistics_by(move |element| mapper(element))
    }
}

/// Runs `generator` into a buffer, to completion unless downstream halts first.
fn drain<E: 'static>(generator: &Generator<E>, halted: &dyn Fn() -> bool) -> Vec<E> {
    let mut buffer = Vec::new();
    generator.generate_with(&mut |element, _| buffer.push(element), &|_| false, halted);
    buffer
}

/// Emits `buffer` in order, timestamped `0..`.
fn replay<E>(
    buffer: Vec<E>,
    push: &mut dyn FnMut(E, Timestamp),
    cancel: &dyn Fn(&E) -> bool,
    halted: &dyn Fn() -> bool,
) {
    for (timestamp, element) in (0..).zip(buffer) {
        if halted() || cancel(&element) {
            break;
        }
        push(element, timestamp);
    }
}

#[cfg(test)]
mod test {
    use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};

    use super::*;

    fn traced<E: 'static>(stream: &Stream<E>) -> Vec<(E, Timestamp)> {
        let mut out = Vec::new();
        stream
            .generator()
            .generate(&mut |element, timestamp| out.push((element, timestamp)), &|_| false);
        out
    }

    fn naturals() -> Stream<i64> {
        crate::iterate(|push, cancel| {
            let mut i = 0;
            while !cancel(&i) {
                push(i, i);
                i += 1;
            }
        })
    }

    #[test]
    fn test_transformations_are_lazy() {
        let calls = Arc::new(AtomicUsize::new(0));
        let observed = Arc::clone(&calls);
        let stream = crate::of(1..=5)
            .peek(move |_| {
                observed.fetch_add(1, AtomicOrdering::Relaxed);
            })
            .map(|x| x * 2)
            .filter(|x| x % 4 == 0);
        assert_eq!(0, calls.load(AtomicOrdering::Relaxed));
        assert_eq!(vec![(4, 1), (8, 3)], traced(&stream));
        assert_eq!(5, calls.load(AtomicOrdering::Relaxed));
    }

    #[test]
    fn test_skip_limit_timestamps() {
        let stream = crate::of('a'..='f').skip(2).limit(3);
        assert_eq!(vec![('c', 0), ('d', 1), ('e', 2)], traced(&stream));
    }

    #[test]
    fn test_limit_stops_infinite_source() {
        let produced = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&produced);
        let stream = naturals()
            .map(|i| i * i)
            .peek(move |_| {
                counter.fetch_add(1, AtomicOrdering::Relaxed);
            })
            .limit(4);
        assert_eq!(vec![(0, 0), (1, 1), (4, 2), (9, 3)], traced(&stream));
        assert_eq!(4, produced.load(AtomicOrdering::Relaxed));
    }

    #[test]
    fn test_cancel_sees_only_emitted_elements() {
        let mut out = Vec::new();
        crate::of([5, 1, 2])
            .skip(1)
            .generator()
            .generate(&mut |element, _| out.push(element), &|&element| element >= 5);
        assert_eq!(vec![1, 2], out);

        let mut mapped = Vec::new();
        crate::of([1, 2, 3])
            .map(|x| x * 10)
            .generator()
            .generate(&mut |element, _| mapped.push(element), &|&element| element > 20);
        assert_eq!(vec![10, 20], mapped);
    }

    #[test]
    fn test_halt_reaches_source_through_filter() {
        let produced = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&produced);
        let stream = naturals()
            .peek(move |_| {
                counter.fetch_add(1, AtomicOrdering::Relaxed);
            })
            .filter(|x| x % 10 == 9);
        let pushed = Cell::new(0);
        let mut out = Vec::new();
        stream.generator().generate_with(
            &mut |element, _| {
                pushed.set(pushed.get() + 1);
                out.push(element);
            },
            &|_| false,
            &|| pushed.get() >= 2,
        );
        assert_eq!(vec![9, 19], out);
        assert_eq!(20, produced.load(AtomicOrdering::Relaxed));
    }

    #[test]
    fn test_mapper_not_called_past_limit() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let stream = naturals()
            .map(move |i| {
                counter.fetch_add(1, AtomicOrdering::Relaxed);
                i + 1
            })
            .flat_map(|i| [i, -i])
            .limit(3);
        assert_eq!(vec![(1, 0), (-1, 1), (2, 2)], traced(&stream));
        assert_eq!(2, calls.load(AtomicOrdering::Relaxed));
    }

    #[test]
    fn test_take_and_drop_while() {
        let taken = naturals().take_while(|&i| i < 3);
        assert_eq!(vec![(0, 0), (1, 1), (2, 2)], traced(&taken));
        let dropped = crate::of([1, 5, 2, 7]).drop_while(|&x| x < 4);
        assert_eq!(vec![(5, 1), (2, 2), (7, 3)], traced(&dropped));
    }

    #[test]
    fn test_distinct() {
        let stream = crate::of([3, 1, 3, 2, 1]).distinct();
        assert_eq!(vec![(3, 0), (1, 1), (2, 3)], traced(&stream));
        let by_parity = crate::of([3, 1, 4, 2]).distinct_by(|x| x % 2);
        assert_eq!(vec![(3, 0), (4, 2)], traced(&by_parity));
    }

    #[test]
    fn test_distinct_seen_set_per_traversal() {
        let stream = crate::of([1, 1, 2]).distinct();
        assert_eq!(traced(&stream), traced(&stream));
    }

    #[test]
    fn test_flat_map_positions() {
        let stream = crate::of([1_usize, 2, 3]).flat_map(|n| std::iter::repeat_n(n, n));
        assert_eq!(
            vec![(1, 0), (2, 1), (2, 2), (3, 3), (3, 4), (3, 5)],
            traced(&stream)
        );
        let limited = naturals().flat_map(|n| [n, -n]).limit(3);
        assert_eq!(vec![(0, 0), (0, 1), (1, 2)], traced(&limited));
    }

    #[test]
    fn test_timestamp_rewrites() {
        let reversed = crate::of("abc".chars()).reverse();
        assert_eq!(vec![('a', -1), ('b', -2), ('c', -3)], traced(&reversed));
        let moved = crate::of("ab".chars()).translate(Timestamp::MAX);
        assert_eq!(
            vec![('a', Timestamp::MAX), ('b', Timestamp::MIN)],
            traced(&moved)
        );
        let reindexed = crate::of([7, 8]).redirect(|_, _| 42).reindex();
        assert_eq!(vec![(7, 0), (8, 1)], traced(&reindexed));
    }

    #[test]
    fn test_concat_offsets_second() {
        let stream = crate::of([1, 2]).concat(crate::of([3, 4]));
        assert_eq!(vec![(1, 0), (2, 1), (3, 2), (4, 3)], traced(&stream));
        let cut = crate::of([1, 2]).concat(crate::of([3, 4])).limit(1);
        assert_eq!(vec![(1, 0)], traced(&cut));
    }

    #[test]
    fn test_sub_normalizes_bounds() {
        let stream = crate::of(10..20).sub(5, 2);
        assert_eq!(vec![(12, 0), (13, 1), (14, 2)], traced(&stream));
        assert!(traced(&crate::of(0..5).sub(3, 3)).is_empty());
        let infinite = naturals().sub(1, 3);
        assert_eq!(vec![(1, 0), (2, 1)], traced(&infinite));
    }

    #[test]
    fn test_sorted_and_shuffle() {
        let sorted = crate::of([3, 1, 2]).sorted();
        assert_eq!(vec![(1, 0), (2, 1), (3, 2)], traced(&sorted));

        let shuffled = crate::of(0..50).shuffle();
        let mut values = traced(&shuffled)
            .into_iter()
            .map(|(value, _)| value)
            .collect::<Vec<_>>();
        values.sort_unstable();
        assert_eq!((0..50).collect::<Vec<_>>(), values);
    }

    #[test]
    fn test_concurrency_propagates() {
        let stream = crate::of([1, 2, 3]).parallel_with(3).map(|x| x + 1).skip(1);
        assert_eq!(3, stream.concurrency());
        assert_eq!(1, stream.clone().sequential().concurrency());
        assert_eq!(1, stream.parallel_with(0).concurrency());
    }
}
