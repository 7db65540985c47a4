//! Constructors for source streams.
//!
//! Every source timestamps its elements by production position, starting from `0`.

use std::cmp::Ordering;
use std::sync::Arc;

use crate::Timestamp;
use crate::generator::Generator;
use crate::numeric::Numeric;
use crate::stream::Stream;

/// A stream with no elements.
pub fn empty<E: 'static>() -> Stream<E> {
    Stream::from(Generator::empty())
}

/// A stream over the items of `items`, which are collected once up front.
pub fn of<E>(items: impl IntoIterator<Item = E>) -> Stream<E>
where
    E: Clone + Send + Sync + 'static,
{
    let items: Arc<[E]> = items.into_iter().collect();
    Stream::from(Generator::new(move |push, cancel| {
        for (timestamp, item) in (0..).zip(items.iter()) {
            if cancel(item) {
                break;
            }
            push(item.clone(), timestamp);
        }
    }))
}

/// Same as [`of`].
pub fn from<E>(items: impl IntoIterator<Item = E>) -> Stream<E>
where
    E: Clone + Send + Sync + 'static,
{
    of(items)
}

/// `count` copies of `value`.
pub fn fill<E>(value: E, count: usize) -> Stream<E>
where
    E: Clone + Send + Sync + 'static,
{
    fill_with(move || value.clone(), count)
}

/// `count` elements, each produced by calling `supplier`.
///
/// The supplier runs again on every traversal, so a stateful supplier (random, I/O) does not
/// replay the same elements.
pub fn fill_with<E: 'static>(
    supplier: impl Fn() -> E + Send + Sync + 'static,
    count: usize,
) -> Stream<E> {
    Stream::from(Generator::new(move |push, cancel| {
        for timestamp in (0..).take(count) {
            let element = supplier();
            if cancel(&element) {
                break;
            }
            push(element, timestamp);
        }
    }))
}

/// `start, start + 1, ...` while below `end`.
pub fn range<D: Numeric>(start: D, end: D) -> Stream<D> {
    range_step(start, end, D::ONE)
}

/// `start, start + step, ...` while before `end`, counting down for a negative `step`.
///
/// A zero `step` yields nothing.
pub fn range_step<D: Numeric>(start: D, end: D, step: D) -> Stream<D> {
    let ascending = match step.partial_cmp(&D::ZERO) {
        Some(Ordering::Greater) => true,
        Some(Ordering::Less) => false,
        _ => return empty(),
    };
    Stream::from(Generator::new(move |push, cancel| {
        let before_end = |value: D| if ascending { value < end } else { value > end };
        let mut value = start;
        let mut timestamp: Timestamp = 0;
        while before_end(value) {
            if cancel(&value) {
                break;
            }
            push(value, timestamp);
            value = value + step;
            timestamp += 1;
        }
    }))
}

/// A stream driven by a custom generator function. See [`Generator::new`] for its contract.
///
/// ```rust
/// use semantic::Materialized;
///
/// let powers = semantic::iterate(|push, cancel| {
///     let mut power = 1_u64;
///     for timestamp in 0.. {
///         if cancel(&power) {
///             break;
///         }
///         push(power, timestamp);
///         power *= 2;
///     }
/// });
/// assert_eq!(vec![1, 2, 4, 8], powers.limit(4).to_unordered().to_vector());
/// ```
pub fn iterate<E: 'static>(
    generator: impl Fn(&mut dyn FnMut(E, Timestamp), &dyn Fn(&E) -> bool) + Send + Sync + 'static,
) -> Stream<E> {
    Stream::from(Generator::new(generator))
}
