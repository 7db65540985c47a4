//! The standard [`Collector`]s behind every terminal operation.
//!
//! Each function here builds a fresh collector; they are also usable directly with
//! [`Materialized::collect`](crate::Materialized::collect).

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashSet, LinkedList};
use std::fmt::Display;
use std::hash::Hash;
use std::sync::Arc;

use itertools::Itertools;

use crate::collector::{CancelScope, Collector};

/// Counts elements.
pub fn count<E: 'static>() -> Collector<E, usize, usize> {
    Collector::new(|| 0, |count, _, _| *count += 1, |a, b| a + b, |count| count)
}

/// `true` if any element satisfies `predicate`. Stops at the first match.
pub fn any_match<E: 'static>(
    predicate: impl Fn(&E) -> bool + Send + Sync + 'static,
) -> Collector<E, bool, bool> {
    Collector::new(
        || false,
        move |found, element, _| *found = *found || predicate(&element),
        |a, b| a || b,
        |found| found,
    )
    .with_interrupt(|found: &bool| *found)
}

/// `true` if every element satisfies `predicate`. Stops at the first mismatch.
pub fn all_match<E: 'static>(
    predicate: impl Fn(&E) -> bool + Send + Sync + 'static,
) -> Collector<E, bool, bool> {
    Collector::new(
        || true,
        move |all, element, _| *all = *all && predicate(&element),
        |a, b| a && b,
        |all| all,
    )
    .with_interrupt(|all: &bool| !*all)
}

/// `true` if no element satisfies `predicate`. Stops at the first match.
pub fn none_match<E: 'static>(
    predicate: impl Fn(&E) -> bool + Send + Sync + 'static,
) -> Collector<E, bool, bool> {
    Collector::new(
        || true,
        move |none, element, _| *none = *none && !predicate(&element),
        |a, b| a && b,
        |none| none,
    )
    .with_interrupt(|none: &bool| !*none)
}

/// The element at the lowest fold position: first in rank order for ordered sources, first
/// produced otherwise.
///
/// Sharded, a shard which finds a candidate only stops shards past it; earlier shards keep
/// searching.
pub fn find_first<E: 'static>() -> Collector<E, Option<(usize, E)>, Option<E>> {
    Collector::new(
        || None,
        |found: &mut Option<(usize, E)>, element, position| {
            if found.is_none() {
                *found = Some((position, element));
            }
        },
        |left, right| match (left, right) {
            (Some(left), Some(right)) if right.0 < left.0 => Some(right),
            (left, right) => left.or(right),
        },
        |found| found.map(|(_, element)| element),
    )
    .with_interrupt(|found: &Option<(usize, E)>| found.is_some())
    .with_cancel_scope(CancelScope::Earliest)
}

/// Any element. Stops every shard as soon as one element is found.
pub fn find_any<E: 'static>() -> Collector<E, Option<E>, Option<E>> {
    Collector::new(
        || None,
        |found: &mut Option<E>, element, _| *found = Some(element),
        |left: Option<E>, right| left.or(right),
        |found| found,
    )
    .with_interrupt(|found: &Option<E>| found.is_some())
}

/// Reduces elements pairwise with `reducer`, or `None` if there are none.
pub fn reduce<E: 'static>(
    reducer: impl Fn(E, E) -> E + Send + Sync + 'static,
) -> Collector<E, Option<E>, Option<E>> {
    let reducer = Arc::new(reducer);
    let combiner = Arc::clone(&reducer);
    Collector::new(
        || None,
        move |reduced: &mut Option<E>, element, _| {
            *reduced = Some(match reduced.take() {
                Some(prev) => reducer(prev, element),
                None => element,
            });
        },
        move |left, right| match (left, right) {
            (Some(left), Some(right)) => Some(combiner(left, right)),
            (left, right) => left.or(right),
        },
        |reduced| reduced,
    )
}

/// Folds into an accumulator created by `identity`, merging shard partials with `combiner`.
pub fn fold<E: 'static, A: 'static>(
    identity: impl Fn() -> A + Send + Sync + 'static,
    accumulator: impl Fn(&mut A, E) + Send + Sync + 'static,
    combiner: impl Fn(A, A) -> A + Send + Sync + 'static,
) -> Collector<E, A, A> {
    Collector::new(
        identity,
        move |accum, element, _| accumulator(accum, element),
        combiner,
        |accum| accum,
    )
}

/// Calls `consumer` with each element.
pub fn for_each<E: 'static>(consumer: impl Fn(E) + Send + Sync + 'static) -> Collector<E, (), ()> {
    Collector::new(|| (), move |_, element, _| consumer(element), |(), ()| (), |()| ())
}

/// Collects into a [`Vec`], in fold order.
pub fn to_vector<E: 'static>() -> Collector<E, Vec<E>, Vec<E>> {
    Collector::new(
        Vec::new,
        |vec: &mut Vec<E>, element, _| vec.push(element),
        |mut left, right| {
            left.extend(right);
            left
        },
        |vec| vec,
    )
}

/// Collects into a [`LinkedList`], in fold order.
pub fn to_list<E: 'static>() -> Collector<E, LinkedList<E>, LinkedList<E>> {
    Collector::new(
        LinkedList::new,
        |list: &mut LinkedList<E>, element, _| list.push_back(element),
        |mut left, mut right| {
            left.append(&mut right);
            left
        },
        |list| list,
    )
}

/// Collects into a [`BTreeSet`].
pub fn to_set<E: Ord + 'static>() -> Collector<E, BTreeSet<E>, BTreeSet<E>> {
    Collector::new(
        BTreeSet::new,
        |set: &mut BTreeSet<E>, element, _| {
            set.insert(element);
        },
        |mut left, mut right| {
            left.append(&mut right);
            left
        },
        |set| set,
    )
}

/// Collects into a [`HashSet`].
pub fn to_unordered_set<E: Hash + Eq + 'static>() -> Collector<E, HashSet<E>, HashSet<E>> {
    Collector::new(
        HashSet::new,
        |set: &mut HashSet<E>, element, _| {
            set.insert(element);
        },
        |mut left, right| {
            left.extend(right);
            left
        },
        |set| set,
    )
}

/// Collects into a [`BTreeMap`] of `key(element) -> value(element)`. Later entries win.
pub fn to_map<E: 'static, K: Ord + 'static, V: 'static>(
    key: impl Fn(&E) -> K + Send + Sync + 'static,
    value: impl Fn(E) -> V + Send + Sync + 'static,
) -> Collector<E, BTreeMap<K, V>, BTreeMap<K, V>> {
    Collector::new(
        BTreeMap::new,
        move |map: &mut BTreeMap<K, V>, element, _| {
            map.insert(key(&element), value(element));
        },
        |mut left, right| {
            left.extend(right);
            left
        },
        |map| map,
    )
}

/// Groups elements by `classifier`.
pub fn group<E: 'static, K: Ord + 'static>(
    classifier: impl Fn(&E) -> K + Send + Sync + 'static,
) -> Collector<E, BTreeMap<K, Vec<E>>, BTreeMap<K, Vec<E>>> {
    group_by(classifier, |element| element)
}

/// Groups `value(element)` by `key(element)`.
pub fn group_by<E: 'static, K: Ord + 'static, V: 'static>(
    key: impl Fn(&E) -> K + Send + Sync + 'static,
    value: impl Fn(E) -> V + Send + Sync + 'static,
) -> Collector<E, BTreeMap<K, Vec<V>>, BTreeMap<K, Vec<V>>> {
    Collector::new(
        BTreeMap::new,
        move |groups: &mut BTreeMap<K, Vec<V>>, element, _| {
            groups.entry(key(&element)).or_default().push(value(element));
        },
        |mut left, right| {
            for (key, values) in right {
                left.entry(key).or_default().extend(values);
            }
            left
        },
        |groups| groups,
    )
}

/// Splits elements into consecutive chunks of `size` (the last may be shorter).
///
/// A `size` of zero is treated as one.
pub fn partition<E: 'static>(size: usize) -> Collector<E, Vec<E>, Vec<Vec<E>>> {
    let size = size.max(1);
    Collector::new(
        Vec::new,
        |vec: &mut Vec<E>, element, _| vec.push(element),
        |mut left, right| {
            left.extend(right);
            left
        },
        move |vec: Vec<E>| {
            vec.into_iter()
                .chunks(size)
                .into_iter()
                .map(|chunk| chunk.collect())
                .collect()
        },
    )
}

/// Buckets elements by `classifier`, returning buckets in ascending classifier order.
pub fn partition_by<E: 'static>(
    classifier: impl Fn(&E) -> usize + Send + Sync + 'static,
) -> Collector<E, BTreeMap<usize, Vec<E>>, Vec<Vec<E>>> {
    let groups = group(classifier);
    Collector::new(
        BTreeMap::new,
        move |buckets: &mut BTreeMap<usize, Vec<E>>, element, position| {
            groups.accumulate(buckets, element, position)
        },
        |mut left, right| {
            for (key, values) in right {
                left.entry(key).or_default().extend(values);
            }
            left
        },
        |buckets| buckets.into_values().collect(),
    )
}

/// Renders elements separated by `delimiter`, wrapped in `prefix` and `suffix`.
pub fn join<E: Display + 'static>(
    delimiter: &str,
    prefix: &str,
    suffix: &str,
) -> Collector<E, Vec<String>, String> {
    let (delimiter, prefix, suffix) = (delimiter.to_owned(), prefix.to_owned(), suffix.to_owned());
    Collector::new(
        Vec::new,
        |parts: &mut Vec<String>, element: E, _| parts.push(element.to_string()),
        |mut left, right| {
            left.extend(right);
            left
        },
        move |parts: Vec<String>| format!("{}{}{}", prefix, parts.iter().join(&delimiter), suffix),
    )
}

/// The greatest element by `comparator`; on ties the earlier element is kept.
pub fn maximum<E: 'static>(
    comparator: impl Fn(&E, &E) -> Ordering + Send + Sync + 'static,
) -> Collector<E, Option<E>, Option<E>> {
    extremum(comparator, Ordering::Greater)
}

/// The least element by `comparator`; on ties the earlier element is kept.
pub fn minimum<E: 'static>(
    comparator: impl Fn(&E, &E) -> Ordering + Send + Sync + 'static,
) -> Collector<E, Option<E>, Option<E>> {
    extremum(comparator, Ordering::Less)
}

/// Keeps the current best unless a later element compares strictly as `replace_when`.
fn extremum<E: 'static>(
    comparator: impl Fn(&E, &E) -> Ordering + Send + Sync + 'static,
    replace_when: Ordering,
) -> Collector<E, Option<E>, Option<E>> {
    let comparator = Arc::new(comparator);
    let combiner = Arc::clone(&comparator);
    Collector::new(
        || None,
        move |best: &mut Option<E>, element, _| {
            let replace = best
                .as_ref()
                .is_none_or(|best| replace_when == comparator(&element, best));
            if replace {
                *best = Some(element);
            }
        },
        move |left, right| match (left, right) {
            (Some(left), Some(right)) => {
                if replace_when == combiner(&right, &left) {
                    Some(right)
                } else {
                    Some(left)
                }
            }
            (left, right) => left.or(right),
        },
        |best| best,
    )
}
