use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use semantic::{Materialized, Stream};

/// `0, 1, 2, ...` until cancelled.
fn naturals() -> Stream<u64> {
    semantic::iterate(|push, cancel| {
        for (timestamp, value) in (0_u64..).enumerate() {
            if cancel(&value) {
                break;
            }
            push(value, timestamp as i64);
        }
    })
}

#[test]
fn test_any_match_stops_infinite_source() {
    let produced = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&produced);
    let matched = naturals()
        .peek(move |_| {
            counter.fetch_add(1, Ordering::Relaxed);
        })
        .to_unordered()
        .any_match(|&x| x == 10);
    assert!(matched);
    assert_eq!(11, produced.load(Ordering::Relaxed));
}

#[test]
fn test_short_circuit_through_filter_on_infinite_source() {
    let fives = naturals().filter(|x| *x == 5).to_unordered();
    assert!(fives.any_match(|x| *x == 5));
    assert_eq!(Some(5), fives.find_first());
    assert_eq!(Some(5), fives.find_any());
    assert!(!fives.all_match(|x| *x != 5));
    assert!(!fives.none_match(|x| *x == 5));
}

#[test]
fn test_parallel_short_circuit_through_filter_on_infinite_source() {
    let fives = naturals().filter(|x| *x == 5).parallel_with(4).to_unordered();
    assert!(fives.any_match(|x| *x == 5));
    assert_eq!(Some(5), fives.find_first());
    assert_eq!(Some(5), fives.find_any());
    assert!(!fives.all_match(|x| *x != 5));
    assert!(!fives.none_match(|x| *x == 5));
}

#[test]
fn test_find_first_is_first_produced_not_lowest_timestamp() {
    let reversed = semantic::of(1..=10).reverse();
    assert_eq!(Some(1), reversed.clone().to_unordered().find_first());
    assert_eq!(Some(1), reversed.parallel_with(4).to_unordered().find_first());
}

#[test]
fn test_all_and_none_match_stop_infinite_source() {
    let unordered = naturals().to_unordered();
    assert!(!unordered.all_match(|&x| x < 50));
    assert!(!unordered.none_match(|&x| x > 20));
}

#[test]
fn test_find_first_on_infinite_source() {
    let first = naturals().filter(|x| x % 7 == 3).to_unordered().find_first();
    assert_eq!(Some(3), first);
}

#[test]
fn test_parallel_short_circuit() {
    let unordered = naturals().parallel_with(4).to_unordered();
    assert!(unordered.any_match(|&x| x == 1000));
    assert!(!unordered.all_match(|&x| x < 500));
    assert!(!unordered.none_match(|&x| x == 77));
    assert!(unordered.find_any().is_some());
}

#[test]
fn test_parallel_find_first_is_earliest() {
    let first = naturals()
        .filter(|x| x % 11 == 5)
        .parallel_with(3)
        .to_unordered()
        .find_first();
    assert_eq!(Some(5), first);
}

#[test]
fn test_limit_bounds_infinite_source() {
    let ordered = naturals().map(|x| x * x).limit(5).to_ordered();
    assert_eq!(vec![0, 1, 4, 9, 16], ordered.to_vector());
}
