use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc;

use proptest::prelude::*;
use semantic::{Error, Materialized, PoolConfig, PoolError, WorkerPool, collectors};

fn init_tracing() {
    let subscriber = tracing_subscriber::FmtSubscriber::builder()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}

fn sum(source: &impl Materialized<i64>) -> i64 {
    source.fold(|| 0, |sum, x| *sum += x, |a, b| a + b)
}

proptest! {
    #![proptest_config(ProptestConfig { cases: 32, .. ProptestConfig::default() })]

    #[test]
    fn sharded_unordered_matches_sequential(
        values in prop::collection::vec(-1000_i64..1000, 0..200),
        shards in 1_usize..8,
    ) {
        let sequential = semantic::of(values.clone()).to_unordered();
        let sharded = semantic::of(values.clone()).parallel_with(shards).to_unordered();
        prop_assert_eq!(sequential.count(), sharded.count());
        prop_assert_eq!(sum(&sequential), sum(&sharded));
        prop_assert_eq!(sequential.find_first(), sharded.find_first());

        let mut sharded_values = sharded.to_vector();
        sharded_values.sort_unstable();
        let mut sorted = values;
        sorted.sort_unstable();
        prop_assert_eq!(sorted, sharded_values);
    }

    #[test]
    fn sharded_ordered_matches_sequential(
        values in prop::collection::vec(-50_i64..50, 0..120),
        shards in 1_usize..8,
    ) {
        let redirected = semantic::of(values).redirect(|value, _| *value);
        let sequential = redirected.clone().to_ordered();
        let sharded = redirected.parallel_with(shards).to_ordered();
        prop_assert_eq!(sequential.to_vector(), sharded.to_vector());
        prop_assert_eq!(sequential.find_first(), sharded.find_first());
        prop_assert_eq!(sum(&sequential), sum(&sharded));
        prop_assert_eq!(sequential.partition(7), sharded.partition(7));
    }

    #[test]
    fn sharded_find_first_matches_sequential_under_rewritten_timestamps(
        values in prop::collection::vec(-50_i64..50, 0..120),
        shards in 1_usize..8,
    ) {
        let redirected = semantic::of(values.clone()).redirect(|value, _| *value);
        prop_assert_eq!(
            redirected.clone().to_unordered().find_first(),
            redirected.parallel_with(shards).to_unordered().find_first()
        );
        let reversed = semantic::of(values.clone()).reverse();
        prop_assert_eq!(values.first().copied(), reversed.clone().to_unordered().find_first());
        prop_assert_eq!(
            values.first().copied(),
            reversed.parallel_with(shards).to_unordered().find_first()
        );
    }
}

#[test]
fn test_sharded_snapshot_fewer_entries_than_shards() {
    init_tracing();
    let ordered = semantic::of([4_i64, 5]).parallel_with(6).to_ordered();
    assert_eq!(vec![4, 5], ordered.to_vector());
    assert_eq!(9, sum(&ordered));
}

#[test]
fn test_shard_panic_reaches_caller() {
    init_tracing();
    let failing = semantic::range(0_i64, 1000)
        .map(|x| if 500 == x { panic!("bad element") } else { x })
        .parallel_with(4)
        .to_unordered();
    let payload = panic::catch_unwind(AssertUnwindSafe(|| failing.count()))
        .expect_err("a shard panicked");
    assert_eq!(Some(&"bad element"), payload.downcast_ref::<&str>());

    // The pool survives a panicking shard.
    let healthy = semantic::range(0_i64, 1000).parallel_with(4).to_unordered();
    assert_eq!(1000, healthy.count());
}

#[test]
fn test_shutdown_pool_rejects_synchronously() {
    init_tracing();
    let pool = WorkerPool::with_workers(2).unwrap();
    pool.shutdown();
    let source = semantic::range(0_i64, 10).parallel_with(2).to_unordered();
    let result = source.try_collect_in(&pool, collectors::count());
    assert!(matches!(
        result,
        Err(Error::Schedule {
            shard: 0,
            shards: 2,
            source: PoolError::Shutdown,
        })
    ));

    // Sequential folds never touch the pool.
    let sequential = semantic::range(0_i64, 10).to_unordered();
    assert_eq!(10, sequential.try_collect_in(&pool, collectors::count()).unwrap());
}

#[test]
fn test_saturated_pool_rejects_synchronously() {
    init_tracing();
    let pool =
        WorkerPool::new(PoolConfig::default().with_workers(1).with_queue_capacity(3)).unwrap();
    let (started_send, started_recv) = mpsc::channel();
    let (release_send, release_recv) = mpsc::channel::<()>();
    let blocker = pool
        .submit(move || {
            started_send.send(()).unwrap();
            release_recv.recv().unwrap();
        })
        .unwrap();
    started_recv.recv().unwrap();
    let fillers = (0..3)
        .map(|_| pool.submit(|| ()).unwrap())
        .collect::<Vec<_>>();

    let source = semantic::range(0_i64, 10).parallel_with(3).to_ordered();
    let result = source.try_collect_in(&pool, collectors::count());
    assert!(matches!(
        result,
        Err(Error::Schedule {
            shard: 0,
            shards: 3,
            source: PoolError::Saturated { capacity: 3 },
        })
    ));

    release_send.send(()).unwrap();
    blocker.join().unwrap();
    for filler in fillers {
        filler.join().unwrap();
    }
    // The queue is empty again and holds all three shards.
    assert_eq!(10, source.try_collect_in(&pool, collectors::count()).unwrap());
}

#[test]
fn test_parallel_for_each_visits_every_element_once() {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicI64, Ordering};

    let total = Arc::new(AtomicI64::new(0));
    let adder = Arc::clone(&total);
    semantic::range(1_i64, 101)
        .parallel_with(5)
        .to_unordered()
        .for_each(move |x| {
            adder.fetch_add(x, Ordering::Relaxed);
        });
    assert_eq!(5050, total.load(Ordering::Relaxed));
}
