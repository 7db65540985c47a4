use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

use semantic_pool::{PoolConfig, PoolError, WorkerPool};

fn init_tracing() {
    let subscriber = tracing_subscriber::FmtSubscriber::builder()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}

#[test]
fn test_pool_from_serialized_config() {
    init_tracing();
    let config: PoolConfig =
        serde_json::from_str(r#"{ "workers": 2, "thread_name": "lifecycle" }"#).unwrap();
    let pool = WorkerPool::new(config).unwrap();
    assert_eq!(2, pool.workers());
    assert_eq!("lifecycle", pool.config().thread_name);

    let name = pool
        .submit(|| thread::current().name().map(str::to_owned))
        .unwrap()
        .join()
        .unwrap();
    assert!(name.unwrap().starts_with("lifecycle-"));
}

#[test]
fn test_drop_runs_queued_tasks() {
    init_tracing();
    let counter = Arc::new(AtomicUsize::new(0));
    {
        let pool = WorkerPool::with_workers(3).unwrap();
        for _ in 0..100 {
            let counter = Arc::clone(&counter);
            let _detached = pool.submit(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            });
        }
    }
    assert_eq!(100, counter.load(Ordering::SeqCst));
}

#[test]
fn test_join_timeout() {
    init_tracing();
    let pool = WorkerPool::with_workers(1).unwrap();
    let (release_send, release_recv) = crossbeam_channel::bounded::<()>(0);
    let slow = pool
        .submit(move || {
            release_recv.recv().unwrap();
            "done"
        })
        .unwrap();
    assert!(!slow.is_finished());
    let timeout = Duration::from_millis(5);
    assert!(matches!(slow.join_timeout(timeout), Err(PoolError::Timeout(t)) if t == timeout));
    release_send.send(()).unwrap();

    let fast = pool.submit(|| 5).unwrap();
    assert_eq!(5, fast.join_or(Duration::from_secs(10), || 0));
}

#[test]
fn test_tasks_run_in_fifo_order_on_one_worker() {
    init_tracing();
    let pool = WorkerPool::with_workers(1).unwrap();
    let (order_send, order_recv) = crossbeam_channel::unbounded();
    for index in 0..10 {
        let order_send = order_send.clone();
        let _detached = pool.submit(move || order_send.send(index).unwrap());
    }
    pool.shutdown();
    drop(order_send);
    assert_eq!((0..10).collect::<Vec<_>>(), order_recv.iter().collect::<Vec<_>>());
}
