use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;

use dense_mlp::dispatch::{dispatch, partition};
use dense_mlp::engine::matmul_on_caller;
use dense_mlp::{Engine, EngineConfig, Error, Matrix, WorkerPool};
use rand::rngs::StdRng;
use rand::SeedableRng;

#[test]
fn test_concurrent_products_share_one_pool() {
    const CALLERS: u64 = 50;
    const N: usize = 128;

    let engine = Engine::new(EngineConfig::default()).unwrap();

    let handles: Vec<_> = (0..CALLERS)
        .map(|seed| {
            let engine = engine.clone();
            thread::spawn(move || {
                let mut rng = StdRng::seed_from_u64(seed);
                let a = Matrix::random(N, N, -1.0, 1.0, &mut rng).unwrap();
                let b = Matrix::random(N, N, -1.0, 1.0, &mut rng).unwrap();

                let pooled = engine.matmul(&a, &b).unwrap();
                let reference = matmul_on_caller(&a, &b).unwrap();
                pooled == reference
            })
        })
        .collect();

    for handle in handles {
        assert!(handle.join().unwrap(), "pooled product differs from reference");
    }
    engine.pool().wait_until_idle().unwrap();
}

#[test]
fn test_partition_100_by_7() {
    let blocks = partition(100, 7);
    let mut covered = vec![false; 100];
    for block in &blocks {
        for i in block.clone() {
            assert!(!covered[i], "row {i} assigned twice");
            covered[i] = true;
        }
    }
    assert!(covered.iter().all(|&c| c));
    assert_eq!(blocks.first().map(|b| b.len()), Some(14));
    assert_eq!(blocks.last().map(|b| b.len()), Some(16));
}

#[test]
fn test_dispatch_waits_for_every_block() {
    let pool = WorkerPool::new(4).unwrap();
    let done = AtomicUsize::new(0);
    let blocks = partition(40, pool.size()).len();

    dispatch(&pool, 40, |_| {
        thread::sleep(Duration::from_millis(50));
        done.fetch_add(1, Ordering::SeqCst);
    })
    .unwrap();

    assert_eq!(done.load(Ordering::SeqCst), blocks);
}

#[test]
fn test_dispatch_does_not_wait_for_unrelated_tasks() {
    let pool = WorkerPool::new(2).unwrap();
    if pool.size() < 2 {
        // a single worker cannot run both at once
        return;
    }
    let (started_tx, started_rx) = mpsc::channel();
    let (release_tx, release_rx) = mpsc::channel::<()>();
    let unrelated_done = Arc::new(AtomicBool::new(false));

    {
        let unrelated_done = Arc::clone(&unrelated_done);
        pool.enqueue(move || {
            started_tx.send(()).unwrap();
            release_rx.recv().unwrap();
            unrelated_done.store(true, Ordering::SeqCst);
        })
        .unwrap();
    }
    // one worker is now held by the unrelated task
    started_rx.recv().unwrap();

    let rows = AtomicUsize::new(0);
    dispatch(&pool, 10, |block| {
        rows.fetch_add(block.len(), Ordering::SeqCst);
    })
    .unwrap();

    assert_eq!(rows.load(Ordering::SeqCst), 10);
    assert!(!unrelated_done.load(Ordering::SeqCst));

    release_tx.send(()).unwrap();
    pool.wait_until_idle().unwrap();
    assert!(unrelated_done.load(Ordering::SeqCst));
}

#[test]
fn test_shutdown_drains_then_rejects() {
    let pool = WorkerPool::new(2).unwrap();
    let done = Arc::new(AtomicUsize::new(0));
    for _ in 0..32 {
        let done = Arc::clone(&done);
        pool.enqueue(move || {
            done.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();
    }

    pool.shutdown();
    assert_eq!(done.load(Ordering::SeqCst), 32);
    assert!(matches!(pool.enqueue(|| {}), Err(Error::PoolTerminated)));
    assert!(matches!(dispatch(&pool, 8, |_| {}), Err(Error::PoolTerminated)));
}

#[test]
fn test_worker_panic_is_reported_not_swallowed() {
    let engine = Engine::new(EngineConfig::default().with_workers(2)).unwrap();
    let result = dispatch(engine.pool(), 4, |block| {
        assert!(block.start != 0, "bad callback");
    });
    assert!(matches!(result, Err(Error::PoolFatal(_))));

    // the pool stays unusable
    assert!(matches!(engine.pool().wait_until_idle(), Err(Error::PoolFatal(_))));
    let m = Matrix::filled(80, 80, 1.0).unwrap();
    assert!(matches!(engine.matmul(&m, &m), Err(Error::PoolFatal(_))));
}
