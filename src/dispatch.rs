//! Row-block parallel dispatch.
//!
//! Splits `[0, total_rows)` into contiguous blocks, submits one task per block
//! to a [`WorkerPool`], and blocks the caller until *its own* blocks are done.
//!
//! # Design Highlights
//! - **Local join barrier**: every call owns a latch (condition variable plus
//!   atomic pending count). Concurrent dispatches sharing one pool never wait
//!   on each other's tasks.
//! - **Borrowed operands**: callbacks may borrow from the caller's stack. The
//!   call does not return, on any path, until every submitted task has either
//!   run or been dropped, so the borrows outlive the tasks.
//! - **Disjoint output**: [`dispatch_rows`] hands each block an exclusive
//!   `&mut` slice of the output buffer, so no locking is needed while the
//!   blocks compute.
//!
//! # Deadlock
//! Calling `dispatch` from inside a task running on the same pool can
//! deadlock once every worker is blocked on a nested join.

use std::mem;
use std::ops::Range;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex, PoisonError};

use crate::error::{Error, Result};
use crate::pool::{Task, WorkerPool};

type ScopedTask<'env> = Box<dyn FnOnce() + Send + 'env>;

/// Partitions `[0, total)` into at most `blocks` contiguous ranges.
///
/// Every block has `total / blocks` rows except the last, which also takes
/// the remainder. `partition(100, 7)` yields six blocks of 14 and one of 16.
/// Returns an empty list when `total` is zero.
#[must_use]
pub fn partition(total: usize, blocks: usize) -> Vec<Range<usize>> {
    if total == 0 {
        return Vec::new();
    }
    let blocks = blocks.clamp(1, total);
    let step = total / blocks;

    (0..blocks)
        .map(|i| {
            let start = i * step;
            let end = if i + 1 == blocks { total } else { start + step };
            start..end
        })
        .collect()
}

/// Number of blocks a dispatch over `total_rows` uses on `pool`.
#[must_use]
pub fn block_count(pool: &WorkerPool, total_rows: usize) -> usize {
    total_rows.min(pool.size())
}

/// Runs `f` over row blocks of `[0, total_rows)` on `pool` and waits for them.
///
/// # Errors
///
/// - [`Error::PoolFatal`] if any block panicked, or the pool was already
///   fatal.
/// - [`Error::PoolTerminated`] if the pool has been shut down.
pub fn dispatch<F>(pool: &WorkerPool, total_rows: usize, f: F) -> Result<()>
where
    F: Fn(Range<usize>) + Sync,
{
    let f = &f;
    let tasks = partition(total_rows, block_count(pool, total_rows))
        .into_iter()
        .map(|rows| Box::new(move || f(rows)) as ScopedTask<'_>)
        .collect();

    run_scoped(pool, tasks)
}

/// Like [`dispatch`], but also hands each block its rows of `out`.
///
/// `out` is a row-major buffer with `row_len` elements per row. The callback
/// receives the global row range and the matching `&mut` sub-slice, which no
/// other block can see.
///
/// # Errors
///
/// - [`Error::Dimension`] if `out.len()` is not a multiple of `row_len`.
/// - See [`dispatch`] for pool errors.
pub fn dispatch_rows<F>(pool: &WorkerPool, out: &mut [f64], row_len: usize, f: F) -> Result<()>
where
    F: Fn(Range<usize>, &mut [f64]) + Sync,
{
    if row_len == 0 || out.len() % row_len != 0 {
        return Err(crate::error::dimension(format!(
            "output buffer of {} elements is not made of rows of {row_len}",
            out.len()
        )));
    }
    let total_rows = out.len() / row_len;

    let f = &f;
    let mut rest = out;
    let mut tasks: Vec<ScopedTask<'_>> = Vec::new();
    for rows in partition(total_rows, block_count(pool, total_rows)) {
        let (chunk, tail) = mem::take(&mut rest).split_at_mut(rows.len() * row_len);
        rest = tail;
        tasks.push(Box::new(move || f(rows, chunk)));
    }

    run_scoped(pool, tasks)
}

/// Join barrier owned by a single dispatch call.
struct Latch {
    pending: AtomicUsize,
    failed: AtomicBool,
    lock: Mutex<()>,
    done: Condvar,
}

impl Latch {
    fn new(count: usize) -> Self {
        Self {
            pending: AtomicUsize::new(count),
            failed: AtomicBool::new(false),
            lock: Mutex::new(()),
            done: Condvar::new(),
        }
    }

    fn count_down(&self) {
        if self.pending.fetch_sub(1, Ordering::AcqRel) == 1 {
            let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
            self.done.notify_all();
        }
    }

    fn wait(&self) {
        let mut guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        while self.pending.load(Ordering::Acquire) != 0 {
            guard = self.done.wait(guard).unwrap_or_else(PoisonError::into_inner);
        }
    }
}

/// Counts the latch down when dropped; a task that never finished (panicked,
/// or was dropped unrun) marks the dispatch as failed.
struct Completion {
    latch: Arc<Latch>,
    finished: bool,
}

impl Completion {
    /// Consumes the guard after its task returned normally.
    fn finish(mut self) {
        self.finished = true;
    }
}

impl Drop for Completion {
    fn drop(&mut self) {
        if !self.finished {
            self.latch.failed.store(true, Ordering::Release);
        }
        self.latch.count_down();
    }
}

/// Blocks until the latch opens, including while unwinding.
struct Join<'a>(&'a Latch);

impl Drop for Join<'_> {
    fn drop(&mut self) {
        self.0.wait();
    }
}

fn run_scoped(pool: &WorkerPool, tasks: Vec<ScopedTask<'_>>) -> Result<()> {
    if tasks.is_empty() {
        return Ok(());
    }

    let latch = Arc::new(Latch::new(tasks.len()));
    let join = Join(&latch);
    let mut submit_error = None;

    for task in tasks {
        let completion = Completion {
            latch: Arc::clone(&latch),
            finished: false,
        };
        // `finish` takes the guard by value, so the closure owns all of it
        // and the latch only counts down once the task has run or is dropped.
        let wrapped: ScopedTask<'_> = Box::new(move || {
            task();
            completion.finish();
        });

        // SAFETY: `join` blocks this function until every wrapped task has
        // dropped its `Completion`, i.e. has finished running or was dropped
        // unrun. Nothing borrowed by the task can therefore be released while
        // a worker still holds it.
        let wrapped: Task = unsafe { mem::transmute::<ScopedTask<'_>, Task>(wrapped) };

        if submit_error.is_some() {
            drop(wrapped);
        } else if let Err(err) = pool.enqueue_boxed(wrapped) {
            submit_error = Some(err);
        }
    }

    drop(join);

    if let Some(err) = submit_error {
        return Err(err);
    }
    if latch.failed.load(Ordering::Acquire) {
        return Err(Error::PoolFatal("a row block task panicked".to_owned()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_exact_cover(blocks: &[Range<usize>], total: usize) {
        let mut seen = vec![0u8; total];
        for block in blocks {
            assert!(!block.is_empty());
            for i in block.clone() {
                seen[i] += 1;
            }
        }
        assert!(seen.iter().all(|&n| n == 1), "rows covered more or less than once");
        for pair in blocks.windows(2) {
            assert_eq!(pair[0].end, pair[1].start);
        }
    }

    #[test]
    fn partition_covers_rows_exactly_once() {
        let blocks = partition(100, 7);
        assert_eq!(blocks.len(), 7);
        assert_exact_cover(&blocks, 100);
        assert_eq!(blocks.last().map(ExactSizeIterator::len), Some(16));
    }

    #[test]
    fn partition_edge_cases() {
        assert!(partition(0, 4).is_empty());
        assert_eq!(partition(3, 8), vec![0..1, 1..2, 2..3]);
        assert_eq!(partition(5, 0), vec![0..5]);
        for total in 1..40 {
            for blocks in 1..10 {
                assert_exact_cover(&partition(total, blocks), total);
            }
        }
    }

    #[test]
    fn dispatch_visits_every_row() {
        let pool = WorkerPool::new(4).unwrap();
        let hits: Vec<AtomicUsize> = (0..37).map(|_| AtomicUsize::new(0)).collect();

        dispatch(&pool, hits.len(), |rows| {
            for i in rows {
                hits[i].fetch_add(1, Ordering::Relaxed);
            }
        })
        .unwrap();

        assert!(hits.iter().all(|h| h.load(Ordering::Relaxed) == 1));
    }

    #[test]
    fn dispatch_rows_writes_disjoint_slices() {
        let pool = WorkerPool::new(3).unwrap();
        let mut out = vec![0.0; 10 * 4];

        dispatch_rows(&pool, &mut out, 4, |rows, chunk| {
            for (local, row) in rows.enumerate() {
                for cell in &mut chunk[local * 4..(local + 1) * 4] {
                    *cell = row as f64;
                }
            }
        })
        .unwrap();

        for (i, value) in out.iter().enumerate() {
            assert_eq!(*value, (i / 4) as f64);
        }
    }

    #[test]
    fn dispatch_returns_only_after_its_blocks_finish() {
        let pool = WorkerPool::new(2).unwrap();
        let done = AtomicUsize::new(0);
        let blocks = block_count(&pool, 2);

        dispatch(&pool, 2, |_| {
            std::thread::sleep(std::time::Duration::from_millis(100));
            done.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();

        assert_eq!(done.load(Ordering::SeqCst), blocks);
    }

    #[test]
    fn dispatch_rows_waits_for_slow_blocks() {
        let pool = WorkerPool::new(3).unwrap();
        let mut out = vec![0.0; 6 * 2];

        dispatch_rows(&pool, &mut out, 2, |_, chunk| {
            std::thread::sleep(std::time::Duration::from_millis(50));
            chunk.fill(1.0);
        })
        .unwrap();

        assert!(out.iter().all(|&v| v == 1.0));
    }

    #[test]
    fn dispatch_rows_rejects_ragged_buffer() {
        let pool = WorkerPool::new(1).unwrap();
        let mut out = vec![0.0; 7];
        let err = dispatch_rows(&pool, &mut out, 3, |_, _| {}).unwrap_err();
        assert!(matches!(err, Error::Dimension(_)));
    }

    #[test]
    fn panicking_block_surfaces_as_pool_fatal() {
        let pool = WorkerPool::new(2).unwrap();
        let err = dispatch(&pool, 8, |rows| {
            if rows.contains(&0) {
                panic!("callback bug");
            }
        })
        .unwrap_err();

        assert!(matches!(err, Error::PoolFatal(_)));
        // the worker records the panic after the block's latch is released
        assert!(pool.wait_until_idle().is_err());
        assert!(pool.is_fatal());
        assert!(matches!(dispatch(&pool, 4, |_| {}), Err(Error::PoolFatal(_))));
    }

    #[test]
    fn dispatch_on_shut_down_pool_fails() {
        let pool = WorkerPool::new(2).unwrap();
        pool.shutdown();
        assert!(matches!(dispatch(&pool, 4, |_| {}), Err(Error::PoolTerminated)));
    }

    #[test]
    fn empty_dispatch_is_a_no_op() {
        let pool = WorkerPool::new(1).unwrap();
        dispatch(&pool, 0, |_| panic!("never called")).unwrap();
    }
}
