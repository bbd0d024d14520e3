//! Fixed-size worker pool.
//!
//! # Worker Pool
//!
//! A bounded set of long-lived OS threads pulling boxed closures from one
//! shared FIFO queue. The pool is the only shared mutable resource in the
//! crate; the queue and the termination flag live behind a single mutex, and
//! a condition variable parks workers until there is work or the pool is
//! shutting down.
//!
//! ## Lifecycle
//!
//! ```text
//! Idle ──enqueue──▶ Running ──queue empty, no active task──▶ Idle
//!   │                  │
//!   └──── shutdown ────┴──▶ Terminating ──all workers joined──▶ Terminated
//! ```
//!
//! - Workers are spawned in [`WorkerPool::new`] and never resized.
//! - [`WorkerPool::shutdown`] rejects new work, lets the workers drain what is
//!   already queued, then joins every worker. It is also run on drop.
//! - `Terminated` is absorbing: [`WorkerPool::enqueue`] returns
//!   [`Error::PoolTerminated`] from then on.
//!
//! ## Task failures
//!
//! A task that panics is caught on the worker, logged, and flips the pool into
//! a fatal state. Already queued tasks still run so that callers waiting on
//! them are released, but every later [`enqueue`](WorkerPool::enqueue) and
//! [`wait_until_idle`](WorkerPool::wait_until_idle) reports
//! [`Error::PoolFatal`]. There is no retry.

use std::any::Any;
use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, OnceLock, PoisonError};
use std::thread::{self, JoinHandle};

use tracing::{debug, error, warn};

use crate::config::available_concurrency;
use crate::error::{Error, Result};

/// A unit of work executed by a worker.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

struct Queue {
    tasks: VecDeque<Task>,
    terminating: bool,
}

struct Shared {
    queue: Mutex<Queue>,
    available: Condvar,
    active: AtomicUsize,
    fatal: OnceLock<String>,
}

impl Shared {
    // Tasks never run while the queue lock is held, so poisoning can only come
    // from a panic inside this module; the queue itself stays consistent.
    fn lock_queue(&self) -> MutexGuard<'_, Queue> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn fatal_error(&self) -> Option<Error> {
        self.fatal.get().map(|msg| Error::PoolFatal(msg.clone()))
    }
}

/// A fixed set of worker threads executing queued closures.
pub struct WorkerPool {
    shared: Arc<Shared>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    size: usize,
}

impl WorkerPool {
    /// Boots `requested` workers, clamped to `1..=available_concurrency()`.
    ///
    /// Asking for more workers than the machine has is not an error; the pool
    /// logs a warning and boots the maximum instead.
    ///
    /// # Errors
    ///
    /// [`Error::Io`] if the OS refuses to spawn a thread. Workers started
    /// before the failure are shut down again.
    pub fn new(requested: usize) -> Result<Self> {
        let max = available_concurrency();
        let size = if requested > max {
            warn!(requested, max, "worker count exceeds available threads, booting {max} instead");
            max
        } else {
            requested.max(1)
        };

        let shared = Arc::new(Shared {
            queue: Mutex::new(Queue {
                tasks: VecDeque::new(),
                terminating: false,
            }),
            available: Condvar::new(),
            active: AtomicUsize::new(0),
            fatal: OnceLock::new(),
        });

        let pool = Self {
            shared,
            workers: Mutex::new(Vec::with_capacity(size)),
            size,
        };

        for id in 0..size {
            let shared = Arc::clone(&pool.shared);
            let handle = thread::Builder::new()
                .name(format!("dense-mlp-worker-{id}"))
                .spawn(move || worker_loop(&shared, id))?;
            pool.lock_workers().push(handle);
        }

        debug!(workers = size, "worker pool started");
        Ok(pool)
    }

    /// Boots one worker per hardware thread.
    ///
    /// # Errors
    ///
    /// See [`WorkerPool::new`].
    pub fn with_available_concurrency() -> Result<Self> {
        Self::new(available_concurrency())
    }

    /// Number of workers. Fixed for the lifetime of the pool.
    #[must_use]
    pub const fn size(&self) -> usize {
        self.size
    }

    /// Appends a task to the queue and wakes one idle worker.
    ///
    /// The queue is unbounded.
    ///
    /// # Errors
    ///
    /// - [`Error::PoolFatal`] if an earlier task panicked.
    /// - [`Error::PoolTerminated`] once [`shutdown`](Self::shutdown) has begun.
    ///
    /// On error the task is dropped without running.
    pub fn enqueue<F>(&self, task: F) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        self.enqueue_boxed(Box::new(task))
    }

    pub(crate) fn enqueue_boxed(&self, task: Task) -> Result<()> {
        if let Some(err) = self.shared.fatal_error() {
            return Err(err);
        }

        {
            let mut queue = self.shared.lock_queue();
            if queue.terminating {
                drop(queue);
                drop(task);
                return Err(Error::PoolTerminated);
            }
            queue.tasks.push_back(task);
        }

        self.shared.available.notify_one();
        Ok(())
    }

    /// Whether any task is queued or running.
    #[must_use]
    pub fn is_busy(&self) -> bool {
        let queue = self.shared.lock_queue();
        !queue.tasks.is_empty() || self.shared.active.load(Ordering::SeqCst) != 0
    }

    /// Spins, yielding the calling thread, until the queue is empty and no
    /// worker is running a task.
    ///
    /// This waits for *every* task in the pool, including those submitted by
    /// other callers. Use [`dispatch`](crate::dispatch::dispatch) to wait for
    /// a specific group of tasks.
    ///
    /// # Errors
    ///
    /// [`Error::PoolFatal`] if a task panicked.
    pub fn wait_until_idle(&self) -> Result<()> {
        while self.is_busy() {
            thread::yield_now();
        }
        self.shared.fatal_error().map_or(Ok(()), Err)
    }

    /// Whether a task has panicked on this pool.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        self.shared.fatal.get().is_some()
    }

    /// Whether shutdown has been requested.
    #[must_use]
    pub fn is_terminating(&self) -> bool {
        self.shared.lock_queue().terminating
    }

    /// Stops accepting work, drains the queue and joins every worker.
    ///
    /// Tasks queued before the call still run. Calling this more than once is
    /// harmless; later calls find no workers left to join. A worker calling
    /// this on its own pool skips joining itself.
    pub fn shutdown(&self) {
        {
            let mut queue = self.shared.lock_queue();
            if !queue.terminating {
                debug!(workers = self.size, "worker pool shutting down");
            }
            queue.terminating = true;
        }
        self.shared.available.notify_all();

        let handles: Vec<JoinHandle<()>> = self.lock_workers().drain(..).collect();
        let current = thread::current().id();
        for handle in handles {
            if handle.thread().id() == current {
                continue;
            }
            if handle.join().is_err() {
                error!("worker thread exited abnormally");
            }
        }
    }

    fn lock_workers(&self) -> MutexGuard<'_, Vec<JoinHandle<()>>> {
        self.workers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("size", &self.size)
            .field("active", &self.shared.active.load(Ordering::Relaxed))
            .field("fatal", &self.is_fatal())
            .finish_non_exhaustive()
    }
}

fn worker_loop(shared: &Shared, id: usize) {
    loop {
        let task = {
            let mut queue = shared.lock_queue();
            loop {
                if let Some(task) = queue.tasks.pop_front() {
                    // counted while still under the lock so `is_busy` never
                    // sees an empty queue with the task in flight uncounted
                    shared.active.fetch_add(1, Ordering::SeqCst);
                    break task;
                }
                if queue.terminating {
                    debug!(worker = id, "worker exiting");
                    return;
                }
                queue = shared
                    .available
                    .wait(queue)
                    .unwrap_or_else(PoisonError::into_inner);
            }
        };

        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(task)) {
            let msg = panic_message(payload.as_ref());
            error!(worker = id, "worker task panicked: {msg}");
            let _ = shared.fatal.set(msg);
        }

        shared.active.fetch_sub(1, Ordering::SeqCst);
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_owned()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "task panicked".to_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;
    use std::time::Duration;

    #[test]
    fn runs_every_enqueued_task() {
        let pool = WorkerPool::new(2).unwrap();
        let counter = Arc::new(AtomicUsize::new(0));

        for _ in 0..100 {
            let counter = Arc::clone(&counter);
            pool.enqueue(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
        }

        pool.wait_until_idle().unwrap();
        assert_eq!(counter.load(Ordering::SeqCst), 100);
        assert!(!pool.is_busy());
    }

    #[test]
    fn size_is_clamped_to_hardware() {
        let max = available_concurrency();
        let pool = WorkerPool::new(max + 8).unwrap();
        assert_eq!(pool.size(), max);

        let pool = WorkerPool::new(0).unwrap();
        assert_eq!(pool.size(), 1);
    }

    #[test]
    fn shutdown_drains_queue_before_returning() {
        let pool = WorkerPool::new(1).unwrap();
        let counter = Arc::new(AtomicUsize::new(0));

        for _ in 0..20 {
            let counter = Arc::clone(&counter);
            pool.enqueue(move || {
                thread::sleep(Duration::from_millis(1));
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
        }

        pool.shutdown();
        assert_eq!(counter.load(Ordering::SeqCst), 20);
        assert!(pool.is_terminating());
    }

    #[test]
    fn enqueue_after_shutdown_is_rejected() {
        let pool = WorkerPool::new(2).unwrap();
        pool.shutdown();

        let ran = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&ran);
        let result = pool.enqueue(move || flag.store(true, Ordering::SeqCst));

        assert!(matches!(result, Err(Error::PoolTerminated)));
        assert!(!ran.load(Ordering::SeqCst));

        // second shutdown finds nothing left to join
        pool.shutdown();
    }

    #[test]
    fn panicking_task_makes_pool_fatal() {
        let pool = WorkerPool::new(2).unwrap();
        pool.enqueue(|| panic!("bad row block")).unwrap();

        let err = pool.wait_until_idle().unwrap_err();
        match err {
            Error::PoolFatal(msg) => assert!(msg.contains("bad row block")),
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(pool.is_fatal());
        assert!(matches!(pool.enqueue(|| {}), Err(Error::PoolFatal(_))));
    }
}
