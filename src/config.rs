//! Engine configuration.
//!
//! The knobs here decide how many workers the pool boots and when a matrix
//! product leaves the calling thread. Both are plain fields so
//! tests can force either code path on small inputs.

use std::num::NonZeroUsize;

/// Default dimension above which `A * B` is computed on the worker pool.
pub const DEFAULT_PARALLEL_THRESHOLD: usize = 64;

/// Default element count from which element-wise kernels use rayon
/// (see [`backend`](crate::backend)).
pub const DEFAULT_ELEMENTWISE_PARALLEL_MIN: usize = 1 << 16;

/// Number of hardware threads reported by the OS, or `1` if unknown.
pub fn available_concurrency() -> usize {
    std::thread::available_parallelism()
        .map(NonZeroUsize::get)
        .unwrap_or(1)
}

/// Tunables for an [`Engine`](crate::engine::Engine).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    /// Requested worker count. `None` boots one worker per hardware thread.
    /// Requests above the hardware count are clamped.
    pub workers: Option<usize>,

    /// `A * B` is dispatched to the pool when `A.rows > threshold` or
    /// `B.cols > threshold`.
    pub parallel_threshold: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            workers: None,
            parallel_threshold: DEFAULT_PARALLEL_THRESHOLD,
        }
    }
}

impl EngineConfig {
    #[must_use]
    pub const fn with_workers(mut self, workers: usize) -> Self {
        self.workers = Some(workers);
        self
    }

    #[must_use]
    pub const fn with_parallel_threshold(mut self, threshold: usize) -> Self {
        self.parallel_threshold = threshold;
        self
    }

    /// Configuration whose products never leave the calling thread.
    #[must_use]
    pub const fn sequential() -> Self {
        Self {
            workers: Some(1),
            parallel_threshold: usize::MAX,
        }
    }

    /// Worker count the pool will actually boot.
    #[must_use]
    pub fn resolved_workers(&self) -> usize {
        let max = available_concurrency();
        self.workers.unwrap_or(max).clamp(1, max)
    }

    /// Whether a product of `lhs_rows × k` by `k × rhs_cols` goes to the pool.
    #[must_use]
    pub const fn wants_parallel(&self, lhs_rows: usize, rhs_cols: usize) -> bool {
        lhs_rows > self.parallel_threshold || rhs_cols > self.parallel_threshold
    }
}
