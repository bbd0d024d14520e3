//! Compute engine: a worker pool plus the policy for using it.
//!
//! An [`Engine`] is the explicit handle matrix products run on. Engines are
//! cheap to clone (the pool is shared through an `Arc`) and are passed to
//! [`Matrix::matmul_with`] and the network layer.
//!
//! # Process-default engine
//!
//! The `*` operator cannot take extra arguments, so it uses a process-wide
//! default engine:
//!
//! 1. [`install_default`] may be called first to choose its configuration.
//!    Otherwise the first product lazily boots one with
//!    [`EngineConfig::default`].
//! 2. [`shutdown_default`] joins its workers. Statics are never dropped, so
//!    call it before the process exits if the join must happen. A later
//!    product boots a fresh default engine.
//!
//! Both calls are safe from any thread but are meant for program start-up and
//! tear-down.

use std::sync::{Arc, PoisonError, RwLock};

use lazy_static::lazy_static;
use tracing::trace;

use crate::config::EngineConfig;
use crate::dispatch::dispatch_rows;
use crate::error::{dimension, Result};
use crate::matrix::Matrix;
use crate::ops::cpu::gemm_rows;
use crate::pool::WorkerPool;

/// Worker pool plus the sequential/parallel policy for matrix products.
#[derive(Debug, Clone)]
pub struct Engine {
    pool: Arc<WorkerPool>,
    config: EngineConfig,
}

impl Engine {
    /// Boots a pool sized by `config`.
    ///
    /// # Errors
    ///
    /// [`Error::Io`](crate::Error::Io) if a worker thread cannot be spawned.
    pub fn new(config: EngineConfig) -> Result<Self> {
        let pool = WorkerPool::new(config.resolved_workers())?;
        Ok(Self {
            pool: Arc::new(pool),
            config,
        })
    }

    /// Wraps an existing pool.
    #[must_use]
    pub const fn with_pool(pool: Arc<WorkerPool>, config: EngineConfig) -> Self {
        Self { pool, config }
    }

    #[must_use]
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    #[must_use]
    pub fn pool(&self) -> &WorkerPool {
        &self.pool
    }

    /// Computes `a × b`, on the pool when either output axis exceeds the
    /// configured threshold, on the calling thread otherwise.
    ///
    /// Both paths run the same kernel with the same per-cell accumulation
    /// order, so they return bit-identical results.
    ///
    /// # Errors
    ///
    /// - [`Error::Dimension`](crate::Error::Dimension) if `a.cols != b.rows`.
    /// - [`Error::PoolFatal`](crate::Error::PoolFatal) /
    ///   [`Error::PoolTerminated`](crate::Error::PoolTerminated) from the
    ///   parallel path.
    pub fn matmul(&self, a: &Matrix, b: &Matrix) -> Result<Matrix> {
        check_inner(a, b)?;
        if self.config.wants_parallel(a.rows(), b.cols()) {
            trace!(rows = a.rows(), cols = b.cols(), "matmul on worker pool");
            self.matmul_parallel(a, b)
        } else {
            trace!(rows = a.rows(), cols = b.cols(), "matmul on calling thread");
            Ok(matmul_sequential(a, b))
        }
    }

    /// Forces the pooled path regardless of size.
    ///
    /// # Errors
    ///
    /// See [`Engine::matmul`].
    pub fn matmul_parallel(&self, a: &Matrix, b: &Matrix) -> Result<Matrix> {
        check_inner(a, b)?;
        let (m, k, n) = (a.rows(), a.cols(), b.cols());
        let mut out = vec![0.0; m * n];

        dispatch_rows(&self.pool, &mut out, n, |rows, chunk| {
            gemm_rows(a.as_slice(), b.as_slice(), k, n, rows, chunk);
        })?;

        Matrix::from_vec(m, n, out)
    }

    /// Stops the pool. Products that need it afterwards fail with
    /// [`Error::PoolTerminated`](crate::Error::PoolTerminated).
    pub fn shutdown(&self) {
        self.pool.shutdown();
    }
}

/// Single-threaded `a × b`.
///
/// # Errors
///
/// [`Error::Dimension`](crate::Error::Dimension) if `a.cols != b.rows`.
pub fn matmul_on_caller(a: &Matrix, b: &Matrix) -> Result<Matrix> {
    check_inner(a, b)?;
    Ok(matmul_sequential(a, b))
}

fn matmul_sequential(a: &Matrix, b: &Matrix) -> Matrix {
    let (m, k, n) = (a.rows(), a.cols(), b.cols());
    let mut out = vec![0.0; m * n];
    gemm_rows(a.as_slice(), b.as_slice(), k, n, 0..m, &mut out);
    Matrix::from_parts(m, n, out)
}

fn check_inner(a: &Matrix, b: &Matrix) -> Result<()> {
    if a.cols() == b.rows() {
        Ok(())
    } else {
        Err(dimension(format!(
            "cannot multiply {}x{} by {}x{}: left column count and right row count differ",
            a.rows(),
            a.cols(),
            b.rows(),
            b.cols()
        )))
    }
}

lazy_static! {
    static ref DEFAULT_ENGINE: RwLock<Option<Engine>> = RwLock::new(None);
}

/// Returns the process-default engine, booting it on first use.
///
/// # Errors
///
/// [`Error::Io`](crate::Error::Io) if the pool cannot be started.
pub fn default_engine() -> Result<Engine> {
    if let Some(engine) = DEFAULT_ENGINE
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .as_ref()
    {
        return Ok(engine.clone());
    }

    let mut slot = DEFAULT_ENGINE.write().unwrap_or_else(PoisonError::into_inner);
    if let Some(engine) = slot.as_ref() {
        return Ok(engine.clone());
    }
    let engine = Engine::new(EngineConfig::default())?;
    *slot = Some(engine.clone());
    Ok(engine)
}

/// Replaces the process-default engine, returning the previous one.
///
/// The previous engine keeps running until its last clone is dropped or it is
/// shut down explicitly.
pub fn install_default(engine: Engine) -> Option<Engine> {
    DEFAULT_ENGINE
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .replace(engine)
}

/// Shuts down and forgets the process-default engine, if one was booted.
pub fn shutdown_default() {
    let engine = DEFAULT_ENGINE
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .take();
    if let Some(engine) = engine {
        engine.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    fn counting(rows: usize, cols: usize, offset: f64) -> Matrix {
        let data = (0..rows * cols).map(|i| (i as f64).mul_add(0.37, offset).sin()).collect();
        Matrix::from_vec(rows, cols, data).unwrap()
    }

    #[test]
    fn both_paths_are_bit_identical() {
        let a = counting(70, 33, 0.1);
        let b = counting(33, 90, -2.0);

        let pooled = Engine::new(EngineConfig::default().with_parallel_threshold(0)).unwrap();
        let serial = Engine::new(EngineConfig::sequential()).unwrap();

        assert_eq!(pooled.matmul(&a, &b).unwrap(), serial.matmul(&a, &b).unwrap());
        assert_eq!(pooled.matmul_parallel(&a, &b).unwrap(), matmul_on_caller(&a, &b).unwrap());
    }

    #[test]
    fn inner_dimension_mismatch_is_rejected_before_dispatch() {
        let engine = Engine::new(EngineConfig::default().with_parallel_threshold(0)).unwrap();
        let a = counting(3, 4, 0.0);
        let b = counting(3, 4, 0.0);
        assert!(matches!(engine.matmul(&a, &b), Err(Error::Dimension(_))));
    }

    #[test]
    fn shut_down_engine_rejects_pooled_products() {
        let engine = Engine::new(EngineConfig::default().with_parallel_threshold(0)).unwrap();
        engine.shutdown();
        let a = counting(4, 4, 0.0);
        assert!(matches!(engine.matmul(&a, &a), Err(Error::PoolTerminated)));
    }
}
