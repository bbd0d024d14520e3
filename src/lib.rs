//! dense_mlp: dense `f64` matrices on a fixed worker pool, and a small
//! multilayer perceptron built on them.
//!
//! Matrix products above a size threshold are split into contiguous row
//! blocks and computed on a fixed set of long-lived worker threads. Each
//! block writes a disjoint part of the result, so no locking happens while
//! the blocks run, and the parallel and sequential paths agree bit for bit.
//!
//! # Features
//!
//! - Row-major dense matrices with checked (`Result`) methods and panicking
//!   `std::ops` operators.
//! - A fixed-size worker pool with a FIFO queue, graceful shutdown and
//!   panic capture.
//! - Row-block dispatch with a per-call join barrier, safe to use from many
//!   threads at once on one pool.
//! - Dense layers, activation and cost functions, and mini-batch gradient
//!   descent for a multilayer perceptron.
//!
//! # Modules
//!
//! - [`matrix`] / [`vector`]: the data types.
//! - [`pool`]: the worker pool.
//! - [`dispatch`]: row partitioning and the blocking parallel loop.
//! - [`engine`]: pool plus multiply policy; the process-default engine.
//! - [`backend`]: element-wise kernel selection (sequential or rayon).
//! - [`nn`]: layers, costs, data and training.
//! - [`approx`]: tolerance comparisons.
//!
//! # Example
//!
//! ```rust
//! use dense_mlp::{matrix, Engine, EngineConfig, Matrix};
//!
//! let engine = Engine::new(EngineConfig::default()).unwrap();
//! let a = Matrix::filled(128, 32, 0.5).unwrap();
//! let b = Matrix::identity(32).unwrap();
//!
//! // 128 rows > 64, so this runs on the pool
//! let c = a.matmul_with(&b, &engine).unwrap();
//! assert_eq!(c, a);
//!
//! let small = matrix![[1.0, 2.0], [3.0, 4.0]];
//! assert_eq!(small.transpose(), matrix![[1.0, 3.0], [2.0, 4.0]]);
//! ```

pub mod approx;
pub mod backend;
pub mod config;
pub mod dispatch;
pub mod engine;
pub mod error;
pub mod matrix;
pub mod nn;
pub mod ops;
pub mod pool;
pub mod vector;

pub use config::EngineConfig;
pub use engine::{default_engine, install_default, shutdown_default, Engine};
pub use error::{Error, Result};
pub use matrix::Matrix;
pub use pool::WorkerPool;
pub use vector::{Orientation, Vector};
