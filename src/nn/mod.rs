//! Neural-network layer built on [`Matrix`](crate::Matrix).
//!
//! Samples travel as matrix columns; a batch of `n` samples with `f`
//! features is an `f × n` matrix. Every product in the forward and backward
//! passes goes through an [`Engine`](crate::Engine), so wide layers and large
//! batches run on the worker pool.
//!
//! # Example
//!
//! ```rust
//! use dense_mlp::nn::{Activation, Cost, Dataset, MultilayerPerceptron, Sample, TrainConfig};
//! use dense_mlp::{Engine, EngineConfig};
//! use rand::rngs::StdRng;
//! use rand::SeedableRng;
//!
//! let samples = vec![
//!     Sample::new(vec![0.0, 0.0], 0.0),
//!     Sample::new(vec![0.0, 1.0], 1.0),
//!     Sample::new(vec![1.0, 0.0], 1.0),
//!     Sample::new(vec![1.0, 1.0], 0.0),
//! ];
//! let data = Dataset::new(samples).unwrap();
//!
//! let mut rng = StdRng::seed_from_u64(7);
//! let engine = Engine::new(EngineConfig::sequential()).unwrap();
//! let mut net = MultilayerPerceptron::with_engine(2, Cost::L2, engine).unwrap();
//! net.add_layer(4, Activation::Tanh, &mut rng).unwrap();
//! net.add_layer(1, Activation::LogisticSigmoid, &mut rng).unwrap();
//!
//! let config = TrainConfig { epochs: 5, learning_rate: 0.5, batch_size: 0, seed: 1 };
//! let reports = net.train(&data, None, &config).unwrap();
//! assert_eq!(reports.len(), 5);
//! ```

mod activation;
mod cost;
mod data;
mod layer;
mod network;

pub use activation::{Activation, LEAKY_RELU_SLOPE, SIGMOID_DX_CUTOFF};
pub use cost::Cost;
pub use data::{Batch, Dataset, Sample};
pub use layer::{Layer, INIT_RANGE};
pub use network::{EpochReport, Evaluation, MultilayerPerceptron, TrainConfig};
