//! Multilayer perceptron trained with mini-batch gradient descent.
//!
//! # Training step
//!
//! For a batch `X` (`inputs × n`) with targets `Y` (`outputs × n`):
//!
//! 1. Forward: every layer caches `Z = W·A_prev + b` and `A = act(Z)`.
//! 2. Output layer: `dZ = act'(Z) ⊙ cost'(Y, A) / n`.
//! 3. Hidden layer `l`: `dZ_l = act'(Z_l) ⊙ (Wᵀ_{l+1}·dZ_{l+1})`, where
//!    `Wᵀ_{l+1}·dZ_{l+1}` is taken before layer `l + 1` is updated.
//! 4. Every layer: `dW = dZ·A_prevᵀ`, `db = dZ·1`, then `W -= rate·dW` and
//!    `b -= rate·db`.
//!
//! All products go through the network's [`Engine`], so large layers and
//! large batches use the worker pool.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info};

use crate::engine::{default_engine, Engine};
use crate::error::{dimension, Result};
use crate::matrix::Matrix;
use crate::nn::{Activation, Batch, Cost, Dataset, Layer};

/// Hyper-parameters for [`MultilayerPerceptron::train`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrainConfig {
    pub epochs: usize,
    pub learning_rate: f64,
    /// Samples per batch; `0` trains on the whole set at once.
    pub batch_size: usize,
    /// Seeds the per-epoch shuffle.
    pub seed: u64,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            epochs: 100,
            learning_rate: 0.01,
            batch_size: 0,
            seed: 0,
        }
    }
}

/// Mean cost and accuracy over a batch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Evaluation {
    pub cost: f64,
    pub accuracy: f64,
}

/// Metrics recorded after one epoch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EpochReport {
    pub epoch: usize,
    pub cost: f64,
    pub accuracy: f64,
    /// Metrics on the held-out set, when one was given.
    pub validation: Option<Evaluation>,
}

/// A stack of dense layers behind an implicit input layer.
#[derive(Debug, Clone)]
pub struct MultilayerPerceptron {
    input_size: usize,
    cost: Cost,
    layers: Vec<Layer>,
    input: Option<Matrix>,
    engine: Engine,
}

impl MultilayerPerceptron {
    /// A network taking `input_size` features, on the process-default engine.
    ///
    /// # Errors
    ///
    /// - [`Error::Dimension`](crate::Error::Dimension) if `input_size` is 0.
    /// - [`Error::Io`](crate::Error::Io) if the default engine cannot boot.
    pub fn new(input_size: usize, cost: Cost) -> Result<Self> {
        Self::with_engine(input_size, cost, default_engine()?)
    }

    /// # Errors
    ///
    /// [`Error::Dimension`](crate::Error::Dimension) if `input_size` is 0.
    pub fn with_engine(input_size: usize, cost: Cost, engine: Engine) -> Result<Self> {
        if input_size == 0 {
            return Err(dimension("a network needs at least one input"));
        }
        Ok(Self {
            input_size,
            cost,
            layers: Vec::new(),
            input: None,
            engine,
        })
    }

    /// Appends a layer of `size` units fed by the previous layer (or the
    /// inputs), with weights drawn from `rng`.
    ///
    /// # Errors
    ///
    /// [`Error::Dimension`](crate::Error::Dimension) if `size` is 0.
    pub fn add_layer<R: Rng + ?Sized>(
        &mut self,
        size: usize,
        activation: Activation,
        rng: &mut R,
    ) -> Result<&mut Self> {
        let layer = Layer::new(self.output_size(), size, activation, rng)?;
        self.push_layer(layer)
    }

    /// Appends a prepared layer.
    ///
    /// # Errors
    ///
    /// [`Error::Dimension`](crate::Error::Dimension) if the layer's input
    /// count differs from the current output size.
    pub fn push_layer(&mut self, layer: Layer) -> Result<&mut Self> {
        if layer.inputs() != self.output_size() {
            return Err(dimension(format!(
                "layer takes {} inputs but the network produces {}",
                layer.inputs(),
                self.output_size()
            )));
        }
        self.layers.push(layer);
        Ok(self)
    }

    #[must_use]
    pub const fn input_size(&self) -> usize {
        self.input_size
    }

    /// Size of the last layer, or the input size with no layers.
    #[must_use]
    pub fn output_size(&self) -> usize {
        self.layers.last().map_or(self.input_size, Layer::outputs)
    }

    #[must_use]
    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    #[must_use]
    pub const fn cost(&self) -> Cost {
        self.cost
    }

    #[must_use]
    pub const fn engine(&self) -> &Engine {
        &self.engine
    }

    fn check_ready(&self, inputs: &Matrix) -> Result<()> {
        if self.layers.is_empty() {
            return Err(dimension("the network has no layers"));
        }
        if inputs.rows() != self.input_size {
            return Err(dimension(format!(
                "network takes {} features, got {}",
                self.input_size,
                inputs.rows()
            )));
        }
        Ok(())
    }

    /// Outputs for `inputs` (`features × n`), without caching.
    ///
    /// # Errors
    ///
    /// [`Error::Dimension`](crate::Error::Dimension) for a network without
    /// layers or a wrong feature count, plus pool errors.
    pub fn predict(&self, inputs: &Matrix) -> Result<Matrix> {
        self.check_ready(inputs)?;
        let mut current = inputs.clone();
        for layer in &self.layers {
            current = layer.evaluate(&current, &self.engine)?.1;
        }
        Ok(current)
    }

    /// Runs every layer on `inputs`, caching the activations needed by
    /// [`gradient_descent`](Self::gradient_descent) and
    /// [`backpropagate`](Self::backpropagate).
    ///
    /// # Errors
    ///
    /// See [`MultilayerPerceptron::predict`].
    pub fn forward(&mut self, inputs: &Matrix) -> Result<&Matrix> {
        self.check_ready(inputs)?;
        let mut current = inputs.clone();
        for layer in &mut self.layers {
            current = layer.forward(&current, &self.engine)?.clone();
        }
        self.input = Some(inputs.clone());
        self.layers
            .last()
            .and_then(Layer::output)
            .ok_or_else(|| dimension("the network has no layers"))
    }

    /// Activation feeding layer `index` in the last forward pass.
    fn previous_output(&self, index: usize) -> Result<&Matrix> {
        let prev = if index == 0 {
            self.input.as_ref()
        } else {
            self.layers[index - 1].output()
        };
        prev.ok_or_else(|| dimension("no forward pass has been run"))
    }

    /// Applies `dZ` to layer `index` and returns `Wᵀ·dZ` computed with the
    /// weights before the update.
    fn apply_delta(&mut self, index: usize, dz: &Matrix, rate: f64) -> Result<Matrix> {
        let a_prev = self.previous_output(index)?;
        let dw = self.engine.matmul(dz, &a_prev.transpose())?;
        let db = dz.row_sums();
        let back = self
            .engine
            .matmul(&self.layers[index].weights().transpose(), dz)?;

        self.layers[index].adjust(&dw, &db, rate)?;
        Ok(back)
    }

    fn cached(&self, index: usize) -> Result<(&Matrix, &Matrix)> {
        let layer = &self.layers[index];
        match (layer.pre_activation(), layer.output()) {
            (Some(z), Some(a)) => Ok((z, a)),
            _ => Err(dimension("no forward pass has been run")),
        }
    }

    /// Runs `batch` forward and updates the output layer.
    ///
    /// Returns `Wᵀ·dZ` of the output layer, the error signal for the layer
    /// below.
    ///
    /// # Errors
    ///
    /// [`Error::Dimension`](crate::Error::Dimension) if the batch does not fit
    /// the network, plus pool errors.
    pub fn gradient_descent(&mut self, batch: &Batch, rate: f64) -> Result<Matrix> {
        self.forward(&batch.inputs)?;
        let last = self.layers.len() - 1;

        let dz = {
            let (z, a) = self.cached(last)?;
            let activation = self.layers[last].activation();
            let cost_dx = self.cost.gradient(&batch.targets, a)?;
            activation.derivative(z).hadamard(&cost_dx)?.div_scalar(batch.len() as f64)
        };

        self.apply_delta(last, &dz, rate)
    }

    /// Updates hidden layer `index` from the error signal `changes` of the
    /// layer above, returning the signal for the layer below.
    ///
    /// # Errors
    ///
    /// [`Error::Dimension`](crate::Error::Dimension) if `index` is out of
    /// range, no forward pass ran, or `changes` has the wrong shape.
    pub fn backpropagate(&mut self, changes: &Matrix, index: usize, rate: f64) -> Result<Matrix> {
        if index >= self.layers.len() {
            return Err(dimension(format!(
                "layer {index} of a {}-layer network",
                self.layers.len()
            )));
        }
        let dz = {
            let (z, _) = self.cached(index)?;
            self.layers[index].activation().derivative(z).hadamard(changes)?
        };
        self.apply_delta(index, &dz, rate)
    }

    /// One full update on `batch`.
    ///
    /// # Errors
    ///
    /// See [`MultilayerPerceptron::gradient_descent`].
    pub fn train_batch(&mut self, batch: &Batch, rate: f64) -> Result<()> {
        let mut changes = self.gradient_descent(batch, rate)?;
        for index in (0..self.layers.len() - 1).rev() {
            changes = self.backpropagate(&changes, index, rate)?;
        }
        Ok(())
    }

    /// Mean cost and accuracy of the predictions for `batch`.
    ///
    /// With one output a prediction is correct when it lies on the same side
    /// of 0.5 as the target. With several outputs the largest output must be
    /// at the same row as the largest target.
    ///
    /// # Errors
    ///
    /// [`Error::Dimension`](crate::Error::Dimension) if the batch does not fit
    /// the network, plus pool errors.
    pub fn evaluate(&self, batch: &Batch) -> Result<Evaluation> {
        let outputs = self.predict(&batch.inputs)?;
        let cost = self.cost.mean(&batch.targets, &outputs)?;

        let n = batch.len();
        let correct = (0..n)
            .filter(|&col| {
                if outputs.rows() == 1 {
                    (outputs[(0, col)] >= 0.5) == (batch.targets[(0, col)] >= 0.5)
                } else {
                    column_argmax(&outputs, col) == column_argmax(&batch.targets, col)
                }
            })
            .count();

        Ok(Evaluation {
            cost,
            accuracy: correct as f64 / n as f64,
        })
    }

    /// Trains for `config.epochs` epochs, shuffling `train` before each one.
    ///
    /// # Errors
    ///
    /// [`Error::Dimension`](crate::Error::Dimension) if the data does not fit
    /// the network, plus pool errors.
    pub fn train(
        &mut self,
        train: &Dataset,
        test: Option<&Dataset>,
        config: &TrainConfig,
    ) -> Result<Vec<EpochReport>> {
        let mut rng = StdRng::seed_from_u64(config.seed);
        let mut shuffled = train.clone();
        let train_all = train.to_batch()?;
        let test_all = test.map(Dataset::to_batch).transpose()?;

        debug!(
            samples = train.len(),
            epochs = config.epochs,
            batch_size = config.batch_size,
            "training started"
        );

        let mut reports = Vec::with_capacity(config.epochs);
        for epoch in 0..config.epochs {
            shuffled.shuffle(&mut rng);
            for batch in shuffled.batches(config.batch_size)? {
                self.train_batch(&batch, config.learning_rate)?;
            }

            let Evaluation { cost, accuracy } = self.evaluate(&train_all)?;
            let validation = test_all.as_ref().map(|b| self.evaluate(b)).transpose()?;

            match validation {
                Some(v) => info!(
                    epoch,
                    cost,
                    accuracy,
                    validation_cost = v.cost,
                    validation_accuracy = v.accuracy,
                    "epoch finished"
                ),
                None => info!(epoch, cost, accuracy, "epoch finished"),
            }

            reports.push(EpochReport {
                epoch,
                cost,
                accuracy,
                validation,
            });
        }
        Ok(reports)
    }
}

fn column_argmax(m: &Matrix, col: usize) -> usize {
    let mut best = 0;
    for row in 1..m.rows() {
        if m[(row, col)] > m[(best, col)] {
            best = row;
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::matrix;
    use crate::nn::Sample;
    use crate::vector::Vector;

    fn engine() -> Engine {
        Engine::new(EngineConfig::sequential()).unwrap()
    }

    #[test]
    fn layers_must_chain() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut net = MultilayerPerceptron::with_engine(2, Cost::L2, engine()).unwrap();
        net.add_layer(4, Activation::ReLU, &mut rng)
            .unwrap()
            .add_layer(1, Activation::LogisticSigmoid, &mut rng)
            .unwrap();
        assert_eq!(net.output_size(), 1);

        let stray = Layer::new(3, 1, Activation::Linear, &mut rng).unwrap();
        assert!(net.push_layer(stray).is_err());
        assert!(net.predict(&matrix![[1], [2], [3]]).is_err());
    }

    #[test]
    fn empty_network_refuses_to_predict() {
        let net = MultilayerPerceptron::with_engine(2, Cost::L2, engine()).unwrap();
        assert!(net.predict(&matrix![[1], [2]]).is_err());
    }

    #[test]
    fn single_linear_unit_takes_an_exact_step() {
        // a = w·x + b with L2 cost; dZ = 2(a - y) / n
        let layer = Layer::from_parts(
            matrix![[1.0]],
            Vector::column(vec![0.0]).unwrap(),
            Activation::Linear,
        )
        .unwrap();
        let mut net = MultilayerPerceptron::with_engine(1, Cost::L2, engine()).unwrap();
        net.push_layer(layer).unwrap();

        let batch = Batch::from_samples(&[Sample::new(vec![1.0], 3.0), Sample::new(vec![2.0], 4.0)])
            .unwrap();
        // a = [1, 2], dZ = [2(1-3), 2(2-4)] / 2 = [-2, -2]
        // dW = dZ·xᵀ = -2 - 4 = -6, db = -4
        net.train_batch(&batch, 0.1).unwrap();

        let layer = &net.layers()[0];
        assert!(crate::approx::approx_eq(&layer.weights().at(0, 0), &1.6));
        assert!(crate::approx::approx_eq(&layer.bias()[0], &0.4));
    }

    #[test]
    fn evaluation_uses_threshold_for_single_output() {
        let layer = Layer::from_parts(
            matrix![[1.0]],
            Vector::column(vec![0.0]).unwrap(),
            Activation::Linear,
        )
        .unwrap();
        let mut net = MultilayerPerceptron::with_engine(1, Cost::L2, engine()).unwrap();
        net.push_layer(layer).unwrap();

        let batch = Batch::from_samples(&[
            Sample::new(vec![0.9], 1.0),
            Sample::new(vec![0.1], 0.0),
            Sample::new(vec![0.7], 0.0),
            Sample::new(vec![0.2], 1.0),
        ])
        .unwrap();
        let eval = net.evaluate(&batch).unwrap();
        assert_eq!(eval.accuracy, 0.5);
    }

    #[test]
    fn column_argmax_picks_first_largest() {
        let m = matrix![[0.1, 0.5], [0.7, 0.5], [0.2, 0.1]];
        assert_eq!(column_argmax(&m, 0), 1);
        assert_eq!(column_argmax(&m, 1), 0);
    }
}
