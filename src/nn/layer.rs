//! Fully connected layers.

use rand::Rng;

use crate::engine::Engine;
use crate::error::{dimension, Result};
use crate::matrix::Matrix;
use crate::nn::Activation;
use crate::vector::Vector;

/// Range new weights and biases are drawn from.
pub const INIT_RANGE: (f64, f64) = (-1.0, 1.0);

/// A dense layer: `a = act(W·x + b)`.
///
/// Inputs are `inputs × n` matrices holding one sample per column. The last
/// forward pass is cached for backpropagation.
#[derive(Debug, Clone)]
pub struct Layer {
    weights: Matrix,
    bias: Vector,
    activation: Activation,
    z: Option<Matrix>,
    a: Option<Matrix>,
}

impl Layer {
    /// A layer with weights and biases drawn uniformly from [`INIT_RANGE`].
    ///
    /// # Errors
    ///
    /// [`Error::Dimension`](crate::Error::Dimension) if either size is zero.
    pub fn new<R: Rng + ?Sized>(
        inputs: usize,
        outputs: usize,
        activation: Activation,
        rng: &mut R,
    ) -> Result<Self> {
        let (lo, hi) = INIT_RANGE;
        let weights = Matrix::random(outputs, inputs, lo, hi, rng)?;
        let bias = Matrix::random(outputs, 1, lo, hi, rng)?;
        Self::from_parts(weights, Vector::try_from(bias)?, activation)
    }

    /// A layer with given parameters; `weights` is `outputs × inputs`.
    ///
    /// # Errors
    ///
    /// [`Error::Dimension`](crate::Error::Dimension) unless
    /// `bias.size() == weights.rows()`.
    pub fn from_parts(weights: Matrix, bias: Vector, activation: Activation) -> Result<Self> {
        if bias.size() != weights.rows() {
            return Err(dimension(format!(
                "bias of {} values for a layer of {} outputs",
                bias.size(),
                weights.rows()
            )));
        }
        Ok(Self {
            weights,
            bias: bias.as_column(),
            activation,
            z: None,
            a: None,
        })
    }

    #[must_use]
    pub const fn inputs(&self) -> usize {
        self.weights.cols()
    }

    #[must_use]
    pub const fn outputs(&self) -> usize {
        self.weights.rows()
    }

    #[must_use]
    pub const fn weights(&self) -> &Matrix {
        &self.weights
    }

    #[must_use]
    pub const fn bias(&self) -> &Vector {
        &self.bias
    }

    #[must_use]
    pub const fn activation(&self) -> Activation {
        self.activation
    }

    /// `z` of the last [`forward`](Self::forward) call.
    #[must_use]
    pub const fn pre_activation(&self) -> Option<&Matrix> {
        self.z.as_ref()
    }

    /// `a` of the last [`forward`](Self::forward) call.
    #[must_use]
    pub const fn output(&self) -> Option<&Matrix> {
        self.a.as_ref()
    }

    /// Computes `(z, a)` without touching the cache.
    ///
    /// # Errors
    ///
    /// [`Error::Dimension`](crate::Error::Dimension) unless
    /// `input.rows() == self.inputs()`, plus pool errors from `engine`.
    pub fn evaluate(&self, input: &Matrix, engine: &Engine) -> Result<(Matrix, Matrix)> {
        if input.rows() != self.inputs() {
            return Err(dimension(format!(
                "layer takes {} inputs, got {}",
                self.inputs(),
                input.rows()
            )));
        }
        let z = engine.matmul(&self.weights, input)?.add_column(&self.bias)?;
        let a = self.activation.forward(&z);
        Ok((z, a))
    }

    /// Like [`evaluate`](Self::evaluate), caching `z` and `a`.
    ///
    /// # Errors
    ///
    /// See [`Layer::evaluate`].
    pub fn forward(&mut self, input: &Matrix, engine: &Engine) -> Result<&Matrix> {
        let (z, a) = self.evaluate(input, engine)?;
        self.z = Some(z);
        Ok(&*self.a.insert(a))
    }

    /// `W -= rate·dW`, `b -= rate·db`.
    ///
    /// # Errors
    ///
    /// [`Error::Dimension`](crate::Error::Dimension) if the gradients do not
    /// match the parameter shapes; nothing is changed in that case.
    pub fn adjust(&mut self, dw: &Matrix, db: &Vector, rate: f64) -> Result<()> {
        if dw.shape() != self.weights.shape() || db.size() != self.bias.size() {
            return Err(dimension(format!(
                "gradients {}x{} / {} do not fit a {}x{} layer",
                dw.rows(),
                dw.cols(),
                db.size(),
                self.weights.rows(),
                self.weights.cols()
            )));
        }
        self.weights.try_sub_assign(&dw.scale(rate))?;

        self.bias = Vector::try_from(self.bias.try_sub(&db.as_column().scale(rate))?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::matrix;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn engine() -> Engine {
        Engine::new(EngineConfig::sequential()).unwrap()
    }

    #[test]
    fn forward_broadcasts_bias_over_samples() {
        let mut layer = Layer::from_parts(
            matrix![[1, 0], [0, 2]],
            Vector::column(vec![1.0, -1.0]).unwrap(),
            Activation::ReLU,
        )
        .unwrap();
        // two samples as columns
        let x = matrix![[1, -5], [1, 3]];
        let a = layer.forward(&x, &engine()).unwrap().clone();

        assert_eq!(layer.pre_activation(), Some(&matrix![[2, -4], [1, 5]]));
        assert_eq!(a, matrix![[2, 0], [1, 5]]);
    }

    #[test]
    fn rejects_wrong_input_size() {
        let layer = Layer::new(3, 2, Activation::Tanh, &mut StdRng::seed_from_u64(0)).unwrap();
        assert_eq!(layer.weights().shape(), (2, 3));
        assert!(layer.evaluate(&matrix![[1], [2]], &engine()).is_err());
    }

    #[test]
    fn adjust_steps_against_gradient() {
        let mut layer = Layer::from_parts(
            matrix![[1, 1]],
            Vector::column(vec![0.5]).unwrap(),
            Activation::Linear,
        )
        .unwrap();
        layer
            .adjust(&matrix![[2, -2]], &Vector::column(vec![1.0]).unwrap(), 0.5)
            .unwrap();
        assert_eq!(layer.weights(), &matrix![[0, 2]]);
        assert_eq!(layer.bias().as_slice(), &[0.0]);

        let before = layer.weights().clone();
        assert!(layer.adjust(&matrix![[1]], &Vector::column(vec![1.0]).unwrap(), 1.0).is_err());
        assert_eq!(layer.weights(), &before);
    }
}
