//! Activation functions.

use crate::matrix::Matrix;

/// Slope of [`Activation::LeakyReLU`] for negative inputs.
pub const LEAKY_RELU_SLOPE: f64 = 0.1;

/// Inputs beyond this magnitude get a zero sigmoid derivative.
pub const SIGMOID_DX_CUTOFF: f64 = 5.0;

/// Element-wise non-linearity applied to a layer's pre-activations.
///
/// Values are plain `Copy` data; a layer stores one by value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Activation {
    /// `max(x, 0)`.
    ReLU,
    /// `x` for positive inputs, `0.1 * x` otherwise.
    LeakyReLU,
    /// Hyperbolic tangent.
    Tanh,
    /// `1 / (1 + e^-x)`.
    LogisticSigmoid,
    /// Identity.
    #[default]
    Linear,
}

impl Activation {
    /// Applies the function to one value.
    #[must_use]
    pub fn apply(self, x: f64) -> f64 {
        match self {
            Self::ReLU => {
                if x > 0.0 {
                    x
                } else {
                    0.0
                }
            }
            Self::LeakyReLU => {
                if x > 0.0 {
                    x
                } else {
                    x * LEAKY_RELU_SLOPE
                }
            }
            Self::Tanh => x.tanh(),
            Self::LogisticSigmoid => 1.0 / (1.0 + (-x).exp()),
            Self::Linear => x,
        }
    }

    /// Derivative at `x`.
    ///
    /// The sigmoid derivative is computed as `1 / (e^x + 2 + e^-x)` and
    /// flattened to zero outside `[-5, 5]`.
    #[must_use]
    pub fn dx(self, x: f64) -> f64 {
        match self {
            Self::ReLU => {
                if x > 0.0 {
                    1.0
                } else {
                    0.0
                }
            }
            Self::LeakyReLU => {
                if x > 0.0 {
                    1.0
                } else {
                    LEAKY_RELU_SLOPE
                }
            }
            Self::Tanh => {
                let c = x.cosh();
                1.0 / c / c
            }
            Self::LogisticSigmoid => {
                if x.abs() > SIGMOID_DX_CUTOFF {
                    0.0
                } else {
                    1.0 / (x.exp() + 2.0 + (-x).exp())
                }
            }
            Self::Linear => 1.0,
        }
    }

    /// Applies the function to every element.
    #[must_use]
    pub fn forward(self, z: &Matrix) -> Matrix {
        z.apply(move |x| self.apply(x))
    }

    /// Derivative at every element.
    #[must_use]
    pub fn derivative(self, z: &Matrix) -> Matrix {
        z.apply(move |x| self.dx(x))
    }
}
