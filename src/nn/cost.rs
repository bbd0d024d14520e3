//! Cost functions.

use crate::error::{dimension, Result};
use crate::matrix::Matrix;

/// Outputs are clamped to `[EPS, 1 - EPS]` before taking logarithms.
const EPS: f64 = 1e-12;

/// Per-element cost of a prediction `value` against `target`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Cost {
    /// Squared error, `(value - target)²`.
    #[default]
    L2,
    /// `-(t·ln v + (1 - t)·ln(1 - v))`, for outputs in `(0, 1)`.
    BinaryCrossEntropy,
}

impl Cost {
    #[must_use]
    pub fn eval(self, target: f64, value: f64) -> f64 {
        match self {
            Self::L2 => (value - target) * (value - target),
            Self::BinaryCrossEntropy => {
                let v = value.clamp(EPS, 1.0 - EPS);
                -(target * v.ln() + (1.0 - target) * (1.0 - v).ln())
            }
        }
    }

    /// Derivative with respect to `value`.
    #[must_use]
    pub fn dx(self, target: f64, value: f64) -> f64 {
        match self {
            Self::L2 => 2.0 * (value - target),
            Self::BinaryCrossEntropy => {
                let v = value.clamp(EPS, 1.0 - EPS);
                (v - target) / (v * (1.0 - v))
            }
        }
    }

    /// Element-wise derivative of outputs `values` against `targets`.
    ///
    /// # Errors
    ///
    /// [`Error::Dimension`](crate::Error::Dimension) unless the shapes match.
    pub fn gradient(self, targets: &Matrix, values: &Matrix) -> Result<Matrix> {
        targets.apply_for_each(move |t, v| self.dx(t, v), values)
    }

    /// Summed cost over every element, divided by the number of samples
    /// (columns).
    ///
    /// # Errors
    ///
    /// [`Error::Dimension`](crate::Error::Dimension) unless the shapes match.
    pub fn mean(self, targets: &Matrix, values: &Matrix) -> Result<f64> {
        if targets.shape() != values.shape() {
            return Err(dimension(format!(
                "targets are {}x{} but outputs are {}x{}",
                targets.rows(),
                targets.cols(),
                values.rows(),
                values.cols()
            )));
        }
        let total: f64 = targets
            .as_slice()
            .iter()
            .zip(values.as_slice())
            .map(|(&t, &v)| self.eval(t, v))
            .sum();
        Ok(total / targets.cols() as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::approx::approx_eq;
    use crate::matrix;

    #[test]
    fn squared_error() {
        assert_eq!(Cost::L2.eval(1.0, 3.0), 4.0);
        assert_eq!(Cost::L2.dx(1.0, 3.0), 4.0);
        assert_eq!(Cost::L2.dx(3.0, 1.0), -4.0);
    }

    #[test]
    fn cross_entropy_stays_finite() {
        let c = Cost::BinaryCrossEntropy;
        assert!(approx_eq(&c.eval(1.0, 0.5), &std::f64::consts::LN_2));
        assert!(c.eval(1.0, 0.0).is_finite());
        assert!(c.dx(0.0, 1.0).is_finite());
        assert!(c.dx(1.0, 0.9) < 0.0);
    }

    #[test]
    fn mean_divides_by_sample_count() {
        let targets = matrix![[0, 1], [1, 0]];
        let values = matrix![[1, 1], [1, 1]];
        // two wrong elements of cost 1 over two samples
        assert_eq!(Cost::L2.mean(&targets, &values).unwrap(), 1.0);
        assert!(Cost::L2.mean(&targets, &matrix![[1, 1]]).is_err());
    }
}
