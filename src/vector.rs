//! Row and column vectors.
//!
//! A [`Vector`] is a [`Matrix`] with one dimension fixed to 1. It derefs to
//! the matrix, so every matrix method is available, and adds linear indexing
//! over the flat buffer.

use std::fmt;
use std::ops::{Deref, Index, IndexMut};

use crate::error::{dimension, shape, Error, Result};
use crate::matrix::Matrix;

/// Which dimension of a [`Vector`] holds its elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Orientation {
    /// `size × 1` (default).
    #[default]
    Column,
    /// `1 × size`.
    Row,
}

impl Orientation {
    const fn shape(self, len: usize) -> (usize, usize) {
        match self {
            Self::Column => (len, 1),
            Self::Row => (1, len),
        }
    }

    const fn flipped(self) -> Self {
        match self {
            Self::Column => Self::Row,
            Self::Row => Self::Column,
        }
    }
}

/// A single-row or single-column matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct Vector {
    inner: Matrix,
}

impl Vector {
    /// Builds a vector of the given orientation.
    ///
    /// # Errors
    ///
    /// [`Error::Dimension`] if `values` is empty.
    pub fn new(values: Vec<f64>, orientation: Orientation) -> Result<Self> {
        if values.is_empty() {
            return Err(dimension("a vector needs at least one element"));
        }
        let (rows, cols) = orientation.shape(values.len());
        Ok(Self {
            inner: Matrix::from_parts(rows, cols, values),
        })
    }

    /// `values.len() × 1`.
    ///
    /// # Errors
    ///
    /// [`Error::Dimension`] if `values` is empty.
    pub fn column(values: Vec<f64>) -> Result<Self> {
        Self::new(values, Orientation::Column)
    }

    /// `1 × values.len()`.
    ///
    /// # Errors
    ///
    /// [`Error::Dimension`] if `values` is empty.
    pub fn row(values: Vec<f64>) -> Result<Self> {
        Self::new(values, Orientation::Row)
    }

    /// # Errors
    ///
    /// [`Error::Dimension`] if `len` is zero.
    pub fn zeros(len: usize, orientation: Orientation) -> Result<Self> {
        Self::filled(len, 0.0, orientation)
    }

    /// # Errors
    ///
    /// [`Error::Dimension`] if `len` is zero or too large to allocate.
    pub fn filled(len: usize, value: f64, orientation: Orientation) -> Result<Self> {
        let (rows, cols) = orientation.shape(len);
        Ok(Self {
            inner: Matrix::filled(rows, cols, value)?,
        })
    }

    /// Wraps a matrix already known to have a dimension of 1.
    pub(crate) fn from_matrix_unchecked(inner: Matrix) -> Self {
        debug_assert!(inner.is_vector());
        Self { inner }
    }

    /// `max(rows, cols)`.
    #[must_use]
    pub fn size(&self) -> usize {
        self.inner.rows().max(self.inner.cols())
    }

    /// `1 × 1` vectors report [`Orientation::Column`].
    #[must_use]
    pub fn orientation(&self) -> Orientation {
        if self.inner.cols() == 1 {
            Orientation::Column
        } else {
            Orientation::Row
        }
    }

    #[must_use]
    pub const fn as_matrix(&self) -> &Matrix {
        &self.inner
    }

    #[must_use]
    pub fn into_matrix(self) -> Matrix {
        self.inner
    }

    /// Same elements with the other orientation.
    #[must_use]
    pub fn transpose(&self) -> Self {
        self.with_orientation(self.orientation().flipped())
    }

    /// Same elements as a column vector.
    #[must_use]
    pub fn as_column(&self) -> Self {
        self.with_orientation(Orientation::Column)
    }

    fn with_orientation(&self, orientation: Orientation) -> Self {
        let (rows, cols) = orientation.shape(self.size());
        Self {
            inner: Matrix::from_parts(rows, cols, self.inner.as_slice().to_vec()),
        }
    }

    /// Element `i` of the flat buffer.
    ///
    /// # Errors
    ///
    /// [`Error::Index`] if `i >= size()`.
    pub fn get(&self, i: usize) -> Result<f64> {
        self.inner
            .as_slice()
            .get(i)
            .copied()
            .ok_or(Error::Index {
                index: i,
                len: self.size(),
            })
    }

    /// # Errors
    ///
    /// [`Error::Index`] if `i >= size()`.
    pub fn get_mut(&mut self, i: usize) -> Result<&mut f64> {
        let len = self.size();
        self.inner
            .as_mut_slice()
            .get_mut(i)
            .ok_or(Error::Index { index: i, len })
    }

    pub fn as_mut_slice(&mut self) -> &mut [f64] {
        self.inner.as_mut_slice()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, f64> {
        self.inner.as_slice().iter()
    }

    /// Index of the largest element; the first one wins ties.
    #[must_use]
    pub fn argmax(&self) -> usize {
        let mut best = 0;
        for (i, &x) in self.iter().enumerate() {
            if x > self[best] {
                best = i;
            }
        }
        best
    }
}

impl Deref for Vector {
    type Target = Matrix;

    fn deref(&self) -> &Matrix {
        &self.inner
    }
}

impl Index<usize> for Vector {
    type Output = f64;

    fn index(&self, i: usize) -> &f64 {
        let len = self.size();
        self.inner
            .as_slice()
            .get(i)
            .unwrap_or_else(|| panic!("index {i} out of range for vector of {len}"))
    }
}

impl IndexMut<usize> for Vector {
    fn index_mut(&mut self, i: usize) -> &mut f64 {
        let len = self.size();
        self.inner
            .as_mut_slice()
            .get_mut(i)
            .unwrap_or_else(|| panic!("index {i} out of range for vector of {len}"))
    }
}

impl TryFrom<Matrix> for Vector {
    type Error = Error;

    fn try_from(m: Matrix) -> Result<Self> {
        if !m.is_vector() {
            return Err(shape(format!(
                "a {}x{} matrix is not a vector",
                m.rows(),
                m.cols()
            )));
        }
        Ok(Self { inner: m })
    }
}

impl From<Vector> for Matrix {
    fn from(v: Vector) -> Self {
        v.inner
    }
}

impl<'a> IntoIterator for &'a Vector {
    type Item = &'a f64;
    type IntoIter = std::slice::Iter<'a, f64>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl fmt::Display for Vector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.inner, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matrix;

    #[test]
    fn oversized_vectors_are_rejected() {
        assert!(matches!(Vector::zeros(usize::MAX, Orientation::Row), Err(Error::Dimension(_))));
        assert!(Vector::filled(3, 1.0, Orientation::Row).is_ok());
    }

    #[test]
    fn size_is_the_long_dimension() {
        let c = Vector::column(vec![1.0, 2.0, 3.0]).unwrap();
        assert_eq!(c.shape(), (3, 1));
        assert_eq!(c.size(), 3);

        let r = c.transpose();
        assert_eq!(r.shape(), (1, 3));
        assert_eq!(r.orientation(), Orientation::Row);
        assert_eq!(r.size(), 3);
    }

    #[test]
    fn linear_indexing() {
        let mut v = Vector::row(vec![1.0, 2.0, 3.0]).unwrap();
        v[1] = 5.0;
        assert_eq!(v[1], 5.0);
        assert_eq!(v.get(2).unwrap(), 3.0);
        assert!(matches!(v.get(3), Err(Error::Index { index: 3, len: 3 })));
        assert!(v.get_mut(9).is_err());
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn index_past_end_panics() {
        let v = Vector::zeros(2, Orientation::Column).unwrap();
        let _ = v[2];
    }

    #[test]
    fn matrix_conversion_requires_unit_dimension() {
        assert!(Vector::try_from(matrix![[1, 2, 3]]).is_ok());
        assert!(matches!(
            Vector::try_from(matrix![[1, 2], [3, 4]]),
            Err(Error::Shape(_))
        ));
        assert!(Vector::column(Vec::new()).is_err());
    }

    #[test]
    fn argmax_prefers_first_maximum() {
        let v = Vector::column(vec![0.2, 0.9, 0.9, 0.1]).unwrap();
        assert_eq!(v.argmax(), 1);
    }
}
