//! Dense row-major matrices.
//!
//! # Dense Matrix
//!
//! [`Matrix`] owns a flat `Vec<f64>` of `rows * cols` elements stored row by
//! row (`index = row * cols + col`). Both dimensions are at least one and the
//! shape never changes after construction; element values are mutable.
//! Copies are deep.
//!
//! ## Checked vs. operator API
//!
//! Every operation has a checked method returning [`Result`] (`try_add`,
//! `hadamard`, `matmul`, `add_column`, ...). Shapes are validated before any
//! element is computed, so an error never leaves a partial result. The
//! `std::ops` operators in [`ops`](crate::ops) call these methods and panic
//! with the error message on misuse.
//!
//! ## Indexing
//!
//! [`Matrix::get`] / [`Matrix::get_mut`] return [`Error::Index`] when out of
//! range. [`Matrix::at`], [`Matrix::at_mut`] and `matrix[(r, c)]` panic
//! instead, like slice indexing.
//!
//! ## Example
//!
//! ```rust
//! use dense_mlp::matrix;
//!
//! let a = matrix![[1.0, 2.0], [3.0, 4.0]];
//! let b = matrix![[5.0, 6.0], [7.0, 8.0]];
//! assert_eq!(&a * &b, matrix![[19.0, 22.0], [43.0, 50.0]]);
//! assert_eq!(&a + &b, matrix![[6.0, 8.0], [10.0, 12.0]]);
//! assert_eq!(&a & &b, matrix![[5.0, 12.0], [21.0, 32.0]]);
//! ```

use std::fmt;
use std::mem;
use std::ops::{Index, IndexMut};

use rand::distr::{Distribution, Uniform};
use rand::Rng;

use crate::engine::{default_engine, Engine};
use crate::error::{dimension, shape, Error, Result};
use crate::ops::cpu;
use crate::vector::Vector;

/// A dense `rows × cols` matrix of `f64`.
#[derive(Debug, Clone, PartialEq)]
pub struct Matrix {
    rows: usize,
    cols: usize,
    data: Vec<f64>,
}

/// Validates a shape and returns its element count.
fn check_dims(rows: usize, cols: usize) -> Result<usize> {
    if rows == 0 || cols == 0 {
        return Err(dimension(format!(
            "matrix dimensions must be positive, got {rows}x{cols}"
        )));
    }
    // a buffer must stay within `isize::MAX` bytes
    rows.checked_mul(cols)
        .filter(|&len| len <= isize::MAX as usize / mem::size_of::<f64>())
        .ok_or_else(|| dimension(format!("a {rows}x{cols} matrix is too large")))
}

impl Matrix {
    /// A `rows × cols` matrix of zeros.
    ///
    /// # Errors
    ///
    /// [`Error::Dimension`] if either dimension is zero.
    pub fn zeros(rows: usize, cols: usize) -> Result<Self> {
        Self::filled(rows, cols, 0.0)
    }

    /// A `rows × cols` matrix with every element set to `value`.
    ///
    /// # Errors
    ///
    /// [`Error::Dimension`] if either dimension is zero or the element
    /// count does not fit in memory.
    pub fn filled(rows: usize, cols: usize, value: f64) -> Result<Self> {
        let len = check_dims(rows, cols)?;
        Ok(Self::from_parts(rows, cols, vec![value; len]))
    }

    /// Wraps a row-major buffer.
    ///
    /// # Errors
    ///
    /// [`Error::Dimension`] if either dimension is zero or
    /// `data.len() != rows * cols`.
    pub fn from_vec(rows: usize, cols: usize, data: Vec<f64>) -> Result<Self> {
        let len = check_dims(rows, cols)?;
        if data.len() != len {
            return Err(dimension(format!(
                "{} values do not fill a {rows}x{cols} matrix",
                data.len()
            )));
        }
        Ok(Self::from_parts(rows, cols, data))
    }

    /// Builds a matrix from nested rows.
    ///
    /// # Errors
    ///
    /// [`Error::Dimension`] if there are no rows, the first row is empty, or
    /// any row differs in length from the first.
    pub fn from_rows<R: AsRef<[f64]>>(rows: &[R]) -> Result<Self> {
        let cols = rows.first().map_or(0, |r| r.as_ref().len());
        let len = check_dims(rows.len(), cols)?;

        let mut data = Vec::with_capacity(len);
        for (i, row) in rows.iter().enumerate() {
            let row = row.as_ref();
            if row.len() != cols {
                return Err(dimension(format!(
                    "row {i} has {} columns, expected {cols}",
                    row.len()
                )));
            }
            data.extend_from_slice(row);
        }
        Ok(Self::from_parts(rows.len(), cols, data))
    }

    /// The `n × n` identity matrix.
    ///
    /// # Errors
    ///
    /// [`Error::Dimension`] if `n` is zero.
    pub fn identity(n: usize) -> Result<Self> {
        let mut m = Self::zeros(n, n)?;
        for i in 0..n {
            m.data[i * n + i] = 1.0;
        }
        Ok(m)
    }

    /// A matrix of values drawn uniformly from `[min, max)`.
    ///
    /// # Errors
    ///
    /// [`Error::Dimension`] if either dimension is zero, or the range is
    /// empty or not finite.
    pub fn random<R: Rng + ?Sized>(
        rows: usize,
        cols: usize,
        min: f64,
        max: f64,
        rng: &mut R,
    ) -> Result<Self> {
        let len = check_dims(rows, cols)?;
        let uniform = Uniform::new(min, max)
            .map_err(|e| dimension(format!("bad sampling range [{min}, {max}): {e}")))?;
        let data = (0..len).map(|_| uniform.sample(rng)).collect();
        Ok(Self::from_parts(rows, cols, data))
    }

    /// Unchecked constructor for buffers whose shape is already known good.
    pub(crate) fn from_parts(rows: usize, cols: usize, data: Vec<f64>) -> Self {
        debug_assert!(rows > 0 && cols > 0);
        debug_assert_eq!(data.len(), rows * cols);
        Self { rows, cols, data }
    }

    #[must_use]
    pub const fn rows(&self) -> usize {
        self.rows
    }

    #[must_use]
    pub const fn cols(&self) -> usize {
        self.cols
    }

    /// `(rows, cols)`.
    #[must_use]
    pub const fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    /// Number of elements, `rows * cols`.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Always `false`; matrices have at least one element.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Whether one of the dimensions is 1.
    #[must_use]
    pub const fn is_vector(&self) -> bool {
        self.rows == 1 || self.cols == 1
    }

    #[must_use]
    pub const fn is_square(&self) -> bool {
        self.rows == self.cols
    }

    /// The row-major element buffer.
    #[must_use]
    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [f64] {
        &mut self.data
    }

    /// Element at `(row, col)`.
    ///
    /// # Panics
    ///
    /// Panics if `row >= rows` or `col >= cols`.
    #[must_use]
    pub fn at(&self, row: usize, col: usize) -> f64 {
        self[(row, col)]
    }

    /// Mutable element at `(row, col)`.
    ///
    /// # Panics
    ///
    /// Panics if `row >= rows` or `col >= cols`.
    pub fn at_mut(&mut self, row: usize, col: usize) -> &mut f64 {
        &mut self[(row, col)]
    }

    /// Element at `(row, col)`.
    ///
    /// # Errors
    ///
    /// [`Error::Index`] if either coordinate is out of range.
    pub fn get(&self, row: usize, col: usize) -> Result<f64> {
        let idx = self.flat_index(row, col)?;
        Ok(self.data[idx])
    }

    /// Mutable element at `(row, col)`.
    ///
    /// # Errors
    ///
    /// [`Error::Index`] if either coordinate is out of range.
    pub fn get_mut(&mut self, row: usize, col: usize) -> Result<&mut f64> {
        let idx = self.flat_index(row, col)?;
        Ok(&mut self.data[idx])
    }

    /// Copy of row `i`.
    ///
    /// # Errors
    ///
    /// [`Error::Index`] if `i >= rows`.
    pub fn row(&self, i: usize) -> Result<Vec<f64>> {
        if i >= self.rows {
            return Err(Error::Index {
                index: i,
                len: self.rows,
            });
        }
        Ok(self.data[i * self.cols..(i + 1) * self.cols].to_vec())
    }

    /// Iterator over rows as slices.
    pub fn row_slices(&self) -> impl Iterator<Item = &[f64]> {
        self.data.chunks_exact(self.cols)
    }

    fn flat_index(&self, row: usize, col: usize) -> Result<usize> {
        if row >= self.rows {
            return Err(Error::Index {
                index: row,
                len: self.rows,
            });
        }
        if col >= self.cols {
            return Err(Error::Index {
                index: col,
                len: self.cols,
            });
        }
        Ok(row * self.cols + col)
    }

    /// The elements as a flat sequence.
    ///
    /// # Errors
    ///
    /// [`Error::Shape`] unless one dimension is 1.
    pub fn to_vec(&self) -> Result<Vec<f64>> {
        if !self.is_vector() {
            return Err(shape(format!(
                "only row or column matrices flatten to a sequence, got {}x{}",
                self.rows, self.cols
            )));
        }
        Ok(self.data.clone())
    }

    /// The single element of a `1 × 1` matrix.
    ///
    /// # Errors
    ///
    /// [`Error::Shape`] unless the matrix is `1 × 1`.
    pub fn to_scalar(&self) -> Result<f64> {
        if self.shape() != (1, 1) {
            return Err(shape(format!(
                "only a 1x1 matrix converts to a scalar, got {}x{}",
                self.rows, self.cols
            )));
        }
        Ok(self.data[0])
    }

    /// Consumes the matrix, returning its row-major buffer.
    #[must_use]
    pub fn into_vec(self) -> Vec<f64> {
        self.data
    }

    fn check_same_shape(&self, other: &Self, op: &str) -> Result<()> {
        if self.shape() != other.shape() {
            return Err(dimension(format!(
                "{op} needs equal shapes, got {}x{} and {}x{}",
                self.rows, self.cols, other.rows, other.cols
            )));
        }
        Ok(())
    }

    fn zip_with<F>(&self, other: &Self, op: &str, f: F) -> Result<Self>
    where
        F: Fn(f64, f64) -> f64 + Sync + Send,
    {
        self.check_same_shape(other, op)?;
        Ok(Self::from_parts(
            self.rows,
            self.cols,
            cpu::zip_map(&self.data, &other.data, f),
        ))
    }

    /// Element-wise `self + other`.
    ///
    /// # Errors
    ///
    /// [`Error::Dimension`] unless the shapes are equal.
    pub fn try_add(&self, other: &Self) -> Result<Self> {
        self.zip_with(other, "addition", |x, y| x + y)
    }

    /// Element-wise `self - other`.
    ///
    /// # Errors
    ///
    /// [`Error::Dimension`] unless the shapes are equal.
    pub fn try_sub(&self, other: &Self) -> Result<Self> {
        self.zip_with(other, "subtraction", |x, y| x - y)
    }

    /// Hadamard (element-wise) product.
    ///
    /// # Errors
    ///
    /// [`Error::Dimension`] unless the shapes are equal.
    pub fn hadamard(&self, other: &Self) -> Result<Self> {
        self.zip_with(other, "hadamard product", |x, y| x * y)
    }

    /// In-place `self += other`.
    ///
    /// # Errors
    ///
    /// [`Error::Dimension`] unless the shapes are equal; `self` is untouched.
    pub fn try_add_assign(&mut self, other: &Self) -> Result<()> {
        self.check_same_shape(other, "addition")?;
        cpu::zip_in_place(&mut self.data, &other.data, |x, y| x + y);
        Ok(())
    }

    /// In-place `self -= other`.
    ///
    /// # Errors
    ///
    /// [`Error::Dimension`] unless the shapes are equal; `self` is untouched.
    pub fn try_sub_assign(&mut self, other: &Self) -> Result<()> {
        self.check_same_shape(other, "subtraction")?;
        cpu::zip_in_place(&mut self.data, &other.data, |x, y| x - y);
        Ok(())
    }

    fn broadcast<F>(&self, column: &Vector, op: &str, f: F) -> Result<Self>
    where
        F: Fn(f64, f64) -> f64 + Sync + Send,
    {
        if column.size() != self.rows {
            return Err(dimension(format!(
                "{op} needs a vector of {} elements, got {}",
                self.rows,
                column.size()
            )));
        }
        Ok(Self::from_parts(
            self.rows,
            self.cols,
            cpu::broadcast_rows(&self.data, self.cols, column.as_slice(), f),
        ))
    }

    /// Adds `column[r]` to every element of row `r`, i.e. adds the vector to
    /// each column of the matrix.
    ///
    /// Either vector orientation is accepted; only its length matters.
    ///
    /// # Errors
    ///
    /// [`Error::Dimension`] unless `column.size() == rows`.
    pub fn add_column(&self, column: &Vector) -> Result<Self> {
        self.broadcast(column, "column broadcast addition", |x, v| x + v)
    }

    /// Subtracts `column[r]` from every element of row `r`.
    ///
    /// # Errors
    ///
    /// [`Error::Dimension`] unless `column.size() == rows`.
    pub fn sub_column(&self, column: &Vector) -> Result<Self> {
        self.broadcast(column, "column broadcast subtraction", |x, v| x - v)
    }

    /// Every element multiplied by `factor`.
    #[must_use]
    pub fn scale(&self, factor: f64) -> Self {
        self.apply(|x| x * factor)
    }

    /// Every element divided by `divisor`.
    #[must_use]
    pub fn div_scalar(&self, divisor: f64) -> Self {
        self.apply(|x| x / divisor)
    }

    pub fn scale_in_place(&mut self, factor: f64) {
        cpu::map_in_place(&mut self.data, |x| x * factor);
    }

    pub fn div_in_place(&mut self, divisor: f64) {
        cpu::map_in_place(&mut self.data, |x| x / divisor);
    }

    /// Matrix product on the process-default engine.
    ///
    /// # Errors
    ///
    /// - [`Error::Dimension`] if `self.cols != rhs.rows`.
    /// - Pool errors from the parallel path, or [`Error::Io`] if the default
    ///   engine cannot boot.
    pub fn matmul(&self, rhs: &Self) -> Result<Self> {
        default_engine()?.matmul(self, rhs)
    }

    /// Matrix product on `engine`.
    ///
    /// # Errors
    ///
    /// See [`Engine::matmul`].
    pub fn matmul_with(&self, rhs: &Self, engine: &Engine) -> Result<Self> {
        engine.matmul(self, rhs)
    }

    /// Product with a vector read as a column; the result is a column vector.
    ///
    /// # Errors
    ///
    /// [`Error::Dimension`] unless `vector.size() == cols`, plus pool errors.
    pub fn mul_vector(&self, vector: &Vector, engine: &Engine) -> Result<Vector> {
        let column = vector.as_column();
        let product = engine.matmul(self, column.as_matrix())?;
        Vector::try_from(product)
    }

    /// `result[j][i] = self[i][j]`.
    #[must_use]
    pub fn transpose(&self) -> Self {
        Self::from_parts(
            self.cols,
            self.rows,
            cpu::transpose(&self.data, self.rows, self.cols),
        )
    }

    /// New matrix with `f` applied to every element.
    #[must_use]
    pub fn apply<F>(&self, f: F) -> Self
    where
        F: Fn(f64) -> f64 + Sync + Send,
    {
        Self::from_parts(self.rows, self.cols, cpu::map(&self.data, f))
    }

    /// New matrix with `result[i][j] = f(self[i][j], other[i][j])`.
    ///
    /// # Errors
    ///
    /// [`Error::Dimension`] unless the shapes are equal.
    pub fn apply_for_each<F>(&self, f: F, other: &Self) -> Result<Self>
    where
        F: Fn(f64, f64) -> f64 + Sync + Send,
    {
        self.zip_with(other, "apply_for_each", f)
    }

    /// Sum of every element.
    #[must_use]
    pub fn sum(&self) -> f64 {
        self.data.iter().sum()
    }

    /// Column vector of per-row sums.
    #[must_use]
    pub fn row_sums(&self) -> Vector {
        let sums = self.row_slices().map(|row| row.iter().sum()).collect();
        Vector::from_matrix_unchecked(Self::from_parts(self.rows, 1, sums))
    }
}

impl Index<(usize, usize)> for Matrix {
    type Output = f64;

    fn index(&self, (row, col): (usize, usize)) -> &f64 {
        assert!(
            row < self.rows && col < self.cols,
            "index ({row}, {col}) out of range for {}x{} matrix",
            self.rows,
            self.cols
        );
        &self.data[row * self.cols + col]
    }
}

impl IndexMut<(usize, usize)> for Matrix {
    fn index_mut(&mut self, (row, col): (usize, usize)) -> &mut f64 {
        assert!(
            row < self.rows && col < self.cols,
            "index ({row}, {col}) out of range for {}x{} matrix",
            self.rows,
            self.cols
        );
        &mut self.data[row * self.cols + col]
    }
}

impl TryFrom<Vec<Vec<f64>>> for Matrix {
    type Error = Error;

    fn try_from(rows: Vec<Vec<f64>>) -> Result<Self> {
        Self::from_rows(&rows)
    }
}

impl From<f64> for Matrix {
    fn from(value: f64) -> Self {
        Self::from_parts(1, 1, vec![value])
    }
}

impl fmt::Display for Matrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in self.row_slices() {
            write!(f, "[")?;
            for (j, value) in row.iter().enumerate() {
                if j > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{value}")?;
            }
            writeln!(f, "]")?;
        }
        Ok(())
    }
}

/// Defines a matrix from nested literal rows.
///
/// # Panics
///
/// Panics on ragged rows.
///
/// # Example
/// ```
/// use dense_mlp::matrix;
/// let m = matrix![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]];
/// assert_eq!(m.shape(), (2, 3));
/// ```
#[macro_export]
macro_rules! matrix {
    ($([ $($x:expr),+ $(,)? ]),+ $(,)?) => {{
        let rows: ::std::vec::Vec<::std::vec::Vec<f64>> = vec![$(vec![$($x as f64),+]),+];
        match $crate::matrix::Matrix::from_rows(&rows) {
            Ok(m) => m,
            Err(e) => panic!("{}", e),
        }
    }};
}
