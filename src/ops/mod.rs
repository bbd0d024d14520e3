//! # Operators
//!
//! `std::ops` implementations for [`Matrix`] and [`Vector`].
//!
//! | Expression        | Meaning                                   | Checked form                 |
//! |-------------------|-------------------------------------------|------------------------------|
//! | `a + b`, `a - b`  | element-wise                              | [`Matrix::try_add`] / [`Matrix::try_sub`] |
//! | `a + v`, `a - v`  | add `v[r]` to every element of row `r`    | [`Matrix::add_column`] / [`Matrix::sub_column`] |
//! | `a & b`           | Hadamard product                          | [`Matrix::hadamard`]         |
//! | `a * b`           | matrix product on the default engine      | [`Matrix::matmul`]           |
//! | `a * v`           | product with `v` as a column              | [`Matrix::mul_vector`]       |
//! | `a * s`, `s * a`, `a / s`, `-a` | element-wise scaling        | infallible                   |
//!
//! Every operator accepts owned values and references. Compound forms
//! (`+=`, `-=`, `*=`, `/=`) are provided where the shape cannot change.
//!
//! ## Panics
//!
//! The matrix-valued operators panic with the [`Error`](crate::Error) message
//! when the checked form would fail. Use the checked form to handle
//! mismatched shapes or pool failures as values.
//!
//! The flat-buffer kernels behind these live in the private `cpu` module.

pub(crate) mod cpu;

use std::ops::{Add, AddAssign, BitAnd, Div, DivAssign, Mul, MulAssign, Neg, Sub, SubAssign};

use crate::engine::default_engine;
use crate::error::Result;
use crate::matrix::Matrix;
use crate::vector::Vector;

#[track_caller]
fn or_panic<T>(result: Result<T>) -> T {
    match result {
        Ok(value) => value,
        Err(e) => panic!("{e}"),
    }
}

/// Implements a binary operator for every owned/borrowed combination by
/// forwarding to a checked method on `&Matrix`.
macro_rules! forward_binop {
    ($tr:ident, $method:ident, $rhs:ty, $out:ty, $checked:expr) => {
        impl $tr<&$rhs> for &Matrix {
            type Output = $out;

            #[track_caller]
            fn $method(self, rhs: &$rhs) -> $out {
                or_panic($checked(self, rhs))
            }
        }

        impl $tr<$rhs> for &Matrix {
            type Output = $out;

            #[track_caller]
            fn $method(self, rhs: $rhs) -> $out {
                or_panic($checked(self, &rhs))
            }
        }

        impl $tr<&$rhs> for Matrix {
            type Output = $out;

            #[track_caller]
            fn $method(self, rhs: &$rhs) -> $out {
                or_panic($checked(&self, rhs))
            }
        }

        impl $tr<$rhs> for Matrix {
            type Output = $out;

            #[track_caller]
            fn $method(self, rhs: $rhs) -> $out {
                or_panic($checked(&self, &rhs))
            }
        }
    };
}

forward_binop!(Add, add, Matrix, Matrix, Matrix::try_add);
forward_binop!(Sub, sub, Matrix, Matrix, Matrix::try_sub);
forward_binop!(BitAnd, bitand, Matrix, Matrix, Matrix::hadamard);
forward_binop!(Mul, mul, Matrix, Matrix, Matrix::matmul);
forward_binop!(Add, add, Vector, Matrix, Matrix::add_column);
forward_binop!(Sub, sub, Vector, Matrix, Matrix::sub_column);
forward_binop!(Mul, mul, Vector, Vector, |m: &Matrix, v: &Vector| {
    default_engine().and_then(|engine| m.mul_vector(v, &engine))
});

/// Scalar operators, element-wise and infallible.
macro_rules! scalar_binop {
    ($tr:ident, $method:ident, $kernel:ident) => {
        impl $tr<f64> for &Matrix {
            type Output = Matrix;

            fn $method(self, rhs: f64) -> Matrix {
                self.$kernel(rhs)
            }
        }

        impl $tr<f64> for Matrix {
            type Output = Matrix;

            fn $method(self, rhs: f64) -> Matrix {
                self.$kernel(rhs)
            }
        }
    };
}

scalar_binop!(Mul, mul, scale);
scalar_binop!(Div, div, div_scalar);

impl Mul<&Matrix> for f64 {
    type Output = Matrix;

    fn mul(self, rhs: &Matrix) -> Matrix {
        rhs.scale(self)
    }
}

impl Mul<Matrix> for f64 {
    type Output = Matrix;

    fn mul(self, rhs: Matrix) -> Matrix {
        rhs.scale(self)
    }
}

impl Neg for &Matrix {
    type Output = Matrix;

    fn neg(self) -> Matrix {
        self.apply(|x| -x)
    }
}

impl Neg for Matrix {
    type Output = Matrix;

    fn neg(mut self) -> Matrix {
        self.scale_in_place(-1.0);
        self
    }
}

impl AddAssign<&Matrix> for Matrix {
    #[track_caller]
    fn add_assign(&mut self, rhs: &Matrix) {
        or_panic(self.try_add_assign(rhs));
    }
}

impl AddAssign<Matrix> for Matrix {
    #[track_caller]
    fn add_assign(&mut self, rhs: Matrix) {
        or_panic(self.try_add_assign(&rhs));
    }
}

impl SubAssign<&Matrix> for Matrix {
    #[track_caller]
    fn sub_assign(&mut self, rhs: &Matrix) {
        or_panic(self.try_sub_assign(rhs));
    }
}

impl SubAssign<Matrix> for Matrix {
    #[track_caller]
    fn sub_assign(&mut self, rhs: Matrix) {
        or_panic(self.try_sub_assign(&rhs));
    }
}

impl MulAssign<f64> for Matrix {
    fn mul_assign(&mut self, rhs: f64) {
        self.scale_in_place(rhs);
    }
}

impl DivAssign<f64> for Matrix {
    fn div_assign(&mut self, rhs: f64) {
        self.div_in_place(rhs);
    }
}

#[cfg(test)]
mod tests {
    use crate::matrix;
    use crate::matrix::Matrix;
    use crate::vector::Vector;

    #[test]
    fn product_matches_hand_computed_values() {
        let a = matrix![[1, 2], [3, 4]];
        let b = matrix![[5, 6], [7, 8]];
        assert_eq!(&a * &b, matrix![[19, 22], [43, 50]]);
        assert_eq!(a.clone() * b.clone(), matrix![[19, 22], [43, 50]]);
    }

    #[test]
    fn element_wise_operators() {
        let a = matrix![[1, 2], [3, 4]];
        let b = matrix![[5, 6], [7, 8]];
        assert_eq!(&a + &b, matrix![[6, 8], [10, 12]]);
        assert_eq!(&b - &a, matrix![[4, 4], [4, 4]]);
        assert_eq!(&a & &b, matrix![[5, 12], [21, 32]]);
        assert_eq!(&a * 2.0, matrix![[2, 4], [6, 8]]);
        assert_eq!(2.0 * &a, matrix![[2, 4], [6, 8]]);
        assert_eq!(&a / 2.0, matrix![[0.5, 1], [1.5, 2]]);
        assert_eq!(-&a, matrix![[-1, -2], [-3, -4]]);
    }

    #[test]
    fn compound_assignment() {
        let mut a = matrix![[1, 2], [3, 4]];
        a += &matrix![[1, 1], [1, 1]];
        a -= matrix![[2, 2], [2, 2]];
        a *= 3.0;
        a /= 3.0;
        assert_eq!(a, matrix![[0, 1], [2, 3]]);
    }

    #[test]
    fn vector_broadcast_and_product() {
        let a = matrix![[1, 2], [3, 4]];
        let v = Vector::column(vec![1.0, -1.0]).unwrap();

        assert_eq!(&a + &v, matrix![[2, 3], [2, 3]]);
        assert_eq!(&a - &v, matrix![[0, 1], [4, 5]]);

        let product = &a * &v;
        assert_eq!(product.shape(), (2, 1));
        assert_eq!(product.as_slice(), &[-1.0, -1.0]);
    }

    #[test]
    #[should_panic(expected = "dimension error")]
    fn mismatched_addition_panics() {
        let _ = matrix![[1, 2]] + Matrix::zeros(2, 2).unwrap();
    }

    #[test]
    #[should_panic(expected = "dimension error")]
    fn mismatched_product_panics() {
        let _ = matrix![[1, 2, 3]] * matrix![[1, 2, 3]];
    }
}
