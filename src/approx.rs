//! Utilities to approximate equality of floating point values.
//!
//! Matrix products are bit-reproducible within this crate, but results that
//! went through a different summation order (a hand-expanded formula, an
//! associativity check) only agree up to rounding. These helpers grade the
//! absolute difference into an [`ApproxEquality`].

use crate::matrix::Matrix;

/// The max epsilon accepted on `f64`s.
pub const F64_MAX_ERROR: f64 = 1e-3;

/// The expected minimum epsilon accepted on `f64`s.
pub const F64_AVG_ERROR: f64 = 1e-6;

/// The best expected epsilon accepted on `f64`s.
pub const F64_MIN_ERROR: f64 = 1e-13;

/// Checks the distance between two values against the epsilons above.
pub trait RelativeEq<Rhs: ?Sized> {
    /// Grades the equality of `self` and `rhs`.
    fn approx_eq(&self, rhs: &Rhs) -> ApproxEquality;
}

impl RelativeEq<Self> for f64 {
    fn approx_eq(&self, rhs: &Self) -> ApproxEquality {
        let dif = (self - rhs).abs();

        if dif < F64_MIN_ERROR {
            ApproxEquality::Precise
        } else if dif < F64_AVG_ERROR {
            ApproxEquality::Partial
        } else if dif < F64_MAX_ERROR {
            ApproxEquality::Relative
        } else {
            // also covers NaN
            ApproxEquality::Scarce
        }
    }
}

impl<T: RelativeEq<U>, U> RelativeEq<[U]> for [T] {
    fn approx_eq(&self, rhs: &[U]) -> ApproxEquality {
        if self.len() != rhs.len() {
            return ApproxEquality::Scarce;
        }
        let mut eq = ApproxEquality::Precise;
        for (t_val, u_val) in self.iter().zip(rhs) {
            eq = eq.max(t_val.approx_eq(u_val));
            if eq == ApproxEquality::Scarce {
                break; // can't improve from here; not equal
            }
        }
        eq
    }
}

impl RelativeEq<Self> for Matrix {
    fn approx_eq(&self, rhs: &Self) -> ApproxEquality {
        if self.shape() != rhs.shape() {
            return ApproxEquality::Scarce;
        }
        self.as_slice().approx_eq(rhs.as_slice())
    }
}

/// The approximated equality enumerated, best first.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ApproxEquality {
    /// Very strong epsilon.
    Precise = 0,

    /// Good epsilon.
    Partial = 1,

    /// Acceptable epsilon.
    Relative = 2,

    /// No relative equality.
    Scarce = 3,
}

/// Whether `a` and `b` are within [`F64_MIN_ERROR`] everywhere.
pub fn approx_eq<A: RelativeEq<B> + ?Sized, B: ?Sized>(a: &A, b: &B) -> bool {
    a.approx_eq(b) == ApproxEquality::Precise
}

/// Whether `a` and `b` are graded `at_least` or better.
pub fn approx_eq_at<A: RelativeEq<B> + ?Sized, B: ?Sized>(
    a: &A,
    b: &B,
    at_least: ApproxEquality,
) -> bool {
    a.approx_eq(b) <= at_least
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matrix;

    #[test]
    fn grades_by_distance() {
        assert_eq!(1.0_f64.approx_eq(&1.0), ApproxEquality::Precise);
        assert_eq!(1.0_f64.approx_eq(&(1.0 + 1e-9)), ApproxEquality::Partial);
        assert_eq!(1.0_f64.approx_eq(&1.0001), ApproxEquality::Relative);
        assert_eq!(1.0_f64.approx_eq(&1.1), ApproxEquality::Scarce);
        assert_eq!(f64::NAN.approx_eq(&f64::NAN), ApproxEquality::Scarce);
    }

    #[test]
    fn slices_take_the_worst_grade() {
        let a: [f64; 3] = [1.0, 2.0, 3.0];
        let b: [f64; 3] = [1.0, 2.0 + 1e-9, 3.0 + 1e-4];
        assert_eq!(a[..].approx_eq(&b[..]), ApproxEquality::Relative);
        assert!(approx_eq_at(&a[..], &b[..], ApproxEquality::Relative));
        assert!(!approx_eq(&a[..], &b[..]));
        assert_eq!(a[..].approx_eq(&a[..2]), ApproxEquality::Scarce);
    }

    #[test]
    fn matrices_compare_shape_first() {
        let a = matrix![[1, 2, 3, 4]];
        let b = matrix![[1, 2], [3, 4]];
        assert_eq!(a.approx_eq(&b), ApproxEquality::Scarce);
        assert!(approx_eq(&b, &b.clone()));
    }
}
