//! CPU kernels.
//!
//! # CPU Kernels
//!
//! Flat-buffer loops behind every [`Matrix`](crate::matrix::Matrix)
//! operation. Shapes are validated by the callers; these functions only
//! assert in debug builds.
//!
//! ## Features
//!
//! - `gemm_rows`: the one matrix-product kernel, shared by the sequential and
//!   pooled paths
//! - Element-wise maps, zips and row broadcasts, run on
//!   [`rayon`](https://docs.rs/rayon) when the [`backend`](crate::backend)
//!   says so
//!
//! ## Determinism
//!
//! Every output cell of `gemm_rows` is accumulated from `0.0` over
//! `p = 0..k` in order, using plain multiply and add. Which thread computes a
//! row, and how rows are grouped into blocks, cannot change a single bit of
//! the result.

use std::ops::Range;

use rayon::prelude::*;

use crate::backend::get_backend;

/// Computes rows `rows` of `A × B` into `out`.
///
/// - `a` is `m × k` row-major, `b` is `k × n` row-major.
/// - `out` holds exactly `rows.len() * n` elements: the output rows of this
///   block, starting at `rows.start`.
pub(crate) fn gemm_rows(a: &[f64], b: &[f64], k: usize, n: usize, rows: Range<usize>, out: &mut [f64]) {
    debug_assert_eq!(out.len(), rows.len() * n);
    debug_assert!(a.len() >= rows.end * k);
    debug_assert_eq!(b.len(), k * n);

    for (out_row, i) in out.chunks_exact_mut(n).zip(rows) {
        let a_row = &a[i * k..(i + 1) * k];
        for (j, cell) in out_row.iter_mut().enumerate() {
            let mut sum = 0.0;
            for (p, &av) in a_row.iter().enumerate() {
                sum += av * b[p * n + j];
            }
            *cell = sum;
        }
    }
}

/// `out[i] = f(src[i])`.
pub(crate) fn map<F>(src: &[f64], f: F) -> Vec<f64>
where
    F: Fn(f64) -> f64 + Sync + Send,
{
    if get_backend().is_parallel_for(src.len()) {
        src.par_iter().map(|&x| f(x)).collect()
    } else {
        src.iter().map(|&x| f(x)).collect()
    }
}

/// `dst[i] = f(dst[i])`.
pub(crate) fn map_in_place<F>(dst: &mut [f64], f: F)
where
    F: Fn(f64) -> f64 + Sync + Send,
{
    if get_backend().is_parallel_for(dst.len()) {
        dst.par_iter_mut().for_each(|x| *x = f(*x));
    } else {
        dst.iter_mut().for_each(|x| *x = f(*x));
    }
}

/// `out[i] = f(a[i], b[i])`.
pub(crate) fn zip_map<F>(a: &[f64], b: &[f64], f: F) -> Vec<f64>
where
    F: Fn(f64, f64) -> f64 + Sync + Send,
{
    debug_assert_eq!(a.len(), b.len());
    if get_backend().is_parallel_for(a.len()) {
        a.par_iter().zip(b.par_iter()).map(|(&x, &y)| f(x, y)).collect()
    } else {
        a.iter().zip(b).map(|(&x, &y)| f(x, y)).collect()
    }
}

/// `dst[i] = f(dst[i], src[i])`.
pub(crate) fn zip_in_place<F>(dst: &mut [f64], src: &[f64], f: F)
where
    F: Fn(f64, f64) -> f64 + Sync + Send,
{
    debug_assert_eq!(dst.len(), src.len());
    if get_backend().is_parallel_for(dst.len()) {
        dst.par_iter_mut()
            .zip(src.par_iter())
            .for_each(|(d, &s)| *d = f(*d, s));
    } else {
        dst.iter_mut().zip(src).for_each(|(d, &s)| *d = f(*d, s));
    }
}

/// `out[r * cols + c] = f(src[r * cols + c], per_row[r])`.
///
/// Broadcasts one value per row across all columns of that row.
pub(crate) fn broadcast_rows<F>(src: &[f64], cols: usize, per_row: &[f64], f: F) -> Vec<f64>
where
    F: Fn(f64, f64) -> f64 + Sync + Send,
{
    debug_assert_eq!(src.len(), cols * per_row.len());
    let mut out = vec![0.0; src.len()];

    let fill = |(dst, (row, &v)): (&mut [f64], (&[f64], &f64))| {
        for (d, &x) in dst.iter_mut().zip(row) {
            *d = f(x, v);
        }
    };

    if get_backend().is_parallel_for(src.len()) {
        out.par_chunks_mut(cols)
            .zip(src.par_chunks(cols).zip(per_row.par_iter()))
            .for_each(fill);
    } else {
        out.chunks_mut(cols)
            .zip(src.chunks(cols).zip(per_row))
            .for_each(fill);
    }

    out
}

/// Row-major transpose of an `rows × cols` buffer.
pub(crate) fn transpose(src: &[f64], rows: usize, cols: usize) -> Vec<f64> {
    debug_assert_eq!(src.len(), rows * cols);
    let mut out = vec![0.0; src.len()];
    for i in 0..rows {
        for j in 0..cols {
            out[j * rows + i] = src[i * cols + j];
        }
    }
    out
}
