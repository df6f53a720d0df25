// Copyright (c) 2025 Felix Kahle.
//
// Permission is hereby granted, free of charge, to any person obtaining
// a copy of this software and associated documentation files (the
// "Software"), to deal in the Software without restriction, including
// without limitation the rights to use, copy, modify, merge, publish,
// distribute, sublicense, and/or sell copies of the Software, and to
// permit persons to whom the Software is furnished to do so, subject to
// the following conditions:
//
// The above copyright notice and this permission notice shall be
// included in all copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND,
// EXPRESS OR IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF
// MERCHANTABILITY, FITNESS FOR A PARTICULAR PURPOSE AND
// NONINFRINGEMENT. IN NO EVENT SHALL THE AUTHORS OR COPYRIGHT HOLDERS BE
// LIABLE FOR ANY CLAIM, DAMAGES OR OTHER LIABILITY, WHETHER IN AN ACTION
// OF CONTRACT, TORT OR OTHERWISE, ARISING FROM, OUT OF OR IN CONNECTION
// WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE SOFTWARE.

//! Dense linear algebra used by the Newton steps.
//!
//! Matrices are square, row-major `Vec<f64>` of `n * n` entries.

/// Position of `(row, col)`, `row <= col`, in a row-major packed upper triangle.
#[inline]
pub(crate) fn packed_upper_index(row: usize, col: usize, n: usize) -> usize {
    debug_assert!(row <= col && col < n);
    row * n - row * (row + 1) / 2 + col
}

#[inline]
pub(crate) fn packed_upper_len(n: usize) -> usize {
    n * (n + 1) / 2
}

#[inline]
pub(crate) fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

#[inline]
pub(crate) fn inf_norm(v: &[f64]) -> f64 {
    v.iter().fold(0.0, |acc, x| acc.max(x.abs()))
}

/// Adds `scale * v * v^T` to `a`.
#[inline]
pub(crate) fn add_outer(a: &mut [f64], n: usize, v: &[f64], scale: f64) {
    for i in 0..n {
        if v[i] == 0.0 {
            continue;
        }
        let row = scale * v[i];
        for j in 0..n {
            a[i * n + j] += row * v[j];
        }
    }
}

/// Factors `a` in place into its lower Cholesky factor.
///
/// Returns `false` if `a` is not numerically positive definite.
fn cholesky_in_place(a: &mut [f64], n: usize) -> bool {
    for j in 0..n {
        let mut d = a[j * n + j];
        for k in 0..j {
            d -= a[j * n + k] * a[j * n + k];
        }
        if !(d > 0.0) || !d.is_finite() {
            return false;
        }
        let d = d.sqrt();
        a[j * n + j] = d;
        for i in (j + 1)..n {
            let mut s = a[i * n + j];
            for k in 0..j {
                s -= a[i * n + k] * a[j * n + k];
            }
            a[i * n + j] = s / d;
        }
    }
    true
}

/// Solves `L L^T x = b` in place for a factor produced by `cholesky_in_place`.
fn cholesky_solve(l: &[f64], n: usize, b: &mut [f64]) {
    for i in 0..n {
        let mut s = b[i];
        for k in 0..i {
            s -= l[i * n + k] * b[k];
        }
        b[i] = s / l[i * n + i];
    }
    for i in (0..n).rev() {
        let mut s = b[i];
        for k in (i + 1)..n {
            s -= l[k * n + i] * b[k];
        }
        b[i] = s / l[i * n + i];
    }
}

/// Computes the Newton direction `p` solving `(H + delta I) p = -g`.
///
/// `delta` starts at zero and grows until the shifted matrix factors.
/// Returns `None` if no shift up to `1e20` makes it positive definite.
pub(crate) fn regularized_newton_direction(h: &[f64], n: usize, g: &[f64]) -> Option<Vec<f64>> {
    let diag_scale = (0..n).fold(1.0_f64, |acc, i| acc.max(h[i * n + i].abs()));
    let mut delta = 0.0;
    while delta <= 1e20 {
        let mut a = h.to_vec();
        for i in 0..n {
            a[i * n + i] += delta;
        }
        if cholesky_in_place(&mut a, n) {
            let mut p: Vec<f64> = g.iter().map(|x| -x).collect();
            cholesky_solve(&a, n, &mut p);
            if p.iter().all(|x| x.is_finite()) {
                return Some(p);
            }
        }
        delta = if delta == 0.0 {
            1e-8 * diag_scale
        } else {
            delta * 10.0
        };
    }
    None
}
