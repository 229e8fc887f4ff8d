//! Chebyshev collocation points and differentiation matrices.
//!
//! Implements the recursive construction of Weideman & Reddy: the point
//! differences are formed from half-angle products, the lower half of the
//! difference matrix is mirrored from the upper half, and each derivative
//! order fixes its diagonal with the negative row sum so constants are
//! annihilated exactly.

use std::f64::consts::PI;

use nalgebra::DMatrix;

use crate::error::{Result, ScmError};

/// Collocation points on [-1, 1] and the differentiation matrices of
/// orders `1..=max_order` evaluated on them.
#[derive(Debug, Clone, PartialEq)]
pub struct CollocationGrid {
    /// Chebyshev extrema in ascending order.
    pub points: Vec<f64>,
    /// `matrices[m - 1]` approximates the m-th derivative.
    pub matrices: Vec<DMatrix<f64>>,
}

impl CollocationGrid {
    /// Build the grid for `n` points and derivatives up to order `max_order`.
    pub fn new(n: usize, max_order: usize) -> Result<Self> {
        let (points, matrices) = chebyshev_differentiation(n, max_order)?;
        Ok(Self { points, matrices })
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn max_order(&self) -> usize {
        self.matrices.len()
    }

    /// Differentiation matrix of the given order (1-based), if it was built.
    pub fn derivative(&self, order: usize) -> Option<&DMatrix<f64>> {
        order.checked_sub(1).and_then(|i| self.matrices.get(i))
    }
}

/// Compute `n` Chebyshev collocation points and the differentiation matrices
/// of orders `1..=m`.
///
/// Points are returned in ascending order and matrix rows/columns follow the
/// same ordering. Fails with a validation error for `n < 2` or `m < 1`.
pub fn chebyshev_differentiation(n: usize, m: usize) -> Result<(Vec<f64>, Vec<DMatrix<f64>>)> {
    if n < 2 {
        return Err(ScmError::Validation {
            field: "n",
            reason: format!("must be at least 2; got {n} instead."),
        });
    }
    if m < 1 {
        return Err(ScmError::Validation {
            field: "m",
            reason: format!("must be at least 1; got {m} instead."),
        });
    }

    let last = (n - 1) as f64;
    let n1 = n / 2;
    let theta: Vec<f64> = (0..n).map(|k| k as f64 * PI / last).collect();

    // x_j - x_i without cancellation for nearby points.
    let half_angle = |i: usize, j: usize| {
        2.0 * ((theta[i] + theta[j]) / 2.0).sin() * ((theta[i] - theta[j]) / 2.0).sin()
    };

    // Difference matrix dx[i][j] = x_i - x_j on the descending points
    // x_k = cos(k pi / (n - 1)).
    let mut dx = DMatrix::<f64>::zeros(n, n);
    for i in 0..n {
        for j in 0..n {
            dx[(j, i)] = if i < n1 {
                half_angle(i, j)
            } else {
                -half_angle(n - 1 - i, n - 1 - j)
            };
        }
    }
    dx.fill_diagonal(1.0);

    // c[i][j] = (c_i / c_j) (-1)^(i + j) with c_0 = c_{n-1} = 2.
    let endpoint_weight = |k: usize| if k == 0 || k == n - 1 { 2.0 } else { 1.0 };
    let c = DMatrix::<f64>::from_fn(n, n, |i, j| {
        let sign = if (i + j) % 2 == 0 { 1.0 } else { -1.0 };
        sign * endpoint_weight(i) / endpoint_weight(j)
    });

    let mut z = dx.map(|v| 1.0 / v);
    z.fill_diagonal(0.0);

    let mut d = DMatrix::<f64>::identity(n, n);
    let mut descending = Vec::with_capacity(m);
    for ell in 0..m {
        let order = (ell + 1) as f64;
        let next = DMatrix::<f64>::from_fn(n, n, |i, j| {
            order * z[(i, j)] * (c[(i, j)] * d[(i, i)] - d[(i, j)])
        });
        d = next;
        for i in 0..n {
            let off_diagonal: f64 = (0..n).filter(|&j| j != i).map(|j| d[(i, j)]).sum();
            d[(i, i)] = -off_diagonal;
        }
        descending.push(d.clone());
    }

    // Reverse to ascending order; D'[i][j] = D[n-1-i][n-1-j].
    let points: Vec<f64> = (0..n)
        .map(|i| -((PI * (last - 2.0 * i as f64)) / (2.0 * last)).sin())
        .collect();
    let matrices = descending
        .iter()
        .map(|dm| DMatrix::<f64>::from_fn(n, n, |i, j| dm[(n - 1 - i, n - 1 - j)]))
        .collect();

    Ok((points, matrices))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::{assert_abs_diff_eq, assert_relative_eq};
    use nalgebra::DVector;

    #[test]
    fn two_point_grid_differentiates_lines() {
        let (x, dm) = chebyshev_differentiation(2, 1).unwrap();
        assert_relative_eq!(x[0], -1.0, epsilon = 1e-15);
        assert_relative_eq!(x[1], 1.0, epsilon = 1e-15);
        let d = &dm[0];
        assert_abs_diff_eq!(d[(0, 0)], -0.5, epsilon = 1e-15);
        assert_abs_diff_eq!(d[(0, 1)], 0.5, epsilon = 1e-15);
        assert_abs_diff_eq!(d[(1, 0)], -0.5, epsilon = 1e-15);
        assert_abs_diff_eq!(d[(1, 1)], 0.5, epsilon = 1e-15);
    }

    #[test]
    fn points_are_ascending_and_symmetric() {
        for n in [3, 8, 16, 17] {
            let grid = CollocationGrid::new(n, 2).unwrap();
            assert_eq!(grid.len(), n);
            assert_relative_eq!(grid.points[0], -1.0, epsilon = 1e-15);
            assert_relative_eq!(grid.points[n - 1], 1.0, epsilon = 1e-15);
            for w in grid.points.windows(2) {
                assert!(w[0] < w[1]);
            }
            for i in 0..n {
                assert_abs_diff_eq!(grid.points[i], -grid.points[n - 1 - i], epsilon = 1e-15);
            }
        }
    }

    #[test]
    fn rows_annihilate_constants() {
        let grid = CollocationGrid::new(11, 3).unwrap();
        for d in &grid.matrices {
            for i in 0..grid.len() {
                let row_sum: f64 = d.row(i).iter().sum();
                assert_abs_diff_eq!(row_sum, 0.0, epsilon = 1e-9);
            }
        }
    }

    #[test]
    fn spectral_accuracy_for_smooth_functions() {
        let grid = CollocationGrid::new(24, 2).unwrap();
        let x = DVector::from_column_slice(&grid.points);
        let f = x.map(|v| (2.0 * v).sin());

        let d1 = grid.derivative(1).unwrap() * &f;
        let d2 = grid.derivative(2).unwrap() * &f;
        for (i, &xi) in grid.points.iter().enumerate() {
            assert_abs_diff_eq!(d1[i], 2.0 * (2.0 * xi).cos(), epsilon = 1e-10);
            assert_abs_diff_eq!(d2[i], -4.0 * (2.0 * xi).sin(), epsilon = 1e-8);
        }
    }

    #[test]
    fn odd_point_counts_are_supported() {
        let grid = CollocationGrid::new(5, 1).unwrap();
        let f: DVector<f64> = DVector::from_iterator(5, grid.points.iter().map(|v| v * v * v));
        let df = grid.derivative(1).unwrap() * f;
        for (i, &xi) in grid.points.iter().enumerate() {
            assert_abs_diff_eq!(df[i], 3.0 * xi * xi, epsilon = 1e-12);
        }
    }

    #[test]
    fn rejects_degenerate_inputs() {
        assert!(chebyshev_differentiation(1, 2).unwrap_err().is_validation());
        assert!(chebyshev_differentiation(0, 2).unwrap_err().is_validation());
        assert!(chebyshev_differentiation(8, 0).unwrap_err().is_validation());
        assert!(CollocationGrid::new(8, 1).unwrap().derivative(2).is_none());
        assert!(CollocationGrid::new(8, 1).unwrap().derivative(0).is_none());
    }
}
