//! Dense complex generalized eigensolver (QZ algorithm).
//!
//! Solves `A x = lambda B x` for all eigenpairs of a square complex pencil:
//!
//! 1. `B` is made upper triangular with Givens rotations from the left.
//! 2. The pencil is reduced to Hessenberg-triangular form.
//! 3. Single-shift QZ sweeps drive `A` to upper triangular form. Zeros on the
//!    diagonal of `B` (infinite eigenvalues) are deflated explicitly.
//! 4. Right eigenvectors are recovered by back substitution on the
//!    triangular pencil and mapped back with the accumulated right rotations.
//!
//! Eigenvalues are returned as `(alpha, beta)` pairs, `lambda = alpha / beta`,
//! in the order they appear on the diagonal of the final Schur forms.

use std::ops::Range;

use log::{trace, warn};
use num_complex::Complex64;

use crate::error::{Result, ScmError};
use crate::types::CMatrix;

const ZERO: Complex64 = Complex64::new(0.0, 0.0);
const ONE: Complex64 = Complex64::new(1.0, 0.0);

/// Every this many sweeps without deflation an exceptional shift is used.
const EXCEPTIONAL_SHIFT_PERIOD: usize = 10;

/// Back substitution rescales once a component grows past this.
const OVERFLOW_GUARD: f64 = 1e100;

/// Plane rotation `G = [[c, s], [-conj(s), c]]` with real `c`.
#[derive(Debug, Clone, Copy)]
struct Givens {
    c: f64,
    s: Complex64,
}

impl Givens {
    /// Rotation with `G [a; b] = [r; 0]`.
    fn new(a: Complex64, b: Complex64) -> Self {
        let bn = b.norm();
        if bn == 0.0 {
            return Givens { c: 1.0, s: ZERO };
        }
        let an = a.norm();
        if an == 0.0 {
            return Givens { c: 0.0, s: b.conj() / bn };
        }
        let norm = an.hypot(bn);
        Givens {
            c: an / norm,
            s: (a / an) * b.conj() / norm,
        }
    }

    /// Rotation applied from the right that zeroes `left` in the row `[left, right]`.
    fn for_columns(left: Complex64, right: Complex64) -> Self {
        Givens::new(right, left)
    }

    fn rotate_rows(&self, m: &mut CMatrix, p: usize, q: usize, cols: Range<usize>) {
        for j in cols {
            let x = m[(p, j)];
            let y = m[(q, j)];
            m[(p, j)] = x * self.c + self.s * y;
            m[(q, j)] = y * self.c - self.s.conj() * x;
        }
    }

    fn rotate_cols(&self, m: &mut CMatrix, p: usize, q: usize, rows: Range<usize>) {
        for i in rows {
            let x = m[(i, p)];
            let y = m[(i, q)];
            m[(i, p)] = x * self.c - self.s.conj() * y;
            m[(i, q)] = y * self.c + self.s * x;
        }
    }
}

/// Generalized Schur decomposition result with right eigenvectors.
#[derive(Debug, Clone)]
pub struct GeneralizedEigen {
    pub alpha: Vec<Complex64>,
    pub beta: Vec<Complex64>,
    /// Right eigenvectors as unit-norm columns, ordered like `alpha`/`beta`.
    pub eigenvectors: CMatrix,
    /// Total number of QZ sweeps performed.
    pub sweeps: usize,
}

impl GeneralizedEigen {
    /// Solve the pencil `(a, b)`.
    ///
    /// At most `iterations_per_eigenvalue * n` sweeps are attempted before
    /// the solve fails with a numerical error.
    pub fn new(a: CMatrix, b: CMatrix, iterations_per_eigenvalue: usize) -> Result<Self> {
        let n = a.nrows();
        if a.ncols() != n || b.shape() != (n, n) {
            return Err(ScmError::Validation {
                field: "pencil",
                reason: format!(
                    "must be two square matrices of equal size; got {:?} and {:?}",
                    a.shape(),
                    b.shape()
                ),
            });
        }
        if a.iter().chain(b.iter()).any(|v| !v.re.is_finite() || !v.im.is_finite()) {
            return Err(ScmError::Numerical("pencil contains non-finite entries".into()));
        }

        let mut schur = Schur {
            h: a,
            t: b,
            z: CMatrix::identity(n, n),
        };
        schur.triangularize_b();
        schur.reduce_to_hessenberg();
        let sweeps = schur.iterate(iterations_per_eigenvalue.max(1) * n.max(1))?;

        let alpha: Vec<Complex64> = (0..n).map(|i| schur.h[(i, i)]).collect();
        let beta: Vec<Complex64> = (0..n).map(|i| schur.t[(i, i)]).collect();
        let eigenvectors = schur.eigenvectors(&alpha, &beta);

        Ok(Self {
            alpha,
            beta,
            eigenvectors,
            sweeps,
        })
    }

    pub fn len(&self) -> usize {
        self.alpha.len()
    }

    pub fn is_empty(&self) -> bool {
        self.alpha.is_empty()
    }

    /// Eigenvalue `i`, or `None` when it is infinite (`beta == 0`).
    pub fn eigenvalue(&self, i: usize) -> Option<Complex64> {
        let beta = self.beta[i];
        if beta == ZERO {
            None
        } else {
            Some(self.alpha[i] / beta)
        }
    }

    pub fn eigenvalues(&self) -> Vec<Option<Complex64>> {
        (0..self.len()).map(|i| self.eigenvalue(i)).collect()
    }
}

/// Working state: `A = Q H Z^H`, `B = Q T Z^H`. `Q` is not needed for right
/// eigenvectors and is not accumulated.
struct Schur {
    h: CMatrix,
    t: CMatrix,
    z: CMatrix,
}

impl Schur {
    fn n(&self) -> usize {
        self.h.nrows()
    }

    fn triangularize_b(&mut self) {
        let n = self.n();
        for j in 0..n.saturating_sub(1) {
            for i in (j + 1..n).rev() {
                if self.t[(i, j)] == ZERO {
                    continue;
                }
                let g = Givens::new(self.t[(i - 1, j)], self.t[(i, j)]);
                g.rotate_rows(&mut self.t, i - 1, i, j..n);
                g.rotate_rows(&mut self.h, i - 1, i, 0..n);
                self.t[(i, j)] = ZERO;
            }
        }
    }

    fn reduce_to_hessenberg(&mut self) {
        let n = self.n();
        for j in 0..n.saturating_sub(2) {
            for i in (j + 2..n).rev() {
                if self.h[(i, j)] == ZERO {
                    continue;
                }
                let g = Givens::new(self.h[(i - 1, j)], self.h[(i, j)]);
                g.rotate_rows(&mut self.h, i - 1, i, j..n);
                g.rotate_rows(&mut self.t, i - 1, i, i - 1..n);
                self.h[(i, j)] = ZERO;

                let g = Givens::for_columns(self.t[(i, i - 1)], self.t[(i, i)]);
                g.rotate_cols(&mut self.t, i - 1, i, 0..i + 1);
                g.rotate_cols(&mut self.h, i - 1, i, 0..n);
                g.rotate_cols(&mut self.z, i - 1, i, 0..n);
                self.t[(i, i - 1)] = ZERO;
            }
        }
    }

    /// Run QZ sweeps until `H` is upper triangular. Returns the sweep count.
    fn iterate(&mut self, max_sweeps: usize) -> Result<usize> {
        let n = self.n();
        if n < 2 {
            return Ok(0);
        }
        let eps = f64::EPSILON;
        let h_tol = eps * self.h.norm().max(f64::MIN_POSITIVE);
        // Rounding from the reduction can leave a zero pivot of T a few ulps
        // above zero, so the tolerance grows with the size.
        let t_tol = n as f64 * eps * self.t.norm().max(f64::MIN_POSITIVE);

        let mut sweeps = 0;
        let mut since_deflation = 0;
        let mut ihi = n - 1;

        while ihi > 0 {
            let mut ilo = ihi;
            while ilo > 0 {
                let sub = self.h[(ilo, ilo - 1)].norm();
                let local = self.h[(ilo - 1, ilo - 1)].norm() + self.h[(ilo, ilo)].norm();
                if sub <= eps * local || sub <= h_tol {
                    self.h[(ilo, ilo - 1)] = ZERO;
                    break;
                }
                ilo -= 1;
            }

            if ilo == ihi {
                ihi -= 1;
                since_deflation = 0;
                continue;
            }

            if let Some(j) = (ilo..=ihi).find(|&j| self.t[(j, j)].norm() <= t_tol) {
                self.t[(j, j)] = ZERO;
                if j == ilo {
                    self.deflate_infinite_top(ilo);
                } else {
                    self.deflate_infinite_bottom(j, ihi);
                }
                since_deflation = 0;
                continue;
            }

            sweeps += 1;
            since_deflation += 1;
            if sweeps > max_sweeps {
                warn!("QZ did not converge after {sweeps} sweeps (size {n}, active rows {ilo}..={ihi})");
                return Err(ScmError::Numerical(format!(
                    "QZ iteration did not converge within {max_sweeps} sweeps"
                )));
            }

            let shift = if since_deflation % EXCEPTIONAL_SHIFT_PERIOD == 0 {
                self.exceptional_shift(ihi)
            } else {
                self.wilkinson_shift(ihi)
            };
            self.sweep(ilo, ihi, shift);
        }

        trace!("QZ converged in {sweeps} sweeps for size {n}");
        Ok(sweeps)
    }

    /// `T[ilo, ilo] == 0`: a left rotation splits off the infinite eigenvalue.
    fn deflate_infinite_top(&mut self, ilo: usize) {
        let n = self.n();
        let g = Givens::new(self.h[(ilo, ilo)], self.h[(ilo + 1, ilo)]);
        g.rotate_rows(&mut self.h, ilo, ilo + 1, ilo..n);
        g.rotate_rows(&mut self.t, ilo, ilo + 1, ilo..n);
        self.h[(ilo + 1, ilo)] = ZERO;
        self.t[(ilo + 1, ilo)] = ZERO;
    }

    /// `T[j, j] == 0` with `j > ilo`: chase the zero down to `ihi`, then split
    /// the last row off with a right rotation.
    fn deflate_infinite_bottom(&mut self, j: usize, ihi: usize) {
        let n = self.n();
        for k in j..ihi {
            let g = Givens::new(self.t[(k, k + 1)], self.t[(k + 1, k + 1)]);
            g.rotate_rows(&mut self.t, k, k + 1, k + 1..n);
            g.rotate_rows(&mut self.h, k, k + 1, k - 1..n);
            self.t[(k + 1, k + 1)] = ZERO;

            let g = Givens::for_columns(self.h[(k + 1, k - 1)], self.h[(k + 1, k)]);
            g.rotate_cols(&mut self.h, k - 1, k, 0..k + 2);
            g.rotate_cols(&mut self.t, k - 1, k, 0..k + 1);
            g.rotate_cols(&mut self.z, k - 1, k, 0..n);
            self.h[(k + 1, k - 1)] = ZERO;
        }

        let g = Givens::for_columns(self.h[(ihi, ihi - 1)], self.h[(ihi, ihi)]);
        g.rotate_cols(&mut self.h, ihi - 1, ihi, 0..ihi + 1);
        g.rotate_cols(&mut self.t, ihi - 1, ihi, 0..ihi + 1);
        g.rotate_cols(&mut self.z, ihi - 1, ihi, 0..n);
        self.h[(ihi, ihi - 1)] = ZERO;
    }

    /// Eigenvalue of the trailing 2x2 pencil closest to `H[ihi, ihi] / T[ihi, ihi]`.
    fn wilkinson_shift(&self, ihi: usize) -> Complex64 {
        let lo = ihi - 1;
        let (h11, h12, h21, h22) = (
            self.h[(lo, lo)],
            self.h[(lo, ihi)],
            self.h[(ihi, lo)],
            self.h[(ihi, ihi)],
        );
        let (t11, t12, t22) = (self.t[(lo, lo)], self.t[(lo, ihi)], self.t[(ihi, ihi)]);

        // det(H - s T) = qa s^2 + qb s + qc
        let qa = t11 * t22;
        let qb = t12 * h21 - (h11 * t22 + h22 * t11);
        let qc = h11 * h22 - h12 * h21;

        let mut disc = (qb * qb - qa * qc * 4.0).sqrt();
        if (qb.conj() * disc).re < 0.0 {
            disc = -disc;
        }
        let q = -(qb + disc) * 0.5;
        let r1 = q / qa;
        let r2 = if q == ZERO { r1 } else { qc / q };

        let target = h22 / t22;
        let shift = if (r1 - target).norm() <= (r2 - target).norm() {
            r1
        } else {
            r2
        };
        if shift.re.is_finite() && shift.im.is_finite() {
            shift
        } else {
            target
        }
    }

    fn exceptional_shift(&self, ihi: usize) -> Complex64 {
        let lo = ihi - 1;
        let bump = self.h[(ihi, lo)].norm() / self.t[(lo, lo)].norm();
        self.h[(ihi, ihi)] / self.t[(ihi, ihi)] + Complex64::new(0.75 * bump, 0.25 * bump)
    }

    /// One implicit single-shift QZ sweep over rows `ilo..=ihi`.
    fn sweep(&mut self, ilo: usize, ihi: usize, shift: Complex64) {
        let n = self.n();
        for k in ilo..ihi {
            let (g, cols) = if k == ilo {
                let x = self.h[(ilo, ilo)] - shift * self.t[(ilo, ilo)];
                (Givens::new(x, self.h[(ilo + 1, ilo)]), ilo..n)
            } else {
                (Givens::new(self.h[(k, k - 1)], self.h[(k + 1, k - 1)]), k - 1..n)
            };
            g.rotate_rows(&mut self.h, k, k + 1, cols);
            if k > ilo {
                self.h[(k + 1, k - 1)] = ZERO;
            }
            g.rotate_rows(&mut self.t, k, k + 1, k..n);

            let g = Givens::for_columns(self.t[(k + 1, k)], self.t[(k + 1, k + 1)]);
            g.rotate_cols(&mut self.h, k, k + 1, 0..(k + 2).min(ihi) + 1);
            g.rotate_cols(&mut self.t, k, k + 1, 0..k + 2);
            g.rotate_cols(&mut self.z, k, k + 1, 0..n);
            self.t[(k + 1, k)] = ZERO;
        }
    }

    /// Right eigenvectors of the triangular pencil, mapped back by `Z`.
    fn eigenvectors(&self, alpha: &[Complex64], beta: &[Complex64]) -> CMatrix {
        let n = self.n();
        let eps = f64::EPSILON;
        let h_norm = self.h.norm();
        let t_norm = self.t.norm();
        let mut vectors = CMatrix::zeros(n, n);
        let mut y = vec![ZERO; n];

        for k in 0..n {
            let (al, be) = (alpha[k], beta[k]);
            let small = (eps * (be.norm() * h_norm + al.norm() * t_norm)).max(f64::MIN_POSITIVE);

            y[..=k].fill(ZERO);
            y[k] = ONE;
            for j in (0..k).rev() {
                let mut sum = ZERO;
                for l in j + 1..=k {
                    sum += (be * self.h[(j, l)] - al * self.t[(j, l)]) * y[l];
                }
                let mut d = be * self.h[(j, j)] - al * self.t[(j, j)];
                if d.norm() < small {
                    d = Complex64::new(small, 0.0);
                }
                y[j] = -sum / d;

                let size = y[j].norm();
                if size > OVERFLOW_GUARD {
                    for v in &mut y[j..=k] {
                        *v /= size;
                    }
                }
            }

            let mut column = vectors.column_mut(k);
            for (l, &coeff) in y[..=k].iter().enumerate() {
                if coeff == ZERO {
                    continue;
                }
                for i in 0..n {
                    column[i] += self.z[(i, l)] * coeff;
                }
            }
            let norm = column.norm();
            if norm > 0.0 && norm.is_finite() {
                column /= Complex64::new(norm, 0.0);
            }
        }

        vectors
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use nalgebra::DVector;

    fn c(re: f64, im: f64) -> Complex64 {
        Complex64::new(re, im)
    }

    /// Deterministic pseudo-random entries in [-0.5, 0.5).
    fn filled(n: usize, seed: u64) -> CMatrix {
        let mut state = seed.wrapping_mul(0x9E37_79B9_7F4A_7C15) | 1;
        let mut next = move || {
            state = state
                .wrapping_mul(6_364_136_223_846_793_005)
                .wrapping_add(1_442_695_040_888_963_407);
            (state >> 11) as f64 / (1u64 << 53) as f64 - 0.5
        };
        CMatrix::from_fn(n, n, |_, _| {
            let re = next();
            let im = next();
            c(re, im)
        })
    }

    fn residual(a: &CMatrix, b: &CMatrix, eig: &GeneralizedEigen, i: usize) -> f64 {
        let x: DVector<Complex64> = eig.eigenvectors.column(i).into_owned();
        let r = a * &x * eig.beta[i] - b * &x * eig.alpha[i];
        r.norm() / (eig.beta[i].norm() * a.norm() + eig.alpha[i].norm() * b.norm())
    }

    #[test]
    fn diagonal_pencil_returns_ratios() {
        let a = CMatrix::from_diagonal(&DVector::from_vec(vec![c(2.0, 0.0), c(6.0, 0.0), c(-1.0, 1.0)]));
        let b = CMatrix::from_diagonal(&DVector::from_vec(vec![c(1.0, 0.0), c(3.0, 0.0), c(1.0, 0.0)]));
        let eig = GeneralizedEigen::new(a, b, 30).unwrap();

        let mut values: Vec<Complex64> = eig.eigenvalues().into_iter().flatten().collect();
        values.sort_by(|x, y| x.re.total_cmp(&y.re));
        assert_eq!(values.len(), 3);
        assert_abs_diff_eq!(values[0].re, -1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(values[0].im, 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(values[1].re, 2.0, epsilon = 1e-12);
        assert_abs_diff_eq!(values[2].re, 2.0, epsilon = 1e-12);
    }

    #[test]
    fn standard_problem_matches_known_spectrum() {
        // Companion-like matrix with eigenvalues 1, 2, 3.
        let a = CMatrix::from_row_slice(
            3,
            3,
            &[
                c(6.0, 0.0), c(-11.0, 0.0), c(6.0, 0.0),
                c(1.0, 0.0), c(0.0, 0.0), c(0.0, 0.0),
                c(0.0, 0.0), c(1.0, 0.0), c(0.0, 0.0),
            ],
        );
        let b = CMatrix::identity(3, 3);
        let eig = GeneralizedEigen::new(a.clone(), b.clone(), 30).unwrap();

        let mut values: Vec<f64> = eig.eigenvalues().into_iter().flatten().map(|v| v.re).collect();
        values.sort_by(|x, y| x.total_cmp(y));
        for (got, expected) in values.iter().zip([1.0, 2.0, 3.0]) {
            assert_abs_diff_eq!(*got, expected, epsilon = 1e-9);
        }
        for i in 0..3 {
            assert!(residual(&a, &b, &eig, i) < 1e-12);
        }
    }

    #[test]
    fn singular_b_gives_infinite_eigenvalues() {
        let n = 6;
        let a = filled(n, 1);
        let diagonal = [1.0, 0.0, 2.0, -1.0, 0.0, 3.0];
        let b = CMatrix::from_fn(n, n, |i, j| if i == j { c(diagonal[i], 0.0) } else { ZERO });

        let eig = GeneralizedEigen::new(a.clone(), b.clone(), 30).unwrap();
        let infinite = eig.eigenvalues().iter().filter(|v| v.is_none()).count();
        assert_eq!(infinite, 2);
        for i in 0..n {
            if eig.eigenvalue(i).is_some() {
                assert!(residual(&a, &b, &eig, i) < 1e-10, "residual too large for {i}");
            }
        }
    }

    #[test]
    fn general_pencil_has_small_residuals() {
        let n = 12;
        let a = filled(n, 3);
        let b = filled(n, 4) + CMatrix::identity(n, n) * c(2.0, 0.0);
        let eig = GeneralizedEigen::new(a.clone(), b.clone(), 30).unwrap();

        assert_eq!(eig.len(), n);
        for i in 0..n {
            assert!(residual(&a, &b, &eig, i) < 1e-10, "residual too large for {i}");
            assert_abs_diff_eq!(eig.eigenvectors.column(i).norm(), 1.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn rejects_mismatched_shapes() {
        let err = GeneralizedEigen::new(CMatrix::zeros(3, 3), CMatrix::zeros(2, 2), 30).unwrap_err();
        assert!(err.is_validation());
    }
}
