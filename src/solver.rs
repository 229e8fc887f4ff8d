//! Frequency-domain dispersion solve.
//!
//! For a frequency `f` the assembled system gives the quadratic eigenproblem
//! `(K2 k^2 + K1 k + K0 - w^2 M) u = 0`. It is linearized to the pencil
//!
//! ```text
//! A = [ -K1   -(K0 - w^2 M) ]      B = [ K2  0 ]
//!     [  I          0       ]          [ 0   I ]
//! ```
//!
//! with state vector `z = [k u; u]` and solved densely with the QZ algorithm.
//! Eigenvalues are mapped back to 1/m; only forward-propagating, non-evanescent
//! wavenumbers are kept as admissible.

use std::f64::consts::PI;

use log::debug;
use num_complex::Complex64;
use serde::{Deserialize, Serialize};

use crate::assembly::GlobalOperators;
use crate::error::{require_positive, Result};
use crate::modes::{classify_modes, ClassifiedMode};
use crate::qz::GeneralizedEigen;
use crate::types::{CMatrix, Rescaling, IMAG_TOL, QZ_ITERATIONS_PER_EIGENVALUE};

const ONE: Complex64 = Complex64::new(1.0, 0.0);

/// Tunable parameters of the dispersion solve.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverOptions {
    /// Largest |Im k| (1/m) of an admissible wavenumber.
    ///
    /// The threshold is absolute, not relative to |k|. Near 1 Hz the real
    /// parts shrink toward the eigensolver's rounding floor and a propagating
    /// root such as S0 can be rejected, depending on `n`. Raise this for
    /// very low frequencies.
    pub imag_tol: f64,
    /// QZ sweep budget per eigenvalue.
    pub qz_iterations_per_eigenvalue: usize,
    /// Scale the wavenumber and equilibrate pencil rows before the solve.
    pub balance: bool,
}

impl Default for SolverOptions {
    fn default() -> Self {
        Self {
            imag_tol: IMAG_TOL,
            qz_iterations_per_eigenvalue: QZ_ITERATIONS_PER_EIGENVALUE,
            balance: true,
        }
    }
}

/// Wavenumbers and eigenvectors for one frequency.
///
/// `wavenumbers[i]` pairs with column `i` of `eigenvectors`; discarded roots
/// are `None` and keep their slot.
#[derive(Debug, Clone)]
pub struct DispersionResult {
    /// Frequency in Hz.
    pub frequency: f64,
    /// Admissible wavenumbers in 1/m.
    pub wavenumbers: Vec<Option<f64>>,
    /// State vectors `[k u; u]`, unit-norm columns.
    pub eigenvectors: CMatrix,
    pub n_layers: usize,
}

impl DispersionResult {
    pub fn len(&self) -> usize {
        self.wavenumbers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.wavenumbers.is_empty()
    }

    /// `(column, wavenumber)` of every admissible root.
    pub fn admissible(&self) -> impl Iterator<Item = (usize, f64)> + '_ {
        self.wavenumbers
            .iter()
            .enumerate()
            .filter_map(|(i, k)| k.map(|k| (i, k)))
    }

    /// Phase velocity `2 pi f / k` (m/s) of an admissible column.
    pub fn phase_velocity(&self, column: usize) -> Option<f64> {
        self.wavenumbers
            .get(column)
            .copied()
            .flatten()
            .map(|k| 2.0 * PI * self.frequency / k)
    }

    /// Label every admissible root as symmetric or antisymmetric.
    pub fn classify(&self) -> Result<Vec<ClassifiedMode>> {
        classify_modes(&self.wavenumbers, &self.eigenvectors, self.n_layers)
    }
}

/// Solve for the wavenumbers of `system` at `frequency` (Hz).
pub fn solve_dispersion(
    system: &GlobalOperators,
    frequency: f64,
    units: &Rescaling,
    options: &SolverOptions,
) -> Result<DispersionResult> {
    let frequency = require_positive("f", frequency)?;
    let omega = units.angular_frequency(frequency);
    let dim = system.dim();
    let [k0, k1, k2] = &system.kinematic;

    let stiffness = k0 - &system.mass * Complex64::new(omega * omega, 0.0);
    let gamma = if options.balance {
        wavenumber_scale(&stiffness, k2)
    } else {
        1.0
    };

    // Linearization in kappa = k / gamma.
    let size = 2 * dim;
    let mut a = CMatrix::zeros(size, size);
    let mut b = CMatrix::zeros(size, size);
    a.view_mut((0, 0), (dim, dim))
        .copy_from(&(k1 * Complex64::new(-1.0 / gamma, 0.0)));
    a.view_mut((0, dim), (dim, dim))
        .copy_from(&(&stiffness * Complex64::new(-1.0 / (gamma * gamma), 0.0)));
    a.view_mut((dim, 0), (dim, dim)).fill_diagonal(ONE);
    b.view_mut((0, 0), (dim, dim)).copy_from(k2);
    b.view_mut((dim, dim), (dim, dim)).fill_diagonal(ONE);

    if options.balance {
        balance_rows(&mut a, &mut b);
    }

    let eig = GeneralizedEigen::new(a, b, options.qz_iterations_per_eigenvalue)?;

    let wavenumbers: Vec<Option<f64>> = eig
        .eigenvalues()
        .into_iter()
        .map(|kappa| {
            let k = kappa.map_or(Complex64::new(0.0, 0.0), |kappa| kappa * gamma);
            admissible_wavenumber(units.wavenumber_to_si(k), options.imag_tol)
        })
        .collect();

    let mut eigenvectors = eig.eigenvectors;
    if gamma != 1.0 {
        eigenvectors
            .view_mut((0, 0), (dim, size))
            .scale_mut(gamma);
        for mut column in eigenvectors.column_iter_mut() {
            let norm = column.norm();
            if norm > 0.0 {
                column.unscale_mut(norm);
            }
        }
    }

    debug!(
        "solved f = {frequency} Hz: {} of {} roots admissible (gamma = {gamma:.3e}, {} QZ sweeps)",
        wavenumbers.iter().flatten().count(),
        wavenumbers.len(),
        eig.sweeps
    );

    Ok(DispersionResult {
        frequency,
        wavenumbers,
        eigenvectors,
        n_layers: system.n_layers,
    })
}

/// Keep forward-propagating roots with negligible imaginary part.
fn admissible_wavenumber(k: Complex64, imag_tol: f64) -> Option<f64> {
    if k.im.abs() > imag_tol || k.re.is_nan() || k.re <= 0.0 {
        return None;
    }
    Some(k.re.abs())
}

/// `sqrt(||K0 - w^2 M|| / ||K2||)`, or 1 when either norm is degenerate.
fn wavenumber_scale(stiffness: &CMatrix, k2: &CMatrix) -> f64 {
    let num = stiffness.norm();
    let den = k2.norm();
    let gamma = (num / den).sqrt();
    if gamma.is_finite() && gamma > 0.0 {
        gamma
    } else {
        1.0
    }
}

/// Scale each row of the pencil so its largest entry has unit modulus.
fn balance_rows(a: &mut CMatrix, b: &mut CMatrix) {
    for r in 0..a.nrows() {
        let largest = a
            .row(r)
            .iter()
            .chain(b.row(r).iter())
            .map(|v| v.norm())
            .fold(0.0, f64::max);
        if largest > 0.0 {
            a.row_mut(r).unscale_mut(largest);
            b.row_mut(r).unscale_mut(largest);
        }
    }
}
