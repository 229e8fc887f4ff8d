//! Symmetry classification of guided-wave modes.
//!
//! A mode is labelled from the in-plane displacement `u_x` of the first layer,
//! read from the lower half (`u`) of the state vector `[k u; u]`. An even
//! through-thickness profile marks a symmetric mode, an odd one an
//! antisymmetric mode.
//!
//! ## Parallelization
//!
//! When the `parallel` feature is enabled, the admissible columns of a
//! solution are classified concurrently using Rayon.

use std::collections::HashMap;

use num_complex::Complex64;
#[cfg(feature = "parallel")]
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{Result, ScmError};
use crate::types::{CMatrix, ModeType, COMPONENTS_PER_POINT};

/// An admissible root together with its symmetry label.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassifiedMode {
    /// Wavenumber in 1/m.
    pub wavenumber: f64,
    /// Column of the eigenvector matrix the root came from.
    pub column: usize,
    pub mode: ModeType,
}

/// Classify a through-thickness profile of `u_x`.
///
/// The profile is rotated by the phase of its largest entry so that the real
/// parts carry the shape. The ends are compared with the entry at index
/// `len / 2`: equal signs mean symmetric, anything else antisymmetric.
///
/// For an even `len` that entry sits just past the centre line. An odd
/// profile whose interior swings wider than its ends, as for higher-order
/// antisymmetric modes, then reads as symmetric. An odd `n` keeps the
/// reference sample on the mid-plane.
pub fn classify_mode(profile: &[Complex64]) -> ModeType {
    let Some(peak) = profile
        .iter()
        .copied()
        .max_by(|a, b| a.norm().total_cmp(&b.norm()))
    else {
        return ModeType::Antisymmetric;
    };
    let phase = if peak.norm() > 0.0 {
        peak.conj() / peak.norm()
    } else {
        Complex64::new(1.0, 0.0)
    };

    let real = |i: usize| (profile[i] * phase).re;
    let mid = real(profile.len() / 2);
    let first = sign(real(0) - mid);
    let last = sign(real(profile.len() - 1) - mid);

    if first == last {
        ModeType::Symmetric
    } else {
        ModeType::Antisymmetric
    }
}

/// Classify every admissible column of a dispersion solution.
///
/// `eigenvectors` must be square with one row per entry of `wavenumbers`,
/// and that length must be a multiple of `4 * n_layers`. Only the first
/// layer's profile is inspected, so on a stack the label describes that layer.
pub fn classify_modes(
    wavenumbers: &[Option<f64>],
    eigenvectors: &CMatrix,
    n_layers: usize,
) -> Result<Vec<ClassifiedMode>> {
    let len = wavenumbers.len();
    let block = 2 * COMPONENTS_PER_POINT * n_layers;
    if n_layers == 0 || len == 0 || len % block != 0 {
        return Err(ScmError::Validation {
            field: "wavenumbers",
            reason: format!(
                "length {len} is not a positive multiple of {} for {n_layers} layer(s).",
                block.max(1)
            ),
        });
    }
    if eigenvectors.shape() != (len, len) {
        let (rows, cols) = eigenvectors.shape();
        return Err(ScmError::Validation {
            field: "eigenvectors",
            reason: format!("must be {len} x {len}; got {rows} x {cols} instead."),
        });
    }

    let n = len / block;
    // Lower half of the state vector holds u; layer 0's u_x comes first.
    let offset = len / 2;
    let columns: Vec<(usize, f64)> = wavenumbers
        .iter()
        .enumerate()
        .filter_map(|(i, k)| k.map(|k| (i, k)))
        .collect();

    Ok(classify_columns(&columns, eigenvectors, offset, n))
}

/// Group classified modes by type, each group sorted by wavenumber.
pub fn group_by_type(modes: &[ClassifiedMode]) -> HashMap<ModeType, Vec<ClassifiedMode>> {
    let mut families: HashMap<ModeType, Vec<ClassifiedMode>> = HashMap::new();
    families.insert(ModeType::Symmetric, Vec::new());
    families.insert(ModeType::Antisymmetric, Vec::new());

    for mode in modes {
        families.entry(mode.mode).or_default().push(*mode);
    }
    for family in families.values_mut() {
        family.sort_by(|a, b| a.wavenumber.total_cmp(&b.wavenumber));
    }
    families
}

fn classify_column(
    eigenvectors: &CMatrix,
    column: usize,
    wavenumber: f64,
    offset: usize,
    n: usize,
) -> ClassifiedMode {
    let profile: Vec<Complex64> = eigenvectors
        .view((offset, column), (n, 1))
        .iter()
        .copied()
        .collect();
    ClassifiedMode {
        wavenumber,
        column,
        mode: classify_mode(&profile),
    }
}

/// Sequential classification of admissible columns.
#[cfg(not(feature = "parallel"))]
fn classify_columns(
    columns: &[(usize, f64)],
    eigenvectors: &CMatrix,
    offset: usize,
    n: usize,
) -> Vec<ClassifiedMode> {
    columns
        .iter()
        .map(|&(column, k)| classify_column(eigenvectors, column, k, offset, n))
        .collect()
}

/// Parallel classification of admissible columns.
#[cfg(feature = "parallel")]
fn classify_columns(
    columns: &[(usize, f64)],
    eigenvectors: &CMatrix,
    offset: usize,
    n: usize,
) -> Vec<ClassifiedMode> {
    columns
        .par_iter()
        .map(|&(column, k)| classify_column(eigenvectors, column, k, offset, n))
        .collect()
}

fn sign(v: f64) -> i8 {
    if v > 0.0 {
        1
    } else if v < 0.0 {
        -1
    } else {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(n: usize, f: impl Fn(f64) -> f64, phase: Complex64) -> Vec<Complex64> {
        (0..n)
            .map(|i| {
                let zeta = i as f64 / (n - 1) as f64 - 0.5;
                phase * f(zeta)
            })
            .collect()
    }

    #[test]
    fn even_profiles_are_symmetric() {
        let p = profile(16, |z| 1.0 + z * z, Complex64::new(1.0, 0.0));
        assert_eq!(classify_mode(&p), ModeType::Symmetric);
        let p = profile(16, |z| -(2.0 - 3.0 * z * z), Complex64::new(0.0, 1.0));
        assert_eq!(classify_mode(&p), ModeType::Symmetric);
    }

    #[test]
    fn odd_profiles_are_antisymmetric() {
        let p = profile(16, |z| z, Complex64::new(1.0, 0.0));
        assert_eq!(classify_mode(&p), ModeType::Antisymmetric);
        let p = profile(15, |z| z * z * z - 0.1 * z, Complex64::from_polar(2.0, 0.7));
        assert_eq!(classify_mode(&p), ModeType::Antisymmetric);
    }

    #[test]
    fn reference_sample_is_the_upper_middle_entry() {
        let even: Vec<Complex64> = [-0.2, -1.0, 1.0, 0.2].iter().map(|&v| Complex64::new(v, 0.0)).collect();
        assert_eq!(classify_mode(&even), ModeType::Symmetric);
        let odd: Vec<Complex64> = [-0.2, -1.0, 0.0, 1.0, 0.2].iter().map(|&v| Complex64::new(v, 0.0)).collect();
        assert_eq!(classify_mode(&odd), ModeType::Antisymmetric);
    }

    #[test]
    fn classification_ignores_global_phase() {
        let base = profile(12, |z| z, Complex64::new(1.0, 0.0));
        for angle in [0.0, 0.5, 1.7, 3.0, -2.2] {
            let rotated: Vec<Complex64> = base.iter().map(|v| v * Complex64::from_polar(1.0, angle)).collect();
            assert_eq!(classify_mode(&rotated), classify_mode(&base));
        }
    }

    #[test]
    fn classifies_only_admissible_columns() {
        // One layer, n = 4: state length 16, u_x of layer 0 at rows 8..12.
        let n = 4;
        let len = 16;
        let mut vectors = CMatrix::zeros(len, len);
        for i in 0..n {
            let zeta = i as f64 / 3.0 - 0.5;
            vectors[(8 + i, 1)] = Complex64::new(zeta, 0.0);
            vectors[(8 + i, 3)] = Complex64::new(0.0, 1.0 + zeta * zeta);
        }
        let mut wavenumbers = vec![None; len];
        wavenumbers[1] = Some(10.0);
        wavenumbers[3] = Some(5.0);

        let modes = classify_modes(&wavenumbers, &vectors, 1).unwrap();
        assert_eq!(modes.len(), 2);
        assert_eq!(modes[0].column, 1);
        assert_eq!(modes[0].mode, ModeType::Antisymmetric);
        assert_eq!(modes[1].column, 3);
        assert_eq!(modes[1].mode, ModeType::Symmetric);

        let families = group_by_type(&modes);
        assert_eq!(families[&ModeType::Symmetric][0].wavenumber, 5.0);
        assert_eq!(families[&ModeType::Antisymmetric][0].wavenumber, 10.0);
    }

    #[test]
    fn rejects_inconsistent_shapes() {
        let vectors = CMatrix::zeros(16, 16);
        assert!(classify_modes(&[None; 12], &vectors, 1).unwrap_err().is_validation());
        assert!(classify_modes(&[None; 16], &vectors, 0).unwrap_err().is_validation());
        assert!(classify_modes(&[None; 16], &CMatrix::zeros(16, 8), 1).unwrap_err().is_validation());
    }
}
