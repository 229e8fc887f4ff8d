//! Frequency sweeps producing labelled dispersion curves.
//!
//! ## Parallelization
//!
//! When the `parallel` feature is enabled, frequencies are evaluated
//! concurrently using Rayon. The waveguide is only read during a sweep.

use std::f64::consts::PI;

use log::debug;
#[cfg(feature = "parallel")]
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{require_positive, Result};
use crate::modes::classify_modes;
use crate::solver::SolverOptions;
use crate::types::ModeType;
use crate::waveguide::Evaluable;

/// `count` evenly spaced values from `start` to `stop` inclusive.
pub fn linspace(start: f64, stop: f64, count: usize) -> Vec<f64> {
    match count {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (stop - start) / (count - 1) as f64;
            (0..count).map(|i| start + step * i as f64).collect()
        }
    }
}

/// Options for [`sweep_frequencies`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SweepOptions {
    pub solver: SolverOptions,
    /// Drop roots faster than this phase velocity (m/s).
    pub max_phase_velocity: Option<f64>,
}

/// One labelled root of the dispersion relation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DispersionPoint {
    /// Hz
    pub frequency: f64,
    /// 1/m
    pub wavenumber: f64,
    /// m/s
    pub phase_velocity: f64,
    pub mode: ModeType,
}

/// Labelled roots of a sweep, ordered by frequency then wavenumber.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DispersionCurve {
    pub points: Vec<DispersionPoint>,
}

impl DispersionCurve {
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Points carrying the given label.
    pub fn by_mode(&self, mode: ModeType) -> impl Iterator<Item = &DispersionPoint> + '_ {
        self.points.iter().filter(move |p| p.mode == mode)
    }

    /// Serialize for a plotting front end.
    pub fn to_json(&self) -> std::result::Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn to_json_pretty(&self) -> std::result::Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// Evaluate and classify every frequency (Hz) of a sweep.
pub fn sweep_frequencies<W: Evaluable + Sync>(
    waveguide: &W,
    frequencies: &[f64],
    options: &SweepOptions,
) -> Result<DispersionCurve> {
    if let Some(ceiling) = options.max_phase_velocity {
        require_positive("max_phase_velocity", ceiling)?;
    }

    let per_frequency = evaluate_all(waveguide, frequencies, options)?;
    let points: Vec<DispersionPoint> = per_frequency.into_iter().flatten().collect();
    debug!(
        "swept {} frequencies: {} labelled roots",
        frequencies.len(),
        points.len()
    );
    Ok(DispersionCurve { points })
}

fn evaluate_one<W: Evaluable>(
    waveguide: &W,
    frequency: f64,
    options: &SweepOptions,
) -> Result<Vec<DispersionPoint>> {
    let result = waveguide.evaluate_with(frequency, &options.solver)?;
    let modes = classify_modes(&result.wavenumbers, &result.eigenvectors, waveguide.layer_count())?;

    let mut points: Vec<DispersionPoint> = modes
        .into_iter()
        .map(|m| DispersionPoint {
            frequency,
            wavenumber: m.wavenumber,
            phase_velocity: 2.0 * PI * frequency / m.wavenumber,
            mode: m.mode,
        })
        .filter(|p| options.max_phase_velocity.map_or(true, |c| p.phase_velocity <= c))
        .collect();
    points.sort_by(|a, b| a.wavenumber.total_cmp(&b.wavenumber));
    Ok(points)
}

/// Sequential evaluation of all frequencies.
#[cfg(not(feature = "parallel"))]
fn evaluate_all<W: Evaluable + Sync>(
    waveguide: &W,
    frequencies: &[f64],
    options: &SweepOptions,
) -> Result<Vec<Vec<DispersionPoint>>> {
    frequencies
        .iter()
        .map(|&f| evaluate_one(waveguide, f, options))
        .collect()
}

/// Parallel evaluation of all frequencies.
#[cfg(feature = "parallel")]
fn evaluate_all<W: Evaluable + Sync>(
    waveguide: &W,
    frequencies: &[f64],
    options: &SweepOptions,
) -> Result<Vec<Vec<DispersionPoint>>> {
    frequencies
        .par_iter()
        .map(|&f| evaluate_one(waveguide, f, options))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solver::DispersionResult;
    use crate::types::CMatrix;
    use num_complex::Complex64;

    /// One layer, n = 2: eight-entry state vectors with a fixed profile.
    struct Fixed;

    impl Evaluable for Fixed {
        fn evaluate_with(&self, frequency: f64, _: &SolverOptions) -> Result<DispersionResult> {
            require_positive("f", frequency)?;
            let mut eigenvectors = CMatrix::zeros(8, 8);
            // u_x of layer 0 sits at rows 4..6.
            eigenvectors[(4, 0)] = Complex64::new(1.0, 0.0);
            eigenvectors[(5, 0)] = Complex64::new(-1.0, 0.0);
            eigenvectors[(4, 2)] = Complex64::new(1.0, 0.0);
            eigenvectors[(5, 2)] = Complex64::new(1.0, 0.0);
            let mut wavenumbers = vec![None; 8];
            // c = 1000 m/s and 8000 m/s.
            wavenumbers[0] = Some(2.0 * PI * frequency / 1000.0);
            wavenumbers[2] = Some(2.0 * PI * frequency / 8000.0);
            Ok(DispersionResult {
                frequency,
                wavenumbers,
                eigenvectors,
                n_layers: 1,
            })
        }

        fn layer_count(&self) -> usize {
            1
        }
    }

    #[test]
    fn linspace_endpoints() {
        assert!(linspace(0.0, 1.0, 0).is_empty());
        assert_eq!(linspace(2.0, 5.0, 1), vec![2.0]);
        let v = linspace(1.0e4, 1.0e6, 100);
        assert_eq!(v.len(), 100);
        assert_eq!(v[0], 1.0e4);
        assert!((v[99] - 1.0e6).abs() < 1e-6);
    }

    #[test]
    fn sweep_keeps_frequency_order_and_labels() {
        let freqs = linspace(1.0e3, 3.0e3, 3);
        let curve = sweep_frequencies(&Fixed, &freqs, &SweepOptions::default()).unwrap();
        assert_eq!(curve.len(), 6);
        for (i, pair) in curve.points.chunks(2).enumerate() {
            assert_eq!(pair[0].frequency, freqs[i]);
            // Sorted by wavenumber: the fast root first.
            assert!((pair[0].phase_velocity - 8000.0).abs() < 1e-9);
            assert_eq!(pair[0].mode, ModeType::Symmetric);
            assert!((pair[1].phase_velocity - 1000.0).abs() < 1e-9);
            assert_eq!(pair[1].mode, ModeType::Antisymmetric);
        }
        assert_eq!(curve.by_mode(ModeType::Symmetric).count(), 3);
    }

    #[test]
    fn phase_velocity_ceiling_filters_fast_roots() {
        let options = SweepOptions {
            max_phase_velocity: Some(5000.0),
            ..SweepOptions::default()
        };
        let curve = sweep_frequencies(&Fixed, &[1.0e3], &options).unwrap();
        assert_eq!(curve.len(), 1);
        assert_eq!(curve.points[0].mode, ModeType::Antisymmetric);
    }

    #[test]
    fn sweep_propagates_errors() {
        assert!(sweep_frequencies(&Fixed, &[1.0, -1.0], &SweepOptions::default())
            .unwrap_err()
            .is_validation());
        let bad = SweepOptions {
            max_phase_velocity: Some(0.0),
            ..SweepOptions::default()
        };
        assert!(sweep_frequencies(&Fixed, &[1.0], &bad).unwrap_err().is_validation());
    }

    #[test]
    fn curve_serializes_to_json() {
        let curve = sweep_frequencies(&Fixed, &[1.0e3], &SweepOptions::default()).unwrap();
        let json = curve.to_json().unwrap();
        assert!(json.contains("\"Antisymmetric\""));
        let back: DispersionCurve = serde_json::from_str(&curve.to_json_pretty().unwrap()).unwrap();
        assert_eq!(back.len(), curve.len());
        for (a, b) in back.points.iter().zip(&curve.points) {
            assert_eq!(a.mode, b.mode);
            assert!((a.wavenumber - b.wavenumber).abs() <= 1e-12 * b.wavenumber);
        }
    }
}
