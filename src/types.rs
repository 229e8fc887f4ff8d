//! Type aliases, constants, unit rescaling and core enums.

use nalgebra::DMatrix;
use num_complex::Complex64;
use serde::{Deserialize, Serialize};

/// Dense complex matrix used for every operator in the crate.
pub type CMatrix = DMatrix<Complex64>;

/// Displacement components per collocation point (in-plane `u_x`, out-of-plane `u_z`).
pub const COMPONENTS_PER_POINT: usize = 2;

/// Number of matrices in the kinematic, stress and strain stacks
/// (coefficients of k^0, k^1 and k^2).
pub const STACK_DEPTH: usize = 3;

/// Name given to layers built without one.
pub const DEFAULT_LAYER_NAME: &str = "layer";

/// Name given to waveguides built without one.
pub const DEFAULT_WAVEGUIDE_NAME: &str = "waveguide";

/// Wavenumbers whose imaginary part exceeds this (1/m) are discarded as evanescent.
pub const IMAG_TOL: f64 = 1e-6;

/// QZ sweeps allowed per eigenvalue before the solve is declared failed.
pub const QZ_ITERATIONS_PER_EIGENVALUE: usize = 30;

/// Conditioning rescale applied to physical quantities before assembly.
///
/// Velocities go to km/s (= um/ns), lengths to um and frequencies to GHz, so
/// `omega / c` comes out in 1/um. Wavenumbers are mapped back to 1/m by the
/// length factor. The modulus factor scales the Lamé parameters that enter
/// the stress operator only.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rescaling {
    pub velocity: f64,
    pub length: f64,
    pub modulus: f64,
    pub frequency: f64,
}

impl Rescaling {
    pub const DEFAULT: Rescaling = Rescaling {
        velocity: 1e-3,
        length: 1e6,
        modulus: 1e-19,
        frequency: 1e-9,
    };

    pub fn velocity(&self, v: f64) -> f64 {
        v * self.velocity
    }

    pub fn length(&self, d: f64) -> f64 {
        d * self.length
    }

    pub fn modulus(&self, m: f64) -> f64 {
        m * self.modulus
    }

    /// Angular frequency in scaled units for a frequency in Hz.
    pub fn angular_frequency(&self, f: f64) -> f64 {
        2.0 * std::f64::consts::PI * f * self.frequency
    }

    /// Map a scaled wavenumber (1/um) back to 1/m.
    pub fn wavenumber_to_si(&self, k: Complex64) -> Complex64 {
        k * self.length
    }
}

impl Default for Rescaling {
    fn default() -> Self {
        Rescaling::DEFAULT
    }
}

/// Symmetry of a guided mode about the mid-plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModeType {
    Symmetric,
    Antisymmetric,
}

impl ModeType {
    /// Single-letter tag used in plots (`S` / `A`).
    pub fn tag(&self) -> char {
        match self {
            ModeType::Symmetric => 'S',
            ModeType::Antisymmetric => 'A',
        }
    }
}
