//! Isotropic elastic layers and their collocation operators.
//!
//! A layer's displacement field is sampled at `n` Chebyshev points through its
//! thickness. The local unknown vector is `[u_x(0..n), u_z(0..n)]`, point 0
//! being the top face and point `n - 1` the bottom face. For a plane wave
//! `exp(i(kx - wt))` the equations of motion become a quadratic matrix
//! polynomial in `k`, stored as the kinematic stack `[K0, K1, K2]` plus the
//! mass term multiplying `w^2`.

use std::fmt;

use nalgebra::DMatrix;
use num_complex::Complex64;

use crate::chebyshev::CollocationGrid;
use crate::error::{require_positive, Result};
use crate::types::{CMatrix, Rescaling, COMPONENTS_PER_POINT, DEFAULT_LAYER_NAME, STACK_DEPTH};

const I: Complex64 = Complex64::new(0.0, 1.0);
const ONE: Complex64 = Complex64::new(1.0, 0.0);

/// An isotropic, homogeneous elastic layer.
#[derive(Debug, Clone, PartialEq)]
pub struct ElasticLayer {
    cl: f64,
    ct: f64,
    rho: f64,
    d: f64,
    name: String,
}

impl ElasticLayer {
    /// Create a layer from longitudinal and transverse wave speeds (m/s),
    /// density (kg/m^3) and thickness (m).
    ///
    /// Every numeric field must be finite and strictly positive.
    pub fn new(cl: f64, ct: f64, rho: f64, d: f64, name: impl Into<String>) -> Result<Self> {
        Ok(Self {
            cl: require_positive("cl", cl)?,
            ct: require_positive("ct", ct)?,
            rho: require_positive("rho", rho)?,
            d: require_positive("d", d)?,
            name: name.into(),
        })
    }

    /// [`ElasticLayer::new`] with the default name.
    pub fn unnamed(cl: f64, ct: f64, rho: f64, d: f64) -> Result<Self> {
        Self::new(cl, ct, rho, d, DEFAULT_LAYER_NAME)
    }

    /// Create a layer from Young's modulus (Pa), density (kg/m^3), Poisson's
    /// ratio and thickness (m).
    ///
    /// The wave speeds are only checked by [`ElasticLayer::new`]: a Poisson
    /// ratio of 0.5 or more yields a non-finite `cl`, reported as an invalid
    /// `cl` rather than an invalid `nu`.
    pub fn from_elastic_constants(
        e: f64,
        rho: f64,
        nu: f64,
        d: f64,
        name: impl Into<String>,
    ) -> Result<Self> {
        let e = require_positive("E", e)?;
        let rho = require_positive("rho", rho)?;
        let nu = require_positive("nu", nu)?;
        let d = require_positive("d", d)?;

        let cl = ((e * (1.0 - nu)) / (rho * (1.0 - nu - 2.0 * nu * nu))).sqrt();
        let ct = (e / (2.0 * rho * (1.0 + nu))).sqrt();

        Self::new(cl, ct, rho, d, name)
    }

    pub fn cl(&self) -> f64 {
        self.cl
    }

    pub fn ct(&self) -> f64 {
        self.ct
    }

    pub fn rho(&self) -> f64 {
        self.rho
    }

    pub fn d(&self) -> f64 {
        self.d
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Lamé parameters `(lambda, mu)` in Pa.
    pub fn lame(&self) -> (f64, f64) {
        let mu = self.rho * self.ct * self.ct;
        let lambda = self.rho * self.cl * self.cl - 2.0 * mu;
        (lambda, mu)
    }

    /// Local operators for `n` collocation points in the default units.
    pub fn operators(&self, n: usize) -> Result<LayerOperators> {
        self.operators_with(n, &Rescaling::DEFAULT)
    }

    /// Local operators for `n` collocation points.
    pub fn operators_with(&self, n: usize, units: &Rescaling) -> Result<LayerOperators> {
        let grid = CollocationGrid::new(n, 2)?;
        let scale = 2.0 / units.length(self.d);
        let d1 = &grid.matrices[0] * scale;
        let d2 = &grid.matrices[1] * (scale * scale);

        let cl = units.velocity(self.cl);
        let ct = units.velocity(self.ct);
        let (lambda, mu) = self.lame();
        let lambda = units.modulus(lambda);
        let mu = units.modulus(mu);
        let p = lambda + 2.0 * mu;

        let size = COMPONENTS_PER_POINT * n;
        let zeros = || CMatrix::zeros(size, size);
        let eye = DMatrix::<f64>::identity(n, n);
        let (u, w) = (0, 1);

        // Equations of motion, u_x rows divided by lambda + 2mu and u_z rows by mu.
        let mut k0 = zeros();
        put_block(&mut k0, n, u, u, &d2, ONE * (mu / p));
        put_block(&mut k0, n, w, w, &d2, ONE * (p / mu));

        let mut k1 = zeros();
        put_block(&mut k1, n, u, w, &d1, I * ((lambda + mu) / p));
        put_block(&mut k1, n, w, u, &d1, I * ((lambda + mu) / mu));

        let k2 = CMatrix::from_diagonal_element(size, size, -ONE);

        let mut mass = zeros();
        put_block(&mut mass, n, u, u, &eye, ONE * (-1.0 / (cl * cl)));
        put_block(&mut mass, n, w, w, &eye, ONE * (-1.0 / (ct * ct)));

        // Tractions on a face of constant depth: sigma_xz on u_x rows, sigma_zz on u_z rows.
        let mut s0 = zeros();
        put_block(&mut s0, n, u, u, &d1, ONE * mu);
        put_block(&mut s0, n, w, w, &d1, ONE * p);

        let mut s1 = zeros();
        put_block(&mut s1, n, u, w, &eye, I * mu);
        put_block(&mut s1, n, w, u, &eye, I * lambda);

        // In-plane gradients du_x/dx and du_z/dx.
        let mut e1 = zeros();
        put_block(&mut e1, n, u, u, &eye, I);
        put_block(&mut e1, n, w, w, &eye, I);

        Ok(LayerOperators {
            n,
            kinematic: [k0, k1, k2],
            mass,
            stress: [s0, s1, zeros()],
            strain: [zeros(), e1, zeros()],
        })
    }
}

impl fmt::Display for ElasticLayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<ElasticLayer>({})", self.name)
    }
}

/// Collocation operators of one layer, each `2n x 2n`.
///
/// Stacks are indexed by the power of the wavenumber they multiply.
#[derive(Debug, Clone, PartialEq)]
pub struct LayerOperators {
    pub n: usize,
    pub kinematic: [CMatrix; STACK_DEPTH],
    pub mass: CMatrix,
    pub stress: [CMatrix; STACK_DEPTH],
    pub strain: [CMatrix; STACK_DEPTH],
}

impl LayerOperators {
    /// Side length of every local matrix.
    pub fn size(&self) -> usize {
        COMPONENTS_PER_POINT * self.n
    }
}

/// Write `factor * source` into the `(row_block, col_block)` n x n block.
fn put_block(
    target: &mut CMatrix,
    n: usize,
    row_block: usize,
    col_block: usize,
    source: &DMatrix<f64>,
    factor: Complex64,
) {
    let mut block = target.view_mut((row_block * n, col_block * n), (n, n));
    for j in 0..n {
        for i in 0..n {
            block[(i, j)] = factor * source[(i, j)];
        }
    }
}
