//! Guided-wave dispersion curves of layered elastic plates.
//!
//! Each layer is discretized through its thickness with Chebyshev spectral
//! collocation. The per-layer operators are assembled into one global
//! quadratic eigenproblem in the wavenumber, with traction-free outer faces
//! and welded interfaces imposed by row substitution. For every frequency the
//! problem is linearized and solved densely; admissible roots are labelled
//! symmetric or antisymmetric from their displacement profile.
//!
//! # Example
//!
//! ```
//! use scm_dispersion::{ElasticLayer, Waveguide};
//!
//! // 10 mm aluminum plate
//! let plate = ElasticLayer::new(6350.0, 3100.0, 2700.0, 10e-3, "AL")?;
//! let mut waveguide = Waveguide::named("plate");
//! waveguide.add_layer(plate).build(12)?;
//!
//! let result = waveguide.evaluate(100e3)?;
//! assert_eq!(result.len(), 48);
//!
//! for mode in result.classify()? {
//!     let c = result.phase_velocity(mode.column).unwrap_or_default();
//!     println!("{:?}: k = {:.2} 1/m, c = {:.0} m/s", mode.mode, mode.wavenumber, c);
//! }
//! # Ok::<(), scm_dispersion::ScmError>(())
//! ```

pub mod assembly;
pub mod chebyshev;
pub mod error;
pub mod layer;
pub mod modes;
pub mod qz;
pub mod solver;
pub mod sweep;
pub mod types;
pub mod waveguide;

pub use assembly::{ConditionRows, GlobalOperators, InterfaceRows};
pub use chebyshev::{chebyshev_differentiation, CollocationGrid};
pub use error::{Result, ScmError};
pub use layer::{ElasticLayer, LayerOperators};
pub use modes::{classify_mode, classify_modes, group_by_type, ClassifiedMode};
pub use qz::GeneralizedEigen;
pub use solver::{solve_dispersion, DispersionResult, SolverOptions};
pub use sweep::{linspace, sweep_frequencies, DispersionCurve, DispersionPoint, SweepOptions};
pub use types::{CMatrix, ModeType, Rescaling};
pub use waveguide::{Evaluable, Waveguide, WaveguideState};
