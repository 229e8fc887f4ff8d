//! Layered waveguides and their build/evaluate lifecycle.

use std::fmt;

use log::debug;

use crate::assembly::GlobalOperators;
use crate::error::{Result, ScmError};
use crate::layer::ElasticLayer;
use crate::solver::{solve_dispersion, DispersionResult, SolverOptions};
use crate::types::{Rescaling, DEFAULT_WAVEGUIDE_NAME};

/// Lifecycle stage of a [`Waveguide`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaveguideState {
    Empty,
    HasLayers,
    Built,
}

/// Anything that yields a dispersion result for a frequency.
pub trait Evaluable {
    /// Solve at `frequency` (Hz) with the given options.
    fn evaluate_with(&self, frequency: f64, options: &SolverOptions) -> Result<DispersionResult>;

    /// Number of layers the result vectors are laid out for.
    fn layer_count(&self) -> usize;
}

/// An ordered stack of elastic layers, top to bottom.
///
/// Layers are added with [`Waveguide::add_layer`] and the global operators
/// assembled by [`Waveguide::build`]. Any later layer addition discards the
/// build, so evaluation always sees operators for the current stack.
#[derive(Debug, Clone)]
pub struct Waveguide {
    name: String,
    layers: Vec<ElasticLayer>,
    units: Rescaling,
    system: Option<GlobalOperators>,
}

impl Default for Waveguide {
    fn default() -> Self {
        Self::new()
    }
}

impl Waveguide {
    pub fn new() -> Self {
        Self::named(DEFAULT_WAVEGUIDE_NAME)
    }

    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            layers: Vec::new(),
            units: Rescaling::DEFAULT,
            system: None,
        }
    }

    /// Start from an existing layer list.
    pub fn with_layers(layers: impl IntoIterator<Item = ElasticLayer>) -> Self {
        let mut waveguide = Self::new();
        for layer in layers {
            waveguide.add_layer(layer);
        }
        waveguide
    }

    /// Replace the conditioning rescale. Discards any previous build.
    pub fn with_units(mut self, units: Rescaling) -> Self {
        self.units = units;
        self.system = None;
        self
    }

    /// Append a layer below the current stack.
    pub fn add_layer(&mut self, layer: ElasticLayer) -> &mut Self {
        debug!("{}: adding {} as layer {}", self, layer, self.layers.len());
        self.layers.push(layer);
        self.system = None;
        self
    }

    /// Assemble the global operators with `n` collocation points per layer.
    pub fn build(&mut self, n: usize) -> Result<&mut Self> {
        if self.layers.is_empty() {
            return Err(ScmError::State(format!("{self} has no layers to build")));
        }
        if n == 0 {
            return Err(ScmError::not_positive("n", 0.0));
        }
        let system = GlobalOperators::assemble(&self.layers, n, &self.units)?;
        debug!(
            "{}: built {} layer(s) with n = {n}, dim = {}",
            self,
            self.layers.len(),
            system.dim()
        );
        self.system = Some(system);
        Ok(self)
    }

    /// Solve at `frequency` (Hz) with default options.
    pub fn evaluate(&self, frequency: f64) -> Result<DispersionResult> {
        self.evaluate_with(frequency, &SolverOptions::default())
    }

    /// Solve at `frequency` (Hz). The build is checked before the frequency.
    pub fn evaluate_with(&self, frequency: f64, options: &SolverOptions) -> Result<DispersionResult> {
        let system = self
            .system
            .as_ref()
            .ok_or_else(|| ScmError::State(format!("{self} must be built before evaluation")))?;
        solve_dispersion(system, frequency, &self.units, options)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn layers(&self) -> &[ElasticLayer] {
        &self.layers
    }

    pub fn units(&self) -> &Rescaling {
        &self.units
    }

    /// Collocation points per layer of the current build.
    pub fn collocation_points(&self) -> Option<usize> {
        self.system.as_ref().map(|s| s.n)
    }

    /// Assembled operators of the current build.
    pub fn system(&self) -> Option<&GlobalOperators> {
        self.system.as_ref()
    }

    pub fn is_built(&self) -> bool {
        self.system.is_some()
    }

    pub fn state(&self) -> WaveguideState {
        match (&self.system, self.layers.is_empty()) {
            (Some(_), _) => WaveguideState::Built,
            (None, true) => WaveguideState::Empty,
            (None, false) => WaveguideState::HasLayers,
        }
    }
}

impl Evaluable for Waveguide {
    fn evaluate_with(&self, frequency: f64, options: &SolverOptions) -> Result<DispersionResult> {
        Waveguide::evaluate_with(self, frequency, options)
    }

    fn layer_count(&self) -> usize {
        self.layers.len()
    }
}

impl fmt::Display for Waveguide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<Waveguide>({})", self.name)
    }
}
