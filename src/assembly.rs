//! Global operator assembly for a stack of layers.
//!
//! Layer operators are placed on the block diagonal. Rows belonging to the
//! outer faces are then replaced by traction-free conditions and rows at each
//! internal interface by continuity conditions, which keeps the global system
//! square.

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::error::{Result, ScmError};
use crate::layer::{ElasticLayer, LayerOperators};
use crate::types::{CMatrix, Rescaling, COMPONENTS_PER_POINT, STACK_DEPTH};

/// Global rows replaced at one internal interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InterfaceRows {
    /// Bottom face of the upper layer: shear and normal traction continuity.
    pub upper: [usize; 2],
    /// Top face of the lower layer: continuity of du_x/dx and du_z/dx.
    pub lower: [usize; 2],
}

/// Row bookkeeping for boundary and interface conditions.
///
/// Each pair is `[u_x row, u_z row]` of the same collocation point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConditionRows {
    pub top: [usize; 2],
    pub bottom: [usize; 2],
    pub interfaces: Vec<InterfaceRows>,
}

impl ConditionRows {
    pub fn new(n_layers: usize, n: usize) -> Self {
        let block = COMPONENTS_PER_POINT * n;
        let dim = n_layers * block;
        let interfaces = (0..n_layers.saturating_sub(1))
            .map(|i| {
                let offset = block * i;
                InterfaceRows {
                    upper: [offset + n - 1, offset + 2 * n - 1],
                    lower: [offset + 2 * n, offset + 3 * n],
                }
            })
            .collect();
        Self {
            top: [0, n],
            bottom: [dim - 1 - n, dim - 1],
            interfaces,
        }
    }

    /// Every replaced row, in ascending order.
    pub fn all(&self) -> Vec<usize> {
        let mut rows: Vec<usize> = self
            .top
            .iter()
            .chain(self.bottom.iter())
            .copied()
            .chain(self.interfaces.iter().flat_map(|r| r.upper.into_iter().chain(r.lower)))
            .collect();
        rows.sort_unstable();
        rows
    }
}

/// Local rows of the top face of a layer.
fn top_face(n: usize) -> [usize; 2] {
    [0, n]
}

/// Local rows of the bottom face of a layer.
fn bottom_face(n: usize) -> [usize; 2] {
    [n - 1, 2 * n - 1]
}

/// Assembled operators of a layered waveguide, each `dim x dim` with
/// `dim = n_layers * 2n`.
#[derive(Debug, Clone, PartialEq)]
pub struct GlobalOperators {
    pub n: usize,
    pub n_layers: usize,
    pub kinematic: [CMatrix; STACK_DEPTH],
    pub mass: CMatrix,
    pub stress: [CMatrix; STACK_DEPTH],
    pub strain: [CMatrix; STACK_DEPTH],
}

impl GlobalOperators {
    /// Assemble the global system for `layers` with `n` points per layer.
    pub fn assemble(layers: &[ElasticLayer], n: usize, units: &Rescaling) -> Result<Self> {
        if layers.is_empty() {
            return Err(ScmError::State("cannot assemble a waveguide without layers".into()));
        }
        let locals = compute_all_layer_operators(layers, n, units)?;

        let block = COMPONENTS_PER_POINT * n;
        let dim = layers.len() * block;
        let zeros = || CMatrix::zeros(dim, dim);
        let mut global = GlobalOperators {
            n,
            n_layers: layers.len(),
            kinematic: [zeros(), zeros(), zeros()],
            mass: zeros(),
            stress: [zeros(), zeros(), zeros()],
            strain: [zeros(), zeros(), zeros()],
        };

        for (i, local) in locals.iter().enumerate() {
            let offset = i * block;
            for p in 0..STACK_DEPTH {
                place(&mut global.kinematic[p], offset, &local.kinematic[p]);
                place(&mut global.stress[p], offset, &local.stress[p]);
                place(&mut global.strain[p], offset, &local.strain[p]);
            }
            place(&mut global.mass, offset, &local.mass);
        }

        let rows = ConditionRows::new(layers.len(), n);
        global.apply_boundaries(&rows, &locals);
        global.apply_interfaces(&rows, &locals);
        Ok(global)
    }

    /// Side length of the global matrices.
    pub fn dim(&self) -> usize {
        self.n_layers * COMPONENTS_PER_POINT * self.n
    }

    /// Traction-free outer faces.
    fn apply_boundaries(&mut self, rows: &ConditionRows, locals: &[LayerOperators]) {
        let n = self.n;
        let block = COMPONENTS_PER_POINT * n;
        let last = locals.len() - 1;

        let faces = [
            (rows.top, top_face(n), 0usize),
            (rows.bottom, bottom_face(n), last),
        ];
        for (global_rows, local_rows, layer) in faces {
            let offset = layer * block;
            for (&row, &local_row) in global_rows.iter().zip(local_rows.iter()) {
                for p in 0..STACK_DEPTH {
                    let target = &mut self.kinematic[p];
                    target.row_mut(row).fill(Default::default());
                    copy_row(target, row, offset, &locals[layer].stress[p], local_row, 1.0);
                }
                self.mass.row_mut(row).fill(Default::default());
            }
        }
    }

    /// Traction and in-plane gradient continuity between neighbouring layers.
    fn apply_interfaces(&mut self, rows: &ConditionRows, locals: &[LayerOperators]) {
        let n = self.n;
        let block = COMPONENTS_PER_POINT * n;

        for (i, iface) in rows.interfaces.iter().enumerate() {
            let upper = &locals[i];
            let lower = &locals[i + 1];
            let upper_offset = i * block;
            let lower_offset = upper_offset + block;
            let upper_face = bottom_face(n);
            let lower_face = top_face(n);

            let conditions = [
                (iface.upper[0], &upper.stress, &lower.stress, 0),
                (iface.upper[1], &upper.stress, &lower.stress, 1),
                (iface.lower[0], &upper.strain, &lower.strain, 0),
                (iface.lower[1], &upper.strain, &lower.strain, 1),
            ];
            for (row, above, below, component) in conditions {
                for p in 0..STACK_DEPTH {
                    let target = &mut self.kinematic[p];
                    target.row_mut(row).fill(Default::default());
                    copy_row(target, row, upper_offset, &above[p], upper_face[component], 1.0);
                    copy_row(target, row, lower_offset, &below[p], lower_face[component], -1.0);
                }
                self.mass.row_mut(row).fill(Default::default());
            }
        }
    }
}

/// Copy `source` onto the diagonal block starting at `offset`.
fn place(target: &mut CMatrix, offset: usize, source: &CMatrix) {
    let size = source.nrows();
    target.view_mut((offset, offset), (size, size)).copy_from(source);
}

/// Write `sign * source[source_row, ..]` into `target[row, offset..]`.
fn copy_row(
    target: &mut CMatrix,
    row: usize,
    offset: usize,
    source: &CMatrix,
    source_row: usize,
    sign: f64,
) {
    for j in 0..source.ncols() {
        target[(row, offset + j)] = source[(source_row, j)] * sign;
    }
}

/// Compute all layer operators sequentially.
#[cfg(not(feature = "parallel"))]
fn compute_all_layer_operators(
    layers: &[ElasticLayer],
    n: usize,
    units: &Rescaling,
) -> Result<Vec<LayerOperators>> {
    layers.iter().map(|layer| layer.operators_with(n, units)).collect()
}

/// Compute all layer operators in parallel; layers are independent.
#[cfg(feature = "parallel")]
fn compute_all_layer_operators(
    layers: &[ElasticLayer],
    n: usize,
    units: &Rescaling,
) -> Result<Vec<LayerOperators>> {
    layers.par_iter().map(|layer| layer.operators_with(n, units)).collect()
}
