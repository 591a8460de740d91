// Read-only field taps for debug overlays.
//
// Renderers pull contiguous arrays plus a (size_x, size_z, stride)
// descriptor. Cell-centered fields have stride 1; edge-centered fields
// store four entries per cell (N, S, E, W). Per-group fields return `None`
// for unknown groups; global fields ignore the group argument.
//
// The mirrors carry presentation-only scalings (edge fields by half a
// square) and mirror infinite potentials as -1.0; nothing here feeds back
// into the simulation.

use glam::Vec3;

use crate::GroupId;
use crate::grid::{Grid, NUM_DIRS};

/// Scalar fields a renderer can request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarField {
    /// Crowd density rho (global, cell-centered).
    Density,
    /// Terrain height (global, cell-centered).
    Height,
    /// Directional speed f (per-group, edge-centered).
    Speed,
    /// Directional unit cost C (per-group, edge-centered).
    Cost,
    /// Potential phi (per-group, cell-centered; -1 marks unreached cells).
    Potential,
}

/// Vector fields a renderer can request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VectorField {
    /// Combined static + mobile discomfort (global, cell-centered).
    Discomfort,
    /// Edge height deltas (global, edge-centered).
    HeightDelta,
    /// Average crowd velocity v-bar (global, cell-centered).
    AvgVelocity,
    /// Group flow velocity v (per-group, edge-centered).
    Velocity,
    /// Potential gradient delta-phi (per-group, edge-centered).
    PotentialDelta,
}

/// A borrowed field with its layout descriptor.
#[derive(Debug, Clone, Copy)]
pub struct FieldView<'a, T> {
    pub data: &'a [T],
    pub size_x: usize,
    pub size_z: usize,
    pub stride: usize,
}

impl Grid {
    /// Borrow a scalar field; `group` is required for the per-group kinds.
    pub fn scalar_field(
        &self,
        field: ScalarField,
        group: Option<GroupId>,
    ) -> Option<FieldView<'_, f32>> {
        let vis = self.vis_arrays();
        let (data, stride): (&[f32], usize) = match field {
            ScalarField::Density => (vis.density, 1),
            ScalarField::Height => (vis.height, 1),
            ScalarField::Speed => (vis.speed.get(&group?)?.as_slice(), NUM_DIRS),
            ScalarField::Cost => (vis.cost.get(&group?)?.as_slice(), NUM_DIRS),
            ScalarField::Potential => (vis.potential.get(&group?)?.as_slice(), 1),
        };
        Some(FieldView {
            data,
            size_x: vis.nx,
            size_z: vis.nz,
            stride,
        })
    }

    /// Borrow a vector field; `group` is required for the per-group kinds.
    pub fn vector_field(
        &self,
        field: VectorField,
        group: Option<GroupId>,
    ) -> Option<FieldView<'_, Vec3>> {
        let vis = self.vis_arrays();
        let (data, stride): (&[Vec3], usize) = match field {
            VectorField::Discomfort => (vis.discomfort, 1),
            VectorField::HeightDelta => (vis.height_delta, NUM_DIRS),
            VectorField::AvgVelocity => (vis.avg_velocity, 1),
            VectorField::Velocity => (vis.velocity.get(&group?)?.as_slice(), NUM_DIRS),
            VectorField::PotentialDelta => {
                (vis.potential_delta.get(&group?)?.as_slice(), NUM_DIRS)
            }
        };
        Some(FieldView {
            data,
            size_x: vis.nx,
            size_z: vis.nz,
            stride,
        })
    }
}
