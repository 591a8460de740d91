// Per-group directional speed and unit-cost construction.
//
// For each of the four travel directions a cell gets a speed f blending the
// slope-derived topological speed with the local crowd flow speed by density
// regime, and a unit cost (alpha*f + beta + gamma*g) / f^2. Speed samples
// density outside the largest group member's own disc (otherwise agents
// would obstruct themselves); cost samples the immediate neighbor.
//
// If the flow speed is zero in a saturated region the cost would go infinite
// everywhere in it; the speed is clamped up to EPSILON instead so the
// potential solve always sees finite costs.

use glam::{Vec2, Vec3Swizzles};

use crate::GroupId;
use crate::agent::AgentDef;

use super::{Cell, Dir, EPSILON, Grid, NUM_DIRS};

/// Aggregates over one group's member defs, recomputed at each solve.
#[derive(Debug, Clone, Copy, Default)]
pub struct GroupLimits {
    pub min_slope: f32,
    pub max_slope: f32,
    pub min_speed: f32,
    pub max_speed: f32,
    pub max_radius: f32,
}

impl GroupLimits {
    /// Fold the defs (and footprint radii) of a group's members.
    pub fn from_defs<I: IntoIterator<Item = (AgentDef, f32)>>(members: I) -> Self {
        let mut limits = Self {
            min_slope: f32::MAX,
            max_slope: -f32::MAX,
            min_speed: f32::MAX,
            max_speed: -f32::MAX,
            max_radius: -f32::MAX,
        };
        let mut any = false;
        for (def, radius) in members {
            limits.min_slope = limits.min_slope.min(def.min_slope);
            limits.max_slope = limits.max_slope.max(def.max_slope);
            limits.min_speed = limits.min_speed.min(def.min_forward_speed);
            limits.max_speed = limits.max_speed.max(def.max_forward_speed);
            limits.max_radius = limits.max_radius.max(radius);
            any = true;
        }
        debug_assert!(any, "group limits folded from an empty member set");
        limits
    }
}

/// True when the sampled edge slope opposes travel along `dir` (uphill in
/// the stored sign convention); such slopes scale the speed down, the
/// complementary case scales it up.
#[inline]
fn positive_slope(dir: Dir, slope: f32) -> bool {
    match dir {
        Dir::North | Dir::West => slope < 0.0,
        Dir::South | Dir::East => slope >= 0.0,
    }
}

impl Grid {
    /// Compute all four directional speeds and costs of one cell for the
    /// group currently being solved, and mirror them into the vis arrays.
    pub(crate) fn compute_cell_speed_and_cost(&mut self, group: GroupId, cell_idx: usize) {
        // Sample speed-side density one cell past the widest member's disc
        // so an agent never reads its own contribution.
        let offset = self.cells_in_radius(self.limits.max_radius);
        let curr = self.curr;
        let cell = self.states[curr].cells[cell_idx];

        let rho_min = self.cfg.rho_min;
        let rho_max = self.cfg.rho_max;
        let f_min = self.limits.min_speed;
        let f_max = self.limits.max_speed;
        let slope_span = (self.max_terrain_slope - self.min_terrain_slope).max(EPSILON);

        let mut speed = [0.0f32; NUM_DIRS];
        let mut cost = [0.0f32; NUM_DIRS];

        for dir in Dir::ALL {
            let d = dir.idx();
            let (dx, dz) = dir.delta();
            let dir_xz: Vec2 = dir.vector().xz();

            let far = self.cell_at_offset(&cell, dx * offset, dz * offset);
            let near = self.cell_at_offset(&cell, dx, dz);

            let edge = self.states[curr].edges[cell.edges[d]];
            let slope = edge.height_delta.xz().dot(dir_xz);
            let slope_mod = if positive_slope(dir, slope) {
                slope.abs()
            } else {
                -slope.abs()
            };

            // (s_max - s_min) is positive and (f_min - f_max) negative, so a
            // positive numerator decreases speed on climbs and a negative
            // one increases it on descents.
            let slope_scale = if self.flat_terrain {
                0.0
            } else {
                (slope_mod - self.min_terrain_slope) / slope_span
            };
            let topo = f_max + slope_scale.clamp(-1.0, 1.0) * (f_min - f_max);

            let blend = |ngb: &Cell| -> f32 {
                let flow = ngb.avg_velocity.xz().dot(dir_xz).max(0.0);
                if ngb.density >= rho_max {
                    flow
                } else if ngb.density <= rho_min {
                    topo
                } else {
                    let density_scale = (ngb.density - rho_min) / (rho_max - rho_min);
                    topo + density_scale * (topo - flow)
                }
            };

            let f_speed = blend(&far);
            let mut f_cost = blend(&near);

            let discomfort = if self.cfg.directional_discomfort {
                // Map the alignment dot from [-1, 1] to [0, 1]: travel
                // parallel to the discomfort flow contributes nothing,
                // head-on travel contributes the full magnitude.
                let s_scale = (near.static_discomfort.xz().dot(dir_xz) * -1.0 + 1.0) * 0.5;
                let m_scale = (near.mobile_discomfort.xz().dot(dir_xz) * -1.0 + 1.0) * 0.5;
                near.static_discomfort.y * s_scale + near.mobile_discomfort.y * m_scale
            } else {
                near.static_discomfort.y + near.mobile_discomfort.y
            };

            if f_cost <= EPSILON {
                f_cost = EPSILON;
            }
            speed[d] = f_speed;
            cost[d] =
                (self.cfg.alpha * f_cost + self.cfg.beta + self.cfg.gamma * discomfort)
                    / (f_cost * f_cost);
        }

        let stored = &mut self.states[curr].cells[cell_idx];
        stored.speed = speed;
        stored.cost = cost;

        if let Some(vis) = self.speed_vis.get_mut(&group) {
            vis[cell_idx * NUM_DIRS..cell_idx * NUM_DIRS + NUM_DIRS].copy_from_slice(&speed);
        }
        if let Some(vis) = self.cost_vis.get_mut(&group) {
            vis[cell_idx * NUM_DIRS..cell_idx * NUM_DIRS + NUM_DIRS].copy_from_slice(&cost);
        }
    }

    /// Copy of the cell `(dx, dz)` steps away, clamped to the grid (the
    /// border hands back the nearest cell, possibly `cell` itself).
    fn cell_at_offset(&self, cell: &Cell, dx: i32, dz: i32) -> Cell {
        let cx = (cell.x as i32 + dx).clamp(0, self.nx as i32 - 1);
        let cz = (cell.z as i32 + dz).clamp(0, self.nz as i32 - 1);
        self.states[self.curr].cells[cz as usize * self.nx + cx as usize]
    }

    pub(crate) fn set_group_limits(&mut self, limits: GroupLimits) {
        self.limits = limits;
    }
}
