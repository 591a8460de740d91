// Fast-marching potential solve.
//
// Dijkstra-like expansion from the goal cells: the candidate with the
// smallest tentative potential is accepted (known), its still-unknown
// neighbors get speed/cost on demand and a 1D or 2D eikonal update, and the
// accepted cell's four edge velocities are derived from the recorded
// potential gradient. A cell moves strictly unknown -> candidate -> known;
// candidate potentials are never revised.

use std::cmp::Ordering;

use glam::{Vec3, Vec3Swizzles};

use crate::GroupId;
#[cfg(test)]
use crate::config::SimConfig;

use super::{Dir, EPSILON, Grid, GroupLimits, NUM_DIRS};

// ============================================================================
// CANDIDATE HEAP
// ============================================================================

/// Min-heap entry: a cell with a tentative potential. Ties break on the cell
/// index so heap order is fully deterministic.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Candidate {
    pub potential: f32,
    pub cell: usize,
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Candidate {}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse ordering so BinaryHeap pops the smallest potential first.
        other
            .potential
            .total_cmp(&self.potential)
            .then_with(|| other.cell.cmp(&self.cell))
    }
}

// ============================================================================
// EIKONAL UPDATES
// ============================================================================

/// Single-axis eikonal update.
pub(crate) fn potential_1d(p: f32, c: f32) -> f32 {
    (p + c).max(p - c)
}

/// Two-axis eikonal update: the larger root of the quadratic
/// (phi - p1)^2 / c1^2 + (phi - p2)^2 / c2^2 = 1. Degenerate cost
/// denominators are clamped to EPSILON.
pub(crate) fn potential_2d(p1: f32, c1: f32, p2: f32, c2: f32) -> f32 {
    let c1s = c1 * c1;
    let c2s = c2 * c2;
    let sum = (c1s + c2s).max(EPSILON);

    let a = (c1s * p2 + c2s * p1) / sum;
    let b = sum.sqrt().max(EPSILON);
    let c = (c1 * c2) / b;

    (a + c).max(a - c)
}

impl Grid {
    /// Solve the potential field for one group.
    ///
    /// Cycles the buffers first so the per-group transients of the
    /// previously solved group read as clean; the previous buffer is
    /// additionally reset cell by cell as the wavefront touches it, and the
    /// cycle happens here rather than after the solve so advection keeps
    /// reading the buffer that was just written.
    pub fn update_group_potential_field(
        &mut self,
        group: GroupId,
        goals: &[usize],
        limits: GroupLimits,
    ) {
        assert!(!goals.is_empty(), "potential solve for group {group} without goal cells");
        assert!(
            self.candidates.is_empty(),
            "candidate heap not drained before solve"
        );

        std::mem::swap(&mut self.curr, &mut self.prev);
        self.set_group_limits(limits);
        self.infinite_potential_cases = 0;

        log::debug!(
            "solve group {group}: speed [{:.2}, {:.2}], slope [{:.2}, {:.2}], radius {:.2}",
            limits.min_speed,
            limits.max_speed,
            limits.min_slope,
            limits.max_slope,
            limits.max_radius
        );

        // Seed: goals are known at potential zero; their neighbors form the
        // initial candidate set.
        for &goal in goals {
            {
                let cell = &mut self.states[self.curr].cells[goal];
                cell.known = true;
                cell.candidate = true;
                cell.potential = 0.0;
            }
            self.states[self.prev].cells[goal].reset_group();

            self.update_candidates(group, goal);

            if let Some(vis) = self.potential_vis.get_mut(&group) {
                vis[goal] = 0.0;
            }
            if let Some(vis) = self.velocity_vis.get_mut(&group) {
                vis[goal * NUM_DIRS..goal * NUM_DIRS + NUM_DIRS].fill(Vec3::ZERO);
            }
            if let Some(vis) = self.potential_delta_vis.get_mut(&group) {
                vis[goal * NUM_DIRS..goal * NUM_DIRS + NUM_DIRS].fill(Vec3::ZERO);
            }
        }

        while let Some(candidate) = self.candidates.pop() {
            let idx = candidate.cell;
            self.states[self.curr].cells[idx].known = true;
            self.states[self.prev].cells[idx].reset_group();

            self.update_candidates(group, idx);

            // Edge velocities of the accepted cell: downhill along the
            // recorded potential gradient, scaled by the directional speed.
            let cell = self.states[self.curr].cells[idx];
            for dir in Dir::ALL {
                let d = dir.idx();
                let e = cell.edges[d];
                let gradient = self.states[self.curr].edges[e].potential_delta;
                let len = gradient.xz().length();
                let velocity = if len > 0.0 {
                    gradient / len * -cell.speed[d]
                } else {
                    Vec3::ZERO
                };
                self.states[self.curr].edges[e].velocity = velocity;
                self.states[self.prev].edges[e].velocity = Vec3::ZERO;
            }

            if self.cfg.update_interval > 1 {
                self.snapshot_group_cell(group, idx);
            }

            self.mirror_solved_cell(group, idx);
        }

        assert_eq!(
            self.infinite_potential_cases, 0,
            "potential solve for group {group} left cells at infinity"
        );
    }

    /// Insert every still-unknown neighbor of `parent` into the candidate
    /// set with a freshly computed speed/cost and eikonal potential.
    fn update_candidates(&mut self, group: GroupId, parent: usize) {
        let parent_cell = self.states[self.curr].cells[parent];

        for n in 0..parent_cell.num_neighbors {
            let ni = parent_cell.neighbors[n];
            self.states[self.prev].cells[ni].reset_group();

            let ngb = self.states[self.curr].cells[ni];
            if ngb.known || ngb.candidate {
                continue;
            }

            self.compute_cell_speed_and_cost(group, ni);
            let mut ngb = self.states[self.curr].cells[ni];

            // Direction costs: any neighbor with a settled tentative
            // potential contributes (candidate potentials are final, they
            // are never revised); unknown neighbors sit at infinity.
            let mut dir_cost = [f32::INFINITY; NUM_DIRS];
            let mut dir_valid = [false; NUM_DIRS];
            let mut dir_cell = [usize::MAX; NUM_DIRS];
            for dir in Dir::ALL {
                let d = dir.idx();
                let (dx, dz) = dir.delta();
                let cx = ngb.x as i32 + dx;
                let cz = ngb.z as i32 + dz;
                if cx < 0 || cz < 0 || cx >= self.nx as i32 || cz >= self.nz as i32 {
                    continue;
                }
                let ci = cz as usize * self.nx + cx as usize;
                let dc = &self.states[self.curr].cells[ci];
                if dc.potential.is_finite() {
                    dir_cost[d] = dc.potential + dc.cost[d];
                    dir_valid[d] = dir_cost[d].is_finite();
                    dir_cell[d] = ci;
                }
            }

            let x_defined = dir_valid[Dir::East.idx()] || dir_valid[Dir::West.idx()];
            let z_defined = dir_valid[Dir::North.idx()] || dir_valid[Dir::South.idx()];
            // The parent is known and adjacent, so one axis always holds.
            assert!(
                x_defined || z_defined,
                "eikonal update at cell ({}, {}) with no defined axis",
                ngb.x,
                ngb.z
            );

            let pick = |a: Dir, b: Dir| -> usize {
                if dir_cost[a.idx()] < dir_cost[b.idx()] {
                    a.idx()
                } else {
                    b.idx()
                }
            };

            if x_defined && z_defined {
                let dx = pick(Dir::East, Dir::West);
                let dz = pick(Dir::North, Dir::South);
                let px = self.states[self.curr].cells[dir_cell[dx]].potential;
                let pz = self.states[self.curr].cells[dir_cell[dz]].potential;

                ngb.potential = potential_2d(px, ngb.cost[dx], pz, ngb.cost[dz]);

                // The gradient's world-space direction must match the
                // direction along which potential increases; the N and W
                // axes are inverted.
                let gx = (px - ngb.potential) * if dx == Dir::West.idx() { -1.0 } else { 1.0 };
                let gz = (pz - ngb.potential) * if dz == Dir::North.idx() { -1.0 } else { 1.0 };
                let gradient = Vec3::new(gx, 0.0, gz);
                self.record_gradient(ngb.edges[dx], gradient);
                self.record_gradient(ngb.edges[dz], gradient);
            } else if z_defined {
                let dz = pick(Dir::North, Dir::South);
                let pz = self.states[self.curr].cells[dir_cell[dz]].potential;

                ngb.potential = potential_1d(pz, ngb.cost[dz]);

                let gz = (pz - ngb.potential) * if dz == Dir::North.idx() { -1.0 } else { 1.0 };
                self.record_gradient(ngb.edges[dz], Vec3::new(0.0, 0.0, gz));
            } else {
                let dx = pick(Dir::East, Dir::West);
                let px = self.states[self.curr].cells[dir_cell[dx]].potential;

                ngb.potential = potential_1d(px, ngb.cost[dx]);

                let gx = (px - ngb.potential) * if dx == Dir::West.idx() { -1.0 } else { 1.0 };
                self.record_gradient(ngb.edges[dx], Vec3::new(gx, 0.0, 0.0));
            }

            ngb.candidate = true;
            if !ngb.potential.is_finite() {
                self.infinite_potential_cases += 1;
            }
            self.states[self.curr].cells[ni] = ngb;
            self.candidates.push(Candidate {
                potential: ngb.potential,
                cell: ni,
            });
        }
    }

    fn record_gradient(&mut self, edge: usize, gradient: Vec3) {
        self.states[self.curr].edges[edge].potential_delta = gradient;
        self.states[self.prev].edges[edge].potential_delta = Vec3::ZERO;
    }

    /// Keep a copy of the accepted cell and its edges for reuse on the ticks
    /// between resolves.
    fn snapshot_group_cell(&mut self, group: GroupId, idx: usize) {
        let cell = self.states[self.curr].cells[idx];
        if let Some(snapshot) = self.group_states.get_mut(&group) {
            snapshot.cells[idx] = cell;
            for d in 0..NUM_DIRS {
                let e = cell.edges[d];
                snapshot.edges[e] = self.states[self.curr].edges[e];
            }
        }
    }

    fn mirror_solved_cell(&mut self, group: GroupId, idx: usize) {
        let cell = self.states[self.curr].cells[idx];
        let edge_scale = self.square * 0.5;

        if let Some(vis) = self.potential_vis.get_mut(&group) {
            vis[idx] = if cell.potential.is_finite() {
                cell.potential
            } else {
                -1.0
            };
        }
        for d in 0..NUM_DIRS {
            let e = cell.edges[d];
            let edge = self.states[self.curr].edges[e];
            if let Some(vis) = self.velocity_vis.get_mut(&group) {
                vis[idx * NUM_DIRS + d] = edge.velocity * edge_scale;
            }
            if let Some(vis) = self.potential_delta_vis.get_mut(&group) {
                vis[idx * NUM_DIRS + d] = edge.potential_delta * edge_scale;
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn config_mut(&mut self) -> &mut SimConfig {
        &mut self.cfg
    }
}
