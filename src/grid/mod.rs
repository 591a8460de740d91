// The shared planning grid of the continuum-crowds pipeline.
//
// One `Cell` per grid square, one `Edge` per distinct face between adjacent
// squares. Cells and edges form a bidirectional graph represented as two
// parallel arrays with integer indices; the grid owns both. Two full buffers
// alternate at each group solve so the per-group transients of the previous
// group read as clean while the next group writes.
//
// Pipeline per tick: reset -> density/discomfort splatting -> average
// velocity -> per group { speed/cost + potential solve -> advection }.
// The splatting, speed/cost, solve, and advection stages live in the
// submodules; this file owns the data model, initialization, and reset.

mod advect;
mod potential;
mod speed_cost;
mod splat;

pub use speed_cost::GroupLimits;

use std::collections::{BTreeMap, BTreeSet, BinaryHeap};

use glam::Vec3;

use crate::GroupId;
use crate::config::SimConfig;
use crate::terrain::TerrainView;
use potential::Candidate;

/// Numerical floor shared by the whole pipeline: degenerate denominators and
/// near-zero magnitudes are clamped here instead of propagating infinities.
pub const EPSILON: f32 = 0.01;

pub const NUM_DIRS: usize = 4;

// ============================================================================
// DIRECTIONS
// ============================================================================

/// The four cardinal faces of a cell. North is -z, east is +x.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dir {
    North = 0,
    South = 1,
    East = 2,
    West = 3,
}

impl Dir {
    /// Fixed iteration order for determinism: N, S, E, W.
    pub const ALL: [Dir; NUM_DIRS] = [Dir::North, Dir::South, Dir::East, Dir::West];

    /// World-space unit vector of this direction on the xz plane.
    #[inline]
    pub fn vector(self) -> Vec3 {
        match self {
            Dir::North => Vec3::new(0.0, 0.0, -1.0),
            Dir::South => Vec3::new(0.0, 0.0, 1.0),
            Dir::East => Vec3::new(1.0, 0.0, 0.0),
            Dir::West => Vec3::new(-1.0, 0.0, 0.0),
        }
    }

    /// Grid-space step of this direction.
    #[inline]
    pub fn delta(self) -> (i32, i32) {
        match self {
            Dir::North => (0, -1),
            Dir::South => (0, 1),
            Dir::East => (1, 0),
            Dir::West => (-1, 0),
        }
    }

    #[inline]
    pub(crate) fn idx(self) -> usize {
        self as usize
    }
}

// ============================================================================
// CELLS AND EDGES
// ============================================================================

/// One grid square.
///
/// Coordinates, height, static discomfort, and the neighbor/edge links are
/// immutable after init. Density, average velocity, and mobile discomfort
/// are globally dynamic and reset every tick. Potential, the known/candidate
/// flags, and the directional speed/cost arrays are per-group transients
/// overwritten during each group's solve.
#[derive(Debug, Clone, Copy)]
pub struct Cell {
    pub x: u32,
    pub z: u32,
    pub height: f32,

    /// Terrain-based discomfort; y carries the normalized height, xz a unit
    /// direction (zero for the baseline field).
    pub static_discomfort: Vec3,

    pub density: f32,
    pub avg_velocity: Vec3,
    /// Predictive discomfort; xz accumulates velocity (normalized to a unit
    /// direction after splatting), y accumulates magnitude.
    pub mobile_discomfort: Vec3,

    pub potential: f32,
    pub known: bool,
    pub candidate: bool,
    pub speed: [f32; NUM_DIRS],
    pub cost: [f32; NUM_DIRS],

    pub edges: [usize; NUM_DIRS],
    pub neighbors: [usize; NUM_DIRS],
    pub num_neighbors: usize,
}

impl Cell {
    fn new(x: u32, z: u32) -> Self {
        Self {
            x,
            z,
            height: 0.0,
            static_discomfort: Vec3::ZERO,
            density: 0.0,
            avg_velocity: Vec3::ZERO,
            mobile_discomfort: Vec3::ZERO,
            potential: f32::INFINITY,
            known: false,
            candidate: false,
            speed: [0.0; NUM_DIRS],
            cost: [0.0; NUM_DIRS],
            edges: [0; NUM_DIRS],
            neighbors: [0; NUM_DIRS],
            num_neighbors: 0,
        }
    }

    /// Clear the globally-dynamic fields written by splatting.
    pub(crate) fn reset_global_dynamic(&mut self) {
        self.density = 0.0;
        self.avg_velocity = Vec3::ZERO;
        self.mobile_discomfort = Vec3::ZERO;
    }

    /// Clear the per-group transients ahead of a solve.
    pub(crate) fn reset_group(&mut self) {
        self.potential = f32::INFINITY;
        self.known = false;
        self.candidate = false;
        self.speed = [0.0; NUM_DIRS];
        self.cost = [0.0; NUM_DIRS];
    }
}

/// One face between two adjacent cells (or a border face).
///
/// `height_delta` is immutable after init; the axis component carries the
/// signed elevation difference between the two sides. `velocity` and
/// `potential_delta` are per-group transients.
#[derive(Debug, Clone, Copy, Default)]
pub struct Edge {
    pub height_delta: Vec3,
    pub velocity: Vec3,
    pub potential_delta: Vec3,
}

/// One complete cell + edge state.
#[derive(Debug, Clone)]
pub(crate) struct Buffer {
    pub cells: Vec<Cell>,
    pub edges: Vec<Edge>,
}

// ============================================================================
// GRID
// ============================================================================

pub struct Grid {
    nx: usize,
    nz: usize,
    square: f32,
    cfg: SimConfig,

    /// Extrema of |height_delta| over all interior edges.
    min_terrain_slope: f32,
    max_terrain_slope: f32,
    flat_terrain: bool,

    states: [Buffer; 2],
    curr: usize,
    prev: usize,

    /// Per-group snapshots kept for reuse between resolves when
    /// `update_interval > 1`.
    group_states: BTreeMap<GroupId, Buffer>,

    /// Cells written by this tick's splatting; reset is O(|touched|).
    touched: BTreeSet<usize>,

    /// Candidate min-heap reused across solves; must be empty between them.
    candidates: BinaryHeap<Candidate>,

    /// Aggregates of the group currently being solved.
    limits: GroupLimits,
    /// Cells that ended a solve with infinite potential; asserted zero.
    infinite_potential_cases: u32,

    // Visualization mirrors. Cell-centered fields have stride 1, the
    // edge-centered fields stride 4 (N, S, E, W per cell).
    density_vis: Vec<f32>,
    height_vis: Vec<f32>,
    discomfort_vis: Vec<Vec3>,
    avg_velocity_vis: Vec<Vec3>,
    height_delta_vis: Vec<Vec3>,
    speed_vis: BTreeMap<GroupId, Vec<f32>>,
    cost_vis: BTreeMap<GroupId, Vec<f32>>,
    potential_vis: BTreeMap<GroupId, Vec<f32>>,
    velocity_vis: BTreeMap<GroupId, Vec<Vec3>>,
    potential_delta_vis: BTreeMap<GroupId, Vec<Vec3>>,
}

impl Grid {
    /// Build the grid from the terrain view, downsampled by `cfg.downscale`.
    pub fn new(cfg: SimConfig, terrain: &dyn TerrainView) -> Self {
        assert!(cfg.downscale >= 1, "downscale factor must be >= 1");
        assert!(cfg.update_interval >= 1, "update interval must be >= 1");
        assert!(cfg.rho_min < cfg.rho_max, "rho_min must be below rho_max");

        let d = cfg.downscale as usize;
        let (tw, th) = terrain.height_map_size();
        let nx = tw / d;
        let nz = th / d;
        assert!(nx > 0 && nz > 0, "downscale factor exceeds the terrain size");

        let square = terrain.square_size() * d as f32;
        let num_cells = nx * nz;
        let num_edges = (nx + 1) * nz + (nz + 1) * nx;

        let h_min = terrain.min_height();
        let h_max = terrain.max_height();
        let flat_terrain = (h_max - h_min) < EPSILON;

        // Link cells to edges so that opposite faces of adjacent cells share
        // one edge record. Each cell allocates its own west and north faces;
        // the south and east faces reuse the neighbor's records except at
        // the map border, where fresh records are appended.
        let mut cells: Vec<Cell> = Vec::with_capacity(num_cells);
        let mut edges: Vec<Edge> = Vec::with_capacity(num_edges);
        for z in 0..nz {
            for x in 0..nx {
                let mut cell = Cell::new(x as u32, z as u32);

                edges.push(Edge::default());
                edges.push(Edge::default());
                let edge_w = edges.len() - 2;
                let edge_n = edges.len() - 1;
                cell.edges[Dir::West.idx()] = edge_w;
                cell.edges[Dir::North.idx()] = edge_n;

                if x > 0 {
                    cells[z * nx + (x - 1)].edges[Dir::East.idx()] = edge_w;
                }
                if z > 0 {
                    cells[(z - 1) * nx + x].edges[Dir::South.idx()] = edge_n;
                }
                if z == nz - 1 {
                    edges.push(Edge::default());
                    cell.edges[Dir::South.idx()] = edges.len() - 1;
                }
                if x == nx - 1 {
                    edges.push(Edge::default());
                    cell.edges[Dir::East.idx()] = edges.len() - 1;
                }

                cells.push(cell);
            }
        }
        debug_assert_eq!(cells.len(), num_cells);
        debug_assert_eq!(edges.len(), num_edges);

        // Static heights and the baseline discomfort. The field is global,
        // so every group experiences height discomfort the same way.
        let mut height_vis = vec![0.0; num_cells];
        let mut discomfort_vis = vec![Vec3::ZERO; num_cells];
        for z in 0..nz {
            for x in 0..nx {
                let i = z * nx + x;
                let h = terrain.center_height(x * d, z * d);
                cells[i].height = h;
                if !flat_terrain {
                    cells[i].static_discomfort = Vec3::new(0.0, (h - h_min) / (h_max - h_min), 0.0);
                }
                height_vis[i] = h;
                discomfort_vis[i] = cells[i].static_discomfort;
            }
        }

        // Neighbor links, edge height-deltas, and the terrain slope extrema.
        // Shared edges are written from both sides in scan order; the vis
        // mirror captures each cell's own perspective (negated across the
        // pair), the edge record keeps the last writer's.
        let mut height_delta_vis = vec![Vec3::ZERO; num_cells * NUM_DIRS];
        let mut s_min = f32::MAX;
        let mut s_max = -f32::MAX;
        let delta_vis_scale = square / d as f32 * 0.5;
        for z in 0..nz {
            for x in 0..nx {
                let i = z * nx + x;
                for dir in Dir::ALL {
                    let (dx, dz) = dir.delta();
                    let ncx = x as i32 + dx;
                    let ncz = z as i32 + dz;
                    if ncx < 0 || ncz < 0 || ncx >= nx as i32 || ncz >= nz as i32 {
                        continue;
                    }
                    let n = ncz as usize * nx + ncx as usize;

                    let dh = cells[n].height - cells[i].height;
                    let delta = match dir {
                        Dir::North | Dir::South => Vec3::new(0.0, 0.0, dh),
                        Dir::East | Dir::West => Vec3::new(dh, 0.0, 0.0),
                    };
                    let e = cells[i].edges[dir.idx()];
                    edges[e].height_delta = delta;

                    let k = cells[i].num_neighbors;
                    cells[i].neighbors[k] = n;
                    cells[i].num_neighbors = k + 1;

                    s_min = s_min.min(dh.abs());
                    s_max = s_max.max(dh.abs());

                    height_delta_vis[i * NUM_DIRS + dir.idx()] = delta * delta_vis_scale;
                }
            }
        }
        if s_max < s_min {
            // Degenerate 1x1 grid with no interior edges.
            s_min = 0.0;
            s_max = 0.0;
        }
        if flat_terrain {
            debug_assert!((s_max - s_min) < EPSILON);
        }

        log::info!(
            "grid: {}x{} cells, square {}, slope range [{:.3}, {:.3}]{}",
            nx,
            nz,
            square,
            s_min,
            s_max,
            if flat_terrain { " (flat)" } else { "" }
        );

        let buffer = Buffer { cells, edges };
        Self {
            nx,
            nz,
            square,
            cfg,
            min_terrain_slope: s_min,
            max_terrain_slope: s_max,
            flat_terrain,
            states: [buffer.clone(), buffer],
            curr: 0,
            prev: 1,
            group_states: BTreeMap::new(),
            touched: BTreeSet::new(),
            candidates: BinaryHeap::new(),
            limits: GroupLimits::default(),
            infinite_potential_cases: 0,
            density_vis: vec![0.0; num_cells],
            height_vis,
            discomfort_vis,
            avg_velocity_vis: vec![Vec3::ZERO; num_cells],
            height_delta_vis,
            speed_vis: BTreeMap::new(),
            cost_vis: BTreeMap::new(),
            potential_vis: BTreeMap::new(),
            velocity_vis: BTreeMap::new(),
            potential_delta_vis: BTreeMap::new(),
        }
    }

    // ------------------------------------------------------------------------
    // per-tick reset
    // ------------------------------------------------------------------------

    /// Undo the previous tick's splatting. Only cells in the touched set are
    /// visited; everything else is already clean.
    pub fn reset(&mut self) {
        for &i in &self.touched {
            for buffer in self.states.iter_mut() {
                buffer.cells[i].reset_global_dynamic();
            }
            self.density_vis[i] = 0.0;
            self.discomfort_vis[i] = self.states[self.curr].cells[i].static_discomfort;
            self.avg_velocity_vis[i] = Vec3::ZERO;
        }
        self.touched.clear();
    }

    // ------------------------------------------------------------------------
    // group lifecycle
    // ------------------------------------------------------------------------

    /// Allocate the per-group vis mirrors and the snapshot buffer.
    pub(crate) fn add_group(&mut self, group: GroupId) {
        let nc = self.nx * self.nz;
        self.speed_vis.insert(group, vec![0.0; nc * NUM_DIRS]);
        self.cost_vis.insert(group, vec![0.0; nc * NUM_DIRS]);
        self.potential_vis.insert(group, vec![0.0; nc]);
        self.velocity_vis.insert(group, vec![Vec3::ZERO; nc * NUM_DIRS]);
        self.potential_delta_vis
            .insert(group, vec![Vec3::ZERO; nc * NUM_DIRS]);

        let mut snapshot = self.states[self.curr].clone();
        for cell in &mut snapshot.cells {
            cell.reset_group();
        }
        for edge in &mut snapshot.edges {
            edge.velocity = Vec3::ZERO;
            edge.potential_delta = Vec3::ZERO;
        }
        self.group_states.insert(group, snapshot);
    }

    /// Drop everything held for a dissolved group.
    pub(crate) fn del_group(&mut self, group: GroupId) {
        self.speed_vis.remove(&group);
        self.cost_vis.remove(&group);
        self.potential_vis.remove(&group);
        self.velocity_vis.remove(&group);
        self.potential_delta_vis.remove(&group);
        self.group_states.remove(&group);
    }

    // ------------------------------------------------------------------------
    // world <-> grid transforms
    // ------------------------------------------------------------------------

    /// Grid coordinates containing `pos`, clamped to the interior.
    pub fn cell_index_2d(&self, pos: Vec3) -> (usize, usize) {
        let gx = (pos.x / self.square) as i32;
        let gz = (pos.z / self.square) as i32;
        (
            gx.clamp(0, self.nx as i32 - 1) as usize,
            gz.clamp(0, self.nz as i32 - 1) as usize,
        )
    }

    /// Flat index of the cell containing `pos`, clamped to the interior.
    pub fn cell_index_1d(&self, pos: Vec3) -> usize {
        let (x, z) = self.cell_index_2d(pos);
        z * self.nx + x
    }

    /// World-space center of cell (x, z) on the ground plane.
    pub fn cell_mid_pos(&self, x: usize, z: usize) -> Vec3 {
        Vec3::new(
            (x as f32 + 0.5) * self.square,
            0.0,
            (z as f32 + 0.5) * self.square,
        )
    }

    /// Discrete cell span of a world-space radius. The projected disc always
    /// covers the center cell plus this many cells along each axis.
    pub(crate) fn cells_in_radius(&self, radius: f32) -> i32 {
        (radius / (self.square * 0.5)).ceil() as i32 + 1
    }

    // ------------------------------------------------------------------------
    // accessors
    // ------------------------------------------------------------------------

    pub fn width(&self) -> usize {
        self.nx
    }

    pub fn depth(&self) -> usize {
        self.nz
    }

    pub fn square_size(&self) -> f32 {
        self.square
    }

    pub fn config(&self) -> &SimConfig {
        &self.cfg
    }

    pub fn is_flat(&self) -> bool {
        self.flat_terrain
    }

    #[cfg(test)]
    pub(crate) fn cell(&self, idx: usize) -> &Cell {
        &self.states[self.curr].cells[idx]
    }

    #[cfg(test)]
    pub(crate) fn edge(&self, idx: usize) -> &Edge {
        &self.states[self.curr].edges[idx]
    }

    pub(crate) fn vis_arrays(&self) -> VisArrays<'_> {
        VisArrays {
            nx: self.nx,
            nz: self.nz,
            density: &self.density_vis,
            height: &self.height_vis,
            discomfort: &self.discomfort_vis,
            avg_velocity: &self.avg_velocity_vis,
            height_delta: &self.height_delta_vis,
            speed: &self.speed_vis,
            cost: &self.cost_vis,
            potential: &self.potential_vis,
            velocity: &self.velocity_vis,
            potential_delta: &self.potential_delta_vis,
        }
    }
}

/// Borrowed view over all vis mirrors, consumed by the `viz` accessors.
pub(crate) struct VisArrays<'a> {
    pub nx: usize,
    pub nz: usize,
    pub density: &'a [f32],
    pub height: &'a [f32],
    pub discomfort: &'a [Vec3],
    pub avg_velocity: &'a [Vec3],
    pub height_delta: &'a [Vec3],
    pub speed: &'a BTreeMap<GroupId, Vec<f32>>,
    pub cost: &'a BTreeMap<GroupId, Vec<f32>>,
    pub potential: &'a BTreeMap<GroupId, Vec<f32>>,
    pub velocity: &'a BTreeMap<GroupId, Vec<Vec3>>,
    pub potential_delta: &'a BTreeMap<GroupId, Vec<Vec3>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::terrain::HeightField;

    fn small_grid() -> Grid {
        let terrain = HeightField::from_fn(4, 3, 8.0, |x, z| (x + z) as f32);
        Grid::new(SimConfig::default(), &terrain)
    }

    #[test]
    fn shared_edges_between_adjacent_cells() {
        let grid = small_grid();
        // The north face of (1, 1) is the south face of (1, 0).
        let lower = grid.cell(1 * 4 + 1);
        let upper = grid.cell(0 * 4 + 1);
        assert_eq!(
            lower.edges[Dir::North.idx()],
            upper.edges[Dir::South.idx()]
        );
        // The west face of (2, 1) is the east face of (1, 1).
        let right = grid.cell(1 * 4 + 2);
        assert_eq!(right.edges[Dir::West.idx()], lower.edges[Dir::East.idx()]);
    }

    #[test]
    fn edge_count_matches_topology() {
        let grid = small_grid();
        assert_eq!(grid.states[0].edges.len(), (4 + 1) * 3 + (3 + 1) * 4);
    }

    #[test]
    fn neighbor_counts_by_position() {
        let grid = small_grid();
        assert_eq!(grid.cell(0).num_neighbors, 2); // corner
        assert_eq!(grid.cell(1).num_neighbors, 3); // border
        assert_eq!(grid.cell(4 + 1).num_neighbors, 4); // interior
    }

    #[test]
    fn height_delta_carries_signed_elevation() {
        let grid = small_grid();
        // Heights rise by 1 per step along both axes; every interior edge
        // ends holding a |delta| of exactly 1.
        let cell = grid.cell(4 + 1);
        for dir in Dir::ALL {
            let e = grid.edge(cell.edges[dir.idx()]);
            let axis = match dir {
                Dir::North | Dir::South => e.height_delta.z,
                Dir::East | Dir::West => e.height_delta.x,
            };
            assert!((axis.abs() - 1.0).abs() < 1e-6);
        }
        assert!((grid.max_terrain_slope - 1.0).abs() < 1e-6);
        assert!((grid.min_terrain_slope - 1.0).abs() < 1e-6);
    }

    #[test]
    fn world_positions_clamp_into_the_grid() {
        let grid = small_grid();
        assert_eq!(grid.cell_index_2d(Vec3::new(-100.0, 0.0, -100.0)), (0, 0));
        assert_eq!(grid.cell_index_2d(Vec3::new(1e6, 0.0, 1e6)), (3, 2));
        assert_eq!(grid.cell_index_2d(Vec3::new(12.0, 0.0, 20.0)), (1, 2));
    }

    #[test]
    fn cells_in_radius_spans_the_disc() {
        let grid = small_grid(); // square 8 -> half-square 4
        assert_eq!(grid.cells_in_radius(4.0), 2);
        assert_eq!(grid.cells_in_radius(5.0), 3);
        assert_eq!(grid.cells_in_radius(0.5), 2);
    }

    #[test]
    fn reset_without_splatting_is_idempotent() {
        let mut grid = small_grid();
        grid.add_density(Vec3::new(10.0, 0.0, 10.0), Vec3::X, 2.0);
        grid.reset();
        let snapshot: Vec<f32> = grid.states[0].cells.iter().map(|c| c.density).collect();
        grid.reset();
        let again: Vec<f32> = grid.states[0].cells.iter().map(|c| c.density).collect();
        assert_eq!(snapshot, again);
        assert!(snapshot.iter().all(|&d| d == 0.0));
    }
}
