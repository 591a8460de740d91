// Read-only terrain view consumed by the grid.
//
// The engine owns the real heightmap; the planner only ever samples cell
// heights, the map extrema, and the square size. `HeightField` is the
// in-process implementation used by the demo binary and the test suite.

/// Read-only heightmap interface the grid is built from.
pub trait TerrainView {
    /// Heightmap resolution as (cells along x, cells along z).
    fn height_map_size(&self) -> (usize, usize);
    /// World-space side length of one heightmap square.
    fn square_size(&self) -> f32;
    /// Lowest elevation anywhere on the map.
    fn min_height(&self) -> f32;
    /// Highest elevation anywhere on the map.
    fn max_height(&self) -> f32;
    /// Elevation at the center of square (x, z).
    fn center_height(&self, x: usize, z: usize) -> f32;
}

/// Owned heightmap backed by a flat `Vec<f32>`.
pub struct HeightField {
    width: usize,
    depth: usize,
    square: f32,
    heights: Vec<f32>,
    min: f32,
    max: f32,
}

impl HeightField {
    /// Uniform-elevation field.
    pub fn flat(width: usize, depth: usize, square: f32, height: f32) -> Self {
        Self::from_fn(width, depth, square, |_, _| height)
    }

    /// Build a field by sampling `f(x, z)` at every square.
    pub fn from_fn(
        width: usize,
        depth: usize,
        square: f32,
        f: impl Fn(usize, usize) -> f32,
    ) -> Self {
        assert!(width > 0 && depth > 0, "height field must be non-empty");
        assert!(square > 0.0, "square size must be > 0");

        let mut heights = Vec::with_capacity(width * depth);
        let mut min = f32::MAX;
        let mut max = -f32::MAX;
        for z in 0..depth {
            for x in 0..width {
                let h = f(x, z);
                min = min.min(h);
                max = max.max(h);
                heights.push(h);
            }
        }

        Self {
            width,
            depth,
            square,
            heights,
            min,
            max,
        }
    }
}

impl TerrainView for HeightField {
    fn height_map_size(&self) -> (usize, usize) {
        (self.width, self.depth)
    }

    fn square_size(&self) -> f32 {
        self.square
    }

    fn min_height(&self) -> f32 {
        self.min
    }

    fn max_height(&self) -> f32 {
        self.max
    }

    fn center_height(&self, x: usize, z: usize) -> f32 {
        self.heights[z.min(self.depth - 1) * self.width + x.min(self.width - 1)]
    }
}
