// Tuning parameters for the continuum-crowds pipeline.
//
// All weights follow the TCP06 cost formulation: the unit cost of crossing a
// cell edge is (alpha*f + beta + gamma*g) / f^2, where f is the directional
// speed and g the directional discomfort.

/// How per-cell edge velocities are sampled when advecting an agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VelocityInterp {
    /// Blend face averages of the four edge velocities by the agent's
    /// position inside the cell.
    #[default]
    Bilinear,
    /// Weight the two edges the agent is facing by |dir.x| and |dir.z|.
    Cardinal,
}

/// Simulation configuration. Constructed by the embedding engine; the core
/// does no config-file parsing of its own.
#[derive(Debug, Clone, Copy)]
pub struct SimConfig {
    /// Weight on the speed term in the cost function.
    pub alpha: f32,
    /// Constant path-length bias in the cost function.
    pub beta: f32,
    /// Weight on the discomfort term in the cost function.
    pub gamma: f32,
    /// Density one agent contributes to each cell of its projected disc.
    pub rho_bar: f32,
    /// Below this density a cell moves at topological speed.
    pub rho_min: f32,
    /// Above this density a cell moves at flow speed.
    pub rho_max: f32,
    /// Ticks between potential-field resolves per group (>= 1).
    pub update_interval: u32,
    /// Heightmap downscale factor for the grid resolution (>= 1).
    pub downscale: u32,
    /// Predictive-discomfort trajectory length in frames; 0 disables the
    /// discomfort splat entirely.
    pub discomfort_frames: u32,
    /// World-space step between predictive-discomfort samples.
    pub discomfort_step: f32,
    /// Scale discomfort by its alignment with the travel direction instead
    /// of summing the magnitude channels directly.
    pub directional_discomfort: bool,
    /// Velocity-field sampling mode used during advection.
    pub interpolation: VelocityInterp,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            alpha: 1.0,
            beta: 0.3,
            gamma: 2.0,
            rho_bar: 0.25,
            rho_min: 0.5,
            rho_max: 2.0,
            update_interval: 1,
            downscale: 1,
            discomfort_frames: 0,
            discomfort_step: 1.0,
            directional_discomfort: true,
            interpolation: VelocityInterp::Bilinear,
        }
    }
}
