// Advection: sampling the group velocity field and steering agents.
//
// Each agent reads an interpolated velocity from the edges of its containing
// cell, then has the implied speed and heading changes clamped by its def
// before the new physical state is written back through the adapter.

use std::f32::consts::{PI, TAU};

use glam::{Vec3, Vec3Swizzles};

use crate::GroupId;
use crate::agent::{AgentAdapter, AgentDef, AgentId};
use crate::config::VelocityInterp;

use super::{Buffer, Cell, Dir, EPSILON, Edge, Grid};

/// Apply the def's kinematic limits to a sampled field velocity, given the
/// agent's current facing and forward speed. Returns the new facing and the
/// new speed.
pub(crate) fn steer(facing: Vec3, sampled: Vec3, speed: f32, def: &AgentDef) -> (Vec3, f32) {
    // In theory the velocity field never exceeds the group's speed range,
    // but slopes can push it past fMax; the acc/dec clamp bounds the change
    // per tick either way.
    let wanted = sampled.xz().length();
    let new_speed = wanted.clamp(
        (speed - def.max_dec_rate).max(0.0),
        speed + def.max_acc_rate,
    );

    // Shortest signed turn on xz, bounded by the per-tick turn rate.
    let current = facing.z.atan2(facing.x);
    let target = sampled.z.atan2(sampled.x);
    let delta = (target - current + PI).rem_euclid(TAU) - PI;
    let heading = current + delta.clamp(-def.max_turn_rate, def.max_turn_rate);

    let dir = Vec3::new(heading.cos(), 0.0, heading.sin());
    (dir, new_speed)
}

impl Grid {
    /// Advect one group member standing in `cell_idx`.
    ///
    /// Reads the group snapshot when resolves are spaced, otherwise the
    /// buffer the last solve wrote. Agents in unreached cells sample a zero
    /// field and stay where they are.
    pub fn update_agent_location<A: AgentAdapter>(
        &self,
        group: GroupId,
        id: AgentId,
        cell_idx: usize,
        agents: &mut A,
    ) {
        let buffer: &Buffer = if self.cfg.update_interval > 1 {
            self.group_states
                .get(&group)
                .unwrap_or(&self.states[self.curr])
        } else {
            &self.states[self.curr]
        };

        let cell = &buffer.cells[cell_idx];
        let pos = agents.position(id);
        let facing = agents.direction(id);

        let sampled = self.interpolated_velocity(&buffer.edges, cell, pos, facing);
        assert!(
            sampled.is_finite(),
            "velocity field sample at cell ({}, {}) is not finite",
            cell.x,
            cell.z
        );
        if sampled.xz().length_squared() <= EPSILON {
            return;
        }

        let def = agents.def(id);
        let speed = agents.forward_speed(id);
        let (dir, new_speed) = steer(facing, sampled, speed, &def);

        let mut new_pos = pos + dir * new_speed;
        let ground = self.cell_index_1d(new_pos);
        new_pos.y = self.states[self.curr].cells[ground].height;

        agents.set_physical_state(id, new_pos, dir, new_speed);
    }

    /// Sample the velocity field of `cell` at a world position.
    fn interpolated_velocity(&self, edges: &[Edge], cell: &Cell, pos: Vec3, facing: Vec3) -> Vec3 {
        let vn = edges[cell.edges[Dir::North.idx()]].velocity;
        let vs = edges[cell.edges[Dir::South.idx()]].velocity;
        let ve = edges[cell.edges[Dir::East.idx()]].velocity;
        let vw = edges[cell.edges[Dir::West.idx()]].velocity;

        match self.cfg.interpolation {
            VelocityInterp::Bilinear => {
                // Standard bilinear blend, except the sample points are face
                // averages rather than stored corner values.
                let a = (pos.x - cell.x as f32 * self.square) / self.square;
                let b = (pos.z - cell.z as f32 * self.square) / self.square;

                let tl = (vn + vw) * 0.5;
                let tr = (vn + ve) * 0.5;
                let bl = (vs + vw) * 0.5;
                let br = (vs + ve) * 0.5;

                tl * (1.0 - a) * (1.0 - b)
                    + tr * a * (1.0 - b)
                    + bl * (1.0 - a) * b
                    + br * a * b
            }
            VelocityInterp::Cardinal => {
                // The facing falls into one quadrant; weight the two edges
                // it points at by the axis components.
                let (vx, a) = if facing.x >= 0.0 { (ve, facing.x) } else { (vw, -facing.x) };
                let (vz, b) = if facing.z >= 0.0 { (vs, facing.z) } else { (vn, -facing.z) };
                vx * a + vz * b
            }
        }
    }
}
