// Density and predictive-discomfort splatting.
//
// Every agent projects a disc onto the grid each tick: rho_bar density plus
// a velocity-weighted contribution to the average-velocity accumulator, and
// (optionally) discomfort along a predicted trajectory. Cells written here
// are recorded in the touched set so the next reset stays O(|touched|).

use glam::{Vec3, Vec3Swizzles};

use super::{EPSILON, Grid};

#[derive(Clone, Copy)]
enum Splat {
    Density,
    Discomfort,
}

impl Grid {
    /// Project one agent's density disc around `pos`.
    ///
    /// `vel` is the agent's current velocity (facing times speed); its
    /// rho_bar-weighted sum is normalized into the average-velocity field by
    /// `compute_avg_velocity`.
    pub fn add_density(&mut self, pos: Vec3, vel: Vec3, radius: f32) {
        let center = self.cell_index_1d(pos);
        let span = self.cells_in_radius(radius);
        self.splat_disc(center, span, vel, Splat::Density);
    }

    /// Splat discomfort along the predicted trajectory `pos + vel * n * step`
    /// for `n` in `0..=frames`.
    ///
    /// Stationary agents are skipped; density alone makes them avoided.
    pub fn add_discomfort(&mut self, pos: Vec3, vel: Vec3, radius: f32, frames: u32, step: f32) {
        if vel.xz().length_squared() <= EPSILON {
            return;
        }

        let span = self.cells_in_radius(radius);
        for n in 0..=frames {
            let step_pos = pos + vel * (n as f32 * step);
            let center = self.cell_index_1d(step_pos);
            self.splat_disc(center, span, vel, Splat::Discomfort);
        }
    }

    /// Write one disc of contributions around `center`.
    ///
    /// Cells of the bounding square outside the Euclidean disc are skipped;
    /// cells outside the grid are clamped into the interior, so a disc
    /// overlapping the border folds onto the border cells rather than being
    /// silently cut off.
    fn splat_disc(&mut self, center: usize, span: i32, vel: Vec3, kind: Splat) {
        let cx0 = self.states[self.curr].cells[center].x as i32;
        let cz0 = self.states[self.curr].cells[center].z as i32;
        let rho_bar = self.cfg.rho_bar;

        for x in -span..=span {
            for z in -span..=span {
                if x * x + z * z > span * span {
                    continue;
                }

                let cx = (cx0 + x).clamp(0, self.nx as i32 - 1);
                let cz = (cz0 + z).clamp(0, self.nz as i32 - 1);
                let idx = cz as usize * self.nx + cx as usize;

                match kind {
                    Splat::Density => {
                        for buffer in self.states.iter_mut() {
                            let cell = &mut buffer.cells[idx];
                            cell.density += rho_bar;
                            cell.avg_velocity += vel * rho_bar;
                        }
                    }
                    Splat::Discomfort => {
                        // Opposing velocities projected onto the same cell
                        // cancel on xz; the y channel keeps the total.
                        let cell = &mut self.states[self.curr].cells[idx];
                        cell.mobile_discomfort.x += vel.x;
                        cell.mobile_discomfort.z += vel.z;
                        cell.mobile_discomfort.y += rho_bar;
                        let md = cell.mobile_discomfort;
                        self.states[self.prev].cells[idx].mobile_discomfort = md;
                    }
                }

                self.touched.insert(idx);
            }
        }
    }

    /// Turn the accumulators into the per-cell average velocity and the
    /// mobile-discomfort direction. Visits only touched cells.
    pub fn compute_avg_velocity(&mut self) {
        let rho_max = self.cfg.rho_max;
        let curr = self.curr;
        let prev = self.prev;

        for &i in &self.touched {
            let mut cell = self.states[curr].cells[i];

            // v(i) was summed weighted by rho_bar, so dividing by the
            // unnormalized density yields the weighted mean.
            if cell.density > EPSILON {
                cell.avg_velocity /= cell.density;
            }
            if cell.mobile_discomfort.xz().length_squared() > EPSILON {
                let dir = cell.mobile_discomfort.xz().normalize();
                cell.mobile_discomfort.x = dir.x;
                cell.mobile_discomfort.z = dir.y;
            }
            // Density only ever decides between the speed regimes, so values
            // past rho_max carry no extra information.
            cell.density = cell.density.clamp(0.0, rho_max + EPSILON);

            self.states[curr].cells[i] = cell;
            let mirror = &mut self.states[prev].cells[i];
            mirror.density = cell.density;
            mirror.avg_velocity = cell.avg_velocity;
            mirror.mobile_discomfort = cell.mobile_discomfort;

            self.density_vis[i] = cell.density;
            self.discomfort_vis[i] = cell.static_discomfort + cell.mobile_discomfort;
            self.avg_velocity_vis[i] = cell.avg_velocity;
        }
    }
}
