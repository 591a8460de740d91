//! Continuum-crowds path planning for real-time simulations.
//!
//! Based on: Treuille, Cooper, Popovic — "Continuum Crowds" (SIGGRAPH 2006).
//!
//! Agents are organized into groups sharing a set of goal cells on a 2D
//! terrain grid. Every tick the crowd is splatted into a shared density and
//! average-velocity field, each group derives directional speed and cost
//! fields from the crowd plus the terrain slope, a potential field is solved
//! by fast marching from the goal cells, and the potential gradient yields
//! the per-cell velocities that advect the group's members.
//!
//! The crate is the planning core only: terrain and agents stay on the
//! engine side behind the [`TerrainView`] and [`AgentAdapter`] traits, and
//! events arrive as [`SimEvent`] values. [`PathModule`] ties it together and
//! drives one synchronous tick at a time; there are no hidden globals and no
//! internal threads.

pub mod agent;
pub mod config;
pub mod event;
pub mod grid;
pub mod path;
pub mod terrain;
pub mod viz;

/// Stable group identifier, allocated by the path module per move order.
pub type GroupId = u32;

pub use agent::{AgentAdapter, AgentDef, AgentId, AgentState, AgentStore};
pub use config::{SimConfig, VelocityInterp};
pub use event::SimEvent;
pub use grid::{Dir, Grid, GroupLimits};
pub use path::PathModule;
pub use terrain::{HeightField, TerrainView};
pub use viz::{FieldView, ScalarField, VectorField};
