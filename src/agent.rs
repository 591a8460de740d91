// The agent boundary of the planner.
//
// The planner never owns agents: it reads their physical state through
// `AgentAdapter` and writes back one (position, facing, speed) triple per
// agent per tick. `AgentStore` is a plain map-backed adapter used by the
// tests; the demo binary implements the same trait over an ECS world.

use std::collections::BTreeMap;

use glam::Vec3;

/// Stable agent identifier assigned by the embedding engine.
pub type AgentId = u32;

/// Kinematic limits shared by all agents of one unit type.
///
/// All rates are per simulation tick; the embedding engine scales per-second
/// values by its frame time before constructing defs.
#[derive(Debug, Clone, Copy)]
pub struct AgentDef {
    /// Minimum slope (height delta per cell) this type registers at all.
    pub min_slope: f32,
    /// Steepest slope this type can traverse.
    pub max_slope: f32,
    /// Speed on the steepest traversable slope.
    pub min_forward_speed: f32,
    /// Speed on flat, empty ground.
    pub max_forward_speed: f32,
    /// Largest speed increase per tick.
    pub max_acc_rate: f32,
    /// Largest speed decrease per tick.
    pub max_dec_rate: f32,
    /// Largest heading change per tick, in radians.
    pub max_turn_rate: f32,
}

impl Default for AgentDef {
    fn default() -> Self {
        Self {
            min_slope: 0.0,
            max_slope: 1.0,
            min_forward_speed: 0.0,
            max_forward_speed: 1.0,
            max_acc_rate: 0.25,
            max_dec_rate: 0.5,
            max_turn_rate: 30f32.to_radians(),
        }
    }
}

/// Read/write access to agent physical state.
///
/// Reads happen throughout a tick; the single write, `set_physical_state`,
/// happens once per agent during advection (and on collision separation).
pub trait AgentAdapter {
    /// World-space position.
    fn position(&self, id: AgentId) -> Vec3;
    /// Unit facing on the xz plane.
    fn direction(&self, id: AgentId) -> Vec3;
    /// Current forward speed.
    fn forward_speed(&self, id: AgentId) -> f32;
    /// Collision/density footprint radius.
    fn radius(&self, id: AgentId) -> f32;
    /// Kinematic limits for this agent.
    fn def(&self, id: AgentId) -> AgentDef;
    /// Overwrite position, facing, and speed in one call.
    fn set_physical_state(&mut self, id: AgentId, pos: Vec3, dir: Vec3, speed: f32);
}

/// Full mutable state of one stored agent.
#[derive(Debug, Clone, Copy)]
pub struct AgentState {
    pub position: Vec3,
    pub direction: Vec3,
    pub speed: f32,
    pub radius: f32,
    pub def: AgentDef,
}

impl AgentState {
    /// Stationary agent at `position`, facing +x.
    pub fn at(position: Vec3, radius: f32, def: AgentDef) -> Self {
        Self {
            position,
            direction: Vec3::X,
            speed: 0.0,
            radius,
            def,
        }
    }
}

/// Deterministic map-backed agent container implementing `AgentAdapter`.
#[derive(Debug, Default)]
pub struct AgentStore {
    agents: BTreeMap<AgentId, AgentState>,
}

impl AgentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: AgentId, state: AgentState) {
        self.agents.insert(id, state);
    }

    pub fn remove(&mut self, id: AgentId) {
        self.agents.remove(&id);
    }

    pub fn get(&self, id: AgentId) -> Option<&AgentState> {
        self.agents.get(&id)
    }

    /// All stored ids in ascending order.
    pub fn ids(&self) -> impl Iterator<Item = AgentId> + '_ {
        self.agents.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }
}

impl AgentAdapter for AgentStore {
    fn position(&self, id: AgentId) -> Vec3 {
        self.agents[&id].position
    }

    fn direction(&self, id: AgentId) -> Vec3 {
        self.agents[&id].direction
    }

    fn forward_speed(&self, id: AgentId) -> f32 {
        self.agents[&id].speed
    }

    fn radius(&self, id: AgentId) -> f32 {
        self.agents[&id].radius
    }

    fn def(&self, id: AgentId) -> AgentDef {
        self.agents[&id].def
    }

    fn set_physical_state(&mut self, id: AgentId, pos: Vec3, dir: Vec3, speed: f32) {
        if let Some(state) = self.agents.get_mut(&id) {
            state.position = pos;
            state.direction = dir;
            state.speed = speed;
        }
    }
}
