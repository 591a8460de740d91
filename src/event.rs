// Events consumed from the engine's event bus.

use glam::Vec3;

use crate::agent::AgentId;

/// The four event kinds the path module reacts to.
///
/// Unknown agent ids inside any event are ignored silently; a malformed
/// event never aborts the tick.
#[derive(Debug, Clone, PartialEq)]
pub enum SimEvent {
    /// An agent came into existence. Its def is recorded; no group is
    /// assigned until a move order arrives.
    ObjectCreated { id: AgentId },
    /// An agent disappeared. It leaves its group, and a group emptied this
    /// way is dissolved.
    ObjectDestroyed { id: AgentId },
    /// Order the listed agents to `goal`. A queued order whose agents all
    /// share one group appends the goal to that group; otherwise a fresh
    /// group is allocated and the agents are re-homed into it.
    MoveOrder {
        ids: Vec<AgentId>,
        goal: Vec3,
        queued: bool,
    },
    /// Two agents overlap; each is displaced half the overlap apart.
    Collision { a: AgentId, b: AgentId },
}
