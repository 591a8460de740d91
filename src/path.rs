// The path module: group bookkeeping, event handling, and the tick driver.
//
// Owns the agent -> group and group -> goal maps; the grid owns everything
// cell-shaped. One tick runs reset -> density/discomfort splatting ->
// average velocity -> per group (ascending id): potential solve on resolve
// ticks, then advection of the members in ascending id. All iteration
// orders are deterministic, so identical event streams replay identically.

use std::collections::{BTreeMap, BTreeSet};

use glam::{Vec3, Vec3Swizzles};

use crate::GroupId;
use crate::agent::{AgentAdapter, AgentDef, AgentId};
use crate::config::SimConfig;
use crate::event::SimEvent;
use crate::grid::{EPSILON, Grid, GroupLimits};
use crate::terrain::TerrainView;

pub struct PathModule {
    grid: Grid,

    /// Recorded defs of every live agent.
    defs: BTreeMap<AgentId, AgentDef>,
    /// Membership index: agent -> group.
    member_groups: BTreeMap<AgentId, GroupId>,
    /// Group -> member agents.
    groups: BTreeMap<GroupId, BTreeSet<AgentId>>,
    /// Group -> goal cells, in arrival order.
    goals: BTreeMap<GroupId, Vec<usize>>,

    next_group_id: GroupId,
    tick: u64,
}

impl PathModule {
    pub fn new(cfg: SimConfig, terrain: &dyn TerrainView) -> Self {
        Self {
            grid: Grid::new(cfg, terrain),
            defs: BTreeMap::new(),
            member_groups: BTreeMap::new(),
            groups: BTreeMap::new(),
            goals: BTreeMap::new(),
            next_group_id: 0,
            tick: 0,
        }
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn current_tick(&self) -> u64 {
        self.tick
    }

    pub fn group_of(&self, id: AgentId) -> Option<GroupId> {
        self.member_groups.get(&id).copied()
    }

    pub fn group_members(&self, group: GroupId) -> Option<&BTreeSet<AgentId>> {
        self.groups.get(&group)
    }

    pub fn group_goals(&self, group: GroupId) -> Option<&[usize]> {
        self.goals.get(&group).map(Vec::as_slice)
    }

    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    // ------------------------------------------------------------------------
    // events
    // ------------------------------------------------------------------------

    pub fn handle_event<A: AgentAdapter>(&mut self, event: &SimEvent, agents: &mut A) {
        match event {
            SimEvent::ObjectCreated { id } => {
                self.defs.insert(*id, agents.def(*id));
            }

            SimEvent::ObjectDestroyed { id } => {
                if self.defs.remove(id).is_none() {
                    log::debug!("destroy event for unknown agent {id}");
                    return;
                }
                self.remove_from_group(*id);
                if self.defs.is_empty() {
                    debug_assert!(self.groups.is_empty());
                    debug_assert!(self.member_groups.is_empty());
                    self.next_group_id = 0;
                }
            }

            SimEvent::MoveOrder { ids, goal, queued } => {
                let ordered: Vec<AgentId> = ids
                    .iter()
                    .copied()
                    .filter(|id| self.defs.contains_key(id))
                    .collect();
                if ordered.is_empty() {
                    log::debug!("move order with no known agents");
                    return;
                }

                let goal_cell = self.grid.cell_index_1d(*goal);

                // A queued order whose agents already share a group just
                // extends that group's goal set.
                if *queued
                    && let Some(group) = self.common_group(&ordered)
                {
                    self.goals.entry(group).or_default().push(goal_cell);
                    return;
                }

                let group = self.next_group_id;
                self.next_group_id += 1;
                self.grid.add_group(group);
                self.groups.insert(group, BTreeSet::new());
                self.goals.insert(group, vec![goal_cell]);

                for id in ordered {
                    self.remove_from_group(id);
                    self.groups
                        .get_mut(&group)
                        .expect("group created above")
                        .insert(id);
                    self.member_groups.insert(id, group);
                }
            }

            SimEvent::Collision { a, b } => {
                self.separate(*a, *b, agents);
            }
        }
    }

    /// The single group every listed agent belongs to, if there is one.
    fn common_group(&self, ids: &[AgentId]) -> Option<GroupId> {
        let first = self.member_groups.get(ids.first()?)?;
        ids.iter()
            .all(|id| self.member_groups.get(id) == Some(first))
            .then_some(*first)
    }

    /// Remove an agent from its group, dissolving the group if it empties.
    fn remove_from_group(&mut self, id: AgentId) {
        let Some(group) = self.member_groups.remove(&id) else {
            return;
        };
        let members = self
            .groups
            .get_mut(&group)
            .expect("membership index out of sync");
        members.remove(&id);
        if members.is_empty() {
            self.groups.remove(&group);
            self.goals.remove(&group);
            self.grid.del_group(group);
            log::debug!("group {group} dissolved");
        }
    }

    /// Push two overlapping agents half the overlap apart along the axis
    /// between their centers.
    fn separate<A: AgentAdapter>(&mut self, a: AgentId, b: AgentId, agents: &mut A) {
        if !self.defs.contains_key(&a) || !self.defs.contains_key(&b) {
            return;
        }

        let pa = agents.position(a);
        let pb = agents.position(b);
        let span = (pb - pa).xz();
        let dist = span.length();
        let overlap = agents.radius(a) + agents.radius(b) - dist;
        if overlap <= 0.0 {
            return;
        }

        let axis = if dist > EPSILON {
            Vec3::new(span.x / dist, 0.0, span.y / dist)
        } else {
            // Coincident centers: any axis separates them.
            Vec3::X
        };
        let push = axis * (overlap * 0.5);

        agents.set_physical_state(a, pa - push, agents.direction(a), agents.forward_speed(a));
        agents.set_physical_state(b, pb + push, agents.direction(b), agents.forward_speed(b));
    }

    // ------------------------------------------------------------------------
    // tick
    // ------------------------------------------------------------------------

    /// Run one simulation tick.
    pub fn update<A: AgentAdapter>(&mut self, agents: &mut A) {
        let cfg = *self.grid.config();

        self.grid.reset();

        for &id in self.defs.keys() {
            let pos = agents.position(id);
            let vel = agents.direction(id) * agents.forward_speed(id);
            let radius = agents.radius(id);
            self.grid.add_density(pos, vel, radius);
            if cfg.discomfort_frames > 0 {
                self.grid
                    .add_discomfort(pos, vel, radius, cfg.discomfort_frames, cfg.discomfort_step);
            }
        }

        self.grid.compute_avg_velocity();

        let resolve = self.tick % cfg.update_interval as u64 == 0;
        for (&group, members) in &self.groups {
            if resolve {
                let limits = GroupLimits::from_defs(
                    members
                        .iter()
                        .map(|id| (self.defs[id], agents.radius(*id))),
                );
                let goals = &self.goals[&group];
                self.grid.update_group_potential_field(group, goals, limits);
            }

            for &id in members {
                let cell = self.grid.cell_index_1d(agents.position(id));
                self.grid.update_agent_location(group, id, cell, agents);
            }
        }

        self.tick += 1;
    }
}
