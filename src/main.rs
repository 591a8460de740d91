// Headless demo: two opposing crowds cross a hilly valley.
//
// Agents live in a bevy_ecs world; the planner sees them only through the
// adapter below. Run with RUST_LOG=debug for per-solve diagnostics.

use std::collections::BTreeMap;

use bevy_ecs::prelude::*;
use glam::Vec3;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crowdflow::{
    AgentAdapter, AgentDef, AgentId, HeightField, PathModule, ScalarField, SimConfig, SimEvent,
};

// ============================================================================
// ECS COMPONENTS
// ============================================================================

/// World-space position.
#[derive(Component, Debug, Clone, Copy)]
struct Position(Vec3);

/// Unit facing on the xz plane.
#[derive(Component, Debug, Clone, Copy)]
struct Heading(Vec3);

/// Current forward speed.
#[derive(Component, Debug, Clone, Copy)]
struct ForwardSpeed(f32);

/// Density/collision footprint radius.
#[derive(Component, Debug, Clone, Copy)]
struct Footprint(f32);

/// Kinematic limits of this agent's type.
#[derive(Component, Debug, Clone, Copy)]
struct Kinematics(AgentDef);

// ============================================================================
// ADAPTER
// ============================================================================

/// Planner's view of the ECS world.
struct EcsAgents<'w> {
    world: &'w mut World,
    entities: &'w BTreeMap<AgentId, Entity>,
}

impl AgentAdapter for EcsAgents<'_> {
    fn position(&self, id: AgentId) -> Vec3 {
        self.world.get::<Position>(self.entities[&id]).unwrap().0
    }

    fn direction(&self, id: AgentId) -> Vec3 {
        self.world.get::<Heading>(self.entities[&id]).unwrap().0
    }

    fn forward_speed(&self, id: AgentId) -> f32 {
        self.world.get::<ForwardSpeed>(self.entities[&id]).unwrap().0
    }

    fn radius(&self, id: AgentId) -> f32 {
        self.world.get::<Footprint>(self.entities[&id]).unwrap().0
    }

    fn def(&self, id: AgentId) -> AgentDef {
        self.world.get::<Kinematics>(self.entities[&id]).unwrap().0
    }

    fn set_physical_state(&mut self, id: AgentId, pos: Vec3, dir: Vec3, speed: f32) {
        let entity = self.entities[&id];
        self.world.get_mut::<Position>(entity).unwrap().0 = pos;
        self.world.get_mut::<Heading>(entity).unwrap().0 = dir;
        self.world.get_mut::<ForwardSpeed>(entity).unwrap().0 = speed;
    }
}

// ============================================================================
// SCENARIO
// ============================================================================

const TICKS: u64 = 400;
const BAND_SIZE: u32 = 24;

fn spawn_band(
    world: &mut World,
    entities: &mut BTreeMap<AgentId, Entity>,
    rng: &mut StdRng,
    first_id: AgentId,
    x_range: std::ops::Range<f32>,
    def: AgentDef,
) -> Vec<AgentId> {
    let mut ids = Vec::with_capacity(BAND_SIZE as usize);
    for n in 0..BAND_SIZE {
        let id = first_id + n;
        let pos = Vec3::new(
            rng.gen_range(x_range.clone()),
            0.0,
            rng.gen_range(160.0..352.0),
        );
        let entity = world
            .spawn((
                Position(pos),
                Heading(Vec3::X),
                ForwardSpeed(0.0),
                Footprint(2.5),
                Kinematics(def),
            ))
            .id();
        entities.insert(id, entity);
        ids.push(id);
    }
    ids
}

fn mean_distance(
    world: &World,
    entities: &BTreeMap<AgentId, Entity>,
    ids: &[AgentId],
    goal: Vec3,
) -> f32 {
    let sum: f32 = ids
        .iter()
        .map(|id| (world.get::<Position>(entities[id]).unwrap().0 - goal).length())
        .sum();
    sum / ids.len() as f32
}

fn main() {
    env_logger::init();

    // 64x64 cells at 8 world units each, with a hill in the middle the
    // crowds prefer to skirt.
    let terrain = HeightField::from_fn(64, 64, 8.0, |x, z| {
        let dx = x as f32 - 32.0;
        let dz = z as f32 - 32.0;
        (24.0 - (dx * dx + dz * dz).sqrt()).max(0.0) * 1.5
    });

    let cfg = SimConfig {
        rho_bar: 0.25,
        discomfort_frames: 8,
        discomfort_step: 2.0,
        ..SimConfig::default()
    };
    let mut module = PathModule::new(cfg, &terrain);

    let mut world = World::new();
    let mut entities = BTreeMap::new();
    let mut rng = StdRng::seed_from_u64(0xC0FFEE);

    let def = AgentDef {
        min_forward_speed: 0.6,
        max_forward_speed: 3.0,
        max_acc_rate: 0.5,
        max_dec_rate: 1.0,
        max_turn_rate: 25f32.to_radians(),
        ..AgentDef::default()
    };

    let eastbound = spawn_band(&mut world, &mut entities, &mut rng, 0, 16.0..80.0, def);
    let westbound = spawn_band(
        &mut world,
        &mut entities,
        &mut rng,
        BAND_SIZE,
        432.0..496.0,
        def,
    );

    let east_goal = Vec3::new(480.0, 0.0, 256.0);
    let west_goal = Vec3::new(32.0, 0.0, 256.0);

    {
        let mut agents = EcsAgents {
            world: &mut world,
            entities: &entities,
        };
        for &id in eastbound.iter().chain(&westbound) {
            module.handle_event(&SimEvent::ObjectCreated { id }, &mut agents);
        }
        module.handle_event(
            &SimEvent::MoveOrder {
                ids: eastbound.clone(),
                goal: east_goal,
                queued: false,
            },
            &mut agents,
        );
        module.handle_event(
            &SimEvent::MoveOrder {
                ids: westbound.clone(),
                goal: west_goal,
                queued: false,
            },
            &mut agents,
        );
    }

    for tick in 0..TICKS {
        {
            let mut agents = EcsAgents {
                world: &mut world,
                entities: &entities,
            };
            module.update(&mut agents);
        }

        // Engine-side overlap scan feeding the collision events.
        let ids: Vec<AgentId> = entities.keys().copied().collect();
        let mut collisions = Vec::new();
        for (n, &a) in ids.iter().enumerate() {
            for &b in &ids[n + 1..] {
                let pa = world.get::<Position>(entities[&a]).unwrap().0;
                let pb = world.get::<Position>(entities[&b]).unwrap().0;
                let reach = world.get::<Footprint>(entities[&a]).unwrap().0
                    + world.get::<Footprint>(entities[&b]).unwrap().0;
                if (pb - pa).length_squared() < reach * reach {
                    collisions.push((a, b));
                }
            }
        }
        if !collisions.is_empty() {
            let mut agents = EcsAgents {
                world: &mut world,
                entities: &entities,
            };
            for (a, b) in collisions {
                module.handle_event(&SimEvent::Collision { a, b }, &mut agents);
            }
        }

        if tick % 50 == 0 {
            log::info!(
                "tick {tick:3}: eastbound {:6.1} from goal, westbound {:6.1} from goal",
                mean_distance(&world, &entities, &eastbound, east_goal),
                mean_distance(&world, &entities, &westbound, west_goal),
            );
        }
    }

    let peak_density = module
        .grid()
        .scalar_field(ScalarField::Density, None)
        .map(|field| field.data.iter().cloned().fold(0.0f32, f32::max))
        .unwrap_or(0.0);

    println!(
        "done after {TICKS} ticks: eastbound {:.1} from goal, westbound {:.1} from goal, peak density {:.2}",
        mean_distance(&world, &entities, &eastbound, east_goal),
        mean_distance(&world, &entities, &westbound, west_goal),
        peak_density
    );
}
