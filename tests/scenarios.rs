// End-to-end scenarios driving the full tick pipeline through the public
// surface: events in, advected agent state out.

use glam::{Vec3, Vec3Swizzles};

use crowdflow::{
    AgentAdapter, AgentDef, AgentState, AgentStore, HeightField, PathModule, ScalarField,
    SimConfig, SimEvent,
};

fn walker(max_speed: f32) -> AgentDef {
    AgentDef {
        min_slope: 0.0,
        max_slope: 1.0,
        min_forward_speed: 1.0,
        max_forward_speed: max_speed,
        max_acc_rate: 1.0,
        max_dec_rate: 2.0,
        max_turn_rate: 30f32.to_radians(),
    }
}

#[test]
fn flat_grid_single_agent_reaches_the_goal() {
    let terrain = HeightField::flat(32, 32, 8.0, 0.0);
    let cfg = SimConfig {
        rho_bar: 0.05,
        rho_min: 0.1,
        rho_max: 0.9,
        ..SimConfig::default()
    };
    let mut module = PathModule::new(cfg, &terrain);
    let mut agents = AgentStore::new();

    let def = walker(4.0);
    agents.insert(0, AgentState::at(Vec3::new(8.0, 0.0, 8.0), 2.0, def));
    module.handle_event(&SimEvent::ObjectCreated { id: 0 }, &mut agents);
    module.handle_event(
        &SimEvent::MoveOrder {
            ids: vec![0],
            goal: Vec3::new(228.0, 0.0, 228.0),
            queued: false,
        },
        &mut agents,
    );

    let goal_center = Vec3::new(228.0, 0.0, 228.0);
    let mut closest = f32::MAX;
    let mut slowest_at_goal = f32::MAX;
    for _ in 0..150 {
        module.update(&mut agents);
        let pos = agents.position(0);
        assert!(pos.is_finite());
        let dist = (pos - goal_center).xz().length();
        closest = closest.min(dist);
        if dist < 8.0 {
            slowest_at_goal = slowest_at_goal.min(agents.forward_speed(0));
        }
    }

    // The agent must settle in (or orbit tightly around) the goal cell.
    assert!(
        closest < 8.0,
        "agent never came within a square of the goal (closest {closest})"
    );
    let final_dist = (agents.position(0) - goal_center).xz().length();
    assert!(
        final_dist < 16.0,
        "agent wandered back off the goal (ended {final_dist} away)"
    );
    assert!(agents.forward_speed(0) <= 4.0 + 1e-3);
    // Arrival is a deceleration, not a fly-through: within the final cell
    // the speed drops to at most one acceleration step.
    assert!(
        slowest_at_goal <= def.max_acc_rate,
        "agent never slowed below {} inside the goal cell (slowest {slowest_at_goal})",
        def.max_acc_rate
    );
}

#[test]
fn ridge_is_avoided_in_favor_of_the_flat_detour() {
    // A 60-unit ridge two cells wide blocks the direct line; a flat gap
    // stays open at the south end of the map.
    let terrain = HeightField::from_fn(32, 32, 8.0, |x, z| {
        if (x == 14 || x == 15) && z <= 25 { 60.0 } else { 0.0 }
    });
    let mut module = PathModule::new(SimConfig::default(), &terrain);
    let mut agents = AgentStore::new();

    let def = AgentDef {
        min_forward_speed: 0.2,
        max_forward_speed: 4.0,
        max_acc_rate: 1.0,
        max_dec_rate: 2.0,
        max_turn_rate: 45f32.to_radians(),
        ..AgentDef::default()
    };
    let start = Vec3::new(36.0, 0.0, 164.0); // cell (4, 20)
    agents.insert(0, AgentState::at(start, 1.5, def));
    module.handle_event(&SimEvent::ObjectCreated { id: 0 }, &mut agents);
    module.handle_event(
        &SimEvent::MoveOrder {
            ids: vec![0],
            goal: Vec3::new(220.0, 0.0, 164.0), // cell (27, 20)
            queued: false,
        },
        &mut agents,
    );

    module.update(&mut agents);
    let group = module.group_of(0).expect("agent grouped");

    // Descending off the ridge crawls at the group minimum; the flat detour
    // runs at full speed. That asymmetry is what prices the ridge out.
    let speed = module
        .grid()
        .scalar_field(ScalarField::Speed, Some(group))
        .expect("speed field");
    let east = 2usize; // stride offset of the east face
    let on_ridge = speed.data[(20 * 32 + 15) * speed.stride + east];
    let on_flat = speed.data[(20 * 32 + 5) * speed.stride + east];
    assert!(
        on_ridge < on_flat,
        "ridge speed {on_ridge} not below flat speed {on_flat}"
    );

    let mut crossed_band = false;
    for _ in 0..250 {
        module.update(&mut agents);
        let pos = agents.position(0);
        assert!(pos.is_finite());
        let cell_x = (pos.x / 8.0) as i32;
        let cell_z = (pos.z / 8.0) as i32;
        if (14..=15).contains(&cell_x) && cell_z <= 24 {
            crossed_band = true;
        }
    }
    assert!(!crossed_band, "agent walked through the ridge band");

    // And the detour actually works: the agent ends well east of the ridge.
    assert!(agents.position(0).x > 128.0, "agent never got past the ridge");
}

#[test]
fn discomfort_ring_leaves_potentials_finite_and_agents_on_the_ground() {
    // A raised closed loop around the goal: discomfort 1.0 and steep walls,
    // but nothing is impassable, so the outside keeps large finite
    // potentials and the run stays NaN-free.
    let terrain = HeightField::from_fn(32, 32, 8.0, |x, z| {
        let on_ring = (8..=24).contains(&x)
            && (8..=24).contains(&z)
            && (x == 8 || x == 24 || z == 8 || z == 24);
        if on_ring { 50.0 } else { 0.0 }
    });
    let mut module = PathModule::new(SimConfig::default(), &terrain);
    let mut agents = AgentStore::new();

    agents.insert(
        0,
        AgentState::at(Vec3::new(16.0, 0.0, 16.0), 1.5, walker(3.0)),
    );
    module.handle_event(&SimEvent::ObjectCreated { id: 0 }, &mut agents);
    module.handle_event(
        &SimEvent::MoveOrder {
            ids: vec![0],
            goal: Vec3::new(130.0, 0.0, 130.0), // inside the ring
            queued: false,
        },
        &mut agents,
    );

    for _ in 0..100 {
        module.update(&mut agents);
        let pos = agents.position(0);
        assert!(pos.is_finite(), "agent state went non-finite");
    }

    let group = module.group_of(0).expect("agent grouped");
    let potential = module
        .grid()
        .scalar_field(ScalarField::Potential, Some(group))
        .expect("potential field");
    for (idx, &phi) in potential.data.iter().enumerate() {
        assert!(phi.is_finite(), "potential at cell {idx} is not finite");
        assert!(phi >= 0.0, "unreached sentinel at cell {idx} on a connected map");
    }

    // y stays snapped to the terrain: flat zero unless standing on the ring.
    let pos = agents.position(0);
    let cell_x = ((pos.x / 8.0) as usize).min(31);
    let cell_z = ((pos.z / 8.0) as usize).min(31);
    let on_ring = (8..=24).contains(&cell_x)
        && (8..=24).contains(&cell_z)
        && (cell_x == 8 || cell_x == 24 || cell_z == 8 || cell_z == 24);
    let expected = if on_ring { 50.0 } else { 0.0 };
    assert_eq!(pos.y, expected);
}

#[test]
fn opposing_groups_both_make_progress() {
    let terrain = HeightField::flat(32, 32, 8.0, 0.0);
    let cfg = SimConfig {
        rho_bar: 0.1,
        discomfort_frames: 4,
        discomfort_step: 2.0,
        ..SimConfig::default()
    };
    let mut module = PathModule::new(cfg, &terrain);
    let mut agents = AgentStore::new();

    let def = walker(3.0);
    let mut eastbound = Vec::new();
    let mut westbound = Vec::new();
    for n in 0..12u32 {
        let z = 64.0 + n as f32 * 10.0;
        agents.insert(n, AgentState::at(Vec3::new(24.0, 0.0, z), 2.0, def));
        module.handle_event(&SimEvent::ObjectCreated { id: n }, &mut agents);
        eastbound.push(n);

        let id = 100 + n;
        agents.insert(id, AgentState::at(Vec3::new(232.0, 0.0, z), 2.0, def));
        module.handle_event(&SimEvent::ObjectCreated { id }, &mut agents);
        westbound.push(id);
    }
    module.handle_event(
        &SimEvent::MoveOrder {
            ids: eastbound.clone(),
            goal: Vec3::new(240.0, 0.0, 128.0),
            queued: false,
        },
        &mut agents,
    );
    module.handle_event(
        &SimEvent::MoveOrder {
            ids: westbound.clone(),
            goal: Vec3::new(16.0, 0.0, 128.0),
            queued: false,
        },
        &mut agents,
    );

    // Lanes, not gridlock: a cell may brush the saturation density while
    // the streams cross, but never hold it past one resolve window.
    let overcap_limit = cfg.update_interval * 2;
    let mut overcap_ticks = vec![0u32; 32 * 32];
    for _ in 0..120 {
        module.update(&mut agents);

        let density = module
            .grid()
            .scalar_field(ScalarField::Density, None)
            .expect("density field");
        for (cell, &rho) in density.data.iter().enumerate() {
            if rho >= cfg.rho_max {
                overcap_ticks[cell] += 1;
                assert!(
                    overcap_ticks[cell] <= overcap_limit,
                    "cell {cell} sat at saturation density for {} consecutive ticks",
                    overcap_ticks[cell]
                );
            } else {
                overcap_ticks[cell] = 0;
            }
        }
    }

    let east_mean: f32 =
        eastbound.iter().map(|&id| agents.position(id).x).sum::<f32>() / eastbound.len() as f32;
    let west_mean: f32 =
        westbound.iter().map(|&id| agents.position(id).x).sum::<f32>() / westbound.len() as f32;
    assert!(east_mean > 120.0, "eastbound stalled at mean x {east_mean}");
    assert!(west_mean < 136.0, "westbound stalled at mean x {west_mean}");
    for id in eastbound.iter().chain(&westbound) {
        assert!(agents.position(*id).is_finite());
    }
}

#[test]
fn far_out_of_bounds_goal_clamps_to_the_corner_cell() {
    let terrain = HeightField::flat(32, 32, 8.0, 0.0);
    let mut module = PathModule::new(SimConfig::default(), &terrain);
    let mut agents = AgentStore::new();

    agents.insert(
        0,
        AgentState::at(Vec3::new(120.0, 0.0, 120.0), 1.5, walker(4.0)),
    );
    module.handle_event(&SimEvent::ObjectCreated { id: 0 }, &mut agents);
    module.handle_event(
        &SimEvent::MoveOrder {
            ids: vec![0],
            goal: Vec3::new(-1000.0, 0.0, -1000.0),
            queued: false,
        },
        &mut agents,
    );

    let group = module.group_of(0).expect("agent grouped");
    assert_eq!(module.group_goals(group), Some(&[0usize][..]));

    let start = agents.position(0).xz().length();
    for _ in 0..60 {
        module.update(&mut agents);
    }
    let end = agents.position(0).xz().length();
    assert!(
        end < start * 0.5,
        "agent did not converge on the corner ({start} -> {end})"
    );
}
