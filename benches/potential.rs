use criterion::{Criterion, black_box, criterion_group, criterion_main};
use glam::Vec3;

use crowdflow::{
    AgentAdapter, AgentDef, AgentState, AgentStore, HeightField, PathModule, SimConfig, SimEvent,
};

fn build(agent_count: u32) -> (PathModule, AgentStore) {
    let terrain = HeightField::from_fn(64, 64, 8.0, |x, z| {
        ((x as f32 * 0.3).sin() + (z as f32 * 0.2).cos()) * 8.0
    });
    let mut module = PathModule::new(SimConfig::default(), &terrain);
    let mut agents = AgentStore::new();

    let def = AgentDef {
        min_forward_speed: 0.5,
        max_forward_speed: 3.0,
        max_acc_rate: 0.5,
        max_dec_rate: 1.0,
        max_turn_rate: 30f32.to_radians(),
        ..AgentDef::default()
    };
    let side = (agent_count as f32).sqrt().ceil() as u32;
    for id in 0..agent_count {
        let pos = Vec3::new(
            24.0 + (id % side) as f32 * 6.0,
            0.0,
            24.0 + (id / side) as f32 * 6.0,
        );
        agents.insert(id, AgentState::at(pos, 2.0, def));
        module.handle_event(&SimEvent::ObjectCreated { id }, &mut agents);
    }
    module.handle_event(
        &SimEvent::MoveOrder {
            ids: (0..agent_count).collect(),
            goal: Vec3::new(480.0, 0.0, 480.0),
            queued: false,
        },
        &mut agents,
    );
    (module, agents)
}

fn bench_tick(c: &mut Criterion) {
    let mut group = c.benchmark_group("crowdflow/tick_64x64");

    for &n in &[16u32, 128u32] {
        let (mut module, mut agents) = build(n);
        group.bench_function(format!("{n}_agents"), |b| {
            b.iter(|| {
                module.update(&mut agents);
                black_box(agents.position(0));
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_tick);
criterion_main!(benches);
