//! Benchmark: kernel step and full-log replay
//!
//! Replay and spectate re-run the kernel for every frame of a session, so
//! both the raw step and a whole replay should stay far below one frame
//! budget (16.7 ms at 60 Hz).

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use dino_arcade::driver::{LiveDriver, LivePhase, ReplayDriver};
use dino_arcade::game::kernel;
use dino_arcade::store::{OwnerId, SessionRecord, SessionStatus, StoreCommand, StoreSink};
use dino_arcade::{GameEvent, Obstacle, Pacing, SimConfig, World};

/// Play a bot session to its crash and collect the log it wrote.
fn recorded_session(config: &SimConfig, retire_frame: u64) -> (SessionRecord, Vec<GameEvent>) {
    let (sink, mut rx) = StoreSink::channel();
    let mut live = LiveDriver::new(config.clone(), Pacing::default(), Some(OwnerId::new("bench")), sink)
        .with_session_id("bench-session");

    live.press_jump();
    let final_score = loop {
        let grounded = live.world().actor.is_grounded();
        let near = live.frames_to_next_obstacle().is_some_and(|f| f <= 8.0);
        if live.world().frame < retire_frame && grounded && near {
            live.press_jump();
        }
        if let LivePhase::Ended { final_score } = live.frame() {
            break final_score;
        }
    };

    let mut events = Vec::new();
    while let Ok(command) = rx.try_recv() {
        if let StoreCommand::AppendEvent(event) = command {
            events.push(event);
        }
    }

    let record = SessionRecord {
        session_id: "bench-session".into(),
        owner: OwnerId::new("bench"),
        started_at: 0,
        status: SessionStatus::Done,
        stage: None,
        config: serde_json::Value::Null,
        final_score: Some(final_score),
    };
    (record, events)
}

fn bench_kernel_step(c: &mut Criterion) {
    let mut group = c.benchmark_group("kernel_step");
    let config = SimConfig::default();

    for count in [0usize, 4, 16] {
        let mut world = World::new(&config);
        for i in 0..count {
            world.obstacles.push(Obstacle::new(800.0 - i as f64 * 50.0, 18.0, 30.0));
        }

        group.bench_with_input(BenchmarkId::new("obstacles", count), &world, |b, world| {
            b.iter(|| {
                let mut world = world.clone();
                kernel::step(&config, &mut world.actor, &mut world.obstacles);
                black_box(world)
            });
        });
    }

    group.finish();
}

fn bench_replay(c: &mut Criterion) {
    let mut group = c.benchmark_group("replay");
    let config = SimConfig::default();

    for retire in [600u64, 1800] {
        let (record, events) = recorded_session(&config, retire);
        group.throughput(Throughput::Elements(events.len() as u64));

        group.bench_with_input(BenchmarkId::new("run_to_end", retire), &events, |b, events| {
            b.iter(|| {
                let mut replay = ReplayDriver::new(config.clone(), record.clone(), events.clone());
                black_box(replay.run_to_end())
            });
        });
    }

    group.finish();
}

fn bench_state_hash(c: &mut Criterion) {
    let config = SimConfig::default();
    let mut world = World::new(&config);
    for i in 0..8 {
        world.obstacles.push(Obstacle::new(800.0 - i as f64 * 90.0, 18.0, 30.0 + i as f64));
    }

    c.bench_function("world_hash", |b| b.iter(|| black_box(world.compute_hash())));
}

criterion_group!(benches, bench_kernel_step, bench_replay, bench_state_hash);
criterion_main!(benches);
