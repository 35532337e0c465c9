//! Performance benchmarks for critical server systems

use server::content;
use server::dispatch::{Dispatcher, Intent};
use server::movement;
use shared::{ChatScope, ClientIntent, Position, StateFrame, TILE_SIZE};
use std::time::Instant;

/// Benchmarks the collision predicate against a populated map
#[test]
fn benchmark_collision_predicate() {
    let mut world = content::default_world();
    for i in 0..20 {
        world.login(&format!("player-{i}"));
    }
    let core = world.player("player-0").unwrap().core.clone();
    let candidate = core.position.offset(TILE_SIZE, 0.0);

    let iterations = 100_000;
    let start = Instant::now();

    for _ in 0..iterations {
        let _ = movement::has_collision(&world, &core, candidate);
    }

    let duration = start.elapsed();
    println!(
        "Collision predicate: {} iterations in {:?} ({:.2} ns/iter)",
        iterations,
        duration,
        duration.as_nanos() as f64 / iterations as f64
    );

    // Should complete in under 2 seconds for 100k iterations
    assert!(duration.as_millis() < 2000);
}

/// Benchmarks warp lookup on warp-free paths (the common case)
#[test]
fn benchmark_warp_lookup() {
    let mut world = content::default_world();
    world.login("ada");
    let core = world.player("ada").unwrap().core.clone();
    let candidate = Position {
        x: 5.0 * TILE_SIZE,
        y: 5.0 * TILE_SIZE,
    };

    let iterations = 100_000;
    let start = Instant::now();

    for _ in 0..iterations {
        let _ = movement::find_warp(&world, &core, candidate);
    }

    let duration = start.elapsed();
    println!(
        "Warp lookup: {} iterations in {:?} ({:.2} ns/iter)",
        iterations,
        duration,
        duration.as_nanos() as f64 / iterations as f64
    );

    assert!(duration.as_millis() < 1000);
}

/// Benchmarks a full drain of queued chat and move intents
#[test]
fn benchmark_drain_throughput() {
    let mut dispatcher = Dispatcher::new(content::default_world(), 8);
    let queue = dispatcher.handle();
    for i in 0..4 {
        queue
            .send(Intent::Connect {
                username: format!("player-{i}"),
                sender: tokio::sync::mpsc::unbounded_channel().0,
            })
            .unwrap();
    }
    dispatcher.drain_once();

    let intents = 10_000;
    for i in 0..intents {
        let username = format!("player-{}", i % 4);
        if i % 2 == 0 {
            queue
                .send(Intent::Client {
                    username,
                    intent: ClientIntent::Chat {
                        scope: ChatScope::Global,
                        message: "tick".to_string(),
                    },
                })
                .unwrap();
        } else {
            queue
                .send(Intent::CommitMove {
                    username,
                    proposed: Position {
                        x: 5.0 * TILE_SIZE,
                        y: 5.0 * TILE_SIZE,
                    },
                })
                .unwrap();
        }
    }

    let start = Instant::now();
    let applied = dispatcher.drain_once().unwrap();
    let duration = start.elapsed();

    println!(
        "Drain: {} intents in {:?} ({:.2} µs/intent)",
        applied,
        duration,
        duration.as_micros() as f64 / applied as f64
    );

    assert_eq!(applied, intents);
    // A 50ms tick budget should dwarf a 10k-intent drain
    assert!(duration.as_millis() < 5000);
}

/// Benchmarks per-recipient snapshot serialization
#[test]
fn benchmark_snapshot_serialization() {
    let mut world = content::default_world();
    for i in 0..16 {
        world.login(&format!("player-{i}"));
    }
    let frame = StateFrame {
        map: world.snapshot("1").unwrap(),
        player: world.player("player-0").unwrap().clone(),
    };

    let iterations = 1_000;
    let start = Instant::now();

    for _ in 0..iterations {
        let _ = serde_json::to_string(&frame).unwrap();
    }

    let duration = start.elapsed();
    println!(
        "Snapshot serialization: {} iterations in {:?} ({:.2} µs/iter)",
        iterations,
        duration,
        duration.as_micros() as f64 / iterations as f64
    );

    // Should stay far below the broadcast interval per frame
    assert!(duration.as_millis() < 5000);
}
