//! Basic demonstration of the Chaos Arena simulation core.
//!
//! Run with: cargo run --example basic_demo

use arena_sim::{EnemyKind, GameEvent, SimWorld};

fn main() {
    println!("=== Chaos Arena - Simulation Demo ===\n");

    let mut sim = SimWorld::new();
    let player = sim.spawn_player(600.0, 400.0);
    sim.start_game();

    println!("Player {player:?} spawned, wave 1 preparing.\n");

    // Run 30 seconds of game time at 60 Hz; fire a few shots along the way.
    for tick in 0..1800 {
        // Hold aim to the right and nudge the player around in a circle.
        let t = tick as f32 / 60.0;
        sim.set_input(t.cos() * 0.5, t.sin() * 0.5, 900.0, 400.0, true);

        // External weapon logic: a shot every quarter second while held.
        if sim.fire_held() && tick % 15 == 0 {
            sim.spawn_projectile(620.0, 400.0, 0.0, 500.0, 25.0, Some(player), false);
        }

        sim.step(1.0 / 60.0);

        for event in sim.drain_events() {
            match event {
                GameEvent::WaveStarted {
                    wave,
                    enemy_count,
                    is_boss_wave,
                } => println!(
                    "[{t:6.2}s] wave {wave} started: {enemy_count} enemies{}",
                    if is_boss_wave { " (boss wave!)" } else { "" }
                ),
                GameEvent::WaveCompleted { wave, bonus } => {
                    println!("[{t:6.2}s] wave {wave} completed, bonus {bonus}")
                }
                GameEvent::EnemyKilled { kind, points, .. } => {
                    println!("[{t:6.2}s] {} down (+{points})", kind.name())
                }
                GameEvent::BossSpawned { kind, .. } => {
                    println!("[{t:6.2}s] !!! {} has arrived", kind.name())
                }
                GameEvent::ChaosLevelChanged { level, tier } => {
                    println!("[{t:6.2}s] chaos -> {} ({level:.0})", tier.name())
                }
                _ => {}
            }
        }

        if tick % 300 == 299 {
            let snapshot = sim.snapshot();
            let enemies = snapshot
                .entities
                .iter()
                .filter(|e| e.kind.is_some())
                .count();
            println!(
                "[{t:6.2}s] tick {}: {} enemies alive, chaos {:.1} ({}), wave {} ({}/{})",
                snapshot.tick,
                enemies,
                snapshot.chaos.level,
                snapshot.chaos.tier,
                snapshot.wave.wave,
                snapshot.wave.enemies_spawned,
                snapshot.wave.enemies_to_spawn,
            );
        }
    }

    // Demonstrate direct spawning and the save/restore surface.
    sim.spawn_enemy(EnemyKind::MiniBoss, 300.0, 300.0);
    let save = sim.save_json().expect("save should serialize");
    println!("\nSaved session: {} bytes of JSON", save.len());

    let mut resumed = SimWorld::new();
    resumed
        .restore_json(&save)
        .expect("restore should succeed");
    println!(
        "Restored session at wave {}, {} entities.",
        resumed.current_wave(),
        resumed.snapshot().entities.len()
    );

    println!("\n=== Final State (JSON) ===\n");
    println!("{}", sim.snapshot().to_json_pretty().unwrap());
}
