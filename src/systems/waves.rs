//! Wave scheduler: per-wave spawn timing, weighted archetype selection,
//! boss waves and completion detection.

use bevy_ecs::prelude::*;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::archetype::EnemyKind;
use crate::components::{Dead, EnemyBundle, Health, PlayerControlled, Score, Transform};
use crate::config::{SimConfig, WaveConfig};
use crate::events::{EventQueue, GameEvent};
use crate::systems::{DeltaTime, SimRng};

/// Scheduler state machine phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum WavePhase {
    /// Before `start_game`; the scheduler does nothing.
    #[default]
    Idle,
    /// Pre-wave countdown running.
    Preparing,
    /// Spawning and completion detection.
    Active,
    /// Post-completion delay before the next wave is prepared.
    Complete,
}

/// Per-game wave record. Superseded (reset wholesale) when the next wave is
/// prepared, never mutated across waves.
#[derive(Resource, Debug, Clone, Default)]
pub struct WaveState {
    pub wave: u32,
    pub phase: WavePhase,
    /// Enemies this wave will spawn.
    pub target: u32,
    /// Enemies spawned so far this wave.
    pub spawned: u32,
    pub difficulty: f32,
    pub spawn_interval: f32,
    pub prewave_timer: f32,
    pub spawn_timer: f32,
    pub boss_timer: f32,
    pub boss_pending: bool,
    /// Latch so completion cannot fire twice for one wave.
    pub completed: bool,
    pub complete_timer: f32,
    pub total_kills: u32,
}

impl WaveState {
    /// Reset to a fresh game and prepare wave 1.
    pub fn begin(&mut self, config: &WaveConfig) {
        *self = Self::default();
        self.prepare_next_wave(config);
    }

    /// Advance the wave counter and compute this wave's parameters.
    pub fn prepare_next_wave(&mut self, config: &WaveConfig) {
        let total_kills = self.total_kills;
        let wave = self.wave + 1;
        *self = Self {
            wave,
            phase: WavePhase::Preparing,
            target: config.base_enemies_per_wave + (wave - 1) * config.enemy_increase_per_wave,
            spawned: 0,
            difficulty: (1.0 + (wave - 1) as f32 * config.difficulty_step)
                .min(config.difficulty_cap),
            spawn_interval: (config.base_spawn_interval
                / (1.0 + (wave - 1) as f32 * config.spawn_speed_step))
                .max(config.min_spawn_interval),
            prewave_timer: config.prewave_delay,
            spawn_timer: 0.0,
            boss_timer: 0.0,
            boss_pending: false,
            completed: false,
            complete_timer: 0.0,
            total_kills,
        };
    }

    pub fn is_boss_wave(&self, config: &WaveConfig) -> bool {
        self.wave > 0 && self.wave % config.boss_wave_interval == 0
    }
}

// ============================================================================
// ARCHETYPE SELECTION
// ============================================================================

/// Weighted composition for a wave. Explicit tables cover the first ten
/// waves; beyond them a smooth formula blends toward higher-tier
/// archetypes, capped at wave 20.
fn wave_composition(wave: u32) -> [(EnemyKind, f32); 4] {
    use EnemyKind::*;
    match wave {
        0 | 1 => [(Grunt, 100.0), (Spitter, 0.0), (Bruiser, 0.0), (MiniBoss, 0.0)],
        2 => [(Grunt, 80.0), (Spitter, 20.0), (Bruiser, 0.0), (MiniBoss, 0.0)],
        3 => [(Grunt, 70.0), (Spitter, 25.0), (Bruiser, 5.0), (MiniBoss, 0.0)],
        4 => [(Grunt, 60.0), (Spitter, 30.0), (Bruiser, 10.0), (MiniBoss, 0.0)],
        5 => [(Grunt, 40.0), (Spitter, 30.0), (Bruiser, 20.0), (MiniBoss, 10.0)],
        6 => [(Grunt, 50.0), (Spitter, 35.0), (Bruiser, 15.0), (MiniBoss, 0.0)],
        7 => [(Grunt, 45.0), (Spitter, 35.0), (Bruiser, 20.0), (MiniBoss, 0.0)],
        8 => [(Grunt, 40.0), (Spitter, 30.0), (Bruiser, 25.0), (MiniBoss, 5.0)],
        9 => [(Grunt, 35.0), (Spitter, 35.0), (Bruiser, 25.0), (MiniBoss, 5.0)],
        10 => [(Grunt, 20.0), (Spitter, 30.0), (Bruiser, 30.0), (MiniBoss, 20.0)],
        _ => {
            let level = wave.min(20) as f32;
            [
                (Grunt, (60.0 - level * 2.0).max(20.0)),
                (Spitter, (20.0 + level).min(40.0)),
                (Bruiser, (level * 1.5).min(30.0)),
                (MiniBoss, ((level - 5.0).max(0.0) * 0.5).min(10.0)),
            ]
        }
    }
}

/// Cumulative-weight roulette over the wave composition.
fn roll_archetype(wave: u32, rng: &mut SimRng) -> EnemyKind {
    let composition = wave_composition(wave);
    let total: f32 = composition.iter().map(|(_, w)| w).sum();
    if total <= 0.0 {
        return EnemyKind::Grunt;
    }
    let roll = rng.0.gen_range(0.0..total);
    let mut cumulative = 0.0;
    for (kind, weight) in composition {
        cumulative += weight;
        if roll <= cumulative {
            return kind;
        }
    }
    EnemyKind::Grunt
}

// ============================================================================
// SPAWN POINTS
// ============================================================================

/// Ring of spawn points along the world edges, inset by the configured
/// margin.
fn spawn_points(config: &SimConfig) -> Vec<(f32, f32)> {
    let n = config.wave.points_per_side.max(2);
    let m = config.wave.spawn_margin;
    let (w, h) = (config.world_width, config.world_height);
    let mut points = Vec::with_capacity(n as usize * 4);
    for i in 0..n {
        let t = i as f32 / (n - 1) as f32;
        points.push((t * w, m));
        points.push((t * w, h - m));
        points.push((m, t * h));
        points.push((w - m, t * h));
    }
    points
}

/// Pick a spawn point farther than `min_dist` from every living player,
/// falling back to any point if none qualify.
fn select_spawn_point(
    points: &[(f32, f32)],
    players: &[(f32, f32)],
    min_dist: f32,
    rng: &mut SimRng,
) -> Option<(f32, f32)> {
    if points.is_empty() {
        return None;
    }
    let far_enough: Vec<(f32, f32)> = points
        .iter()
        .copied()
        .filter(|&(px, py)| {
            players.iter().all(|&(x, y)| {
                let (dx, dy) = (px - x, py - y);
                (dx * dx + dy * dy).sqrt() > min_dist
            })
        })
        .collect();
    let pool = if far_enough.is_empty() { points } else { &far_enough };
    Some(pool[rng.0.gen_range(0..pool.len())])
}

// ============================================================================
// SCHEDULER SYSTEM
// ============================================================================

/// System that advances the wave state machine.
///
/// Wave completion is a continuously re-evaluated predicate (all spawned
/// and none left alive), latched by the `completed` flag, and evaluated
/// before any same-tick spawn so a pending spawn command can never race
/// the live count.
pub fn wave_system(
    config: Res<SimConfig>,
    dt: Res<DeltaTime>,
    mut rng: ResMut<SimRng>,
    mut wave: ResMut<WaveState>,
    mut queue: ResMut<EventQueue>,
    enemies: Query<(Entity, &EnemyKind, &Health), Without<Dead>>,
    players: Query<(&Transform, &Health), (With<PlayerControlled>, Without<EnemyKind>)>,
    mut scores: Query<&mut Score, With<PlayerControlled>>,
    mut commands: Commands,
) {
    let delta = dt.0;
    let wc = &config.wave;

    wave.total_kills += queue
        .events
        .iter()
        .filter(|e| matches!(e, GameEvent::EnemyKilled { .. }))
        .count() as u32;

    // Elite takedowns pay a wave-scaled bonus on top of the score value.
    let boss_killers: Vec<Entity> = queue
        .events
        .iter()
        .filter_map(|e| match e {
            GameEvent::BossDefeated { killer, .. } => *killer,
            _ => None,
        })
        .collect();
    for killer in boss_killers {
        if let Ok(mut score) = scores.get_mut(killer) {
            score.points += (1000 * wave.wave) as u64;
        }
    }

    match wave.phase {
        WavePhase::Idle => {}
        WavePhase::Preparing => {
            wave.prewave_timer -= delta;
            if wave.prewave_timer <= 0.0 {
                // Leftover non-elite enemies from the previous wave are
                // cleared; bosses carry over.
                for (entity, kind, _) in enemies.iter() {
                    if !kind.is_elite() {
                        commands.entity(entity).insert(Dead);
                    }
                }
                wave.phase = WavePhase::Active;
                let is_boss_wave = wave.is_boss_wave(wc);
                if is_boss_wave {
                    wave.target = (wave.target / 2).max(1);
                    wave.boss_pending = true;
                    wave.boss_timer = wc.boss_spawn_delay;
                }
                info!(wave = wave.wave, target = wave.target, is_boss_wave, "wave started");
                queue.emit(GameEvent::WaveStarted {
                    wave: wave.wave,
                    enemy_count: wave.target,
                    is_boss_wave,
                });
            }
        }
        WavePhase::Active => {
            let live = enemies.iter().filter(|(_, _, h)| h.is_alive()).count() as u32;
            let players_alive: Vec<(f32, f32)> = players
                .iter()
                .filter(|(_, h)| h.is_alive())
                .map(|(t, _)| (t.x, t.y))
                .collect();

            if !wave.completed && !wave.boss_pending && wave.spawned >= wave.target && live == 0 {
                wave.completed = true;
                wave.phase = WavePhase::Complete;
                wave.complete_timer = wc.complete_delay;
                let bonus = 100 * wave.wave;
                for mut score in scores.iter_mut() {
                    score.points += bonus as u64;
                }
                info!(wave = wave.wave, bonus, "wave completed");
                queue.emit(GameEvent::WaveCompleted {
                    wave: wave.wave,
                    bonus,
                });
                return;
            }

            if wave.boss_pending {
                wave.boss_timer -= delta;
                if wave.boss_timer <= 0.0 {
                    wave.boss_pending = false;
                    let kind = if wave.wave % (wc.boss_wave_interval * 2) == 0 {
                        EnemyKind::Boss
                    } else {
                        EnemyKind::MiniBoss
                    };
                    let (x, y) = boss_spawn_point(&config, &players_alive, &mut rng);
                    commands.spawn(EnemyBundle::new(kind, x, y).scaled(wave.difficulty));
                    info!(wave = wave.wave, kind = kind.name(), "boss spawned");
                    queue.emit(GameEvent::BossSpawned {
                        wave: wave.wave,
                        kind,
                    });
                }
            }

            wave.spawn_timer -= delta;
            let gates_open = wave.spawn_timer <= 0.0
                && wave.spawned < wave.target
                && live < wc.max_concurrent_enemies
                && !players_alive.is_empty();
            if gates_open {
                let kind = roll_archetype(wave.wave, &mut rng);
                let points = spawn_points(&config);
                if let Some((x, y)) = select_spawn_point(
                    &points,
                    &players_alive,
                    wc.min_player_distance,
                    &mut rng,
                ) {
                    let enemy = commands
                        .spawn(EnemyBundle::new(kind, x, y).scaled(wave.difficulty))
                        .id();
                    wave.spawned += 1;
                    queue.emit(GameEvent::EnemySpawned {
                        enemy,
                        kind,
                        wave: wave.wave,
                    });
                }
                // Timer resets even when no point qualified; the attempt is
                // simply deferred, never an error.
                let jitter = (rng.0.gen::<f32>() - 0.5) * 2.0 * wc.spawn_jitter;
                wave.spawn_timer = wave.spawn_interval + jitter;
            }
        }
        WavePhase::Complete => {
            wave.complete_timer -= delta;
            if wave.complete_timer <= 0.0 {
                wave.prepare_next_wave(wc);
            }
        }
    }
}

/// Bosses appear at the arena center unless a player is close, in which
/// case they fall back to an edge point.
fn boss_spawn_point(config: &SimConfig, players: &[(f32, f32)], rng: &mut SimRng) -> (f32, f32) {
    let center = (config.world_width / 2.0, config.world_height / 2.0);
    let too_close = players.iter().any(|&(x, y)| {
        let (dx, dy) = (center.0 - x, center.1 - y);
        (dx * dx + dy * dy).sqrt() < 150.0
    });
    if too_close {
        let points = spawn_points(config);
        select_spawn_point(&points, &[], 0.0, rng).unwrap_or(center)
    } else {
        center
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::{Motion, Tag, Tags};

    fn base_world() -> World {
        let mut world = World::new();
        world.insert_resource(SimConfig::default());
        world.insert_resource(DeltaTime(0.1));
        world.insert_resource(SimRng::from_seed(7));
        world.insert_resource(EventQueue::default());
        world.insert_resource(WaveState::default());
        world
    }

    fn spawn_live_player(world: &mut World, x: f32, y: f32) -> Entity {
        world
            .spawn((
                Tags::new(&[Tag::Player]),
                Transform::new(x, y, 0.0),
                Motion::new(16.0),
                Health::new(100.0),
                Score::default(),
                PlayerControlled::default(),
            ))
            .id()
    }

    fn run_ticks(world: &mut World, n: usize) {
        let mut schedule = Schedule::default();
        schedule.add_systems(wave_system);
        for _ in 0..n {
            schedule.run(world);
        }
    }

    #[test]
    fn test_wave_targets_escalate() {
        let config = WaveConfig::default();
        let mut state = WaveState::default();
        state.begin(&config);
        assert_eq!(state.wave, 1);
        assert_eq!(state.target, 8);
        state.prepare_next_wave(&config);
        assert_eq!(state.target, 10);
        state.prepare_next_wave(&config);
        assert_eq!(state.target, 12);
    }

    #[test]
    fn test_difficulty_and_interval_formulas() {
        let config = WaveConfig::default();
        let mut state = WaveState::default();
        state.begin(&config);
        assert!((state.difficulty - 1.0).abs() < 0.001);
        assert!((state.spawn_interval - 3.0).abs() < 0.001);

        for _ in 0..10 {
            state.prepare_next_wave(&config);
        }
        // Wave 11: difficulty 1 + 10*0.15, interval 3 / (1 + 10*0.1).
        assert!((state.difficulty - 2.5).abs() < 0.001);
        assert!((state.spawn_interval - 1.5).abs() < 0.001);

        for _ in 0..60 {
            state.prepare_next_wave(&config);
        }
        assert!((state.difficulty - 4.0).abs() < 0.001); // capped
        assert!((state.spawn_interval - 1.0).abs() < 0.001); // floored
    }

    #[test]
    fn test_wave_one_spawns_grunts_only() {
        let mut rng = SimRng::from_seed(3);
        for _ in 0..50 {
            assert_eq!(roll_archetype(1, &mut rng), EnemyKind::Grunt);
        }
    }

    #[test]
    fn test_overflow_wave_composition_blends_up() {
        let composition = wave_composition(25); // beyond the tables, capped at 20
        let weights: std::collections::HashMap<_, _> = composition.into_iter().collect();
        assert_eq!(weights[&EnemyKind::Grunt], 20.0);
        assert_eq!(weights[&EnemyKind::Spitter], 40.0);
        assert_eq!(weights[&EnemyKind::Bruiser], 30.0);
        assert_eq!(weights[&EnemyKind::MiniBoss], 7.5);
    }

    #[test]
    fn test_spawn_point_respects_player_distance() {
        let config = SimConfig::default();
        let points = spawn_points(&config);
        let mut rng = SimRng::from_seed(11);
        // Player in one corner: every chosen point keeps its distance.
        for _ in 0..20 {
            let p = select_spawn_point(&points, &[(30.0, 30.0)], 200.0, &mut rng).unwrap();
            let d = ((p.0 - 30.0).powi(2) + (p.1 - 30.0).powi(2)).sqrt();
            assert!(d > 200.0);
        }
        // Unsatisfiable distance: falls back to some point instead of failing.
        assert!(select_spawn_point(&points, &[(600.0, 400.0)], 1e6, &mut rng).is_some());
    }

    #[test]
    fn test_spawning_paused_without_living_players() {
        let mut world = base_world();
        {
            let config = world.resource::<SimConfig>().wave.clone();
            let mut wave = world.resource_mut::<WaveState>();
            wave.begin(&config);
            wave.prewave_timer = 0.05;
        }
        run_ticks(&mut world, 30); // ~3 s with no players

        let mut enemies = world.query::<&EnemyKind>();
        assert_eq!(enemies.iter(&world).count(), 0);
        assert_eq!(world.resource::<WaveState>().spawned, 0);

        // A player appearing unblocks spawning within one tick.
        spawn_live_player(&mut world, 600.0, 400.0);
        run_ticks(&mut world, 1);
        assert_eq!(world.resource::<WaveState>().spawned, 1);
    }

    #[test]
    fn test_boss_wave_halves_target_and_spawns_boss_once() {
        let mut world = base_world();
        spawn_live_player(&mut world, 600.0, 400.0);
        {
            let config = world.resource::<SimConfig>().wave.clone();
            let mut wave = world.resource_mut::<WaveState>();
            wave.begin(&config);
            for _ in 0..4 {
                wave.prepare_next_wave(&config); // wave 5: boss wave
            }
            wave.prewave_timer = 0.05;
        }

        run_ticks(&mut world, 1); // start the wave
        {
            let wave = world.resource::<WaveState>();
            assert_eq!(wave.wave, 5);
            assert_eq!(wave.target, 8); // (8 + 4*2) / 2
            assert!(wave.boss_pending);
        }
        let events: Vec<_> = world.resource::<EventQueue>().events.clone();
        assert!(events
            .iter()
            .any(|e| matches!(e, GameEvent::WaveStarted { is_boss_wave: true, .. })));

        // Boss appears once, ~5 s after wave start.
        run_ticks(&mut world, 55);
        let boss_events = world
            .resource::<EventQueue>()
            .events
            .iter()
            .filter(|e| matches!(e, GameEvent::BossSpawned { .. }))
            .count();
        assert_eq!(boss_events, 1);
        assert!(!world.resource::<WaveState>().boss_pending);
    }

    #[test]
    fn test_wave_completion_fires_once_with_bonus() {
        let mut world = base_world();
        let player = spawn_live_player(&mut world, 600.0, 400.0);
        {
            let config = world.resource::<SimConfig>().wave.clone();
            let mut wave = world.resource_mut::<WaveState>();
            wave.begin(&config);
            wave.phase = WavePhase::Active;
            wave.spawned = wave.target; // everything spawned, nothing alive
        }

        run_ticks(&mut world, 3);

        let completions = world
            .resource::<EventQueue>()
            .events
            .iter()
            .filter(|e| matches!(e, GameEvent::WaveCompleted { .. }))
            .count();
        assert_eq!(completions, 1);
        assert_eq!(world.get::<Score>(player).unwrap().points, 100);
        assert_eq!(world.resource::<WaveState>().phase, WavePhase::Complete);
    }

    #[test]
    fn test_completion_waits_for_live_enemies() {
        let mut world = base_world();
        spawn_live_player(&mut world, 600.0, 400.0);
        world.spawn(EnemyBundle::new(EnemyKind::Grunt, 100.0, 100.0));
        {
            let config = world.resource::<SimConfig>().wave.clone();
            let mut wave = world.resource_mut::<WaveState>();
            wave.begin(&config);
            wave.phase = WavePhase::Active;
            wave.spawned = wave.target;
        }

        run_ticks(&mut world, 3);
        assert_eq!(world.resource::<WaveState>().phase, WavePhase::Active);
    }

    #[test]
    fn test_next_wave_prepared_after_complete_delay() {
        let mut world = base_world();
        {
            let config = world.resource::<SimConfig>().wave.clone();
            let mut wave = world.resource_mut::<WaveState>();
            wave.begin(&config);
            wave.phase = WavePhase::Complete;
            wave.completed = true;
            wave.complete_timer = 0.15;
        }

        run_ticks(&mut world, 2);
        let wave = world.resource::<WaveState>();
        assert_eq!(wave.wave, 2);
        assert_eq!(wave.phase, WavePhase::Preparing);
        assert_eq!(wave.target, 10);
    }
}
