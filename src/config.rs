//! Simulation configuration resources.
//!
//! Every tunable constant of the core lives here so that embedders (and
//! tests) can shrink timers or reseed the RNG without touching the systems.

use bevy_ecs::prelude::*;

/// Top-level configuration for the simulation core.
#[derive(Resource, Debug, Clone)]
pub struct SimConfig {
    /// Fixed timestep in seconds (e.g., 1/60 = 0.0167 for 60 Hz).
    pub fixed_timestep: f32,
    /// Deltas larger than this are discarded instead of applied, so a
    /// suspended process cannot resolve several wave/phase transitions in
    /// a single giant step.
    pub max_step: f32,
    /// World bounds width in units.
    pub world_width: f32,
    /// World bounds height in units.
    pub world_height: f32,
    /// Spatial grid cell size. Default is roughly one median collision
    /// diameter so most entities cover a single cell.
    pub cell_size: f32,
    /// Seed for the simulation RNG. Identical seeds reproduce runs.
    pub seed: u64,
    /// Wave scheduler tunables.
    pub wave: WaveConfig,
    /// Chaos controller tunables.
    pub chaos: ChaosConfig,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            fixed_timestep: 1.0 / 60.0,
            max_step: 0.1,
            world_width: 1200.0,
            world_height: 800.0,
            cell_size: 32.0,
            seed: 0x00C4_A05,
            wave: WaveConfig::default(),
            chaos: ChaosConfig::default(),
        }
    }
}

/// Wave scheduler configuration.
#[derive(Debug, Clone)]
pub struct WaveConfig {
    /// Enemy target for wave 1.
    pub base_enemies_per_wave: u32,
    /// Additional enemies per subsequent wave.
    pub enemy_increase_per_wave: u32,
    /// Difficulty multiplier growth per wave.
    pub difficulty_step: f32,
    /// Cap on the difficulty multiplier.
    pub difficulty_cap: f32,
    /// Spawn interval at wave 1, in seconds.
    pub base_spawn_interval: f32,
    /// Spawn-speed multiplier growth per wave (divides the interval).
    pub spawn_speed_step: f32,
    /// Floor for the spawn interval.
    pub min_spawn_interval: f32,
    /// Random jitter applied to each spawn interval (± this value).
    pub spawn_jitter: f32,
    /// Countdown between waves, in seconds.
    pub prewave_delay: f32,
    /// Every Nth wave is a boss wave.
    pub boss_wave_interval: u32,
    /// Delay after wave start before the boss appears.
    pub boss_spawn_delay: f32,
    /// Maximum concurrently alive enemies.
    pub max_concurrent_enemies: u32,
    /// Minimum spawn-point distance from every living player.
    pub min_player_distance: f32,
    /// Delay after wave completion before the next wave is prepared.
    pub complete_delay: f32,
    /// Inset of the spawn-point ring from the world edge.
    pub spawn_margin: f32,
    /// Spawn points per world edge.
    pub points_per_side: u32,
}

impl Default for WaveConfig {
    fn default() -> Self {
        Self {
            base_enemies_per_wave: 8,
            enemy_increase_per_wave: 2,
            difficulty_step: 0.15,
            difficulty_cap: 4.0,
            base_spawn_interval: 3.0,
            spawn_speed_step: 0.1,
            min_spawn_interval: 1.0,
            spawn_jitter: 0.5,
            prewave_delay: 10.0,
            boss_wave_interval: 5,
            boss_spawn_delay: 5.0,
            max_concurrent_enemies: 25,
            min_player_distance: 200.0,
            complete_delay: 2.0,
            spawn_margin: 30.0,
            points_per_side: 5,
        }
    }
}

/// Chaos controller configuration.
#[derive(Debug, Clone)]
pub struct ChaosConfig {
    /// Linear decay toward zero, per second.
    pub decay_rate: f32,
    /// Rolling event window used for the combo multiplier, in seconds.
    pub event_window: f32,
    /// Minimum time between tier-change notifications.
    pub tier_cooldown: f32,
    /// Window for multi-kill detection, in seconds.
    pub multi_kill_window: f32,
}

impl Default for ChaosConfig {
    fn default() -> Self {
        Self {
            decay_rate: 5.0,
            event_window: 5.0,
            tier_cooldown: 1.0,
            multi_kill_window: 2.0,
        }
    }
}
