//! Public API for the simulation.
//!
//! This module provides the main interface for the presentation layer (or
//! any other client) to interact with the simulation.
//!
//! ## Fixed Timestep
//!
//! The simulation uses a fixed timestep internally (default 60 Hz). When
//! `step(dt)` is called, time is accumulated and fixed updates run as
//! needed, so behavior is deterministic regardless of frame rate. A delta
//! above the configured maximum (default 100 ms, e.g. from a suspended
//! process) is discarded outright rather than applied.

use bevy_ecs::prelude::*;
use bevy_ecs::schedule::Schedule;

use crate::archetype::EnemyKind;
use crate::components::{
    AreaEffect, AreaEffectBundle, Dead, EnemyBundle, Pickup, PickupBundle, PlayerBundle,
    ProjectileBundle, Tag,
};
use crate::config::SimConfig;
use crate::events::{event_outbox_system, EventOutbox, EventQueue, GameEvent};
use crate::spatial::SpatialGrid;
use crate::systems::*;
use crate::world::{SaveState, SimError, Snapshot};

/// The main simulation world container.
///
/// Holds the ECS world and schedule, providing a clean API for:
/// - Initializing and stepping the simulation
/// - Spawning externally owned entities (players, projectiles, pickups)
/// - Feeding input intents
/// - Extracting state snapshots and draining events
/// - Saving and restoring a session
pub struct SimWorld {
    world: World,
    schedule: Schedule,
    tick: u64,
    time: f32,
    /// Accumulated time for the fixed timestep.
    time_accumulator: f32,
}

impl SimWorld {
    /// Create a new empty simulation world.
    pub fn new() -> Self {
        Self::with_config(SimConfig::default())
    }

    /// Create a new simulation world with custom configuration.
    pub fn with_config(config: SimConfig) -> Self {
        let mut world = World::new();

        world.insert_resource(DeltaTime(config.fixed_timestep));
        world.insert_resource(SimClock::default());
        world.insert_resource(SpatialGrid::new(config.cell_size));
        world.insert_resource(SimRng::from_seed(config.seed));
        world.insert_resource(PlayerInput::default());
        world.insert_resource(EventQueue::default());
        world.insert_resource(EventOutbox::default());
        world.insert_resource(WaveState::default());
        world.insert_resource(ChaosState::new());
        world.insert_resource(config);

        // One chained schedule; tick ordering is part of the contract.
        let mut schedule = Schedule::default();
        schedule.add_systems(
            (
                player_input_system,
                health_tick_system,
                lifetime_system,
                area_growth_system,
            )
                .chain(),
        );
        schedule.add_systems(
            (
                integrate_system,
                crate::spatial::spatial_index_system,
                collision_system,
                bounds_system,
            )
                .chain()
                .after(area_growth_system),
        );
        schedule.add_systems(
            (behavior_system, attack_system, phase_system, death_system)
                .chain()
                .after(bounds_system),
        );
        schedule.add_systems(wave_system.after(death_system));
        schedule.add_systems(
            (chaos_system, event_outbox_system, despawn_system)
                .chain()
                .after(wave_system),
        );

        Self {
            world,
            schedule,
            tick: 0,
            time: 0.0,
            time_accumulator: 0.0,
        }
    }

    /// Reset per-game state and prepare wave 1. Existing enemies are
    /// cleared; players persist.
    pub fn start_game(&mut self) {
        let config = self.world.resource::<SimConfig>().wave.clone();
        self.world.resource_mut::<WaveState>().begin(&config);
        self.world.resource_mut::<ChaosState>().reset();
        self.clear_enemies();
    }

    /// Step the simulation forward by `dt` seconds.
    ///
    /// Deltas above the configured maximum are discarded so a single giant
    /// step can never resolve several wave or phase transitions at once.
    pub fn step(&mut self, dt: f32) {
        let (fixed_dt, max_step) = {
            let config = self.world.resource::<SimConfig>();
            (config.fixed_timestep, config.max_step)
        };
        if dt > max_step || dt <= 0.0 {
            return;
        }

        self.time_accumulator += dt;
        while self.time_accumulator >= fixed_dt {
            self.fixed_update(fixed_dt);
            self.time_accumulator -= fixed_dt;
        }
    }

    /// Run a single fixed timestep update.
    fn fixed_update(&mut self, dt: f32) {
        self.world.resource_mut::<DeltaTime>().0 = dt;
        self.world.resource_mut::<SimClock>().advance(dt);
        self.schedule.run(&mut self.world);
        self.tick += 1;
        self.time += dt;
    }

    // ------------------------------------------------------------------
    // Entity creation for external collaborators
    // ------------------------------------------------------------------

    /// Spawn a player entity.
    pub fn spawn_player(&mut self, x: f32, y: f32) -> Entity {
        self.world.spawn(PlayerBundle::new(x, y)).id()
    }

    /// Spawn an enemy directly, outside the wave scheduler.
    pub fn spawn_enemy(&mut self, kind: EnemyKind, x: f32, y: f32) -> Entity {
        self.world.spawn(EnemyBundle::new(kind, x, y)).id()
    }

    /// Spawn a player-owned projectile. Collisions resolve through the
    /// same tag-interaction table as every other entity.
    pub fn spawn_projectile(
        &mut self,
        x: f32,
        y: f32,
        angle: f32,
        speed: f32,
        damage: f32,
        owner: Option<Entity>,
        piercing: bool,
    ) -> Entity {
        let mut bundle = ProjectileBundle::new(Tag::Bullet, x, y, angle, speed, damage);
        bundle.projectile.owner = owner;
        bundle.projectile.piercing = piercing;
        self.world.spawn(bundle).id()
    }

    /// Spawn an expanding explosion damaging enemies, and notify
    /// listeners.
    pub fn spawn_explosion(
        &mut self,
        x: f32,
        y: f32,
        radius: f32,
        damage: f32,
        source: Option<Entity>,
    ) -> Entity {
        let entity = self
            .world
            .spawn(AreaEffectBundle::new(
                x,
                y,
                radius * 0.25,
                AreaEffect {
                    damage,
                    growth: radius * 8.0,
                    max_radius: radius,
                    target: Tag::Enemy,
                    knockback: 300.0,
                    source,
                    hit: Vec::new(),
                },
                1.0,
            ))
            .id();
        self.world
            .resource_mut::<EventQueue>()
            .emit(GameEvent::ExplosionDamage {
                x,
                y,
                radius,
                damage,
                source,
            });
        entity
    }

    /// Spawn a pickup.
    pub fn spawn_pickup(&mut self, x: f32, y: f32, pickup: Pickup) -> Entity {
        self.world.spawn(PickupBundle::new(x, y, pickup)).id()
    }

    /// Destroy an entity. Idempotent: destroying a missing or
    /// already-destroyed id is a no-op returning `false`.
    pub fn destroy_entity(&mut self, entity: Entity) -> bool {
        if self.world.entities().contains(entity) {
            self.world.despawn(entity)
        } else {
            false
        }
    }

    /// Clear all enemies (manual wave clear). Abandoned wave/phase timers
    /// are simply dropped with their entities.
    pub fn clear_enemies(&mut self) {
        let mut query = self.world.query_filtered::<Entity, With<EnemyKind>>();
        let enemies: Vec<Entity> = query.iter(&self.world).collect();
        for entity in enemies {
            self.world.entity_mut(entity).insert(Dead);
        }
    }

    // ------------------------------------------------------------------
    // Input intents
    // ------------------------------------------------------------------

    /// Supply this tick's input intents: movement vector, aim point and
    /// fire-held state.
    pub fn set_input(&mut self, move_x: f32, move_y: f32, aim_x: f32, aim_y: f32, fire_held: bool) {
        let mut input = self.world.resource_mut::<PlayerInput>();
        input.move_x = move_x;
        input.move_y = move_y;
        input.aim_x = aim_x;
        input.aim_y = aim_y;
        input.fire_held = fire_held;
    }

    /// Trigger the special ability on the next tick.
    pub fn trigger_special(&mut self) {
        self.world.resource_mut::<PlayerInput>().special = true;
    }

    /// Current fire-held state, for external weapon logic.
    pub fn fire_held(&self) -> bool {
        self.world.resource::<PlayerInput>().fire_held
    }

    // ------------------------------------------------------------------
    // Queries and snapshots
    // ------------------------------------------------------------------

    /// Get a snapshot of the current simulation state.
    pub fn snapshot(&mut self) -> Snapshot {
        Snapshot::from_world(&mut self.world, self.tick, self.time)
    }

    /// Get the snapshot as a JSON string.
    pub fn snapshot_json(&mut self) -> String {
        self.snapshot()
            .to_json()
            .unwrap_or_else(|_| "{}".to_string())
    }

    /// Drain the events accumulated since the last call. Fire-and-forget;
    /// ordering across external listeners is not guaranteed.
    pub fn drain_events(&mut self) -> Vec<GameEvent> {
        std::mem::take(&mut self.world.resource_mut::<EventOutbox>().events)
    }

    /// Entities within `radius` of a point, nearest first, as of the last
    /// completed tick's spatial index.
    pub fn query_radius(&self, x: f32, y: f32, radius: f32) -> Vec<Entity> {
        self.world
            .resource::<SpatialGrid>()
            .query_radius(x, y, radius)
            .into_iter()
            .map(|entry| entry.entity)
            .collect()
    }

    pub fn chaos_level(&self) -> f32 {
        self.world.resource::<ChaosState>().level
    }

    pub fn chaos_tier(&self) -> ChaosTier {
        self.world.resource::<ChaosState>().tier
    }

    pub fn current_wave(&self) -> u32 {
        self.world.resource::<WaveState>().wave
    }

    /// Get the current tick number.
    pub fn current_tick(&self) -> u64 {
        self.tick
    }

    /// Get the elapsed simulation time.
    pub fn current_time(&self) -> f32 {
        self.time
    }

    /// Get direct access to the ECS world (for advanced usage).
    pub fn world(&self) -> &World {
        &self.world
    }

    /// Get mutable access to the ECS world (for advanced usage).
    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    // ------------------------------------------------------------------
    // Save / resume
    // ------------------------------------------------------------------

    /// Capture a save of the current session.
    pub fn save(&mut self) -> SaveState {
        SaveState::capture(&mut self.world)
    }

    /// Restore a previously captured session. All current entities are
    /// replaced; transient projectiles and effects are not part of the
    /// contract and simply vanish.
    pub fn restore(&mut self, save: &SaveState) -> Result<(), SimError> {
        save.validate()?;

        self.world.clear_entities();
        self.world.resource_mut::<EventQueue>().events.clear();
        self.world.resource_mut::<EventOutbox>().events.clear();
        *self.world.resource_mut::<PlayerInput>() = PlayerInput::default();

        {
            let mut wave = self.world.resource_mut::<WaveState>();
            wave.wave = save.wave.wave;
            wave.phase = save.wave.phase;
            wave.difficulty = save.wave.difficulty;
            wave.spawned = save.wave.spawned;
            wave.target = save.wave.target;
            wave.total_kills = save.wave.total_kills;
        }
        {
            let mut chaos = self.world.resource_mut::<ChaosState>();
            chaos.reset();
            chaos.level = save.chaos.level;
            chaos.tier = save.chaos.tier;
            chaos.combo = save.chaos.combo;
        }

        for entity in &save.entities {
            match entity.kind {
                Some(kind) => {
                    let mut bundle = EnemyBundle::new(kind, entity.x, entity.y);
                    bundle.transform.rotation = entity.rotation;
                    bundle.health.max = entity.health_max;
                    bundle.health.current = entity.health_current;
                    if let Some(mode) = entity.mode {
                        bundle.behavior.mode = mode;
                    }
                    self.world.spawn(bundle);
                }
                None => {
                    let mut bundle = PlayerBundle::new(entity.x, entity.y);
                    bundle.transform.rotation = entity.rotation;
                    bundle.health.max = entity.health_max;
                    bundle.health.current = entity.health_current;
                    if let Some(score) = entity.score {
                        bundle.score = score;
                    }
                    self.world.spawn(bundle);
                }
            }
        }
        Ok(())
    }

    /// Save as JSON.
    pub fn save_json(&mut self) -> Result<String, SimError> {
        self.save().to_json()
    }

    /// Restore from JSON.
    pub fn restore_json(&mut self, data: &str) -> Result<(), SimError> {
        let save = SaveState::from_json(data)?;
        self.restore(&save)
    }
}

impl Default for SimWorld {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::{Health, Score, Transform};

    /// Config with timers shrunk so whole waves fit in a short test run.
    fn fast_config() -> SimConfig {
        let mut config = SimConfig::default();
        config.wave.prewave_delay = 0.2;
        config.wave.base_spawn_interval = 0.2;
        config.wave.min_spawn_interval = 0.1;
        config.wave.spawn_jitter = 0.0;
        config
    }

    #[test]
    fn test_new_world() {
        let sim = SimWorld::new();
        assert_eq!(sim.current_tick(), 0);
        assert_eq!(sim.current_wave(), 0);
    }

    #[test]
    fn test_step_advances_fixed_ticks() {
        let mut sim = SimWorld::new();
        sim.step(1.0 / 60.0);
        assert_eq!(sim.current_tick(), 1);
        for _ in 0..3 {
            sim.step(1.0 / 60.0);
        }
        assert_eq!(sim.current_tick(), 4);
    }

    #[test]
    fn test_oversized_delta_discarded() {
        let mut sim = SimWorld::new();
        sim.step(0.5); // above max_step 0.1
        assert_eq!(sim.current_tick(), 0);
        sim.step(-1.0);
        assert_eq!(sim.current_tick(), 0);
    }

    #[test]
    fn test_destroy_entity_is_idempotent() {
        let mut sim = SimWorld::new();
        let player = sim.spawn_player(100.0, 100.0);
        assert!(sim.destroy_entity(player));
        assert!(!sim.destroy_entity(player));
    }

    #[test]
    fn test_input_moves_player() {
        let mut sim = SimWorld::new();
        let player = sim.spawn_player(600.0, 400.0);
        sim.set_input(1.0, 0.0, 700.0, 400.0, true);

        for _ in 0..30 {
            sim.step(1.0 / 60.0);
        }

        let x = sim.world().get::<Transform>(player).unwrap().x;
        assert!(x > 600.0);
        assert!(sim.fire_held());
    }

    #[test]
    fn test_game_loop_spawns_waves_and_emits_events() {
        let mut sim = SimWorld::with_config(fast_config());
        sim.spawn_player(600.0, 400.0);
        sim.start_game();

        for _ in 0..240 {
            sim.step(1.0 / 60.0); // 4 seconds
        }

        let events = sim.drain_events();
        assert!(events
            .iter()
            .any(|e| matches!(e, GameEvent::WaveStarted { wave: 1, .. })));
        assert!(events
            .iter()
            .any(|e| matches!(e, GameEvent::EnemySpawned { .. })));

        let snapshot = sim.snapshot();
        assert!(snapshot.wave.enemies_spawned > 0);
        assert!(snapshot.entities.len() > 1);
        // Health invariant at a tick boundary.
        for entity in &snapshot.entities {
            assert!(entity.health_fraction >= 0.0 && entity.health_fraction <= 1.0);
        }
    }

    #[test]
    fn test_projectile_kills_enemy_and_raises_chaos() {
        let mut sim = SimWorld::with_config(fast_config());
        let player = sim.spawn_player(600.0, 400.0);
        let enemy = sim.spawn_enemy(EnemyKind::Grunt, 700.0, 400.0);

        // Two bullets pointed straight at the grunt (50 HP, 30 damage each).
        for _ in 0..2 {
            sim.spawn_projectile(650.0, 400.0, 0.0, 400.0, 30.0, Some(player), false);
            for _ in 0..20 {
                sim.step(1.0 / 60.0);
            }
        }

        assert!(!sim.world().entities().contains(enemy));
        let events = sim.drain_events();
        assert!(events
            .iter()
            .any(|e| matches!(e, GameEvent::EnemyKilled { .. })));
        assert!(sim.chaos_level() > 0.0);
        let score = {
            let mut query = sim.world_mut().query::<&Score>();
            *query.iter(sim.world()).next().unwrap()
        };
        assert_eq!(score.kills, 1);
    }

    #[test]
    fn test_explosion_damages_enemies_in_radius() {
        let mut sim = SimWorld::with_config(fast_config());
        let enemy = sim.spawn_enemy(EnemyKind::Bruiser, 620.0, 400.0);
        sim.spawn_explosion(600.0, 400.0, 120.0, 45.0, None);

        for _ in 0..10 {
            sim.step(1.0 / 60.0);
        }

        let health = sim.world().get::<Health>(enemy).unwrap();
        assert!(health.current < health.max);
        let events = sim.drain_events();
        assert!(events
            .iter()
            .any(|e| matches!(e, GameEvent::ExplosionDamage { .. })));
    }

    #[test]
    fn test_save_restore_roundtrip() {
        let mut sim = SimWorld::with_config(fast_config());
        sim.spawn_player(600.0, 400.0);
        sim.start_game();
        for _ in 0..300 {
            sim.step(1.0 / 60.0);
        }

        let save = sim.save();
        let json = save.to_json().unwrap();
        let wave_before = sim.current_wave();
        let snapshot_before = sim.snapshot();

        let mut restored = SimWorld::with_config(fast_config());
        restored.restore_json(&json).unwrap();

        assert_eq!(restored.current_wave(), wave_before);
        let snapshot_after = restored.snapshot();
        assert_eq!(
            snapshot_after.entities.len(),
            snapshot_before
                .entities
                .iter()
                .filter(|e| e.kind.is_some() || e.tags.contains(&"player".to_string()))
                .count()
        );
        assert!((snapshot_after.chaos.level - snapshot_before.chaos.level).abs() < 0.001);
    }

    #[test]
    fn test_clear_enemies_drops_wave_leftovers() {
        let mut sim = SimWorld::new();
        sim.spawn_enemy(EnemyKind::Grunt, 100.0, 100.0);
        sim.spawn_enemy(EnemyKind::Boss, 200.0, 200.0);
        sim.clear_enemies();
        sim.step(1.0 / 60.0);

        let mut query = sim.world_mut().query::<&EnemyKind>();
        assert_eq!(query.iter(sim.world()).count(), 0);
    }

    #[test]
    fn test_snapshot_json_has_sections() {
        let mut sim = SimWorld::new();
        sim.spawn_player(1.0, 2.0);
        let json = sim.snapshot_json();
        assert!(json.contains("entities"));
        assert!(json.contains("wave"));
        assert!(json.contains("chaos"));
    }
}
