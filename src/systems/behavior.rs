//! Enemy behavior: target acquisition, the per-enemy state machine,
//! archetype-specific movement and attacks, and the elite phase machine.
//!
//! Decision evaluation is throttled (~100 ms) and target acquisition more so
//! (~500 ms) to bound cost; both are plain countdowns on the behavior state.
//! Movement is expressed as forces handed to the integrator on the next
//! physics pass.

use bevy_ecs::prelude::*;
use rand::Rng;
use std::collections::HashSet;
use tracing::{debug, info};

use crate::archetype::{
    max_minions, phase_aggro_range, phase_for_health, phase_pattern_cooldown, phase_patterns,
    phase_rate_multiplier, AttackPattern, EnemyKind, PHASE_TRANSITION_INVULN,
};
use crate::components::{
    AreaEffect, AreaEffectBundle, BehaviorMode, BehaviorState, ContactDamage, Dead, EnemyBundle,
    Health, Motion, PlayerControlled, ProjectileBundle, Tag, Transform,
};
use crate::events::{EventQueue, GameEvent};
use crate::spatial::SpatialGrid;
use crate::systems::{DeltaTime, SimClock, SimRng};

/// Seconds between decision evaluations.
const DECISION_INTERVAL: f32 = 0.1;
/// Seconds between target acquisitions.
const RETARGET_INTERVAL: f32 = 0.5;

const SEEK_FORCE: f32 = 300.0;
const FLEE_FORCE: f32 = 400.0;
const WANDER_FORCE: f32 = 100.0;
const WANDER_CHANCE: f32 = 0.1;

/// Travel below this per decision counts toward the stuck timer.
const STUCK_DISTANCE: f32 = 1.0;
const STUCK_DURATION: f32 = 2.0;
const UNSTUCK_IMPULSE: f32 = 500.0;

const CHARGE_FORCE: f32 = 800.0;
const CHARGE_DURATION: f32 = 1.0;
const GRUNT_CHARGE_DISTANCE: f32 = 150.0;
const GRUNT_CHARGE_COOLDOWN: f32 = 3.0;
const GRUNT_KNOCKBACK_CHANCE: f32 = 0.3;
const GRUNT_KNOCKBACK: f32 = 300.0;

const SPITTER_KEEP_DISTANCE: f32 = 120.0;
const SPITTER_RETREAT_FORCE: f32 = 250.0;
const SPITTER_APPROACH_FORCE: f32 = 200.0;
const SPITTER_PROJECTILE_SPEED: f32 = 400.0;
const SPITTER_ACCURACY: f32 = 0.8;

const BRUISER_SLAM_COOLDOWN: f32 = 5.0;
const BRUISER_WINDUP: f32 = 0.8;
const ELITE_WINDUP: f32 = 0.5;

// ============================================================================
// STATE MACHINE
// ============================================================================

/// Pure transition function for the behavior state machine.
///
/// The flee check runs first and overrides everything else; archetypes with
/// no flee threshold skip it entirely. Otherwise the mode follows distance
/// to the current target.
pub fn next_mode(
    flee_threshold: Option<f32>,
    health_fraction: f32,
    target_dist: Option<f32>,
    attack_range: f32,
    aggro_range: f32,
) -> BehaviorMode {
    if let Some(threshold) = flee_threshold {
        if health_fraction < threshold {
            return BehaviorMode::Fleeing;
        }
    }
    match target_dist {
        Some(d) if d <= attack_range => BehaviorMode::Attacking,
        Some(d) if d <= aggro_range => BehaviorMode::Seeking,
        _ => BehaviorMode::Idle,
    }
}

/// System that drives target acquisition, transitions and movement for
/// every enemy.
pub fn behavior_system(
    dt: Res<DeltaTime>,
    grid: Res<SpatialGrid>,
    mut rng: ResMut<SimRng>,
    mut enemies: Query<
        (
            Entity,
            &EnemyKind,
            &mut Transform,
            &mut Motion,
            &Health,
            &mut BehaviorState,
        ),
        Without<Dead>,
    >,
    players: Query<(&Transform, &Health), (With<PlayerControlled>, Without<EnemyKind>)>,
) {
    let delta = dt.0;

    for (_entity, &kind, mut transform, mut motion, health, mut behavior) in enemies.iter_mut() {
        if !health.is_alive() {
            continue;
        }
        let stats = kind.stats();

        // Cooldown bookkeeping runs every tick.
        behavior.decision_timer -= delta;
        behavior.retarget_timer -= delta;
        behavior.attack_cooldown = (behavior.attack_cooldown - delta).max(0.0);
        behavior.charge_cooldown = (behavior.charge_cooldown - delta).max(0.0);
        behavior.slam_cooldown = (behavior.slam_cooldown - delta).max(0.0);

        // Locked-direction charge keeps pushing while its timer runs.
        if behavior.charge_timer > 0.0 {
            behavior.charge_timer -= delta;
            let (cx, cy) = behavior.charge_dir;
            motion.apply_force(cx * CHARGE_FORCE, cy * CHARGE_FORCE);
        }

        // Throttled target acquisition: nearest alive player within aggro
        // range, ties broken by lowest entity id for determinism.
        if behavior.retarget_timer <= 0.0 {
            behavior.retarget_timer = RETARGET_INTERVAL;
            behavior.target = grid
                .query_tagged(transform.x, transform.y, behavior.aggro_range, Tag::Player)
                .first()
                .map(|entry| entry.entity);
        }

        if behavior.decision_timer > 0.0 {
            continue;
        }
        behavior.decision_timer = DECISION_INTERVAL;

        // Stale-target cleanup: a reference that no longer resolves is
        // cleared and re-acquired on the next retarget cycle.
        let target_pose = behavior.target.and_then(|t| players.get(t).ok());
        let target_pose = match target_pose {
            Some((pose, target_health)) if target_health.is_alive() => Some(*pose),
            _ => {
                behavior.target = None;
                None
            }
        };
        let target_dist = target_pose.map(|pose| transform.distance_to(&pose));

        // Anti-stuck: barely moving while seeking earns a randomized kick.
        if behavior.mode == BehaviorMode::Seeking {
            let moved = ((transform.x - behavior.last_x).powi(2)
                + (transform.y - behavior.last_y).powi(2))
            .sqrt();
            if moved < STUCK_DISTANCE {
                behavior.stuck_timer += DECISION_INTERVAL;
                if behavior.stuck_timer > STUCK_DURATION {
                    let angle = rng.0.gen_range(0.0..std::f32::consts::TAU);
                    motion.apply_impulse(angle.cos() * UNSTUCK_IMPULSE, angle.sin() * UNSTUCK_IMPULSE);
                    behavior.stuck_timer = 0.0;
                }
            } else {
                behavior.stuck_timer = 0.0;
            }
        } else {
            behavior.stuck_timer = 0.0;
        }
        behavior.last_x = transform.x;
        behavior.last_y = transform.y;

        let mode = next_mode(
            stats.flee_threshold,
            health.fraction(),
            target_dist,
            stats.attack_range,
            behavior.aggro_range,
        );
        if mode != behavior.mode {
            debug!(kind = kind.name(), from = behavior.mode.name(), to = mode.name(), "behavior transition");
            behavior.mode = mode;
        }

        match behavior.mode {
            BehaviorMode::Idle => {
                if rng.0.gen::<f32>() < WANDER_CHANCE {
                    let angle = rng.0.gen_range(0.0..std::f32::consts::TAU);
                    motion.apply_force(angle.cos() * WANDER_FORCE, angle.sin() * WANDER_FORCE);
                }
            }
            BehaviorMode::Seeking => {
                let Some(pose) = target_pose else { continue };
                let dist = transform.distance_to(&pose);
                let (dx, dy) = transform.direction_to(&pose);
                match kind {
                    EnemyKind::Grunt => {
                        // Charge when in the charge band and off cooldown.
                        if behavior.charge_cooldown <= 0.0
                            && dist > stats.attack_range
                            && dist <= GRUNT_CHARGE_DISTANCE
                        {
                            behavior.charge_dir = (dx, dy);
                            behavior.charge_timer = CHARGE_DURATION;
                            behavior.charge_cooldown = GRUNT_CHARGE_COOLDOWN;
                        } else {
                            motion.apply_force(dx * SEEK_FORCE, dy * SEEK_FORCE);
                        }
                    }
                    EnemyKind::Spitter => {
                        // Maintain the stand-off band.
                        if dist < SPITTER_KEEP_DISTANCE {
                            motion.apply_force(
                                -dx * SPITTER_RETREAT_FORCE,
                                -dy * SPITTER_RETREAT_FORCE,
                            );
                        } else if dist > stats.attack_range {
                            motion.apply_force(
                                dx * SPITTER_APPROACH_FORCE,
                                dy * SPITTER_APPROACH_FORCE,
                            );
                        }
                    }
                    _ => {
                        motion.apply_force(dx * SEEK_FORCE, dy * SEEK_FORCE);
                    }
                }
                transform.face(pose.x, pose.y);
            }
            BehaviorMode::Attacking => {
                if let Some(pose) = target_pose {
                    transform.face(pose.x, pose.y);
                    // Spitters hold their stand-off band while attacking.
                    if kind == EnemyKind::Spitter {
                        let dist = transform.distance_to(&pose);
                        if dist < SPITTER_KEEP_DISTANCE {
                            let (dx, dy) = transform.direction_to(&pose);
                            motion.apply_force(
                                -dx * SPITTER_RETREAT_FORCE,
                                -dy * SPITTER_RETREAT_FORCE,
                            );
                        }
                    }
                }
            }
            BehaviorMode::Fleeing => {
                if let Some(pose) = target_pose {
                    let (dx, dy) = transform.direction_to(&pose);
                    motion.apply_force(-dx * FLEE_FORCE, -dy * FLEE_FORCE);
                }
            }
        }
    }
}

// ============================================================================
// ATTACKS
// ============================================================================

fn slam_params(kind: EnemyKind, phase: u8) -> (f32, f32, f32) {
    // (range, damage, knockback)
    match kind {
        EnemyKind::Bruiser => (80.0, 60.0, 500.0),
        EnemyKind::MiniBoss => (90.0, 50.0 + 10.0 * phase as f32, 600.0),
        EnemyKind::Boss => (120.0, 100.0 + 25.0 * phase as f32, 800.0),
        _ => (0.0, 0.0, 0.0),
    }
}

fn burst_damage(kind: EnemyKind, phase: u8) -> f32 {
    match kind {
        EnemyKind::Boss => 40.0 + 10.0 * phase as f32,
        _ => 30.0 + 5.0 * phase as f32,
    }
}

/// System that executes attacks for enemies in `Attacking` mode with an
/// expired cooldown, plus pending slam windups regardless of mode.
pub fn attack_system(
    dt: Res<DeltaTime>,
    clock: Res<SimClock>,
    mut rng: ResMut<SimRng>,
    mut enemies: Query<
        (
            Entity,
            &EnemyKind,
            &Transform,
            &ContactDamage,
            &mut BehaviorState,
        ),
        Without<Dead>,
    >,
    mut victims: Query<
        (Entity, &Transform, &mut Health, &mut Motion),
        (With<PlayerControlled>, Without<EnemyKind>),
    >,
    mut queue: ResMut<EventQueue>,
    mut commands: Commands,
) {
    let delta = dt.0;
    let now = clock.time;
    let alive: HashSet<Entity> = enemies.iter().map(|item| item.0).collect();

    for (entity, &kind, transform, contact, mut behavior) in enemies.iter_mut() {
        // Resolve a pending slam windup first; the countdown lives on the
        // owning entity, so a dead enemy's slam simply never lands.
        if behavior.windup_timer > 0.0 {
            behavior.windup_timer -= delta;
            if behavior.windup_timer <= 0.0 {
                let (range, damage, knockback) = slam_params(kind, behavior.phase);
                slam(
                    entity, transform, range, damage, knockback, &mut victims, &mut *queue, now,
                );
            }
            continue;
        }

        if behavior.mode != BehaviorMode::Attacking
            || behavior.attack_cooldown > 0.0
            || behavior.is_transitioning()
        {
            continue;
        }
        let Some(target) = behavior.target else {
            continue;
        };
        let Ok((_, target_pose, _, _)) = victims.get(target) else {
            behavior.target = None;
            continue;
        };
        let target_pose = *target_pose;
        let aim = transform.angle_to(&target_pose);

        if kind.is_elite() {
            let patterns = phase_patterns(kind, behavior.phase);
            if patterns.is_empty() {
                continue;
            }
            let pattern = patterns[behavior.pattern_index as usize % patterns.len()];
            behavior.pattern_index = behavior.pattern_index.wrapping_add(1);
            behavior.attack_cooldown = phase_pattern_cooldown(behavior.phase);

            match pattern {
                AttackPattern::Burst(count) => {
                    spawn_burst(
                        &mut commands,
                        transform,
                        aim,
                        count,
                        burst_damage(kind, behavior.phase),
                    );
                }
                AttackPattern::Slam => {
                    behavior.windup_timer = ELITE_WINDUP;
                }
                AttackPattern::Shockwave => {
                    let (damage, max_radius) = match kind {
                        EnemyKind::Boss => (60.0 + 15.0 * behavior.phase as f32, 400.0),
                        _ => (40.0 + 10.0 * behavior.phase as f32, 250.0),
                    };
                    commands.spawn(AreaEffectBundle::new(
                        transform.x,
                        transform.y,
                        20.0,
                        AreaEffect {
                            damage,
                            growth: 300.0,
                            max_radius,
                            target: Tag::Player,
                            knockback: 600.0,
                            source: Some(entity),
                            hit: Vec::new(),
                        },
                        5.0,
                    ));
                }
                AttackPattern::Charge => {
                    behavior.charge_dir = (aim.cos(), aim.sin());
                    behavior.charge_timer = CHARGE_DURATION;
                }
                AttackPattern::Laser => {
                    spawn_laser(&mut commands, entity, transform, aim, behavior.phase);
                }
                AttackPattern::Summon => {
                    behavior.minions.retain(|m| alive.contains(m));
                    let cap = max_minions(kind);
                    let room = cap.saturating_sub(behavior.minions.len());
                    for i in 0..room.min(2) {
                        let angle = rng.0.gen_range(0.0..std::f32::consts::TAU);
                        let minion_kind = if (behavior.pattern_index + i as u32) % 2 == 0 {
                            EnemyKind::Grunt
                        } else {
                            EnemyKind::Spitter
                        };
                        let minion = commands
                            .spawn(EnemyBundle::new(
                                minion_kind,
                                transform.x + angle.cos() * 100.0,
                                transform.y + angle.sin() * 100.0,
                            ))
                            .id();
                        behavior.minions.push(minion);
                    }
                }
            }
            continue;
        }

        behavior.attack_cooldown = behavior.attack_rate;
        match kind {
            EnemyKind::Spitter => {
                // Aimed shot with accuracy-scaled angular error.
                let max_error = (1.0 - SPITTER_ACCURACY) * std::f32::consts::FRAC_PI_4;
                let error = (rng.0.gen::<f32>() - 0.5) * max_error;
                let angle = aim + error;
                commands.spawn(ProjectileBundle::new(
                    Tag::EnemyProjectile,
                    transform.x + angle.cos() * 20.0,
                    transform.y + angle.sin() * 20.0,
                    angle,
                    SPITTER_PROJECTILE_SPEED,
                    contact.0,
                ));
            }
            EnemyKind::Bruiser if behavior.slam_cooldown <= 0.0 => {
                let (range, _, _) = slam_params(kind, behavior.phase);
                if transform.distance_to(&target_pose) <= range {
                    behavior.windup_timer = BRUISER_WINDUP;
                    behavior.slam_cooldown = BRUISER_SLAM_COOLDOWN;
                } else {
                    melee(entity, kind, contact.0, target, &mut victims, &mut *rng, &mut *queue, now);
                }
            }
            _ => {
                melee(entity, kind, contact.0, target, &mut victims, &mut *rng, &mut *queue, now);
            }
        }
    }
}

/// Plain melee hit against the current target.
#[allow(clippy::too_many_arguments)]
fn melee(
    attacker: Entity,
    kind: EnemyKind,
    damage: f32,
    target: Entity,
    victims: &mut Query<
        (Entity, &Transform, &mut Health, &mut Motion),
        (With<PlayerControlled>, Without<EnemyKind>),
    >,
    rng: &mut SimRng,
    queue: &mut EventQueue,
    now: f32,
) {
    let Ok((_, _, mut health, mut motion)) = victims.get_mut(target) else {
        return;
    };
    let dealt = health.apply_damage(damage, Some(attacker), now);
    if dealt > 0.0 {
        queue.emit(GameEvent::PlayerDamaged {
            player: target,
            amount: dealt,
            hp_fraction: health.fraction(),
        });
        if kind == EnemyKind::Grunt && rng.0.gen::<f32>() < GRUNT_KNOCKBACK_CHANCE {
            let angle = rng.0.gen_range(0.0..std::f32::consts::TAU);
            motion.apply_impulse(angle.cos() * GRUNT_KNOCKBACK, angle.sin() * GRUNT_KNOCKBACK);
        }
    }
}

/// Area slam landing: damage plus radial knockback for every player in
/// range.
#[allow(clippy::too_many_arguments)]
fn slam(
    attacker: Entity,
    center: &Transform,
    range: f32,
    damage: f32,
    knockback: f32,
    victims: &mut Query<
        (Entity, &Transform, &mut Health, &mut Motion),
        (With<PlayerControlled>, Without<EnemyKind>),
    >,
    queue: &mut EventQueue,
    now: f32,
) {
    for (victim, pose, mut health, mut motion) in victims.iter_mut() {
        if center.distance_to(pose) > range {
            continue;
        }
        let dealt = health.apply_damage(damage, Some(attacker), now);
        if dealt > 0.0 {
            queue.emit(GameEvent::PlayerDamaged {
                player: victim,
                amount: dealt,
                hp_fraction: health.fraction(),
            });
            let (dx, dy) = center.direction_to(pose);
            motion.apply_impulse(dx * knockback, dy * knockback);
        }
    }
}

fn spawn_burst(commands: &mut Commands, origin: &Transform, aim: f32, count: u32, damage: f32) {
    let spread = std::f32::consts::FRAC_PI_2;
    for i in 0..count {
        let angle = if count > 1 {
            aim + (i as f32 - (count - 1) as f32 / 2.0) * (spread / (count - 1) as f32)
        } else {
            aim
        };
        commands.spawn(ProjectileBundle::new(
            Tag::EnemyProjectile,
            origin.x + angle.cos() * 40.0,
            origin.y + angle.sin() * 40.0,
            angle,
            600.0,
            damage,
        ));
    }
}

/// A line of short-lived beam segments toward the target.
fn spawn_laser(commands: &mut Commands, source: Entity, origin: &Transform, aim: f32, phase: u8) {
    const SEGMENTS: u32 = 8;
    const SPACING: f32 = 50.0;
    let damage = 80.0 + 20.0 * phase as f32;
    for i in 1..=SEGMENTS {
        let x = origin.x + aim.cos() * (i as f32 * SPACING);
        let y = origin.y + aim.sin() * (i as f32 * SPACING);
        commands.spawn(AreaEffectBundle::new(
            x,
            y,
            20.0,
            AreaEffect {
                damage,
                growth: 0.0,
                max_radius: 20.0,
                target: Tag::Player,
                knockback: 0.0,
                source: Some(source),
                hit: Vec::new(),
            },
            0.5,
        ));
    }
}

// ============================================================================
// ELITE PHASES
// ============================================================================

/// System that advances elite phase machines on health-fraction
/// breakpoints. Each transition is one-shot: guarded by the transition
/// window, it grants invulnerability, speeds up the attack cadence, widens
/// aggro and resets the pattern cycle.
pub fn phase_system(
    dt: Res<DeltaTime>,
    mut query: Query<(&EnemyKind, &mut Health, &mut BehaviorState), Without<Dead>>,
) {
    let delta = dt.0;
    for (&kind, mut health, mut behavior) in query.iter_mut() {
        if !kind.is_elite() {
            continue;
        }
        if behavior.transition_timer > 0.0 {
            behavior.transition_timer -= delta;
            continue;
        }
        let new_phase = phase_for_health(kind, health.fraction());
        if new_phase > behavior.phase {
            info!(kind = kind.name(), phase = new_phase, "phase transition");
            behavior.phase = new_phase;
            behavior.transition_timer = PHASE_TRANSITION_INVULN;
            health.set_invulnerable(PHASE_TRANSITION_INVULN);
            behavior.attack_rate *= phase_rate_multiplier(new_phase);
            behavior.aggro_range = phase_aggro_range(kind, new_phase);
            behavior.pattern_index = 0;
            behavior.attack_cooldown = 0.0;
        }
    }
}
