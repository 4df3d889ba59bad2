//! Health bookkeeping and the one-shot death transition.

use bevy_ecs::prelude::*;
use tracing::debug;

use crate::archetype::EnemyKind;
use crate::components::{Dead, Health, Score, ScoreValue, Tag, Tags};
use crate::events::{EventQueue, GameEvent};
use crate::systems::{DeltaTime, SimClock};

/// System that advances per-entity health timers: invulnerability
/// countdown, passive regeneration, and damage-history pruning.
pub fn health_tick_system(
    dt: Res<DeltaTime>,
    clock: Res<SimClock>,
    mut query: Query<&mut Health, Without<Dead>>,
) {
    let delta = dt.0;
    for mut health in query.iter_mut() {
        if health.invulnerable_for > 0.0 {
            health.invulnerable_for = (health.invulnerable_for - delta).max(0.0);
        }
        if health.regen_rate > 0.0 && health.is_alive() && health.current < health.max {
            let amount = health.regen_rate * delta;
            health.heal(amount);
        }
        health.prune_damage_log(clock.time);
    }
}

/// System that fires the death transition exactly once per entity.
///
/// Runs after every damage source in the tick. Emits kill/death events,
/// credits the killer's score, and marks the entity for the end-of-tick
/// sweep. The `died` latch guarantees a single firing even if the entity
/// survives in storage for the rest of the tick.
pub fn death_system(
    mut query: Query<
        (
            Entity,
            &mut Health,
            &Tags,
            Option<&EnemyKind>,
            Option<&ScoreValue>,
        ),
        Without<Dead>,
    >,
    mut scores: Query<&mut Score>,
    mut queue: ResMut<EventQueue>,
    mut commands: Commands,
) {
    for (entity, mut health, tags, kind, score_value) in query.iter_mut() {
        debug_assert!(health.current >= 0.0, "health must never go negative");
        if health.is_alive() || health.died {
            continue;
        }
        health.died = true;
        commands.entity(entity).insert(Dead);

        let killer = health.last_damager;
        if let Some(&kind) = kind {
            let points = score_value.map(|s| s.0).unwrap_or(0);
            if let Some(killer) = killer {
                if let Ok(mut score) = scores.get_mut(killer) {
                    score.points += points as u64;
                    score.kills += 1;
                }
            }
            debug!(kind = kind.name(), points, "enemy killed");
            queue.emit(GameEvent::EnemyKilled {
                enemy: entity,
                killer,
                kind,
                points,
            });
            if kind.is_elite() {
                queue.emit(GameEvent::BossDefeated {
                    boss: entity,
                    killer,
                });
            }
        } else if tags.contains(Tag::Player) {
            debug!("player died");
            queue.emit(GameEvent::PlayerDied { player: entity });
        }
    }
}
