//! Typed event queue for cross-system notifications.
//!
//! Systems push [`GameEvent`]s into the [`EventQueue`] resource; consumers
//! inside the core (the chaos controller) read the queue during their pass,
//! and at the end of every tick the queue is moved into the [`EventOutbox`]
//! for external collaborators to drain. One queue, drained once per tick in
//! a fixed order — event processing does not depend on listener
//! registration order.

use bevy_ecs::prelude::*;

use crate::archetype::EnemyKind;
use crate::systems::chaos::ChaosTier;

/// Notification emitted by the simulation core.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GameEvent {
    EnemySpawned {
        enemy: Entity,
        kind: EnemyKind,
        wave: u32,
    },
    EnemyKilled {
        enemy: Entity,
        killer: Option<Entity>,
        kind: EnemyKind,
        points: u32,
    },
    PlayerDamaged {
        player: Entity,
        amount: f32,
        /// Health fraction after the hit, for near-death detection.
        hp_fraction: f32,
    },
    PlayerDied {
        player: Entity,
    },
    WaveStarted {
        wave: u32,
        enemy_count: u32,
        is_boss_wave: bool,
    },
    WaveCompleted {
        wave: u32,
        bonus: u32,
    },
    BossSpawned {
        wave: u32,
        kind: EnemyKind,
    },
    BossDefeated {
        boss: Entity,
        killer: Option<Entity>,
    },
    ChaosLevelChanged {
        level: f32,
        tier: ChaosTier,
    },
    ExplosionDamage {
        x: f32,
        y: f32,
        radius: f32,
        damage: f32,
        source: Option<Entity>,
    },
    PickupCollected {
        player: Entity,
        pickup: Entity,
    },
    SpecialAbilityUsed {
        player: Entity,
    },
}

/// Events emitted during the current tick, in emission order.
#[derive(Resource, Debug, Default)]
pub struct EventQueue {
    pub events: Vec<GameEvent>,
}

impl EventQueue {
    pub fn emit(&mut self, event: GameEvent) {
        self.events.push(event);
    }
}

/// Events accumulated for the embedder, moved out of the queue at the end
/// of each tick and drained via `SimWorld::drain_events`.
#[derive(Resource, Debug, Default)]
pub struct EventOutbox {
    pub events: Vec<GameEvent>,
}

/// Moves this tick's events into the outbox. Runs last, after every
/// internal consumer has seen the queue.
pub fn event_outbox_system(mut queue: ResMut<EventQueue>, mut outbox: ResMut<EventOutbox>) {
    outbox.events.append(&mut queue.events);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outbox_drains_queue_in_order() {
        let mut world = World::new();
        world.insert_resource(EventQueue::default());
        world.insert_resource(EventOutbox::default());

        world
            .resource_mut::<EventQueue>()
            .emit(GameEvent::WaveStarted {
                wave: 1,
                enemy_count: 8,
                is_boss_wave: false,
            });
        world
            .resource_mut::<EventQueue>()
            .emit(GameEvent::WaveCompleted { wave: 1, bonus: 100 });

        let mut schedule = Schedule::default();
        schedule.add_systems(event_outbox_system);
        schedule.run(&mut world);

        let outbox = world.resource::<EventOutbox>();
        assert_eq!(outbox.events.len(), 2);
        assert!(matches!(outbox.events[0], GameEvent::WaveStarted { wave: 1, .. }));
        assert!(world.resource::<EventQueue>().events.is_empty());
    }
}
