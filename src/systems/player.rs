//! Player input intents.
//!
//! The external input layer writes discrete intents into [`PlayerInput`];
//! this system consumes them once per tick. The core never polls a raw
//! input device.

use bevy_ecs::prelude::*;
use tracing::debug;

use crate::components::{Dead, Health, Motion, PlayerControlled, Transform};
use crate::events::{EventQueue, GameEvent};
use crate::systems::DeltaTime;

/// Discrete input intents supplied by the external input/UI layer.
#[derive(Resource, Debug, Clone, Copy, Default)]
pub struct PlayerInput {
    /// Movement vector, each axis in [-1, 1].
    pub move_x: f32,
    pub move_y: f32,
    /// Aim target point in world coordinates.
    pub aim_x: f32,
    pub aim_y: f32,
    /// Held state of the fire control; read by external weapon logic.
    pub fire_held: bool,
    /// One-shot special-ability trigger, cleared after consumption.
    pub special: bool,
}

/// System that applies input intents to player-controlled entities.
pub fn player_input_system(
    dt: Res<DeltaTime>,
    mut input: ResMut<PlayerInput>,
    mut query: Query<
        (
            Entity,
            &mut Transform,
            &mut Motion,
            &mut Health,
            &mut PlayerControlled,
        ),
        Without<Dead>,
    >,
    mut queue: ResMut<EventQueue>,
) {
    let delta = dt.0;
    let special = input.special;
    input.special = false;

    for (entity, mut transform, mut motion, mut health, mut control) in query.iter_mut() {
        if control.cooldown_timer > 0.0 {
            control.cooldown_timer = (control.cooldown_timer - delta).max(0.0);
        }
        if !health.is_alive() {
            continue;
        }

        let mag = (input.move_x * input.move_x + input.move_y * input.move_y).sqrt();
        if mag > 0.001 {
            let scale = if mag > 1.0 { 1.0 / mag } else { 1.0 };
            let force = control.move_force;
            motion.apply_force(input.move_x * scale * force, input.move_y * scale * force);
        }

        transform.face(input.aim_x, input.aim_y);

        if special && control.cooldown_timer <= 0.0 {
            control.cooldown_timer = control.special_cooldown;
            health.set_invulnerable(control.special_invuln);
            debug!("special ability used");
            queue.emit(GameEvent::SpecialAbilityUsed { player: entity });
        }
    }
}
