//! Motion integration and world-boundary handling.

use bevy_ecs::prelude::*;

use crate::components::{Dead, Motion, Tag, Tags, Transform};
use crate::config::SimConfig;
use crate::systems::DeltaTime;

/// System that integrates velocity and position for all bodies.
///
/// Per tick and body: apply accumulated forces, clamp to max speed, apply
/// drag and friction, integrate position, reset the force accumulator.
/// `fixed` bodies never move; `kinematic` bodies skip the force branch but
/// still move under their velocity.
pub fn integrate_system(dt: Res<DeltaTime>, mut query: Query<(&mut Transform, &mut Motion), Without<Dead>>) {
    let delta = dt.0;
    for (mut transform, mut motion) in query.iter_mut() {
        if motion.fixed {
            motion.fx = 0.0;
            motion.fy = 0.0;
            continue;
        }

        if !motion.kinematic {
            let ax = motion.fx / motion.mass;
            let ay = motion.fy / motion.mass;
            motion.vx += ax * delta;
            motion.vy += ay * delta;

            motion.clamp_speed();

            let damp = motion.drag * motion.friction;
            motion.vx *= damp;
            motion.vy *= damp;
        }

        transform.x += motion.vx * delta;
        transform.y += motion.vy * delta;

        motion.fx = 0.0;
        motion.fy = 0.0;
    }
}

/// System that resolves world-boundary contact, tag-dependent:
/// players and enemies are clamped inside and their velocity reflected,
/// scaled by bounciness; projectiles are destroyed once fully outside.
pub fn bounds_system(
    config: Res<SimConfig>,
    mut query: Query<(Entity, &Tags, &mut Transform, &mut Motion), Without<Dead>>,
    mut commands: Commands,
) {
    let (width, height) = (config.world_width, config.world_height);

    for (entity, tags, mut transform, mut motion) in query.iter_mut() {
        let radius = motion.radius;

        if tags.contains_any(&[Tag::Player, Tag::Enemy]) {
            if transform.x < radius {
                transform.x = radius;
                motion.vx = motion.vx.abs() * motion.bounciness;
            }
            if transform.x > width - radius {
                transform.x = width - radius;
                motion.vx = -motion.vx.abs() * motion.bounciness;
            }
            if transform.y < radius {
                transform.y = radius;
                motion.vy = motion.vy.abs() * motion.bounciness;
            }
            if transform.y > height - radius {
                transform.y = height - radius;
                motion.vy = -motion.vy.abs() * motion.bounciness;
            }
        } else if tags.contains_any(&[Tag::Bullet, Tag::EnemyProjectile]) {
            let outside = transform.x < -radius
                || transform.x > width + radius
                || transform.y < -radius
                || transform.y > height + radius;
            if outside {
                commands.entity(entity).insert(Dead);
            }
        }
    }
}
