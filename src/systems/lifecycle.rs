//! Lifetime countdowns, area-effect growth and the deferred despawn sweep.

use bevy_ecs::prelude::*;

use crate::components::{AreaEffect, Dead, Lifetime, Motion};
use crate::systems::DeltaTime;

/// System that decrements lifetimes and marks expired entities.
pub fn lifetime_system(
    dt: Res<DeltaTime>,
    mut query: Query<(Entity, &mut Lifetime), Without<Dead>>,
    mut commands: Commands,
) {
    let delta = dt.0;
    for (entity, mut lifetime) in query.iter_mut() {
        lifetime.0 -= delta;
        if lifetime.0 <= 0.0 {
            commands.entity(entity).insert(Dead);
        }
    }
}

/// System that expands growing damage regions. The region's collision
/// radius tracks the expansion so the interaction table picks up newly
/// covered targets; at max radius the region is destroyed.
pub fn area_growth_system(
    dt: Res<DeltaTime>,
    mut query: Query<(Entity, &AreaEffect, &mut Motion), Without<Dead>>,
    mut commands: Commands,
) {
    let delta = dt.0;
    for (entity, area, mut motion) in query.iter_mut() {
        if area.growth <= 0.0 {
            continue;
        }
        motion.radius = (motion.radius + area.growth * delta).min(area.max_radius);
        if motion.radius >= area.max_radius {
            commands.entity(entity).insert(Dead);
        }
    }
}

/// System that sweeps entities marked [`Dead`]. Runs last; destruction is
/// batched here so no earlier pass ever iterates a half-destroyed entity.
/// Despawning releases all components atomically.
pub fn despawn_system(query: Query<Entity, With<Dead>>, mut commands: Commands) {
    for entity in query.iter() {
        commands.entity(entity).despawn();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::Tag;

    fn run<M>(world: &mut World, system: impl IntoSystemConfigs<M>) {
        let mut schedule = Schedule::default();
        schedule.add_systems(system);
        schedule.run(world);
    }

    #[test]
    fn test_lifetime_expiry_marks_dead() {
        let mut world = World::new();
        world.insert_resource(DeltaTime(0.5));

        let entity = world.spawn(Lifetime(0.4)).id();
        run(&mut world, lifetime_system);
        assert!(world.get::<Dead>(entity).is_some());
    }

    #[test]
    fn test_despawn_sweep_removes_marked() {
        let mut world = World::new();
        let doomed = world.spawn(Dead).id();
        let alive = world.spawn(Lifetime(10.0)).id();

        run(&mut world, despawn_system);

        assert!(!world.entities().contains(doomed));
        assert!(world.entities().contains(alive));
    }

    #[test]
    fn test_area_growth_caps_and_expires() {
        let mut world = World::new();
        world.insert_resource(DeltaTime(0.5));

        let entity = world
            .spawn((
                AreaEffect {
                    damage: 10.0,
                    growth: 100.0,
                    max_radius: 120.0,
                    target: Tag::Player,
                    knockback: 0.0,
                    source: None,
                    hit: Vec::new(),
                },
                Motion {
                    radius: 20.0,
                    fixed: true,
                    ..Default::default()
                },
            ))
            .id();

        run(&mut world, area_growth_system);
        assert!((world.get::<Motion>(entity).unwrap().radius - 70.0).abs() < 0.001);
        assert!(world.get::<Dead>(entity).is_none());

        run(&mut world, area_growth_system);
        assert!((world.get::<Motion>(entity).unwrap().radius - 120.0).abs() < 0.001);
        assert!(world.get::<Dead>(entity).is_some());
    }
}
