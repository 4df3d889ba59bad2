//! Collision resolution: pair detection over the spatial grid, tag-table
//! filtering, kind-specific contact effects, and mass-proportional
//! separation.
//!
//! Mirrors the two-phase shape used throughout the core: a read-only gather
//! pass collects intents, then an apply pass commits them. Damage,
//! knockback and separation from one pair can therefore never disturb the
//! evaluation of another pair in the same tick.

use bevy_ecs::prelude::*;
use std::collections::HashSet;

use crate::components::{
    AreaEffect, ContactDamage, Dead, Health, Motion, Pickup, Projectile, Score, Tag, Tags,
    Transform,
};
use crate::events::{EventQueue, GameEvent};
use crate::spatial::SpatialGrid;
use crate::systems::SimClock;

/// Invulnerability window granted by enemy touch damage.
const TOUCH_INVULN: f32 = 1.0;

/// Tag-based interaction table. Pairs not listed here are never checked;
/// notably projectiles ignore each other.
fn interaction_allowed(a: &Tags, b: &Tags) -> bool {
    let pair = |x: Tag, y: Tag| (a.contains(x) && b.contains(y)) || (a.contains(y) && b.contains(x));
    pair(Tag::Bullet, Tag::Enemy)
        || pair(Tag::EnemyProjectile, Tag::Player)
        || pair(Tag::Player, Tag::Enemy)
        || (a.contains(Tag::Enemy) && b.contains(Tag::Enemy))
        || pair(Tag::Player, Tag::Pickup)
        || a.contains(Tag::AreaEffect)
        || b.contains(Tag::AreaEffect)
}

/// Collected contact effects, applied after pair iteration.
#[derive(Default)]
struct ContactEffects {
    /// (target, amount, source, invulnerability granted on a landed hit).
    damage: Vec<(Entity, f32, Option<Entity>, f32)>,
    impulses: Vec<(Entity, f32, f32)>,
    separations: Vec<(Entity, f32, f32)>,
    destroyed: Vec<Entity>,
    /// Projectile -> target registrations for piercing rounds.
    projectile_hits: Vec<(Entity, Entity)>,
    /// Area region -> target registrations (hit-once-per-target).
    area_hits: Vec<(Entity, Entity)>,
    /// (player, pickup entity, payload).
    pickups: Vec<(Entity, Entity, Pickup)>,
}

type BodyQuery<'w, 's> = Query<
    'w,
    's,
    (
        Entity,
        &'static Tags,
        &'static mut Transform,
        &'static mut Motion,
        Option<&'static mut Health>,
        Option<&'static mut Projectile>,
        Option<&'static mut AreaEffect>,
        Option<&'static ContactDamage>,
        Option<&'static Pickup>,
    ),
    Without<Dead>,
>;

/// System that finds and resolves overlapping pairs.
///
/// Candidate pairs come from grid-cell co-residency and are each checked
/// exactly once per tick (ordered id pair dedup). A pair missing Transform
/// or Motion on either side is skipped silently — a defensive no-op, never
/// an error.
pub fn collision_system(
    grid: Res<SpatialGrid>,
    clock: Res<SimClock>,
    mut bodies: BodyQuery,
    mut scores: Query<&mut Score>,
    mut queue: ResMut<EventQueue>,
    mut commands: Commands,
) {
    let now = clock.time;
    let mut effects = ContactEffects::default();
    // Non-piercing projectiles spend themselves on their first pair.
    let mut spent: HashSet<Entity> = HashSet::new();

    for (a, b) in grid.candidate_pairs() {
        let (Ok(body_a), Ok(body_b)) = (bodies.get(a), bodies.get(b)) else {
            continue;
        };
        let (_, tags_a, tf_a, motion_a, _, proj_a, area_a, touch_a, pickup_a) = body_a;
        let (_, tags_b, tf_b, motion_b, _, proj_b, area_b, touch_b, pickup_b) = body_b;

        if !interaction_allowed(tags_a, tags_b) {
            continue;
        }

        let distance = tf_a.distance_to(tf_b);
        let combined = motion_a.radius + motion_b.radius;
        if distance > combined {
            continue;
        }
        let overlap = combined - distance;
        let normal = if distance > 0.0001 {
            ((tf_b.x - tf_a.x) / distance, (tf_b.y - tf_a.y) / distance)
        } else {
            (1.0, 0.0)
        };

        // Directional contact handlers; each pair evaluated both ways.
        let mut handle = |attacker: Entity,
                          attacker_tags: &Tags,
                          attacker_proj: Option<&Projectile>,
                          attacker_area: Option<&AreaEffect>,
                          attacker_touch: Option<&ContactDamage>,
                          victim: Entity,
                          victim_tags: &Tags,
                          victim_pickup: Option<&Pickup>,
                          to_victim: (f32, f32)| {
            // Projectile hits.
            if let Some(proj) = attacker_proj {
                let bullet_vs_enemy =
                    attacker_tags.contains(Tag::Bullet) && victim_tags.contains(Tag::Enemy);
                let hostile_vs_player = attacker_tags.contains(Tag::EnemyProjectile)
                    && victim_tags.contains(Tag::Player);
                if (bullet_vs_enemy || hostile_vs_player)
                    && !proj.hit.contains(&victim)
                    && !spent.contains(&attacker)
                {
                    let source = proj.owner.or(Some(attacker));
                    effects.damage.push((victim, proj.damage, source, 0.0));
                    if proj.piercing {
                        effects.projectile_hits.push((attacker, victim));
                    } else {
                        spent.insert(attacker);
                        effects.destroyed.push(attacker);
                    }
                }
            }

            // Enemy touch damage.
            if attacker_tags.contains(Tag::Enemy) && victim_tags.contains(Tag::Player) {
                if let Some(&ContactDamage(amount)) = attacker_touch {
                    effects
                        .damage
                        .push((victim, amount, Some(attacker), TOUCH_INVULN));
                }
            }

            // Area regions damage their target tag, once per target.
            if let Some(area) = attacker_area {
                if victim_tags.contains(area.target) && !area.hit.contains(&victim) {
                    effects
                        .damage
                        .push((victim, area.damage, area.source, 0.0));
                    if area.knockback > 0.0 {
                        effects.impulses.push((
                            victim,
                            to_victim.0 * area.knockback,
                            to_victim.1 * area.knockback,
                        ));
                    }
                    effects.area_hits.push((attacker, victim));
                }
            }

            // Pickup collection.
            if attacker_tags.contains(Tag::Player) && victim_tags.contains(Tag::Pickup) {
                if let Some(&pickup) = victim_pickup {
                    effects.pickups.push((attacker, victim, pickup));
                    effects.destroyed.push(victim);
                }
            }
        };

        handle(
            a,
            tags_a,
            proj_a.as_deref(),
            area_a.as_deref(),
            touch_a,
            b,
            tags_b,
            pickup_b,
            normal,
        );
        handle(
            b,
            tags_b,
            proj_b.as_deref(),
            area_b.as_deref(),
            touch_b,
            a,
            tags_a,
            pickup_a,
            (-normal.0, -normal.1),
        );

        // Physical separation, bodies only: heavier entities move less.
        let bodies_only = tags_a.contains_any(&[Tag::Player, Tag::Enemy])
            && tags_b.contains_any(&[Tag::Player, Tag::Enemy]);
        if bodies_only && overlap > 0.0 {
            match (motion_a.fixed, motion_b.fixed) {
                (false, false) => {
                    let total = motion_a.mass + motion_b.mass;
                    let share_a = overlap * motion_b.mass / total;
                    let share_b = overlap * motion_a.mass / total;
                    effects
                        .separations
                        .push((a, -normal.0 * share_a, -normal.1 * share_a));
                    effects
                        .separations
                        .push((b, normal.0 * share_b, normal.1 * share_b));
                }
                (false, true) => {
                    effects
                        .separations
                        .push((a, -normal.0 * overlap, -normal.1 * overlap));
                }
                (true, false) => {
                    effects
                        .separations
                        .push((b, normal.0 * overlap, normal.1 * overlap));
                }
                (true, true) => {}
            }
        }
    }

    // Apply phase.
    for (target, amount, source, invuln) in effects.damage {
        let Ok((_, tags, _, _, health, ..)) = bodies.get_mut(target) else {
            continue;
        };
        let Some(mut health) = health else { continue };
        let dealt = health.apply_damage(amount, source, now);
        if dealt > 0.0 {
            if invuln > 0.0 {
                health.set_invulnerable(invuln);
            }
            if tags.contains(Tag::Player) {
                let hp_fraction = health.fraction();
                queue.emit(GameEvent::PlayerDamaged {
                    player: target,
                    amount: dealt,
                    hp_fraction,
                });
            }
        }
    }

    for (target, ix, iy) in effects.impulses {
        if let Ok((_, _, _, mut motion, ..)) = bodies.get_mut(target) {
            motion.apply_impulse(ix, iy);
        }
    }

    for (target, dx, dy) in effects.separations {
        if let Ok((_, _, mut transform, ..)) = bodies.get_mut(target) {
            transform.x += dx;
            transform.y += dy;
        }
    }

    for (projectile, target) in effects.projectile_hits {
        if let Ok((_, _, _, _, _, Some(mut proj), ..)) = bodies.get_mut(projectile) {
            proj.hit.push(target);
        }
    }

    for (region, target) in effects.area_hits {
        if let Ok((_, _, _, _, _, _, Some(mut area), ..)) = bodies.get_mut(region) {
            area.hit.push(target);
        }
    }

    for (player, pickup_entity, pickup) in effects.pickups {
        match pickup {
            Pickup::Health(amount) => {
                if let Ok((_, _, _, _, Some(mut health), ..)) = bodies.get_mut(player) {
                    health.heal(amount);
                }
            }
            Pickup::Score(points) => {
                if let Ok(mut score) = scores.get_mut(player) {
                    score.points += points as u64;
                }
            }
        }
        queue.emit(GameEvent::PickupCollected {
            player,
            pickup: pickup_entity,
        });
    }

    for entity in effects.destroyed {
        commands.entity(entity).insert(Dead);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spatial::spatial_index_system;

    fn run_physics(world: &mut World) {
        let mut schedule = Schedule::default();
        schedule.add_systems((spatial_index_system, collision_system).chain());
        schedule.run(world);
    }

    fn base_world() -> World {
        let mut world = World::new();
        world.insert_resource(SpatialGrid::new(32.0));
        world.insert_resource(SimClock::default());
        world.insert_resource(EventQueue::default());
        world
    }

    #[test]
    fn test_equal_mass_pair_fully_separated() {
        // Two radius-16 bodies 20 apart overlap by 12; equal masses move
        // 6 each along the contact normal, ending exactly 32 apart.
        let mut world = base_world();

        let a = world
            .spawn((
                Tags::new(&[Tag::Enemy]),
                Transform::new(0.0, 0.0, 0.0),
                Motion::new(16.0),
            ))
            .id();
        let b = world
            .spawn((
                Tags::new(&[Tag::Enemy]),
                Transform::new(20.0, 0.0, 0.0),
                Motion::new(16.0),
            ))
            .id();

        run_physics(&mut world);

        let ax = world.get::<Transform>(a).unwrap().x;
        let bx = world.get::<Transform>(b).unwrap().x;
        assert!((ax - -6.0).abs() < 0.001);
        assert!((bx - 26.0).abs() < 0.001);
        assert!(((bx - ax) - 32.0).abs() < 0.001);
    }

    #[test]
    fn test_heavier_body_moves_less() {
        let mut world = base_world();

        let light = world
            .spawn((
                Tags::new(&[Tag::Enemy]),
                Transform::new(0.0, 0.0, 0.0),
                Motion {
                    radius: 16.0,
                    mass: 1.0,
                    ..Default::default()
                },
            ))
            .id();
        let heavy = world
            .spawn((
                Tags::new(&[Tag::Enemy]),
                Transform::new(20.0, 0.0, 0.0),
                Motion {
                    radius: 16.0,
                    mass: 3.0,
                    ..Default::default()
                },
            ))
            .id();

        run_physics(&mut world);

        // Overlap 12 split 3:1 — light moves 9, heavy moves 3.
        assert!((world.get::<Transform>(light).unwrap().x - -9.0).abs() < 0.001);
        assert!((world.get::<Transform>(heavy).unwrap().x - 23.0).abs() < 0.001);
    }

    #[test]
    fn test_bullet_damages_enemy_and_is_destroyed() {
        let mut world = base_world();

        let owner = world.spawn_empty().id();
        let bullet = world
            .spawn((
                Tags::new(&[Tag::Bullet]),
                Transform::new(0.0, 0.0, 0.0),
                Motion {
                    radius: 4.0,
                    kinematic: true,
                    ..Default::default()
                },
                Projectile::new(25.0, Some(owner)),
            ))
            .id();
        let enemy = world
            .spawn((
                Tags::new(&[Tag::Enemy]),
                Transform::new(10.0, 0.0, 0.0),
                Motion::new(16.0),
                Health::new(50.0),
            ))
            .id();

        run_physics(&mut world);

        let health = world.get::<Health>(enemy).unwrap();
        assert!((health.current - 25.0).abs() < 0.001);
        assert_eq!(health.last_damager, Some(owner));
        assert!(world.get::<Dead>(bullet).is_some());
    }

    #[test]
    fn test_bullets_never_interact_with_bullets() {
        let mut world = base_world();

        let a = world
            .spawn((
                Tags::new(&[Tag::Bullet]),
                Transform::new(0.0, 0.0, 0.0),
                Motion {
                    radius: 4.0,
                    kinematic: true,
                    ..Default::default()
                },
                Projectile::new(25.0, None),
            ))
            .id();
        world.spawn((
            Tags::new(&[Tag::Bullet]),
            Transform::new(2.0, 0.0, 0.0),
            Motion {
                radius: 4.0,
                kinematic: true,
                ..Default::default()
            },
            Projectile::new(25.0, None),
        ));

        run_physics(&mut world);

        assert!(world.get::<Dead>(a).is_none());
    }

    #[test]
    fn test_touch_damage_grants_invulnerability_once() {
        let mut world = base_world();

        let player = world
            .spawn((
                Tags::new(&[Tag::Player]),
                Transform::new(0.0, 0.0, 0.0),
                Motion::new(16.0),
                Health::new(100.0),
            ))
            .id();
        world.spawn((
            Tags::new(&[Tag::Enemy]),
            Transform::new(20.0, 0.0, 0.0),
            Motion::new(15.0),
            Health::new(50.0),
            ContactDamage(20.0),
        ));

        run_physics(&mut world);

        let health = world.get::<Health>(player).unwrap();
        assert!((health.current - 80.0).abs() < 0.001);
        assert!(health.is_invulnerable());
        let events = &world.resource::<EventQueue>().events;
        assert!(events
            .iter()
            .any(|e| matches!(e, GameEvent::PlayerDamaged { .. })));

        // Second pass inside the invulnerability window: no further damage.
        run_physics(&mut world);
        let health = world.get::<Health>(player).unwrap();
        assert!((health.current - 80.0).abs() < 0.001);
    }

    #[test]
    fn test_area_effect_hits_each_target_once() {
        let mut world = base_world();

        let region = world
            .spawn((
                Tags::new(&[Tag::AreaEffect]),
                Transform::new(0.0, 0.0, 0.0),
                Motion {
                    radius: 60.0,
                    fixed: true,
                    ..Default::default()
                },
                AreaEffect {
                    damage: 30.0,
                    growth: 0.0,
                    max_radius: 60.0,
                    target: Tag::Player,
                    knockback: 100.0,
                    source: None,
                    hit: Vec::new(),
                },
            ))
            .id();
        let player = world
            .spawn((
                Tags::new(&[Tag::Player]),
                Transform::new(30.0, 0.0, 0.0),
                Motion::new(16.0),
                Health::new(100.0),
            ))
            .id();

        run_physics(&mut world);
        let health = world.get::<Health>(player).unwrap();
        assert!((health.current - 70.0).abs() < 0.001);
        assert!(world.get::<Motion>(player).unwrap().vx > 0.0);

        run_physics(&mut world);
        // Hit-once set prevents repeat damage.
        let health = world.get::<Health>(player).unwrap();
        assert!((health.current - 70.0).abs() < 0.001);
        assert_eq!(world.get::<AreaEffect>(region).unwrap().hit.len(), 1);
    }

    #[test]
    fn test_pickup_collected_and_consumed() {
        let mut world = base_world();

        let player = world
            .spawn((
                Tags::new(&[Tag::Player]),
                Transform::new(0.0, 0.0, 0.0),
                Motion::new(16.0),
                {
                    let mut health = Health::new(100.0);
                    health.current = 40.0;
                    health
                },
            ))
            .id();
        let pickup = world
            .spawn((
                Tags::new(&[Tag::Pickup]),
                Transform::new(10.0, 0.0, 0.0),
                Motion {
                    radius: 12.0,
                    fixed: true,
                    ..Default::default()
                },
                Pickup::Health(25.0),
            ))
            .id();

        run_physics(&mut world);

        assert!((world.get::<Health>(player).unwrap().current - 65.0).abs() < 0.001);
        assert!(world.get::<Dead>(pickup).is_some());
        let events = &world.resource::<EventQueue>().events;
        assert!(events
            .iter()
            .any(|e| matches!(e, GameEvent::PickupCollected { .. })));
    }

    #[test]
    fn test_missing_motion_pair_skipped_silently() {
        let mut world = base_world();
        // An enemy with no Motion never reaches the grid, so the pair is
        // simply absent — no damage, no separation, no panic.
        world.spawn((
            Tags::new(&[Tag::Enemy]),
            Transform::new(0.0, 0.0, 0.0),
            Health::new(50.0),
        ));
        world.spawn((
            Tags::new(&[Tag::Player]),
            Transform::new(5.0, 0.0, 0.0),
            Motion::new(16.0),
            Health::new(100.0),
        ));

        run_physics(&mut world);
    }
}
