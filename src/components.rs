//! ECS Components for the Chaos Arena simulation.
//!
//! Components are pure data containers attached to entities.
//! All game logic lives in systems that query these components.

use bevy_ecs::prelude::*;
use serde::{Deserialize, Serialize};

use crate::archetype::EnemyKind;

// ============================================================================
// SPATIAL COMPONENTS
// ============================================================================

/// 2D pose: position, rotation and non-uniform scale.
#[derive(Component, Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Transform {
    pub x: f32,
    pub y: f32,
    /// Radians, wrapped to (-pi, pi].
    pub rotation: f32,
    pub scale_x: f32,
    pub scale_y: f32,
}

impl Default for Transform {
    fn default() -> Self {
        Self::new(0.0, 0.0, 0.0)
    }
}

impl Transform {
    pub fn new(x: f32, y: f32, rotation: f32) -> Self {
        Self {
            x,
            y,
            rotation: wrap_angle(rotation),
            scale_x: 1.0,
            scale_y: 1.0,
        }
    }

    pub fn distance_to(&self, other: &Transform) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }

    /// Unit vector from `self` toward `other`; zero if coincident.
    pub fn direction_to(&self, other: &Transform) -> (f32, f32) {
        let dx = other.x - self.x;
        let dy = other.y - self.y;
        let dist = (dx * dx + dy * dy).sqrt();
        if dist < 0.0001 {
            (0.0, 0.0)
        } else {
            (dx / dist, dy / dist)
        }
    }

    pub fn angle_to(&self, other: &Transform) -> f32 {
        (other.y - self.y).atan2(other.x - self.x)
    }

    /// Rotate to face a point.
    pub fn face(&mut self, x: f32, y: f32) {
        self.rotation = wrap_angle((y - self.y).atan2(x - self.x));
    }
}

/// Wrap an angle in radians to (-pi, pi].
pub fn wrap_angle(angle: f32) -> f32 {
    let mut a = angle % std::f32::consts::TAU;
    if a <= -std::f32::consts::PI {
        a += std::f32::consts::TAU;
    } else if a > std::f32::consts::PI {
        a -= std::f32::consts::TAU;
    }
    a
}

/// Velocity, pending forces and collision body data.
///
/// `kinematic` bodies ignore forces/drag/friction but still move under their
/// velocity; `fixed` bodies never move at all.
#[derive(Component, Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Motion {
    pub vx: f32,
    pub vy: f32,
    /// Pending-force accumulator, reset after every integration.
    pub fx: f32,
    pub fy: f32,
    pub mass: f32,
    pub drag: f32,
    pub friction: f32,
    pub max_speed: f32,
    /// Velocity retained when reflecting off the world boundary.
    pub bounciness: f32,
    pub radius: f32,
    pub kinematic: bool,
    pub fixed: bool,
}

impl Default for Motion {
    fn default() -> Self {
        Self {
            vx: 0.0,
            vy: 0.0,
            fx: 0.0,
            fy: 0.0,
            mass: 1.0,
            drag: 0.99,
            friction: 0.98,
            max_speed: 500.0,
            bounciness: 0.0,
            radius: 16.0,
            kinematic: false,
            fixed: false,
        }
    }
}

impl Motion {
    pub fn new(radius: f32) -> Self {
        Self {
            radius,
            ..Default::default()
        }
    }

    /// Accumulate a force; ignored by kinematic and fixed bodies.
    pub fn apply_force(&mut self, fx: f32, fy: f32) {
        if self.fixed || self.kinematic {
            return;
        }
        self.fx += fx;
        self.fy += fy;
    }

    /// Instantaneous velocity change scaled by mass; ignored by kinematic
    /// and fixed bodies.
    pub fn apply_impulse(&mut self, ix: f32, iy: f32) {
        if self.fixed || self.kinematic {
            return;
        }
        self.vx += ix / self.mass;
        self.vy += iy / self.mass;
    }

    pub fn speed(&self) -> f32 {
        (self.vx * self.vx + self.vy * self.vy).sqrt()
    }

    pub fn clamp_speed(&mut self) {
        let speed = self.speed();
        if speed > self.max_speed && speed > 0.0 {
            let scale = self.max_speed / speed;
            self.vx *= scale;
            self.vy *= scale;
        }
    }
}

// ============================================================================
// TAG COMPONENTS
// ============================================================================

/// Role tags used by the collision interaction table and the snapshot
/// surface. An entity carries a small set of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Tag {
    Player,
    Enemy,
    /// Player-owned projectile.
    Bullet,
    /// Enemy-owned projectile.
    EnemyProjectile,
    /// Expanding or persistent damage region (shockwave, laser, explosion).
    AreaEffect,
    Pickup,
}

impl Tag {
    pub fn name(self) -> &'static str {
        match self {
            Tag::Player => "player",
            Tag::Enemy => "enemy",
            Tag::Bullet => "bullet",
            Tag::EnemyProjectile => "enemy_projectile",
            Tag::AreaEffect => "area_effect",
            Tag::Pickup => "pickup",
        }
    }

    fn bit(self) -> u8 {
        match self {
            Tag::Player => 0,
            Tag::Enemy => 1,
            Tag::Bullet => 2,
            Tag::EnemyProjectile => 3,
            Tag::AreaEffect => 4,
            Tag::Pickup => 5,
        }
    }
}

/// Set of [`Tag`]s attached to an entity.
#[derive(Component, Debug, Clone, Default, Serialize, Deserialize)]
pub struct Tags(Vec<Tag>);

impl Tags {
    pub fn new(tags: &[Tag]) -> Self {
        let mut set = Self::default();
        for &tag in tags {
            set.insert(tag);
        }
        set
    }

    pub fn insert(&mut self, tag: Tag) {
        if !self.contains(tag) {
            self.0.push(tag);
        }
    }

    pub fn remove(&mut self, tag: Tag) {
        self.0.retain(|&t| t != tag);
    }

    pub fn contains(&self, tag: Tag) -> bool {
        self.0.contains(&tag)
    }

    pub fn contains_all(&self, tags: &[Tag]) -> bool {
        tags.iter().all(|&t| self.contains(t))
    }

    pub fn contains_any(&self, tags: &[Tag]) -> bool {
        tags.iter().any(|&t| self.contains(t))
    }

    pub fn iter(&self) -> impl Iterator<Item = Tag> + '_ {
        self.0.iter().copied()
    }

    /// Compact bitmask used by the spatial grid entries.
    pub fn mask(&self) -> u8 {
        self.0.iter().fold(0u8, |m, t| m | (1 << t.bit()))
    }
}

/// Check a tag against a [`Tags::mask`] value.
pub fn mask_has(mask: u8, tag: Tag) -> bool {
    mask & (1 << tag.bit()) != 0
}

// ============================================================================
// COMBAT COMPONENTS
// ============================================================================

/// Hit points with invulnerability, regeneration and a short rolling damage
/// history for statistics. Holds entity references, so snapshots copy the
/// plain fields out instead of serializing the component.
#[derive(Component, Debug, Clone)]
pub struct Health {
    pub current: f32,
    pub max: f32,
    /// Remaining invulnerability, in seconds.
    pub invulnerable_for: f32,
    /// Passive regeneration in HP per second.
    pub regen_rate: f32,
    /// One-shot latch so the death transition fires exactly once.
    pub died: bool,
    /// Most recent damage source, for kill attribution.
    pub last_damager: Option<Entity>,
    /// (sim-time, amount) entries, pruned to the last few seconds.
    pub damage_log: Vec<(f32, f32)>,
}

/// Damage history retention window, in seconds.
pub const DAMAGE_LOG_WINDOW: f32 = 5.0;

impl Health {
    pub fn new(max: f32) -> Self {
        Self {
            current: max,
            max,
            invulnerable_for: 0.0,
            regen_rate: 0.0,
            died: false,
            last_damager: None,
            damage_log: Vec::new(),
        }
    }

    pub fn fraction(&self) -> f32 {
        if self.max <= 0.0 {
            0.0
        } else {
            (self.current / self.max).clamp(0.0, 1.0)
        }
    }

    pub fn is_alive(&self) -> bool {
        self.current > 0.0
    }

    pub fn is_invulnerable(&self) -> bool {
        self.invulnerable_for > 0.0
    }

    /// Apply damage at sim-time `now`. Returns the damage actually dealt;
    /// zero while invulnerable or already dead.
    pub fn apply_damage(&mut self, amount: f32, source: Option<Entity>, now: f32) -> f32 {
        if self.is_invulnerable() || !self.is_alive() || amount <= 0.0 {
            return 0.0;
        }
        let dealt = amount.min(self.current);
        self.current -= dealt;
        self.last_damager = source;
        self.damage_log.push((now, dealt));
        dealt
    }

    pub fn heal(&mut self, amount: f32) {
        if !self.is_alive() || amount <= 0.0 {
            return;
        }
        self.current = (self.current + amount).min(self.max);
    }

    pub fn set_invulnerable(&mut self, duration: f32) {
        self.invulnerable_for = self.invulnerable_for.max(duration);
    }

    /// Total damage received within `window` seconds of `now`.
    pub fn recent_damage(&self, window: f32, now: f32) -> f32 {
        self.damage_log
            .iter()
            .filter(|(t, _)| now - t <= window)
            .map(|(_, amount)| amount)
            .sum()
    }

    pub fn prune_damage_log(&mut self, now: f32) {
        self.damage_log.retain(|(t, _)| now - t < DAMAGE_LOG_WINDOW);
    }
}

impl Default for Health {
    fn default() -> Self {
        Self::new(100.0)
    }
}

/// Damage dealt on body contact (enemy touch damage, scaled by wave
/// difficulty at spawn).
#[derive(Component, Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ContactDamage(pub f32);

/// Score awarded to the killer, scaled by wave difficulty at spawn.
#[derive(Component, Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ScoreValue(pub u32);

/// Per-player score tally.
#[derive(Component, Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Score {
    pub points: u64,
    pub kills: u32,
}

/// Projectile payload. `hit` keeps piercing rounds from damaging the same
/// target twice.
#[derive(Component, Debug, Clone)]
pub struct Projectile {
    pub damage: f32,
    pub piercing: bool,
    pub owner: Option<Entity>,
    pub hit: Vec<Entity>,
}

impl Projectile {
    pub fn new(damage: f32, owner: Option<Entity>) -> Self {
        Self {
            damage,
            piercing: false,
            owner,
            hit: Vec::new(),
        }
    }
}

/// Damage region that may grow over time (shockwave, explosion) or persist
/// at fixed size for its lifetime (laser segment). Each target is hit at
/// most once.
#[derive(Component, Debug, Clone)]
pub struct AreaEffect {
    pub damage: f32,
    /// Radius growth in units per second; zero for fixed-size regions.
    pub growth: f32,
    /// The region is destroyed once its radius reaches this.
    pub max_radius: f32,
    /// Tag the region damages.
    pub target: Tag,
    /// Impulse applied to struck targets.
    pub knockback: f32,
    pub source: Option<Entity>,
    pub hit: Vec<Entity>,
}

// ============================================================================
// LIFECYCLE COMPONENTS
// ============================================================================

/// Remaining lifetime in seconds; the entity is destroyed on expiry.
#[derive(Component, Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Lifetime(pub f32);

/// Mark for end-of-tick destruction. Destruction is deferred so in-progress
/// iteration over the live set is never invalidated mid-pass.
#[derive(Component, Debug, Clone, Copy, Default)]
pub struct Dead;

// ============================================================================
// PLAYER COMPONENTS
// ============================================================================

/// Marker plus control parameters for player-driven entities.
#[derive(Component, Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PlayerControlled {
    /// Force applied per tick at full stick deflection.
    pub move_force: f32,
    /// Special-ability cooldown, in seconds.
    pub special_cooldown: f32,
    /// Invulnerability window granted by the special ability.
    pub special_invuln: f32,
    /// Remaining cooldown.
    pub cooldown_timer: f32,
}

impl Default for PlayerControlled {
    fn default() -> Self {
        Self {
            move_force: 600.0,
            special_cooldown: 8.0,
            special_invuln: 3.0,
            cooldown_timer: 0.0,
        }
    }
}

/// Pickup payload, consumed on player contact.
#[derive(Component, Debug, Clone, Copy, Serialize, Deserialize)]
pub enum Pickup {
    Health(f32),
    Score(u32),
}

// ============================================================================
// AI COMPONENTS
// ============================================================================

/// Behavior mode of an enemy's state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BehaviorMode {
    #[default]
    Idle,
    Seeking,
    Attacking,
    Fleeing,
}

impl BehaviorMode {
    pub fn name(self) -> &'static str {
        match self {
            BehaviorMode::Idle => "idle",
            BehaviorMode::Seeking => "seeking",
            BehaviorMode::Attacking => "attacking",
            BehaviorMode::Fleeing => "fleeing",
        }
    }
}

/// Per-enemy AI state: mode, weak target reference, throttle and cooldown
/// countdowns, anti-stuck tracking, and the elite phase machine.
///
/// All timers are plain countdowns decremented in the tick loop; nothing
/// here fires after its owning entity is gone.
#[derive(Component, Debug, Clone)]
pub struct BehaviorState {
    pub mode: BehaviorMode,
    /// Weak reference: resolved by id on use, cleared when the target dies.
    pub target: Option<Entity>,
    /// Countdown to the next (throttled) decision evaluation.
    pub decision_timer: f32,
    /// Countdown to the next target acquisition.
    pub retarget_timer: f32,
    pub attack_cooldown: f32,
    /// Current attack interval, reduced by elite phase transitions.
    pub attack_rate: f32,
    /// Current aggro radius, widened by elite phase transitions.
    pub aggro_range: f32,

    // Charge sub-behavior (grunt, elite charge pattern).
    pub charge_cooldown: f32,
    pub charge_timer: f32,
    pub charge_dir: (f32, f32),

    // Slam sub-behavior (bruiser, elite slam pattern).
    pub slam_cooldown: f32,
    /// Windup countdown; the slam lands when it reaches zero.
    pub windup_timer: f32,

    // Anti-stuck.
    pub stuck_timer: f32,
    pub last_x: f32,
    pub last_y: f32,

    // Elite phase machine.
    /// 1-based phase number; grunts stay at 1 forever.
    pub phase: u8,
    /// Invulnerability/transition window after a phase change.
    pub transition_timer: f32,
    /// Deterministic cursor into the phase's attack-pattern list.
    pub pattern_index: u32,
    /// Weak references to summoned minions, pruned against the live set.
    pub minions: Vec<Entity>,
}

impl BehaviorState {
    /// Seed AI state from archetype stats, at the given spawn position.
    pub fn for_kind(kind: EnemyKind, x: f32, y: f32) -> Self {
        let stats = kind.stats();
        Self {
            mode: BehaviorMode::Idle,
            target: None,
            decision_timer: 0.0,
            retarget_timer: 0.0,
            attack_cooldown: 0.0,
            attack_rate: stats.attack_rate,
            aggro_range: stats.aggro_range,
            charge_cooldown: 0.0,
            charge_timer: 0.0,
            charge_dir: (0.0, 0.0),
            slam_cooldown: 0.0,
            windup_timer: 0.0,
            stuck_timer: 0.0,
            last_x: x,
            last_y: y,
            phase: 1,
            transition_timer: 0.0,
            pattern_index: 0,
            minions: Vec::new(),
        }
    }

    pub fn is_transitioning(&self) -> bool {
        self.transition_timer > 0.0
    }
}

// ============================================================================
// BUNDLE HELPERS
// ============================================================================

/// Bundle for spawning a complete enemy entity. Use
/// [`EnemyBundle::new`] so stats, tags and AI state stay consistent.
#[derive(Bundle)]
pub struct EnemyBundle {
    pub kind: EnemyKind,
    pub tags: Tags,
    pub transform: Transform,
    pub motion: Motion,
    pub health: Health,
    pub behavior: BehaviorState,
    pub contact_damage: ContactDamage,
    pub score_value: ScoreValue,
}

impl EnemyBundle {
    pub fn new(kind: EnemyKind, x: f32, y: f32) -> Self {
        let stats = kind.stats();
        let motion = Motion {
            mass: stats.mass,
            max_speed: stats.max_speed,
            radius: stats.radius,
            friction: 0.8,
            bounciness: 0.3,
            ..Default::default()
        };
        Self {
            kind,
            tags: Tags::new(&[Tag::Enemy]),
            transform: Transform::new(x, y, 0.0),
            motion,
            health: Health::new(stats.max_health),
            behavior: BehaviorState::for_kind(kind, x, y),
            contact_damage: ContactDamage(stats.damage),
            score_value: ScoreValue(stats.score_value),
        }
    }

    /// Multiply health, speed, contact damage and score value by the wave
    /// difficulty multiplier; attack cadence speeds up more gently.
    pub fn scaled(mut self, difficulty: f32) -> Self {
        self.health.max *= difficulty;
        self.health.current = self.health.max;
        self.motion.max_speed *= 1.0 + (difficulty - 1.0) * 0.3;
        self.contact_damage.0 *= difficulty;
        self.score_value.0 = (self.score_value.0 as f32 * difficulty).floor() as u32;
        self.behavior.attack_rate /= 1.0 + (difficulty - 1.0) * 0.2;
        self
    }
}

/// Bundle for spawning a player entity.
#[derive(Bundle)]
pub struct PlayerBundle {
    pub tags: Tags,
    pub transform: Transform,
    pub motion: Motion,
    pub health: Health,
    pub score: Score,
    pub control: PlayerControlled,
}

impl PlayerBundle {
    pub fn new(x: f32, y: f32) -> Self {
        Self {
            tags: Tags::new(&[Tag::Player]),
            transform: Transform::new(x, y, 0.0),
            motion: Motion {
                radius: 16.0,
                max_speed: 300.0,
                friction: 0.9,
                bounciness: 0.4,
                ..Default::default()
            },
            health: Health::new(100.0),
            score: Score::default(),
            control: PlayerControlled::default(),
        }
    }
}

/// Bundle for spawning a projectile. Kinematic: flies in a straight line at
/// constant speed until it hits, expires or leaves the world.
#[derive(Bundle)]
pub struct ProjectileBundle {
    pub tags: Tags,
    pub transform: Transform,
    pub motion: Motion,
    pub projectile: Projectile,
    pub lifetime: Lifetime,
}

impl ProjectileBundle {
    pub fn new(tag: Tag, x: f32, y: f32, angle: f32, speed: f32, damage: f32) -> Self {
        Self {
            tags: Tags::new(&[tag]),
            transform: Transform::new(x, y, angle),
            motion: Motion {
                vx: angle.cos() * speed,
                vy: angle.sin() * speed,
                radius: 6.0,
                max_speed: speed.max(1.0),
                kinematic: true,
                ..Default::default()
            },
            projectile: Projectile::new(damage, None),
            lifetime: Lifetime(3.0),
        }
    }
}

/// Bundle for spawning a damage region (shockwave, laser segment,
/// explosion). Fixed in place; radius growth is handled per tick.
#[derive(Bundle)]
pub struct AreaEffectBundle {
    pub tags: Tags,
    pub transform: Transform,
    pub motion: Motion,
    pub area: AreaEffect,
    pub lifetime: Lifetime,
}

impl AreaEffectBundle {
    pub fn new(x: f32, y: f32, radius: f32, area: AreaEffect, lifetime: f32) -> Self {
        Self {
            tags: Tags::new(&[Tag::AreaEffect]),
            transform: Transform::new(x, y, 0.0),
            motion: Motion {
                radius,
                fixed: true,
                ..Default::default()
            },
            area,
            lifetime: Lifetime(lifetime),
        }
    }
}

/// Bundle for spawning a pickup.
#[derive(Bundle)]
pub struct PickupBundle {
    pub tags: Tags,
    pub transform: Transform,
    pub motion: Motion,
    pub pickup: Pickup,
}

impl PickupBundle {
    pub fn new(x: f32, y: f32, pickup: Pickup) -> Self {
        Self {
            tags: Tags::new(&[Tag::Pickup]),
            transform: Transform::new(x, y, 0.0),
            motion: Motion {
                radius: 12.0,
                fixed: true,
                ..Default::default()
            },
            pickup,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrap_angle() {
        assert!((wrap_angle(0.0)).abs() < 0.0001);
        assert!((wrap_angle(std::f32::consts::TAU) - 0.0).abs() < 0.0001);
        assert!(wrap_angle(4.0) < std::f32::consts::PI);
        assert!(wrap_angle(-4.0) > -std::f32::consts::PI);
        // pi maps to itself, -pi wraps to pi
        assert!((wrap_angle(std::f32::consts::PI) - std::f32::consts::PI).abs() < 0.0001);
    }

    #[test]
    fn test_health_clamps_and_latches() {
        let mut health = Health::new(50.0);
        let dealt = health.apply_damage(80.0, None, 0.0);
        assert!((dealt - 50.0).abs() < 0.0001);
        assert!((health.current - 0.0).abs() < 0.0001);
        assert!(!health.is_alive());
        // Dead entities take no further damage and never go negative.
        assert_eq!(health.apply_damage(10.0, None, 0.1), 0.0);
        assert!(health.current >= 0.0);
    }

    #[test]
    fn test_health_invulnerability_blocks_damage() {
        let mut health = Health::new(100.0);
        health.set_invulnerable(1.0);
        assert_eq!(health.apply_damage(25.0, None, 0.0), 0.0);
        assert!((health.current - 100.0).abs() < 0.0001);
    }

    #[test]
    fn test_health_heal_caps_at_max() {
        let mut health = Health::new(100.0);
        health.apply_damage(30.0, None, 0.0);
        health.heal(500.0);
        assert!((health.current - 100.0).abs() < 0.0001);
    }

    #[test]
    fn test_damage_log_prunes_old_entries() {
        let mut health = Health::new(100.0);
        health.apply_damage(5.0, None, 0.0);
        health.apply_damage(5.0, None, 4.0);
        health.prune_damage_log(6.0);
        assert_eq!(health.damage_log.len(), 1);
        assert!((health.recent_damage(3.0, 6.0) - 5.0).abs() < 0.0001);
    }

    #[test]
    fn test_tags_set_semantics() {
        let mut tags = Tags::new(&[Tag::Enemy]);
        tags.insert(Tag::Enemy);
        assert_eq!(tags.iter().count(), 1);
        assert!(tags.contains(Tag::Enemy));
        assert!(tags.contains_any(&[Tag::Player, Tag::Enemy]));
        assert!(!tags.contains_all(&[Tag::Player, Tag::Enemy]));
        tags.remove(Tag::Enemy);
        assert!(!tags.contains(Tag::Enemy));
    }

    #[test]
    fn test_motion_force_rules() {
        let mut motion = Motion::default();
        motion.apply_force(10.0, 0.0);
        assert!(motion.fx > 0.0);

        let mut kinematic = Motion {
            kinematic: true,
            ..Default::default()
        };
        kinematic.apply_force(10.0, 0.0);
        kinematic.apply_impulse(10.0, 0.0);
        assert_eq!(kinematic.fx, 0.0);
        assert_eq!(kinematic.vx, 0.0);
    }

    #[test]
    fn test_enemy_bundle_difficulty_scaling() {
        let bundle = EnemyBundle::new(EnemyKind::Grunt, 0.0, 0.0).scaled(2.0);
        let stats = EnemyKind::Grunt.stats();
        assert!((bundle.health.max - stats.max_health * 2.0).abs() < 0.001);
        assert!((bundle.health.current - bundle.health.max).abs() < 0.001);
        assert!((bundle.contact_damage.0 - stats.damage * 2.0).abs() < 0.001);
        assert_eq!(bundle.score_value.0, stats.score_value * 2);
        assert!((bundle.motion.max_speed - stats.max_speed * 1.3).abs() < 0.001);
        assert!(bundle.behavior.attack_rate < stats.attack_rate);
    }
}
