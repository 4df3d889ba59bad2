//! Enemy archetypes: the stats table and the elite phase/pattern data.
//!
//! One enum replaces per-type dynamic dispatch: systems switch on
//! [`EnemyKind`] for archetype-specific sub-behaviors, and elites read their
//! phase breakpoints and attack-pattern cycles from the tables below.

use bevy_ecs::prelude::*;
use serde::{Deserialize, Serialize};

/// Enemy archetype.
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EnemyKind {
    /// Basic melee chaser with a short-range charge.
    Grunt,
    /// Ranged attacker that keeps a stand-off distance.
    Spitter,
    /// Heavy melee tank with an area slam. Never flees.
    Bruiser,
    /// Elite with a three-phase attack machine.
    MiniBoss,
    /// Elite with a four-phase attack machine.
    Boss,
}

/// Static per-archetype stats, looked up by [`EnemyKind::stats`].
#[derive(Debug, Clone, Copy)]
pub struct ArchetypeStats {
    pub max_health: f32,
    pub max_speed: f32,
    pub mass: f32,
    pub radius: f32,
    /// Touch/melee damage.
    pub damage: f32,
    /// Seconds between attacks.
    pub attack_rate: f32,
    pub aggro_range: f32,
    pub attack_range: f32,
    pub score_value: u32,
    /// Health fraction below which the archetype flees; `None` never flees.
    pub flee_threshold: Option<f32>,
}

impl EnemyKind {
    pub fn stats(self) -> ArchetypeStats {
        match self {
            EnemyKind::Grunt => ArchetypeStats {
                max_health: 50.0,
                max_speed: 100.0,
                mass: 1.0,
                radius: 15.0,
                damage: 20.0,
                attack_rate: 1.0,
                aggro_range: 250.0,
                attack_range: 40.0,
                score_value: 10,
                flee_threshold: Some(0.2),
            },
            EnemyKind::Spitter => ArchetypeStats {
                max_health: 30.0,
                max_speed: 80.0,
                mass: 0.8,
                radius: 12.0,
                damage: 15.0,
                attack_rate: 2.0,
                aggro_range: 400.0,
                attack_range: 200.0,
                score_value: 15,
                flee_threshold: Some(0.2),
            },
            EnemyKind::Bruiser => ArchetypeStats {
                max_health: 120.0,
                max_speed: 60.0,
                mass: 3.0,
                radius: 25.0,
                damage: 40.0,
                attack_rate: 1.5,
                aggro_range: 200.0,
                attack_range: 60.0,
                score_value: 25,
                flee_threshold: None,
            },
            EnemyKind::MiniBoss => ArchetypeStats {
                max_health: 300.0,
                max_speed: 80.0,
                mass: 5.0,
                radius: 35.0,
                damage: 60.0,
                attack_rate: 0.8,
                aggro_range: 350.0,
                attack_range: 80.0,
                score_value: 100,
                flee_threshold: None,
            },
            EnemyKind::Boss => ArchetypeStats {
                max_health: 800.0,
                max_speed: 120.0,
                mass: 10.0,
                radius: 50.0,
                damage: 100.0,
                attack_rate: 0.5,
                aggro_range: 500.0,
                attack_range: 100.0,
                score_value: 500,
                flee_threshold: None,
            },
        }
    }

    /// Elites carry a phase state machine.
    pub fn is_elite(self) -> bool {
        matches!(self, EnemyKind::MiniBoss | EnemyKind::Boss)
    }

    pub fn name(self) -> &'static str {
        match self {
            EnemyKind::Grunt => "grunt",
            EnemyKind::Spitter => "spitter",
            EnemyKind::Bruiser => "bruiser",
            EnemyKind::MiniBoss => "miniboss",
            EnemyKind::Boss => "boss",
        }
    }
}

// ============================================================================
// ELITE PHASES
// ============================================================================

/// Named attack patterns elites cycle through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttackPattern {
    /// Fan of projectiles.
    Burst(u32),
    /// Close-range area slam with knockback.
    Slam,
    /// Expanding shockwave ring.
    Shockwave,
    /// Locked-direction charge.
    Charge,
    /// Line of short-lived beam segments.
    Laser,
    /// Spawn a pair of lesser minions.
    Summon,
}

/// Phase (1-based) an elite should be in for a given health fraction.
pub fn phase_for_health(kind: EnemyKind, fraction: f32) -> u8 {
    match kind {
        EnemyKind::MiniBoss => {
            if fraction <= 0.33 {
                3
            } else if fraction <= 0.66 {
                2
            } else {
                1
            }
        }
        EnemyKind::Boss => {
            if fraction <= 0.25 {
                4
            } else if fraction <= 0.5 {
                3
            } else if fraction <= 0.75 {
                2
            } else {
                1
            }
        }
        _ => 1,
    }
}

/// Attack-cadence multiplier applied when entering `phase`.
pub fn phase_rate_multiplier(phase: u8) -> f32 {
    match phase {
        2 => 0.8,
        3 => 0.6,
        _ => 0.4,
    }
}

/// Aggro radius for an elite in `phase`.
pub fn phase_aggro_range(kind: EnemyKind, phase: u8) -> f32 {
    match (kind, phase) {
        (EnemyKind::MiniBoss, 2) => 400.0,
        (EnemyKind::MiniBoss, 3) => 500.0,
        (EnemyKind::Boss, 2) => 600.0,
        (EnemyKind::Boss, 3) => 800.0,
        (EnemyKind::Boss, 4) => 1000.0,
        _ => kind.stats().aggro_range,
    }
}

/// Ordered attack patterns for an elite phase. Selection cycles through the
/// list by index, never randomly, so behavior is reproducible given phase
/// and cycle position.
pub fn phase_patterns(kind: EnemyKind, phase: u8) -> &'static [AttackPattern] {
    use AttackPattern::*;
    match (kind, phase) {
        (EnemyKind::MiniBoss, 1) => &[Burst(3), Slam, Shockwave],
        (EnemyKind::MiniBoss, 2) => &[Burst(5), Slam, Summon, Shockwave],
        (EnemyKind::MiniBoss, _) => &[Burst(6), Charge, Summon, Shockwave],
        (EnemyKind::Boss, 1) => &[Burst(5), Slam, Shockwave],
        (EnemyKind::Boss, 2) => &[Burst(8), Laser, Summon, Slam],
        (EnemyKind::Boss, 3) => &[Burst(10), Shockwave, Charge, Slam],
        (EnemyKind::Boss, _) => &[Burst(12), Laser, Summon, Shockwave],
        _ => &[],
    }
}

/// Cooldown between elite pattern attacks: shrinks with phase, floored.
pub fn phase_pattern_cooldown(phase: u8) -> f32 {
    (2.0 - 0.3 * phase as f32).max(0.5)
}

/// Invulnerability window granted by a phase transition.
pub const PHASE_TRANSITION_INVULN: f32 = 3.0;

/// Maximum concurrently summoned minions per elite.
pub fn max_minions(kind: EnemyKind) -> usize {
    match kind {
        EnemyKind::Boss => 4,
        EnemyKind::MiniBoss => 2,
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_table_basics() {
        assert!(EnemyKind::Boss.stats().max_health > EnemyKind::Grunt.stats().max_health);
        assert_eq!(EnemyKind::Grunt.stats().flee_threshold, Some(0.2));
        assert_eq!(EnemyKind::Bruiser.stats().flee_threshold, None);
        assert!(EnemyKind::MiniBoss.is_elite());
        assert!(!EnemyKind::Spitter.is_elite());
    }

    #[test]
    fn test_phase_breakpoints() {
        assert_eq!(phase_for_health(EnemyKind::Boss, 1.0), 1);
        assert_eq!(phase_for_health(EnemyKind::Boss, 0.75), 2);
        assert_eq!(phase_for_health(EnemyKind::Boss, 0.4), 3);
        assert_eq!(phase_for_health(EnemyKind::Boss, 0.1), 4);
        assert_eq!(phase_for_health(EnemyKind::MiniBoss, 0.5), 2);
        assert_eq!(phase_for_health(EnemyKind::MiniBoss, 0.2), 3);
        // Non-elites never leave phase 1.
        assert_eq!(phase_for_health(EnemyKind::Grunt, 0.01), 1);
    }

    #[test]
    fn test_pattern_cycle_is_deterministic() {
        let patterns = phase_patterns(EnemyKind::Boss, 2);
        let first: Vec<_> = (0..8).map(|i| patterns[i % patterns.len()]).collect();
        let second: Vec<_> = (0..8).map(|i| patterns[i % patterns.len()]).collect();
        assert_eq!(first, second);
        assert_eq!(patterns[0], AttackPattern::Burst(8));
    }

    #[test]
    fn test_pattern_cooldown_floors() {
        assert!((phase_pattern_cooldown(1) - 1.7).abs() < 0.001);
        assert!((phase_pattern_cooldown(4) - 0.8).abs() < 0.001);
        assert!((phase_pattern_cooldown(6) - 0.5).abs() < 0.001);
    }
}
