//! Chaos controller: an event-sourced intensity accumulator with decay,
//! a combo multiplier derived from recent-event density, and discrete
//! named tiers.
//!
//! Pure function of the event stream plus elapsed time: the controller
//! performs no rendering or audio calls. External systems read the scalar
//! and tier from snapshots or the `ChaosLevelChanged` notification.

use bevy_ecs::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::archetype::EnemyKind;
use crate::config::SimConfig;
use crate::events::{EventQueue, GameEvent};
use crate::systems::{DeltaTime, SimClock};

pub const MAX_CHAOS: f32 = 100.0;

// Base chaos contributions per observed event.
const CHAOS_ENEMY_KILL: f32 = 5.0;
const CHAOS_PLAYER_DAMAGE: f32 = 8.0;
const CHAOS_PLAYER_DEATH: f32 = 25.0;
const CHAOS_BOSS_SPAWN: f32 = 30.0;
const CHAOS_BOSS_KILL: f32 = 50.0;
const CHAOS_SPECIAL_ABILITY: f32 = 10.0;
const CHAOS_MULTI_KILL: f32 = 15.0;
const CHAOS_CLOSE_CALL: f32 = 12.0;
const CHAOS_EXPLOSION: f32 = 8.0;

/// Named intensity tier, derived from the level against fixed ascending
/// thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ChaosTier {
    #[default]
    Calm,
    Tense,
    Intense,
    Chaotic,
    Meltdown,
}

impl ChaosTier {
    pub fn from_level(level: f32) -> Self {
        if level >= 80.0 {
            ChaosTier::Meltdown
        } else if level >= 60.0 {
            ChaosTier::Chaotic
        } else if level >= 40.0 {
            ChaosTier::Intense
        } else if level >= 20.0 {
            ChaosTier::Tense
        } else {
            ChaosTier::Calm
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ChaosTier::Calm => "calm",
            ChaosTier::Tense => "tense",
            ChaosTier::Intense => "intense",
            ChaosTier::Chaotic => "chaotic",
            ChaosTier::Meltdown => "meltdown",
        }
    }
}

/// Source kind recorded in the rolling event log. Only used to compute the
/// combo multiplier and the multi-kill bonus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChaosSource {
    Kill,
    PlayerDamage,
    PlayerDeath,
    BossSpawn,
    BossKill,
    Special,
    Explosion,
}

/// Process-wide chaos state. Reset at game start, updated every tick.
#[derive(Resource, Debug, Clone, Default)]
pub struct ChaosState {
    /// Intensity scalar in [0, 100].
    pub level: f32,
    pub tier: ChaosTier,
    /// Multiplier applied to incoming amounts, a step function of recent
    /// event density.
    pub combo: f32,
    /// Remaining suppression window after a tier change.
    tier_cooldown: f32,
    /// (source, adjusted amount, sim-time), pruned to the event window.
    log: Vec<(ChaosSource, f32, f32)>,
}

impl ChaosState {
    pub fn new() -> Self {
        Self {
            combo: 1.0,
            ..Default::default()
        }
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Add chaos: the amount is scaled by the current combo multiplier,
    /// the level saturates at 100, and the event is logged for combo
    /// tracking.
    pub fn add(&mut self, amount: f32, source: ChaosSource, now: f32) {
        let adjusted = amount * self.combo;
        self.level = (self.level + adjusted).min(MAX_CHAOS);
        self.log.push((source, adjusted, now));
    }

    /// Kills within `window` seconds of `now`.
    pub fn recent_kills(&self, window: f32, now: f32) -> usize {
        self.log
            .iter()
            .filter(|(source, _, t)| *source == ChaosSource::Kill && now - t < window)
            .count()
    }

    pub fn recent_event_count(&self) -> usize {
        self.log.len()
    }

    fn prune(&mut self, window: f32, now: f32) {
        self.log.retain(|(_, _, t)| now - t < window);
    }

    /// Step function of recent event density.
    fn update_combo(&mut self) {
        self.combo = match self.log.len() {
            n if n >= 10 => 2.5,
            n if n >= 7 => 2.0,
            n if n >= 4 => 1.5,
            n if n >= 2 => 1.2,
            _ => 1.0,
        };
    }
}

/// Chaos contribution of a single observed event, if any.
fn event_amount(event: &GameEvent, state: &ChaosState, multi_kill_window: f32, now: f32) -> Option<(f32, ChaosSource)> {
    match event {
        GameEvent::EnemyKilled { kind, .. } => {
            let kind_multiplier = match kind {
                EnemyKind::Bruiser => 1.5,
                EnemyKind::MiniBoss => 2.0,
                EnemyKind::Boss => 3.0,
                _ => 1.0,
            };
            let mut amount = CHAOS_ENEMY_KILL * kind_multiplier;
            if state.recent_kills(multi_kill_window, now) >= 2 {
                amount += CHAOS_MULTI_KILL;
            }
            Some((amount, ChaosSource::Kill))
        }
        GameEvent::PlayerDamaged {
            amount, hp_fraction, ..
        } => {
            let mut chaos = CHAOS_PLAYER_DAMAGE;
            if *hp_fraction < 0.2 {
                chaos += CHAOS_CLOSE_CALL;
            }
            chaos *= (amount / 50.0).min(2.0);
            Some((chaos, ChaosSource::PlayerDamage))
        }
        GameEvent::PlayerDied { .. } => Some((CHAOS_PLAYER_DEATH, ChaosSource::PlayerDeath)),
        GameEvent::BossSpawned { .. } => Some((CHAOS_BOSS_SPAWN, ChaosSource::BossSpawn)),
        GameEvent::BossDefeated { .. } => Some((CHAOS_BOSS_KILL, ChaosSource::BossKill)),
        GameEvent::SpecialAbilityUsed { .. } => {
            Some((CHAOS_SPECIAL_ABILITY, ChaosSource::Special))
        }
        GameEvent::ExplosionDamage { .. } => Some((CHAOS_EXPLOSION, ChaosSource::Explosion)),
        _ => None,
    }
}

/// System that folds this tick's events into the chaos level, then decays
/// it, recomputes the combo multiplier, and re-derives the tier.
///
/// Tier-change notifications are suppressed while the cooldown window from
/// the previous change is open, so the tier cannot flicker at a threshold
/// boundary.
pub fn chaos_system(
    config: Res<SimConfig>,
    dt: Res<DeltaTime>,
    clock: Res<SimClock>,
    mut state: ResMut<ChaosState>,
    mut queue: ResMut<EventQueue>,
) {
    let cc = &config.chaos;
    let now = clock.time;
    let delta = dt.0;

    // Fold in this tick's events at the current combo multiplier.
    for i in 0..queue.events.len() {
        let event = queue.events[i];
        if let Some((amount, source)) = event_amount(&event, &state, cc.multi_kill_window, now) {
            state.add(amount, source, now);
        }
    }

    state.prune(cc.event_window, now);
    state.update_combo();

    if state.level > 0.0 {
        state.level = (state.level - cc.decay_rate * delta).max(0.0);
    }

    if state.tier_cooldown > 0.0 {
        state.tier_cooldown -= delta;
        return;
    }
    let tier = ChaosTier::from_level(state.level);
    if tier != state.tier {
        state.tier = tier;
        state.tier_cooldown = cc.tier_cooldown;
        info!(tier = tier.name(), level = state.level, "chaos tier changed");
        queue.emit(GameEvent::ChaosLevelChanged {
            level: state.level,
            tier,
        });
    }
}
