//! Read-only snapshots for external collaborators, and the save/resume
//! contract.
//!
//! Snapshots are plain serializable structs copied out of the ECS world
//! each tick; rendering/audio/UI read them and never mutate core state.
//! Saves carry the minimum needed to reconstruct a session without
//! replaying the event log: wave state, chaos state, and per-entity pose,
//! health and behavior mode for players and enemies.

use bevy_ecs::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::archetype::EnemyKind;
use crate::components::{
    BehaviorMode, BehaviorState, Health, PlayerControlled, Score, Tags, Transform,
};
use crate::systems::chaos::{ChaosState, ChaosTier};
use crate::systems::waves::{WavePhase, WaveState};

/// Error surface of the save/restore contract.
#[derive(Debug, Error)]
pub enum SimError {
    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("invalid save state: {0}")]
    InvalidSave(String),
}

// ============================================================================
// PER-TICK SNAPSHOT
// ============================================================================

/// Snapshot of a single entity's externally visible state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntitySnapshot {
    /// Opaque stable id (entity bits).
    pub id: u64,
    pub tags: Vec<String>,
    /// Archetype name for enemies, absent otherwise.
    pub kind: Option<String>,
    pub x: f32,
    pub y: f32,
    pub rotation: f32,
    pub health_fraction: f32,
    /// Behavior mode name for AI entities.
    pub mode: Option<String>,
}

/// Wave scheduler state exposed to the UI layer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WaveSnapshot {
    pub wave: u32,
    pub active: bool,
    pub enemies_to_spawn: u32,
    pub enemies_spawned: u32,
    pub difficulty: f32,
    pub total_kills: u32,
}

/// Chaos controller state exposed to audio/visual collaborators.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChaosSnapshot {
    pub level: f32,
    pub tier: String,
    pub combo: f32,
}

/// Complete read-only simulation state snapshot.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Snapshot {
    /// Current simulation tick.
    pub tick: u64,
    /// Elapsed simulation time in seconds.
    pub time: f32,
    pub entities: Vec<EntitySnapshot>,
    pub wave: WaveSnapshot,
    pub chaos: ChaosSnapshot,
}

impl Snapshot {
    /// Create a snapshot from the ECS world.
    pub fn from_world(world: &mut World, tick: u64, time: f32) -> Self {
        let mut entities = Vec::new();

        let mut query = world.query::<(
            Entity,
            &Tags,
            &Transform,
            Option<&Health>,
            Option<&EnemyKind>,
            Option<&BehaviorState>,
        )>();
        for (entity, tags, transform, health, kind, behavior) in query.iter(world) {
            entities.push(EntitySnapshot {
                id: entity.to_bits(),
                tags: tags.iter().map(|t| t.name().to_string()).collect(),
                kind: kind.map(|k| k.name().to_string()),
                x: transform.x,
                y: transform.y,
                rotation: transform.rotation,
                health_fraction: health.map(|h| h.fraction()).unwrap_or(1.0),
                mode: behavior.map(|b| b.mode.name().to_string()),
            });
        }
        entities.sort_by_key(|e| e.id);

        let wave = world
            .get_resource::<WaveState>()
            .map(|w| WaveSnapshot {
                wave: w.wave,
                active: w.phase == WavePhase::Active,
                enemies_to_spawn: w.target,
                enemies_spawned: w.spawned,
                difficulty: w.difficulty,
                total_kills: w.total_kills,
            })
            .unwrap_or_default();

        let chaos = world
            .get_resource::<ChaosState>()
            .map(|c| ChaosSnapshot {
                level: c.level,
                tier: c.tier.name().to_string(),
                combo: c.combo,
            })
            .unwrap_or_default();

        Self {
            tick,
            time,
            entities,
            wave,
            chaos,
        }
    }

    /// Serialize snapshot to JSON string.
    pub fn to_json(&self) -> Result<String, SimError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Serialize snapshot to pretty JSON string.
    pub fn to_json_pretty(&self) -> Result<String, SimError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

// ============================================================================
// SAVE / RESUME
// ============================================================================

/// Saved entity: enough to respawn it, not its transient combat buffers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntitySave {
    /// Archetype for enemies; `None` marks a player.
    pub kind: Option<EnemyKind>,
    pub x: f32,
    pub y: f32,
    pub rotation: f32,
    pub health_current: f32,
    pub health_max: f32,
    pub mode: Option<BehaviorMode>,
    pub score: Option<Score>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WaveSave {
    pub wave: u32,
    pub phase: WavePhase,
    pub difficulty: f32,
    pub spawned: u32,
    pub target: u32,
    pub total_kills: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChaosSave {
    pub level: f32,
    pub tier: ChaosTier,
    pub combo: f32,
}

/// Serializable save state: sufficient to reconstruct the simulation
/// without replaying the event log.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SaveState {
    pub wave: WaveSave,
    pub chaos: ChaosSave,
    pub entities: Vec<EntitySave>,
}

impl SaveState {
    /// Capture players and enemies plus scheduler/chaos state.
    pub fn capture(world: &mut World) -> Self {
        let mut entities = Vec::new();

        let mut players = world.query_filtered::<(&Transform, &Health, &Score), With<PlayerControlled>>();
        for (transform, health, score) in players.iter(world) {
            entities.push(EntitySave {
                kind: None,
                x: transform.x,
                y: transform.y,
                rotation: transform.rotation,
                health_current: health.current,
                health_max: health.max,
                mode: None,
                score: Some(*score),
            });
        }

        let mut enemies = world.query::<(&EnemyKind, &Transform, &Health, &BehaviorState)>();
        for (kind, transform, health, behavior) in enemies.iter(world) {
            entities.push(EntitySave {
                kind: Some(*kind),
                x: transform.x,
                y: transform.y,
                rotation: transform.rotation,
                health_current: health.current,
                health_max: health.max,
                mode: Some(behavior.mode),
                score: None,
            });
        }

        let wave = world
            .get_resource::<WaveState>()
            .map(|w| WaveSave {
                wave: w.wave,
                phase: w.phase,
                difficulty: w.difficulty,
                spawned: w.spawned,
                target: w.target,
                total_kills: w.total_kills,
            })
            .unwrap_or_default();

        let chaos = world
            .get_resource::<ChaosState>()
            .map(|c| ChaosSave {
                level: c.level,
                tier: c.tier,
                combo: c.combo,
            })
            .unwrap_or_default();

        Self {
            wave,
            chaos,
            entities,
        }
    }

    pub fn to_json(&self) -> Result<String, SimError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(data: &str) -> Result<Self, SimError> {
        Ok(serde_json::from_str(data)?)
    }

    /// Basic structural validation before a restore.
    pub fn validate(&self) -> Result<(), SimError> {
        for entity in &self.entities {
            if entity.health_max <= 0.0 {
                return Err(SimError::InvalidSave(
                    "entity with non-positive max health".to_string(),
                ));
            }
            if entity.health_current < 0.0 || entity.health_current > entity.health_max {
                return Err(SimError::InvalidSave(
                    "entity health outside [0, max]".to_string(),
                ));
            }
        }
        if self.wave.spawned > self.wave.target {
            return Err(SimError::InvalidSave(
                "spawned count exceeds wave target".to_string(),
            ));
        }
        Ok(())
    }
}
