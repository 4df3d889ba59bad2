//! Chaos Arena - Simulation Core
//!
//! The headless runtime of a top-down arcade combat game: the
//! component-based entity store, spatial collision/physics pass, enemy
//! behavior state machines, wave-based spawn scheduler, and the chaos
//! feedback controller. Uses `bevy_ecs` for the entity-component-system
//! architecture; rendering, audio and input devices live outside and talk
//! to the core through snapshots, events and intents.

pub mod api;
pub mod archetype;
pub mod components;
pub mod config;
pub mod events;
pub mod spatial;
pub mod systems;
pub mod world;

pub use api::SimWorld;
pub use archetype::{ArchetypeStats, AttackPattern, EnemyKind};
pub use components::*;
pub use config::{ChaosConfig, SimConfig, WaveConfig};
pub use events::{EventOutbox, EventQueue, GameEvent};
pub use spatial::{SpatialEntry, SpatialGrid};
pub use systems::*;
pub use world::{SaveState, SimError, Snapshot};
