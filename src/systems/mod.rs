//! ECS Systems for the Chaos Arena simulation.
//!
//! Systems contain the game logic that operates on components. The schedule
//! is a single chain; ordering within a tick is significant and preserved:
//!
//! **Group 1 (Bookkeeping)** - timers and intents:
//! - `player_input_system` - consumes the per-tick input intents
//! - `health_tick_system` - invulnerability, regeneration, damage history
//! - `lifetime_system` - lifetime countdowns
//! - `area_growth_system` - expanding damage regions
//!
//! **Group 2 (Spatial Physics)** - integration and collision resolution:
//! - `integrate_system` - forces, drag/friction, position integration
//! - `spatial_index_system` - rebuilds the uniform grid
//! - `collision_system` - pair detection, damage handlers, separation
//! - `bounds_system` - world-boundary bounce/clamp/despawn
//!
//! **Group 3 (AI)** - decisions and attacks:
//! - `behavior_system` - target acquisition and the behavior state machine
//! - `attack_system` - cooldown-gated attacks and elite patterns
//! - `phase_system` - elite phase transitions
//! - `death_system` - one-shot death transitions and kill events
//!
//! **Group 4 (Spawn Scheduler)**:
//! - `wave_system` - wave state machine and enemy spawning
//!
//! **Group 5 (Chaos + Cleanup)**:
//! - `chaos_system` - chaos accumulator, combo, tier evaluation
//! - `event_outbox_system` - hands this tick's events to the embedder
//! - `despawn_system` - sweeps entities marked `Dead`

pub mod behavior;
pub mod chaos;
pub mod collision;
pub mod health;
pub mod lifecycle;
pub mod motion;
pub mod player;
pub mod waves;

pub use behavior::*;
pub use chaos::*;
pub use collision::*;
pub use health::*;
pub use lifecycle::*;
pub use motion::*;
pub use player::*;
pub use waves::*;

use bevy_ecs::prelude::*;
use rand::SeedableRng;
use rand_pcg::Pcg64Mcg;

/// Resource containing the delta time for the current tick.
#[derive(Resource, Debug, Default)]
pub struct DeltaTime(pub f32);

/// Global simulation clock: tick counter and accumulated seconds.
#[derive(Resource, Debug, Clone, Copy, Default)]
pub struct SimClock {
    pub tick: u64,
    pub time: f32,
}

impl SimClock {
    pub fn advance(&mut self, dt: f32) {
        self.tick = self.tick.wrapping_add(1);
        self.time += dt;
    }
}

/// Seeded simulation RNG. All stochastic choices draw from this, so a fixed
/// seed reproduces a run.
#[derive(Resource, Debug)]
pub struct SimRng(pub Pcg64Mcg);

impl SimRng {
    pub fn from_seed(seed: u64) -> Self {
        Self(Pcg64Mcg::seed_from_u64(seed))
    }
}
