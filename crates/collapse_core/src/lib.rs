//! # Collapse Core
//!
//! Authoritative simulation for a real-time hex-grid combat game.
//!
//! This crate contains **only** deterministic logic:
//! - No networking
//! - No IO
//! - No wall-clock time (everything is counted in ticks)
//! - No system randomness (a seeded generator lives in the state)
//!
//! This separation enables:
//! - A thin transport layer in front of the engine
//! - Replaying intent sequences against a snapshot
//! - Determinism testing
//!
//! ## Crate Structure
//!
//! - [`hex`] - Axial hex geometry
//! - [`components`] - Entity records (players, towers, bases, landmarks)
//! - [`config`] - Balance and timing configuration
//! - [`simulation`] - Core simulation loop
//! - [`intent`] - Client requests applied between ticks
//! - [`view`] - Per-player state views
//! - [`replay`] - Intent recordings and replay verification
//! - [`math`] - Fixed-point math utilities

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]

pub mod combat;
pub mod components;
pub mod config;
pub mod economy;
pub mod error;
pub mod hex;
pub mod intent;
pub mod math;
pub mod movement;
pub mod replay;
pub mod rng;
pub mod simulation;
pub mod view;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::combat::{Combatant, DamageEvent};
    pub use crate::components::*;
    pub use crate::config::{GameConfig, TickSchedule};
    pub use crate::error::{ActionError, GameError, Result};
    pub use crate::hex::{HexCoord, HexGrid};
    pub use crate::intent::{Intent, IntentOutcome};
    pub use crate::math::Fixed;
    pub use crate::simulation::{FireReport, Simulation, TickEvents};
    pub use crate::view::PlayerView;
}
