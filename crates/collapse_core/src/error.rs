//! Error types for the game simulation.

use thiserror::Error;

use crate::components::{EntityId, PlayerId};

/// Result type alias using [`GameError`].
pub type Result<T> = std::result::Result<T, GameError>;

/// Top-level error type for engine lookups and configuration.
#[derive(Debug, Error)]
pub enum GameError {
    /// No player with this id is connected.
    #[error("Player not found: {0}")]
    PlayerNotFound(PlayerId),

    /// A second join from a connection that already has a player.
    #[error("Player already joined: {0}")]
    PlayerAlreadyJoined(PlayerId),

    /// Configuration values that the simulation cannot run with.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Configuration text that failed to parse.
    #[error("Failed to parse configuration: {0}")]
    ConfigParse(String),

    /// Snapshot encoding or decoding failed.
    #[error("Serialization failed: {0}")]
    Serialization(String),
}

/// Why a player action was refused.
///
/// The `Display` text is what clients show the player. A refused action
/// leaves every entity untouched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ActionError {
    /// The acting player no longer exists.
    #[error("Player not found")]
    PlayerNotFound,

    /// Dead players wait for respawn.
    #[error("You are dead")]
    PlayerDead,

    /// The weapon has not recovered from its last shot.
    #[error("{weapon} is cooling down")]
    WeaponCoolingDown {
        /// Weapon display name.
        weapon: String,
    },

    /// Nothing selected.
    #[error("No target selected")]
    NoTarget,

    /// The selected id is unknown or already destroyed.
    #[error("Target {0} not found or destroyed")]
    TargetUnavailable(EntityId),

    /// Players cannot shoot their own team's base.
    #[error("Cannot attack your own base")]
    OwnBase,

    /// Target further than the weapon reaches.
    #[error("Target out of range ({distance} > {range})")]
    OutOfRange {
        /// Hex distance to the target.
        distance: u32,
        /// Weapon range.
        range: u32,
    },

    /// Not enough energy to build.
    #[error("Not enough energy (need {required}, have {available})")]
    InsufficientEnergy {
        /// Energy the action costs.
        required: u32,
        /// Energy the player has (floored).
        available: u32,
    },

    /// Build spot too far from the builder and their base.
    #[error("Too far from you and your base (max {radius} hexes)")]
    OutOfBuildRadius {
        /// Configured build radius.
        radius: u32,
    },

    /// Something already stands on the hex.
    #[error("Hex is occupied")]
    HexOccupied,

    /// Coordinate is off the map.
    #[error("Invalid hex")]
    InvalidHex,
}
