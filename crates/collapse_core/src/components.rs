//! Entity records the simulation operates on.
//!
//! Entities are plain data. All mutation goes through
//! [`Simulation`](crate::simulation::Simulation) methods.

use std::collections::VecDeque;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::hex::HexCoord;
use crate::math::{fixed_serde, Fixed};

/// Identifier for towers, bases and landmarks (one shared id space).
pub type EntityId = u64;

/// Identifier of a connected player, assigned by the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(pub u64);

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "p{}", self.0)
    }
}

// ============================================================================
// Teams
// ============================================================================

/// The two sides of a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Team {
    /// Spawns along the bottom rows.
    Green,
    /// Spawns along the top rows.
    Blue,
}

impl Team {
    /// Both teams, in base creation order.
    pub const ALL: [Team; 2] = [Team::Green, Team::Blue];

    /// The other team.
    #[must_use]
    pub const fn opponent(self) -> Self {
        match self {
            Self::Green => Self::Blue,
            Self::Blue => Self::Green,
        }
    }

    /// Lowercase wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Green => "green",
            Self::Blue => "blue",
        }
    }
}

// ============================================================================
// Shared components
// ============================================================================

/// Hit points bounded by `[0, max]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Health {
    /// Current health points.
    pub current: u32,
    /// Maximum health points.
    pub max: u32,
}

impl Health {
    /// Create new health component at full health.
    #[must_use]
    pub const fn new(max: u32) -> Self {
        Self { current: max, max }
    }

    /// Create health at `current`, capped to `max`.
    #[must_use]
    pub fn with_current(current: u32, max: u32) -> Self {
        Self {
            current: current.min(max),
            max,
        }
    }

    /// Check if health is exhausted.
    #[must_use]
    pub const fn is_depleted(&self) -> bool {
        self.current == 0
    }

    /// Apply damage, returning actual damage dealt.
    /// Saturates at zero, so a lethal hit leaves exactly 0.
    pub fn apply_damage(&mut self, amount: u32) -> u32 {
        let actual = amount.min(self.current);
        self.current -= actual;
        actual
    }

    /// Restore to full.
    pub fn refill(&mut self) {
        self.current = self.max;
    }
}

/// Attack parameters of anything that shoots on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CombatStats {
    /// Range in hexes.
    pub range: u32,
    /// Damage per shot.
    pub damage: u32,
    /// Minimum ticks between shots.
    pub attack_interval: u64,
}

impl CombatStats {
    /// Create combat stats.
    #[must_use]
    pub const fn new(range: u32, damage: u32, attack_interval: u64) -> Self {
        Self {
            range,
            damage,
            attack_interval,
        }
    }

    /// Whether enough ticks have passed since `last_attack` to fire at `now`.
    ///
    /// Something that has never fired is always ready.
    #[must_use]
    pub fn ready(&self, last_attack: Option<u64>, now: u64) -> bool {
        last_attack.map_or(true, |last| now.saturating_sub(last) >= self.attack_interval)
    }
}

// ============================================================================
// Players
// ============================================================================

/// The two manually fired weapons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WeaponKind {
    /// Short range, short cooldown.
    Laser,
    /// Long range missiles, long cooldown.
    Lrm,
}

impl WeaponKind {
    /// Both weapons.
    pub const ALL: [WeaponKind; 2] = [WeaponKind::Laser, WeaponKind::Lrm];
}

/// Cooldown state of one weapon slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WeaponState {
    /// Ready to fire.
    pub available: bool,
    /// Tick of the last shot.
    pub fired_tick: Option<u64>,
    /// Milliseconds until ready, for client display only.
    pub cooldown_remaining_ms: u64,
}

impl WeaponState {
    /// A loaded weapon.
    pub const READY: Self = Self {
        available: true,
        fired_tick: None,
        cooldown_remaining_ms: 0,
    };
}

impl Default for WeaponState {
    fn default() -> Self {
        Self::READY
    }
}

/// A player's weapon slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Weapons {
    /// Laser slot.
    pub laser: WeaponState,
    /// LRM slot.
    pub lrm: WeaponState,
}

impl Weapons {
    /// State of one slot.
    #[must_use]
    pub const fn get(&self, kind: WeaponKind) -> &WeaponState {
        match kind {
            WeaponKind::Laser => &self.laser,
            WeaponKind::Lrm => &self.lrm,
        }
    }

    /// Mutable state of one slot.
    pub fn get_mut(&mut self, kind: WeaponKind) -> &mut WeaponState {
        match kind {
            WeaponKind::Laser => &mut self.laser,
            WeaponKind::Lrm => &mut self.lrm,
        }
    }
}

/// Alive/dead cycle of a player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LifeState {
    /// In play.
    Alive,
    /// Waiting to respawn.
    Dead {
        /// First tick on which the player may respawn.
        respawn_at: u64,
    },
}

/// A connected player.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Player {
    /// Connection id.
    pub id: PlayerId,
    /// Display name.
    pub name: String,
    /// Side the player fights for.
    pub team: Team,
    /// Client colour.
    pub color: String,
    /// Current hex.
    pub position: HexCoord,
    /// Final hex of the current move, if moving.
    pub destination: Option<HexCoord>,
    /// Hexes still to traverse, next first.
    pub path: VecDeque<HexCoord>,
    /// Game milliseconds travelled toward the next path hex.
    pub travel_ms: u64,
    /// Collected oil, in `[0, max_energy]`.
    #[serde(with = "fixed_serde")]
    pub energy: Fixed,
    /// Hit points.
    pub health: Health,
    /// Basic attack parameters.
    pub stats: CombatStats,
    /// Structure picked by auto-targeting (server computed).
    pub auto_target: Option<EntityId>,
    /// Tick of the last basic attack.
    pub last_attack_tick: Option<u64>,
    /// Structure chosen by the player for weapon fire.
    pub manual_target: Option<EntityId>,
    /// Weapon cooldowns.
    pub weapons: Weapons,
    /// Alive or waiting to respawn.
    pub life: LifeState,
}

impl Player {
    /// Whether the player is in play.
    #[must_use]
    pub const fn is_alive(&self) -> bool {
        matches!(self.life, LifeState::Alive)
    }

    /// Tick the player respawns at, while dead.
    #[must_use]
    pub const fn respawn_at(&self) -> Option<u64> {
        match self.life {
            LifeState::Alive => None,
            LifeState::Dead { respawn_at } => Some(respawn_at),
        }
    }

    /// Whether the player has no move in progress.
    #[must_use]
    pub const fn is_stationary(&self) -> bool {
        self.destination.is_none()
    }

    /// Drop any move in progress.
    pub fn stop(&mut self) {
        self.destination = None;
        self.path.clear();
        self.travel_ms = 0;
    }
}

// ============================================================================
// Landmarks
// ============================================================================

/// An oil rig players capture energy from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Landmark {
    /// Entity id.
    pub id: EntityId,
    /// Hex the rig stands on.
    pub position: HexCoord,
    /// Oil available, in `[0, max_oil]`.
    #[serde(with = "fixed_serde")]
    pub oil: Fixed,
    /// Oil cap.
    #[serde(with = "fixed_serde")]
    pub max_oil: Fixed,
    /// Player currently extracting.
    pub capturing_player: Option<PlayerId>,
    /// Game milliseconds of the current capture cycle.
    pub capture_ms: u64,
    /// Neutral towers guarding this rig.
    pub defending_towers: Vec<EntityId>,
}

// ============================================================================
// Structures
// ============================================================================

/// Where a tower came from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TowerKind {
    /// Neutral defender placed at world init; shoots every player.
    Defensive {
        /// Rig the tower guards.
        landmark_id: EntityId,
    },
    /// Built by a player; shoots only the other team.
    PlayerBuilt {
        /// Owning team.
        team: Team,
        /// Builder's display name.
        builder: String,
    },
}

impl TowerKind {
    /// Owning team, if any.
    #[must_use]
    pub const fn team(&self) -> Option<Team> {
        match self {
            Self::Defensive { .. } => None,
            Self::PlayerBuilt { team, .. } => Some(*team),
        }
    }

    /// Guarded landmark, if any.
    #[must_use]
    pub const fn landmark_id(&self) -> Option<EntityId> {
        match self {
            Self::Defensive { landmark_id } => Some(*landmark_id),
            Self::PlayerBuilt { .. } => None,
        }
    }
}

/// A tower.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Tower {
    /// Entity id.
    pub id: EntityId,
    /// Hex the tower stands on.
    pub position: HexCoord,
    /// Provenance and ownership.
    pub kind: TowerKind,
    /// Hit points.
    pub health: Health,
    /// Attack parameters.
    pub stats: CombatStats,
    /// Player currently targeted.
    pub target: Option<PlayerId>,
    /// Tick of the last shot.
    pub last_attack_tick: Option<u64>,
    /// Permanently out of play once set.
    pub destroyed: bool,
}

/// A team base. Losing it loses the match.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Base {
    /// Entity id.
    pub id: EntityId,
    /// Owning team.
    pub team: Team,
    /// Hex the base stands on.
    pub position: HexCoord,
    /// Hit points.
    pub health: Health,
    /// Attack parameters.
    pub stats: CombatStats,
    /// Player currently targeted.
    pub target: Option<PlayerId>,
    /// Tick of the last shot.
    pub last_attack_tick: Option<u64>,
    /// Permanently out of play once set.
    pub destroyed: bool,
}

// ============================================================================
// Projectiles
// ============================================================================

/// What fired a projectile; decides colour and speed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProjectileSource {
    /// Player laser.
    Laser,
    /// Player long-range missile.
    Lrm,
    /// Player basic attack.
    Player,
    /// Tower shot.
    Tower,
    /// Base shot.
    Base,
}

impl ProjectileSource {
    /// Client colour.
    #[must_use]
    pub const fn color(self) -> &'static str {
        match self {
            Self::Laser => "#ff0000",
            Self::Lrm => "#ff8800",
            Self::Player => "#ffffff",
            Self::Tower => "#ff4444",
            Self::Base => "#ffff00",
        }
    }

    /// Heavy projectiles travel at half speed.
    #[must_use]
    pub const fn is_heavy(self) -> bool {
        matches!(self, Self::Lrm)
    }
}

impl From<WeaponKind> for ProjectileSource {
    fn from(kind: WeaponKind) -> Self {
        match kind {
            WeaponKind::Laser => Self::Laser,
            WeaponKind::Lrm => Self::Lrm,
        }
    }
}

/// A visual-only shot, kept until its animation time has elapsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Projectile {
    /// Sequence id.
    pub id: u64,
    /// Shooter hex.
    pub from: HexCoord,
    /// Target hex.
    pub to: HexCoord,
    /// Shooter kind.
    pub source: ProjectileSource,
    /// Tick the shot was fired.
    pub created_tick: u64,
    /// Animation length in milliseconds.
    pub lifetime_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_health_damage_clamps_to_zero() {
        let mut health = Health::with_current(5, 30);
        assert_eq!(health.apply_damage(10), 5);
        assert_eq!(health.current, 0);
        assert!(health.is_depleted());
    }

    #[test]
    fn test_health_with_current_caps() {
        assert_eq!(Health::with_current(150, 100).current, 100);
    }

    #[test]
    fn test_combat_ready() {
        let stats = CombatStats::new(3, 10, 200);
        assert!(stats.ready(None, 0));
        assert!(!stats.ready(Some(10), 209));
        assert!(stats.ready(Some(10), 210));
    }

    #[test]
    fn test_team_opponent() {
        assert_eq!(Team::Green.opponent(), Team::Blue);
        assert_eq!(Team::Blue.opponent(), Team::Green);
    }

    #[test]
    fn test_tower_kind_accessors() {
        let defender = TowerKind::Defensive { landmark_id: 4 };
        assert_eq!(defender.team(), None);
        assert_eq!(defender.landmark_id(), Some(4));

        let built = TowerKind::PlayerBuilt {
            team: Team::Blue,
            builder: "ada".to_string(),
        };
        assert_eq!(built.team(), Some(Team::Blue));
        assert_eq!(built.landmark_id(), None);
    }

    #[test]
    fn test_team_wire_names() {
        assert_eq!(serde_json::to_string(&Team::Green).unwrap(), "\"green\"");
        let team: Team = serde_json::from_str("\"blue\"").unwrap();
        assert_eq!(team, Team::Blue);
    }
}
