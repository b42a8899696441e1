//! Game balance and timing configuration.
//!
//! Every field has a default, so a RON file only needs to name the values
//! it overrides:
//!
//! ```ron
//! GameConfig(
//!     map: (radius: 12),
//!     towers: (build_cost: 40),
//!     seed: 7,
//! )
//! ```
//!
//! The configuration is plain data. [`GameConfig::schedule`] converts the
//! time-based settings into the integer tick thresholds the simulation runs
//! on, so floating point never reaches the tick loop.

use serde::{Deserialize, Serialize};

use crate::components::Team;
use crate::error::{GameError, Result};
use crate::hex::{HexCoord, HexGrid};
use crate::math::Fixed;

/// Complete game configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    /// Map dimensions and team zones.
    pub map: MapSettings,
    /// Game-time scaling.
    pub time: TimeSettings,
    /// Oil rig settings.
    pub landmarks: LandmarkSettings,
    /// Defence and player-built tower settings.
    pub towers: TowerSettings,
    /// Team base settings.
    pub bases: BaseSettings,
    /// Player settings.
    pub player: PlayerSettings,
    /// Visibility filtering.
    pub fog_of_war: FogOfWarSettings,
    /// Manually fired weapons.
    pub weapons: WeaponsSettings,
    /// Combat tuning.
    pub combat: CombatSettings,
    /// Loop periods.
    pub updates: UpdateSettings,
    /// Seed for the simulation RNG.
    pub seed: u64,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            map: MapSettings::default(),
            time: TimeSettings::default(),
            landmarks: LandmarkSettings::default(),
            towers: TowerSettings::default(),
            bases: BaseSettings::default(),
            player: PlayerSettings::default(),
            fog_of_war: FogOfWarSettings::default(),
            weapons: WeaponsSettings::default(),
            combat: CombatSettings::default(),
            updates: UpdateSettings::default(),
            seed: 0x00C0_11A9_5E00,
        }
    }
}

/// Map settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapSettings {
    /// Map radius in hexes.
    pub radius: u32,
    /// Per-team starting zones.
    pub starting_zones: StartingZones,
}

impl Default for MapSettings {
    fn default() -> Self {
        Self {
            radius: 10,
            starting_zones: StartingZones::default(),
        }
    }
}

/// Starting zone for each team.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StartingZones {
    /// Green team zone (bottom rows).
    pub green: ZoneSettings,
    /// Blue team zone (top rows).
    pub blue: ZoneSettings,
}

impl Default for StartingZones {
    fn default() -> Self {
        Self {
            green: ZoneSettings {
                name: "Green Zone".to_string(),
                color: "#00ff0033".to_string(),
                spawn_area: SpawnArea {
                    q_min: -10,
                    q_max: 10,
                    r_min: 9,
                    r_max: 10,
                },
                safe_radius: 5,
            },
            blue: ZoneSettings {
                name: "Blue Zone".to_string(),
                color: "#0088ff33".to_string(),
                spawn_area: SpawnArea {
                    q_min: -10,
                    q_max: 10,
                    r_min: -10,
                    r_max: -9,
                },
                safe_radius: 5,
            },
        }
    }
}

impl StartingZones {
    /// Zone settings for a team.
    #[must_use]
    pub fn for_team(&self, team: Team) -> &ZoneSettings {
        match team {
            Team::Green => &self.green,
            Team::Blue => &self.blue,
        }
    }
}

/// A team's starting zone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneSettings {
    /// Display name.
    pub name: String,
    /// Overlay colour for clients.
    pub color: String,
    /// Axial bounds players spawn within.
    pub spawn_area: SpawnArea,
    /// No landmarks are placed within this distance of the team base.
    pub safe_radius: u32,
}

/// Inclusive axial bounds of a spawn area.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpawnArea {
    /// Minimum q.
    pub q_min: i32,
    /// Maximum q.
    pub q_max: i32,
    /// Minimum r.
    pub r_min: i32,
    /// Maximum r.
    pub r_max: i32,
}

impl SpawnArea {
    /// Whether a coordinate falls inside the bounds.
    #[must_use]
    pub fn contains(&self, hex: HexCoord) -> bool {
        (self.q_min..=self.q_max).contains(&hex.q) && (self.r_min..=self.r_max).contains(&hex.r)
    }

    /// Centre of the bounds (integer division truncates toward zero).
    #[must_use]
    pub fn center(&self) -> HexCoord {
        HexCoord::new((self.q_min + self.q_max) / 2, (self.r_min + self.r_max) / 2)
    }

    /// Whether any hex inside the bounds lies on the map.
    #[must_use]
    pub fn has_valid_hex(&self, grid: &HexGrid) -> bool {
        (self.q_min..=self.q_max)
            .any(|q| (self.r_min..=self.r_max).any(|r| grid.is_valid(HexCoord::new(q, r))))
    }
}

/// Game-time scaling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeSettings {
    /// Milliseconds per game hour.
    pub scale: f64,
    /// Game hours to cross one hex.
    pub movement_time_per_hex: f64,
}

impl Default for TimeSettings {
    fn default() -> Self {
        Self {
            scale: 1000.0,
            movement_time_per_hex: 0.5,
        }
    }
}

/// Oil rig settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LandmarkSettings {
    /// Number of oil rigs. The first sits at the map centre.
    pub count: u32,
    /// Minimum starting oil.
    pub oil_min: u32,
    /// Maximum starting oil.
    pub oil_max: u32,
    /// Oil cap.
    pub max_oil: u32,
    /// Oil regenerated per game hour.
    pub regeneration_rate: f64,
    /// Game hours per capture cycle.
    pub capture_time: f64,
    /// Oil extracted per completed cycle.
    pub oil_per_capture: u32,
}

impl Default for LandmarkSettings {
    fn default() -> Self {
        Self {
            count: 1,
            oil_min: 0,
            oil_max: 0,
            max_oil: 100,
            regeneration_rate: 0.5,
            capture_time: 5.0,
            oil_per_capture: 5,
        }
    }
}

/// Tower settings (shared by landmark defenders and player-built towers).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TowerSettings {
    /// Defenders placed around each landmark.
    pub per_landmark: u32,
    /// Ring radius defenders are placed on.
    pub placement_radius: u32,
    /// Energy cost to build a tower.
    pub build_cost: u32,
    /// Max distance from the builder or their base.
    pub build_radius: u32,
    /// Hit points.
    pub max_hp: u32,
    /// Attack range in hexes.
    pub attack_range: u32,
    /// Damage per shot.
    pub damage: u32,
    /// Attacks per game hour.
    pub attack_speed: f64,
    /// Detection range (informational).
    pub vision_range: u32,
}

impl Default for TowerSettings {
    fn default() -> Self {
        Self {
            per_landmark: 3,
            placement_radius: 3,
            build_cost: 50,
            build_radius: 4,
            max_hp: 30,
            attack_range: 3,
            damage: 10,
            attack_speed: 0.1,
            vision_range: 7,
        }
    }
}

/// Team base settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BaseSettings {
    /// Hit points.
    pub max_hp: u32,
    /// Attack range in hexes.
    pub attack_range: u32,
    /// Damage per shot.
    pub damage: u32,
    /// Attacks per game hour.
    pub attack_speed: f64,
    /// Detection range (informational).
    pub vision_range: u32,
}

impl Default for BaseSettings {
    fn default() -> Self {
        Self {
            max_hp: 20,
            attack_range: 7,
            damage: 10,
            attack_speed: 0.1,
            vision_range: 10,
        }
    }
}

/// Player settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerSettings {
    /// Energy at join and after reset.
    pub starting_energy: u32,
    /// Energy cap.
    pub max_energy: u32,
    /// Hit point cap.
    pub max_hp: u32,
    /// Hit points at join.
    pub starting_hp: u32,
    /// Basic attack range.
    pub attack_range: u32,
    /// Basic attack damage.
    pub damage: u32,
    /// Basic attacks per game hour.
    pub attack_speed: f64,
    /// Vision range; `None` sees the whole map.
    pub vision_range: Option<u32>,
    /// Game hours before a dead player respawns.
    pub respawn_time: f64,
}

impl Default for PlayerSettings {
    fn default() -> Self {
        Self {
            starting_energy: 0,
            max_energy: 100,
            max_hp: 100,
            starting_hp: 100,
            attack_range: 2,
            damage: 4,
            attack_speed: 2.0,
            vision_range: None,
            respawn_time: 8.0,
        }
    }
}

/// Fog of war settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FogOfWarSettings {
    /// Whether other players are filtered by distance.
    pub enabled: bool,
    /// Vision range used when the player's own range is unlimited.
    pub base_vision_range: u32,
}

impl Default for FogOfWarSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            base_vision_range: 10,
        }
    }
}

/// Both manual weapons.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WeaponsSettings {
    /// Short-range laser.
    pub laser: WeaponSettings,
    /// Long-range missiles.
    pub lrm: WeaponSettings,
}

impl Default for WeaponsSettings {
    fn default() -> Self {
        Self {
            laser: WeaponSettings {
                name: "Laser".to_string(),
                display_name: "LASER".to_string(),
                range: 2,
                damage: 4,
                cooldown: 7.0,
                hotkey: "2".to_string(),
            },
            lrm: WeaponSettings {
                name: "LRM".to_string(),
                display_name: "LRM".to_string(),
                range: 5,
                damage: 25,
                cooldown: 30.0,
                hotkey: "1".to_string(),
            },
        }
    }
}

/// A manually fired weapon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeaponSettings {
    /// Internal name.
    pub name: String,
    /// HUD label.
    pub display_name: String,
    /// Range in hexes.
    pub range: u32,
    /// Damage per shot.
    pub damage: u32,
    /// Wall-clock seconds between shots.
    pub cooldown: f64,
    /// Client hotkey.
    pub hotkey: String,
}

/// Combat tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CombatSettings {
    /// Players auto-fire their basic attack at the nearest hostile structure.
    pub auto_target_enabled: bool,
    /// Projectile animation speed in hexes per second.
    pub projectile_speed: f64,
}

impl Default for CombatSettings {
    fn default() -> Self {
        Self {
            auto_target_enabled: false,
            projectile_speed: 20.0,
        }
    }
}

/// Loop periods in milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpdateSettings {
    /// Simulation tick length (`tickDeltaMs`).
    pub game_loop_tick: u64,
    /// Per-player view broadcast period.
    pub client_broadcast: u64,
}

impl Default for UpdateSettings {
    fn default() -> Self {
        Self {
            game_loop_tick: 50,
            client_broadcast: 50,
        }
    }
}

/// Integer thresholds derived from a [`GameConfig`].
///
/// Movement and capture progress accumulate whole milliseconds of game
/// time; progress toward the next hex is `travel_ms / hex_travel_ms`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TickSchedule {
    /// Milliseconds simulated per tick.
    pub tick_ms: u64,
    /// Milliseconds of travel to cross one hex.
    pub hex_travel_ms: u64,
    /// Milliseconds of standing still per capture cycle.
    pub capture_ms: u64,
    /// Ticks between tower shots.
    pub tower_attack_ticks: u64,
    /// Ticks between base shots.
    pub base_attack_ticks: u64,
    /// Ticks between player basic attacks.
    pub player_attack_ticks: u64,
    /// Laser cooldown in ticks.
    pub laser_cooldown_ticks: u64,
    /// LRM cooldown in ticks.
    pub lrm_cooldown_ticks: u64,
    /// Respawn delay in ticks.
    pub respawn_ticks: u64,
    /// Projectile animation milliseconds per hex travelled.
    pub projectile_ms_per_hex: u64,
    /// Oil regenerated per landmark per tick.
    #[serde(with = "crate::math::fixed_serde")]
    pub oil_regen_per_tick: Fixed,
}

impl TickSchedule {
    /// Cooldown ticks for a weapon.
    #[must_use]
    pub const fn cooldown_ticks(&self, weapon: crate::components::WeaponKind) -> u64 {
        match weapon {
            crate::components::WeaponKind::Laser => self.laser_cooldown_ticks,
            crate::components::WeaponKind::Lrm => self.lrm_cooldown_ticks,
        }
    }

    /// Convert a tick count to milliseconds of game time.
    #[must_use]
    pub const fn ticks_to_ms(&self, ticks: u64) -> u64 {
        ticks * self.tick_ms
    }
}

/// `ceil(value)` clamped to at least one.
fn ceil_ticks(value: f64) -> u64 {
    (value.ceil() as u64).max(1)
}

impl GameConfig {
    /// Parse a configuration from RON text.
    pub fn from_ron_str(text: &str) -> Result<Self> {
        let config: Self =
            ron::from_str(text).map_err(|e| GameError::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// The map described by this configuration.
    #[must_use]
    pub fn grid(&self) -> HexGrid {
        HexGrid::new(self.map.radius)
    }

    /// Check invariants the simulation relies on.
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: &str| Err(GameError::InvalidConfig(msg.to_string()));

        if self.map.radius == 0 {
            return invalid("map.radius must be at least 1");
        }
        if self.updates.game_loop_tick == 0 || self.updates.client_broadcast == 0 {
            return invalid("update periods must be positive");
        }
        if !(self.time.scale > 0.0) || !(self.time.movement_time_per_hex > 0.0) {
            return invalid("time.scale and time.movement_time_per_hex must be positive");
        }
        if !(self.landmarks.capture_time > 0.0) {
            return invalid("landmarks.capture_time must be positive");
        }
        if self.landmarks.regeneration_rate < 0.0 {
            return invalid("landmarks.regeneration_rate must not be negative");
        }
        if self.landmarks.oil_min > self.landmarks.oil_max {
            return invalid("landmarks.oil_min exceeds landmarks.oil_max");
        }
        if self.landmarks.oil_max > self.landmarks.max_oil {
            return invalid("landmarks.oil_max exceeds landmarks.max_oil");
        }
        if self.player.starting_energy > self.player.max_energy {
            return invalid("player.starting_energy exceeds player.max_energy");
        }
        if self.player.starting_hp == 0 || self.player.starting_hp > self.player.max_hp {
            return invalid("player.starting_hp must be in 1..=player.max_hp");
        }
        if !(self.player.respawn_time >= 0.0) {
            return invalid("player.respawn_time must not be negative");
        }
        for (name, speed) in [
            ("towers.attack_speed", self.towers.attack_speed),
            ("bases.attack_speed", self.bases.attack_speed),
            ("player.attack_speed", self.player.attack_speed),
        ] {
            if !(speed > 0.0) {
                return Err(GameError::InvalidConfig(format!("{name} must be positive")));
            }
        }
        for (name, weapon) in [("laser", &self.weapons.laser), ("lrm", &self.weapons.lrm)] {
            if !(weapon.cooldown >= 0.0) {
                return Err(GameError::InvalidConfig(format!(
                    "weapons.{name}.cooldown must not be negative"
                )));
            }
        }
        if !(self.combat.projectile_speed > 0.0) {
            return invalid("combat.projectile_speed must be positive");
        }

        let grid = self.grid();
        for team in Team::ALL {
            let zone = self.map.starting_zones.for_team(team);
            if !zone.spawn_area.has_valid_hex(&grid) {
                return Err(GameError::InvalidConfig(format!(
                    "{} spawn area contains no valid hex",
                    team.as_str()
                )));
            }
            if !grid.is_valid(zone.spawn_area.center()) {
                return Err(GameError::InvalidConfig(format!(
                    "{} base position {} is off the map",
                    team.as_str(),
                    zone.spawn_area.center()
                )));
            }
        }

        Ok(())
    }

    /// Derive integer tick thresholds.
    #[must_use]
    pub fn schedule(&self) -> TickSchedule {
        let tick_ms = self.updates.game_loop_tick;
        let tick = tick_ms as f64;
        let scale = self.time.scale;
        let attack_ticks = |speed: f64| ceil_ticks((1.0 / speed * scale) / tick);

        TickSchedule {
            tick_ms,
            hex_travel_ms: ((self.time.movement_time_per_hex * scale).round() as u64).max(1),
            capture_ms: ((self.landmarks.capture_time * scale).round() as u64).max(1),
            tower_attack_ticks: attack_ticks(self.towers.attack_speed),
            base_attack_ticks: attack_ticks(self.bases.attack_speed),
            player_attack_ticks: attack_ticks(self.player.attack_speed),
            laser_cooldown_ticks: (self.weapons.laser.cooldown * 1000.0 / tick).ceil() as u64,
            lrm_cooldown_ticks: (self.weapons.lrm.cooldown * 1000.0 / tick).ceil() as u64,
            respawn_ticks: (self.player.respawn_time * scale / tick).ceil() as u64,
            projectile_ms_per_hex: ((1000.0 / self.combat.projectile_speed).round() as u64).max(1),
            oil_regen_per_tick: Fixed::from_num(tick / scale * self.landmarks.regeneration_rate),
        }
    }

    /// Fixed-point energy cap.
    #[must_use]
    pub fn max_energy(&self) -> Fixed {
        Fixed::from_num(self.player.max_energy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(GameConfig::default().validate().is_ok());
    }

    #[test]
    fn test_default_schedule() {
        let s = GameConfig::default().schedule();
        assert_eq!(s.tick_ms, 50);
        assert_eq!(s.hex_travel_ms, 500);
        assert_eq!(s.capture_ms, 5000);
        assert_eq!(s.tower_attack_ticks, 200);
        assert_eq!(s.base_attack_ticks, 200);
        assert_eq!(s.player_attack_ticks, 10);
        assert_eq!(s.laser_cooldown_ticks, 140);
        assert_eq!(s.lrm_cooldown_ticks, 600);
        assert_eq!(s.respawn_ticks, 160);
        assert_eq!(s.projectile_ms_per_hex, 50);
    }

    #[test]
    fn test_ron_partial_override() {
        let config = GameConfig::from_ron_str("(map: (radius: 12), seed: 9)").unwrap();
        assert_eq!(config.map.radius, 12);
        assert_eq!(config.seed, 9);
        assert_eq!(config.towers.build_cost, 50);
    }

    #[test]
    fn test_ron_parse_error() {
        let err = GameConfig::from_ron_str("(map: (radius: \"big\"))").unwrap_err();
        assert!(matches!(err, GameError::ConfigParse(_)));
    }

    #[test]
    fn test_rejects_zero_tick() {
        let mut config = GameConfig::default();
        config.updates.game_loop_tick = 0;
        assert!(matches!(config.validate(), Err(GameError::InvalidConfig(_))));
    }

    #[test]
    fn test_rejects_unreachable_spawn_area() {
        let mut config = GameConfig::default();
        config.map.starting_zones.blue.spawn_area = SpawnArea {
            q_min: 20,
            q_max: 25,
            r_min: 20,
            r_max: 25,
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_spawn_area_center() {
        let zones = StartingZones::default();
        assert_eq!(zones.green.spawn_area.center(), HexCoord::new(0, 9));
        assert_eq!(zones.blue.spawn_area.center(), HexCoord::new(0, -9));
    }
}
