//! Per-player state views.
//!
//! A view is what one client sees after a tick: their own player in full,
//! every structure and landmark, the other players they can see and the
//! projectiles still in flight. Field names are camelCase on the wire.
//! Energy and oil are floored to whole numbers.

use serde::{Deserialize, Serialize};

use crate::components::{
    Base, EntityId, Landmark, Player, PlayerId, Projectile, ProjectileSource, Team, Tower,
    TowerKind, WeaponState,
};
use crate::hex::HexCoord;
use crate::math::floor_to_u32;
use crate::simulation::Simulation;

/// Everything one client is shown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerView {
    /// The receiving player.
    pub player: SelfView,
    /// All landmarks.
    pub landmarks: Vec<LandmarkView>,
    /// All towers, destroyed ones included.
    pub towers: Vec<TowerView>,
    /// Both bases.
    pub bases: Vec<BaseView>,
    /// Match over.
    pub game_over: bool,
    /// Winner once the match is over.
    pub winner: Option<Team>,
    /// Other players within vision.
    pub visible_players: Vec<OtherPlayerView>,
    /// Projectiles in flight.
    pub projectiles: Vec<ProjectileView>,
    /// Game milliseconds at the time of the view.
    pub now: u64,
    /// Tick the view was taken at.
    pub tick: u64,
}

/// Full state of the receiving player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelfView {
    /// Connection id.
    pub id: PlayerId,
    /// Display name.
    pub name: String,
    /// Team.
    pub team: Team,
    /// Client colour.
    pub color: String,
    /// Current hex.
    pub position: HexCoord,
    /// Move target, while moving.
    pub destination: Option<HexCoord>,
    /// Energy, floored.
    pub energy: u32,
    /// Energy cap.
    pub max_energy: u32,
    /// Current health.
    pub hp: u32,
    /// Health cap.
    pub max_hp: u32,
    /// Waiting to respawn.
    pub is_dead: bool,
    /// Game milliseconds until respawn, while dead.
    pub respawn_in: Option<u64>,
    /// Structure picked by auto-targeting.
    pub auto_target: Option<EntityId>,
    /// Structure selected for weapon fire.
    pub manual_target: Option<EntityId>,
    /// Weapon slots.
    pub weapons: WeaponsView,
}

/// Weapon slots of the receiving player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeaponsView {
    /// Laser slot.
    pub laser: WeaponView,
    /// LRM slot.
    pub lrm: WeaponView,
}

/// One weapon slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeaponView {
    /// Ready to fire.
    pub available: bool,
    /// Milliseconds until the weapon is ready again.
    pub cooldown_remaining: u64,
}

impl From<&WeaponState> for WeaponView {
    fn from(state: &WeaponState) -> Self {
        Self {
            available: state.available,
            cooldown_remaining: state.cooldown_remaining_ms,
        }
    }
}

/// An oil rig.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LandmarkView {
    /// Entity id.
    pub id: EntityId,
    /// Rig hex.
    pub position: HexCoord,
    /// Oil, floored.
    pub oil: u32,
    /// Oil cap.
    pub max_oil: u32,
    /// Player currently extracting.
    pub capturing_player: Option<PlayerId>,
    /// Fraction of the current capture cycle, in `[0, 1)`.
    pub capture_progress: f64,
    /// Neutral towers guarding the rig.
    pub defending_towers: Vec<EntityId>,
}

/// A tower.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TowerView {
    /// Entity id.
    pub id: EntityId,
    /// Tower hex.
    pub position: HexCoord,
    /// Current health.
    pub hp: u32,
    /// Health cap.
    pub max_hp: u32,
    /// Out of play.
    pub is_destroyed: bool,
    /// Player being shot at.
    pub target: Option<PlayerId>,
    /// Owning team; neutral defenders have none.
    pub team: Option<Team>,
    /// Guarded rig, for defenders.
    pub landmark_id: Option<EntityId>,
    /// Builder name, for player-built towers.
    pub builder: Option<String>,
}

/// A team base.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BaseView {
    /// Entity id.
    pub id: EntityId,
    /// Owning team.
    pub team: Team,
    /// Base hex.
    pub position: HexCoord,
    /// Current health.
    pub hp: u32,
    /// Health cap.
    pub max_hp: u32,
    /// Out of play.
    pub is_destroyed: bool,
    /// Player being shot at.
    pub target: Option<PlayerId>,
}

/// Another player, as far as the receiver can tell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OtherPlayerView {
    /// Connection id.
    pub id: PlayerId,
    /// Display name.
    pub name: String,
    /// Team.
    pub team: Team,
    /// Current hex.
    pub position: HexCoord,
    /// Client colour.
    pub color: String,
    /// Current health.
    pub hp: u32,
    /// Health cap.
    pub max_hp: u32,
    /// Waiting to respawn.
    pub is_dead: bool,
}

/// A shot to animate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectileView {
    /// Sequence id.
    pub id: u64,
    /// Shooter hex.
    pub from: HexCoord,
    /// Target hex.
    pub to: HexCoord,
    /// Client colour.
    pub color: String,
    /// Shooter kind.
    #[serde(rename = "type")]
    pub kind: ProjectileSource,
    /// Slow, heavy shot.
    pub is_heavy: bool,
    /// Game milliseconds at which the shot was fired.
    pub created_at: u64,
    /// Animation length in milliseconds.
    pub duration: u64,
}

impl LandmarkView {
    fn new(landmark: &Landmark, cycle_ms: u64) -> Self {
        Self {
            id: landmark.id,
            position: landmark.position,
            oil: floor_to_u32(landmark.oil),
            max_oil: floor_to_u32(landmark.max_oil),
            capturing_player: landmark.capturing_player,
            capture_progress: landmark.capture_ms as f64 / cycle_ms as f64,
            defending_towers: landmark.defending_towers.clone(),
        }
    }
}

impl From<&Tower> for TowerView {
    fn from(tower: &Tower) -> Self {
        let builder = match &tower.kind {
            TowerKind::PlayerBuilt { builder, .. } => Some(builder.clone()),
            TowerKind::Defensive { .. } => None,
        };
        Self {
            id: tower.id,
            position: tower.position,
            hp: tower.health.current,
            max_hp: tower.health.max,
            is_destroyed: tower.destroyed,
            target: tower.target,
            team: tower.kind.team(),
            landmark_id: tower.kind.landmark_id(),
            builder,
        }
    }
}

impl From<&Base> for BaseView {
    fn from(base: &Base) -> Self {
        Self {
            id: base.id,
            team: base.team,
            position: base.position,
            hp: base.health.current,
            max_hp: base.health.max,
            is_destroyed: base.destroyed,
            target: base.target,
        }
    }
}

impl From<&Player> for OtherPlayerView {
    fn from(player: &Player) -> Self {
        Self {
            id: player.id,
            name: player.name.clone(),
            team: player.team,
            position: player.position,
            color: player.color.clone(),
            hp: player.health.current,
            max_hp: player.health.max,
            is_dead: !player.is_alive(),
        }
    }
}

/// Build the view for `id`. `None` if the player is not in the match.
pub(crate) fn build(sim: &Simulation, id: PlayerId) -> Option<PlayerView> {
    let me = sim.player(id)?;
    let config = sim.config();
    let schedule = sim.schedule();
    let now = sim.get_tick();

    let player = SelfView {
        id: me.id,
        name: me.name.clone(),
        team: me.team,
        color: me.color.clone(),
        position: me.position,
        destination: me.destination,
        energy: floor_to_u32(me.energy),
        max_energy: config.player.max_energy,
        hp: me.health.current,
        max_hp: me.health.max,
        is_dead: !me.is_alive(),
        respawn_in: me
            .respawn_at()
            .map(|at| schedule.ticks_to_ms(at.saturating_sub(now))),
        auto_target: me.auto_target,
        manual_target: me.manual_target,
        weapons: WeaponsView {
            laser: WeaponView::from(&me.weapons.laser),
            lrm: WeaponView::from(&me.weapons.lrm),
        },
    };

    let vision = if config.fog_of_war.enabled {
        Some(
            config
                .player
                .vision_range
                .unwrap_or(config.fog_of_war.base_vision_range),
        )
    } else {
        None
    };
    let visible_players = sim
        .players()
        .filter(|other| other.id != id)
        .filter(|other| vision.map_or(true, |range| me.position.distance(other.position) <= range))
        .map(OtherPlayerView::from)
        .collect();

    let landmarks = sim
        .landmarks()
        .map(|landmark| LandmarkView::new(landmark, schedule.capture_ms))
        .collect();

    Some(PlayerView {
        player,
        landmarks,
        towers: sim.towers().map(TowerView::from).collect(),
        bases: sim.bases().map(BaseView::from).collect(),
        game_over: sim.is_game_over(),
        winner: sim.winner(),
        visible_players,
        projectiles: sim
            .projectiles()
            .iter()
            .map(|p| projectile_view(p, schedule.tick_ms))
            .collect(),
        now: sim.now_ms(),
        tick: now,
    })
}

fn projectile_view(projectile: &Projectile, tick_ms: u64) -> ProjectileView {
    ProjectileView {
        id: projectile.id,
        from: projectile.from,
        to: projectile.to,
        color: projectile.source.color().to_string(),
        kind: projectile.source,
        is_heavy: projectile.source.is_heavy(),
        created_at: projectile.created_tick * tick_ms,
        duration: projectile.lifetime_ms,
    }
}

#[cfg(test)]
mod tests {
    use crate::components::{PlayerId, Team, WeaponKind};
    use crate::config::GameConfig;
    use crate::hex::HexCoord;
    use crate::math::Fixed;
    use crate::simulation::Simulation;

    fn sim_with(config: GameConfig) -> Simulation {
        let mut sim = Simulation::new(config).unwrap();
        sim.add_player(PlayerId(1), "ada", Team::Green).unwrap();
        sim.add_player(PlayerId(2), "bob", Team::Blue).unwrap();
        sim
    }

    #[test]
    fn test_view_for_unknown_player() {
        let sim = sim_with(GameConfig::default());
        assert!(sim.view_for(PlayerId(9)).is_none());
    }

    #[test]
    fn test_view_contents() {
        let mut sim = sim_with(GameConfig::default());
        sim.player_mut(PlayerId(1)).unwrap().energy = Fixed::from_num(12.75);

        let view = sim.view_for(PlayerId(1)).unwrap();
        assert_eq!(view.player.name, "ada");
        assert_eq!(view.player.energy, 12);
        assert_eq!(view.player.max_energy, 100);
        assert_eq!(view.landmarks.len(), 1);
        assert_eq!(view.towers.len(), 3);
        assert_eq!(view.bases.len(), 2);
        assert!(!view.game_over);
        assert_eq!(view.visible_players.len(), 1);
        assert_eq!(view.visible_players[0].name, "bob");
    }

    #[test]
    fn test_fog_of_war_hides_distant_players() {
        let mut config = GameConfig::default();
        config.fog_of_war.enabled = true;
        let mut sim = sim_with(config);

        // Spawn zones are far apart.
        let view = sim.view_for(PlayerId(1)).unwrap();
        assert!(view.visible_players.is_empty());

        let near = sim.player(PlayerId(1)).unwrap().position;
        sim.player_mut(PlayerId(2)).unwrap().position = near;
        let view = sim.view_for(PlayerId(1)).unwrap();
        assert_eq!(view.visible_players.len(), 1);
    }

    #[test]
    fn test_wire_field_names() {
        let mut sim = sim_with(GameConfig::default());
        let tower = sim.towers().next().unwrap().clone();
        {
            let player = sim.player_mut(PlayerId(1)).unwrap();
            player.position = tower.position.offset(HexCoord::new(0, 1));
            player.stop();
        }
        sim.set_manual_target(PlayerId(1), Some(tower.id)).unwrap();
        sim.fire_weapon(PlayerId(1), WeaponKind::Lrm).unwrap();

        let json = serde_json::to_value(sim.view_for(PlayerId(1)).unwrap()).unwrap();
        assert_eq!(json["gameOver"], false);
        assert_eq!(json["player"]["maxHp"], 100);
        assert_eq!(json["player"]["weapons"]["lrm"]["available"], false);
        assert_eq!(json["player"]["weapons"]["lrm"]["cooldownRemaining"], 30_000);
        assert_eq!(json["player"]["manualTarget"], tower.id);
        assert_eq!(json["towers"][0]["isDestroyed"], false);
        assert_eq!(json["projectiles"][0]["type"], "lrm");
        assert_eq!(json["projectiles"][0]["isHeavy"], true);
        assert_eq!(json["projectiles"][0]["color"], "#ff8800");
        assert_eq!(json["bases"][0]["team"], "green");
    }
}
