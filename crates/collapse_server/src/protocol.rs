//! JSON wire protocol between browser clients and the server.
//!
//! Every WebSocket text frame carries one JSON object tagged by `type`.
//!
//! # Example Session
//!
//! ```text
//! -> {"type":"join","username":"ada","team":"green"}
//! <- {"type":"init","player":{...},"landmarks":[...],...}
//! -> {"type":"moveTo","destination":{"q":0,"r":5}}
//! <- {"type":"moveConfirmed","destination":{"q":0,"r":5}}
//! -> {"type":"targetTower","target":4}
//! -> {"type":"fireLRM"}
//! <- {"type":"lrmResult","success":false,"message":"Target out of range (6 > 5)"}
//! <- {"type":"gameUpdate","player":{...},...}
//! ```

use collapse_core::components::{EntityId, PlayerId, Team};
use collapse_core::error::ActionError;
use collapse_core::hex::HexCoord;
use collapse_core::intent::Intent;
use collapse_core::simulation::FireReport;
use collapse_core::view::PlayerView;
use serde::{Deserialize, Serialize};

// ============================================================================
// Client -> Server
// ============================================================================

/// Requests a client can send.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ClientMsg {
    /// Enter the match. Team defaults to green.
    Join {
        /// Display name; blank names are replaced by the server.
        #[serde(default)]
        username: String,
        /// Chosen side.
        #[serde(default)]
        team: Option<Team>,
    },
    /// Walk toward a hex.
    MoveTo {
        /// Destination hex.
        destination: HexCoord,
    },
    /// Select (or clear, with `null`) the weapon target.
    TargetTower {
        /// Tower or base id.
        #[serde(default)]
        target: Option<EntityId>,
    },
    /// Fire the laser at the selected target.
    FireLaser,
    /// Fire long-range missiles at the selected target.
    #[serde(rename = "fireLRM")]
    FireLrm,
    /// Build a team tower.
    BuildTower {
        /// Build hex.
        position: HexCoord,
    },
    /// Rebuild the world for everyone.
    ResetGame,
}

impl ClientMsg {
    /// Parse one text frame.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Wire name, for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Join { .. } => "join",
            Self::MoveTo { .. } => "moveTo",
            Self::TargetTower { .. } => "targetTower",
            Self::FireLaser => "fireLaser",
            Self::FireLrm => "fireLRM",
            Self::BuildTower { .. } => "buildTower",
            Self::ResetGame => "resetGame",
        }
    }
}

impl From<ClientMsg> for Intent {
    fn from(msg: ClientMsg) -> Self {
        match msg {
            ClientMsg::Join { username, team } => Intent::Join {
                name: username,
                team: team.unwrap_or(Team::Green),
            },
            ClientMsg::MoveTo { destination } => Intent::MoveTo { destination },
            ClientMsg::TargetTower { target } => Intent::TargetTower { target },
            ClientMsg::FireLaser => Intent::FireLaser,
            ClientMsg::FireLrm => Intent::FireLrm,
            ClientMsg::BuildTower { position } => Intent::BuildTower { position },
            ClientMsg::ResetGame => Intent::ResetGame,
        }
    }
}

// ============================================================================
// Server -> Client
// ============================================================================

/// Messages the server pushes to a client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ServerMsg {
    /// Full view sent once after a successful join.
    Init(Box<PlayerView>),
    /// Periodic view.
    GameUpdate(Box<PlayerView>),
    /// Move accepted.
    MoveConfirmed {
        /// Accepted destination.
        destination: HexCoord,
    },
    /// Move refused.
    MoveError {
        /// Reason.
        message: String,
    },
    /// Outcome of a laser shot.
    LaserResult(ActionResult),
    /// Outcome of an LRM salvo.
    LrmResult(ActionResult),
    /// Outcome of a build request.
    BuildResult(ActionResult),
    /// Someone joined.
    PlayerJoined {
        /// New player's id.
        id: PlayerId,
        /// New player's display name.
        username: String,
    },
    /// Someone left.
    PlayerLeft {
        /// Departed player's id.
        id: PlayerId,
    },
    /// The world was rebuilt.
    GameReset,
    /// A request could not be handled.
    Error {
        /// Reason.
        message: String,
    },
}

/// Success flag plus reason, as returned for shots and builds.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionResult {
    /// Whether the action happened.
    pub success: bool,
    /// Refusal reason.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Damage dealt by a shot.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub damage: Option<u32>,
    /// Target hit points after a shot.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_hp: Option<u32>,
    /// Whether a shot destroyed its target.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destroyed: Option<bool>,
    /// Id of a newly built tower.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tower_id: Option<EntityId>,
}

impl ActionResult {
    /// A refusal with its reason.
    pub fn refused(reason: &ActionError) -> Self {
        Self {
            success: false,
            message: Some(reason.to_string()),
            ..Self::default()
        }
    }

    /// Result of a shot.
    pub fn from_shot(result: &Result<FireReport, ActionError>) -> Self {
        match result {
            Ok(report) => Self {
                success: true,
                damage: Some(report.damage),
                target_hp: Some(report.target_health),
                destroyed: Some(report.destroyed),
                ..Self::default()
            },
            Err(reason) => Self::refused(reason),
        }
    }

    /// Result of a build.
    pub fn from_build(result: &Result<EntityId, ActionError>) -> Self {
        match result {
            Ok(tower) => Self {
                success: true,
                tower_id: Some(*tower),
                ..Self::default()
            },
            Err(reason) => Self::refused(reason),
        }
    }
}

impl ServerMsg {
    /// Create an error message.
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }

    /// Serialize to one text frame.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| {
            format!(r#"{{"type":"error","message":"Serialization failed: {e}"}}"#)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use collapse_core::combat::Combatant;
    use collapse_core::components::WeaponKind;
    use collapse_core::config::GameConfig;
    use collapse_core::simulation::Simulation;

    #[test]
    fn test_parse_join() {
        let msg = ClientMsg::from_json(r#"{"type":"join","username":"ada","team":"blue"}"#).unwrap();
        assert_eq!(
            msg,
            ClientMsg::Join {
                username: "ada".to_string(),
                team: Some(Team::Blue)
            }
        );
    }

    #[test]
    fn test_join_defaults_to_green() {
        let msg = ClientMsg::from_json(r#"{"type":"join","username":"ada"}"#).unwrap();
        assert_eq!(
            Intent::from(msg),
            Intent::Join {
                name: "ada".to_string(),
                team: Team::Green
            }
        );
    }

    #[test]
    fn test_parse_commands() {
        let msg = ClientMsg::from_json(r#"{"type":"moveTo","destination":{"q":1,"r":-2}}"#).unwrap();
        assert_eq!(
            msg,
            ClientMsg::MoveTo {
                destination: HexCoord::new(1, -2)
            }
        );

        let msg = ClientMsg::from_json(r#"{"type":"targetTower","target":null}"#).unwrap();
        assert_eq!(msg, ClientMsg::TargetTower { target: None });

        let msg = ClientMsg::from_json(r#"{"type":"fireLRM"}"#).unwrap();
        assert_eq!(msg, ClientMsg::FireLrm);
        assert_eq!(msg.name(), "fireLRM");

        let msg = ClientMsg::from_json(r#"{"type":"fireLaser"}"#).unwrap();
        assert_eq!(Intent::from(msg), Intent::FireLaser);
    }

    #[test]
    fn test_reject_malformed() {
        assert!(ClientMsg::from_json("not json").is_err());
        assert!(ClientMsg::from_json(r#"{"type":"teleport"}"#).is_err());
        assert!(ClientMsg::from_json(r#"{"type":"moveTo"}"#).is_err());
    }

    #[test]
    fn test_serialize_results() {
        let refused = ServerMsg::LaserResult(ActionResult::refused(&ActionError::NoTarget));
        assert_eq!(
            refused.to_json(),
            r#"{"type":"laserResult","success":false,"message":"No target selected"}"#
        );

        let hit = ServerMsg::LrmResult(ActionResult::from_shot(&Ok(FireReport {
            weapon: WeaponKind::Lrm,
            target: Combatant::Tower(4),
            damage: 25,
            target_health: 5,
            destroyed: false,
            game_over: None,
        })));
        let json: serde_json::Value = serde_json::from_str(&hit.to_json()).unwrap();
        assert_eq!(json["type"], "lrmResult");
        assert_eq!(json["success"], true);
        assert_eq!(json["targetHp"], 5);

        let built = ServerMsg::BuildResult(ActionResult::from_build(&Ok(9)));
        assert_eq!(
            built.to_json(),
            r#"{"type":"buildResult","success":true,"towerId":9}"#
        );
    }

    #[test]
    fn test_view_messages_round_trip() {
        let mut sim = Simulation::new(GameConfig::default()).unwrap();
        sim.add_player(PlayerId(1), "ada", Team::Green).unwrap();
        let view = sim.view_for(PlayerId(1)).unwrap();

        let msg = ServerMsg::GameUpdate(Box::new(view));
        let json = msg.to_json();
        assert!(json.starts_with(r#"{"type":"gameUpdate","player":"#));

        let parsed: ServerMsg = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, msg);
    }

    #[test]
    fn test_serialize_notifications() {
        assert_eq!(
            ServerMsg::PlayerLeft { id: PlayerId(3) }.to_json(),
            r#"{"type":"playerLeft","id":3}"#
        );
        assert_eq!(ServerMsg::GameReset.to_json(), r#"{"type":"gameReset"}"#);
        assert_eq!(
            ServerMsg::error("bad frame").to_json(),
            r#"{"type":"error","message":"bad frame"}"#
        );
    }
}
