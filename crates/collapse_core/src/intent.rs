//! Player intents.
//!
//! Every client request maps to one [`Intent`]. [`Simulation::apply_intent`]
//! applies it immediately and reports the result; the effect is visible in
//! the next tick's views.

use serde::{Deserialize, Serialize};

use crate::components::{EntityId, PlayerId, Team, WeaponKind};
use crate::error::{ActionError, Result};
use crate::hex::HexCoord;
use crate::simulation::{FireReport, Simulation};
use crate::view::PlayerView;

/// A request from a connected client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Intent {
    /// Enter the match.
    Join {
        /// Display name.
        name: String,
        /// Chosen side.
        team: Team,
    },
    /// Walk toward a hex.
    MoveTo {
        /// Destination hex.
        destination: HexCoord,
    },
    /// Select or clear the weapon target.
    TargetTower {
        /// Tower or base id.
        target: Option<EntityId>,
    },
    /// Fire the laser.
    FireLaser,
    /// Fire the long-range missiles.
    FireLrm,
    /// Build a team tower.
    BuildTower {
        /// Build hex.
        position: HexCoord,
    },
    /// Rebuild the world.
    ResetGame,
    /// Leave the match.
    Disconnect,
}

/// What applying an [`Intent`] produced.
#[derive(Debug, Clone, PartialEq)]
pub enum IntentOutcome {
    /// Joined; carries the initial view.
    Joined(Box<PlayerView>),
    /// Move accepted or refused.
    Moved {
        /// Whether the move was accepted.
        accepted: bool,
        /// Requested destination.
        destination: HexCoord,
    },
    /// Target recorded.
    Targeted(Option<EntityId>),
    /// A weapon was fired, or refused.
    Fired {
        /// Weapon used.
        weapon: WeaponKind,
        /// Shot details or the refusal reason.
        result: std::result::Result<FireReport, ActionError>,
    },
    /// A tower was built, or refused.
    Built(std::result::Result<EntityId, ActionError>),
    /// The world was rebuilt.
    Reset,
    /// The player left; `false` if they were not in the match.
    Left(bool),
}

impl Simulation {
    /// Apply one intent from `player`.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::PlayerAlreadyJoined`](crate::error::GameError::PlayerAlreadyJoined)
    /// for a second join and
    /// [`GameError::PlayerNotFound`](crate::error::GameError::PlayerNotFound)
    /// when targeting or resetting from a player that is not in the match. Refused moves,
    /// shots and builds are reported in the outcome instead.
    pub fn apply_intent(&mut self, player: PlayerId, intent: Intent) -> Result<IntentOutcome> {
        let outcome = match intent {
            Intent::Join { name, team } => {
                self.add_player(player, &name, team)?;
                let view = self
                    .view_for(player)
                    .ok_or(crate::error::GameError::PlayerNotFound(player))?;
                IntentOutcome::Joined(Box::new(view))
            }
            Intent::MoveTo { destination } => IntentOutcome::Moved {
                accepted: self.set_destination(player, destination),
                destination,
            },
            Intent::TargetTower { target } => {
                self.set_manual_target(player, target)?;
                IntentOutcome::Targeted(target)
            }
            Intent::FireLaser => self.fire(player, WeaponKind::Laser),
            Intent::FireLrm => self.fire(player, WeaponKind::Lrm),
            Intent::BuildTower { position } => {
                let result = self.build_tower(player, position);
                if let Err(reason) = &result {
                    tracing::debug!(player = %player, position = %position, %reason, "Build refused");
                }
                IntentOutcome::Built(result)
            }
            Intent::ResetGame => {
                if self.player(player).is_none() {
                    return Err(crate::error::GameError::PlayerNotFound(player));
                }
                tracing::info!(requested_by = %player, "Reset requested");
                self.reset();
                IntentOutcome::Reset
            }
            Intent::Disconnect => IntentOutcome::Left(self.remove_player(player).is_some()),
        };
        Ok(outcome)
    }

    fn fire(&mut self, player: PlayerId, weapon: WeaponKind) -> IntentOutcome {
        let result = self.fire_weapon(player, weapon);
        if let Err(reason) = &result {
            tracing::debug!(player = %player, ?weapon, %reason, "Shot refused");
        }
        IntentOutcome::Fired { weapon, result }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GameConfig;
    use crate::error::GameError;

    fn joined() -> Simulation {
        let mut sim = Simulation::new(GameConfig::default()).unwrap();
        sim.apply_intent(
            PlayerId(1),
            Intent::Join {
                name: "ada".to_string(),
                team: Team::Green,
            },
        )
        .unwrap();
        sim
    }

    #[test]
    fn test_join_returns_initial_view() {
        let mut sim = Simulation::new(GameConfig::default()).unwrap();
        let outcome = sim
            .apply_intent(
                PlayerId(7),
                Intent::Join {
                    name: "ada".to_string(),
                    team: Team::Blue,
                },
            )
            .unwrap();
        let IntentOutcome::Joined(view) = outcome else {
            panic!("expected join outcome, got {outcome:?}");
        };
        assert_eq!(view.player.id, PlayerId(7));
        assert_eq!(view.player.team, Team::Blue);
    }

    #[test]
    fn test_double_join_is_an_error() {
        let mut sim = joined();
        let result = sim.apply_intent(
            PlayerId(1),
            Intent::Join {
                name: "ada".to_string(),
                team: Team::Green,
            },
        );
        assert!(matches!(result, Err(GameError::PlayerAlreadyJoined(_))));
    }

    #[test]
    fn test_reset_requires_joining() {
        let mut sim = joined();
        let before = sim.state_hash();

        let result = sim.apply_intent(PlayerId(2), Intent::ResetGame);
        assert!(matches!(result, Err(GameError::PlayerNotFound(PlayerId(2)))));
        assert_eq!(sim.state_hash(), before);

        assert_eq!(
            sim.apply_intent(PlayerId(1), Intent::ResetGame).unwrap(),
            IntentOutcome::Reset
        );
    }

    #[test]
    fn test_move_outcome() {
        let mut sim = joined();
        let destination = HexCoord::new(0, 11);
        let outcome = sim
            .apply_intent(PlayerId(1), Intent::MoveTo { destination })
            .unwrap();
        assert_eq!(
            outcome,
            IntentOutcome::Moved {
                accepted: false,
                destination
            }
        );
    }

    #[test]
    fn test_fire_without_target_reports_reason() {
        let mut sim = joined();
        let outcome = sim.apply_intent(PlayerId(1), Intent::FireLaser).unwrap();
        assert_eq!(
            outcome,
            IntentOutcome::Fired {
                weapon: WeaponKind::Laser,
                result: Err(ActionError::NoTarget)
            }
        );
    }

    #[test]
    fn test_target_from_unknown_player() {
        let mut sim = joined();
        let result = sim.apply_intent(PlayerId(2), Intent::TargetTower { target: Some(3) });
        assert!(matches!(result, Err(GameError::PlayerNotFound(_))));
    }

    #[test]
    fn test_disconnect_twice() {
        let mut sim = joined();
        assert_eq!(
            sim.apply_intent(PlayerId(1), Intent::Disconnect).unwrap(),
            IntentOutcome::Left(true)
        );
        assert_eq!(
            sim.apply_intent(PlayerId(1), Intent::Disconnect).unwrap(),
            IntentOutcome::Left(false)
        );
    }
}
