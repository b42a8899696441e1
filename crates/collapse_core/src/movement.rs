//! Straight-line hex movement.
//!
//! A move request turns into a queue of hexes (see [`HexGrid::line`]).
//! Each tick the player accumulates game milliseconds of travel and steps
//! onto the next queued hex for every full `hex_travel_ms` accumulated, so
//! a coarse tick can cross several hexes at once.

use std::collections::VecDeque;

use crate::components::Player;
use crate::config::TickSchedule;
use crate::hex::{HexCoord, HexGrid};

/// Queue of hexes from `start` to `destination`, excluding `start`.
#[must_use]
pub fn plan_path(start: HexCoord, destination: HexCoord) -> VecDeque<HexCoord> {
    HexGrid::line(start, destination).into()
}

/// Begin a move, replacing any move in progress.
pub fn begin_move(player: &mut Player, destination: HexCoord) {
    player.destination = Some(destination);
    player.path = plan_path(player.position, destination);
    player.travel_ms = 0;
}

/// Advance a player along their path by one tick.
///
/// Returns the number of hexes entered this tick.
pub fn advance(player: &mut Player, schedule: &TickSchedule) -> u32 {
    if player.path.is_empty() {
        player.destination = None;
        return 0;
    }

    player.travel_ms += schedule.tick_ms;

    let mut entered = 0;
    while player.travel_ms >= schedule.hex_travel_ms {
        let Some(next) = player.path.pop_front() else {
            break;
        };
        player.travel_ms -= schedule.hex_travel_ms;
        player.position = next;
        entered += 1;

        if player.path.is_empty() {
            player.destination = None;
            player.travel_ms = 0;
        }
    }

    entered
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::{CombatStats, Health, LifeState, PlayerId, Team, Weapons};
    use crate::config::GameConfig;
    use crate::math::Fixed;

    fn player_at(position: HexCoord) -> Player {
        Player {
            id: PlayerId(1),
            name: "mover".to_string(),
            team: Team::Green,
            color: "#FF6B6B".to_string(),
            position,
            destination: None,
            path: VecDeque::new(),
            travel_ms: 0,
            energy: Fixed::ZERO,
            health: Health::new(100),
            stats: CombatStats::new(2, 4, 10),
            auto_target: None,
            last_attack_tick: None,
            manual_target: None,
            weapons: Weapons::default(),
            life: LifeState::Alive,
        }
    }

    #[test]
    fn test_one_hex_takes_hex_travel_time() {
        let schedule = GameConfig::default().schedule();
        let mut player = player_at(HexCoord::ORIGIN);
        begin_move(&mut player, HexCoord::new(2, 0));

        // 500 ms per hex at 50 ms per tick.
        for _ in 0..9 {
            assert_eq!(advance(&mut player, &schedule), 0);
        }
        assert_eq!(advance(&mut player, &schedule), 1);
        assert_eq!(player.position, HexCoord::new(1, 0));
        assert_eq!(player.destination, Some(HexCoord::new(2, 0)));
    }

    #[test]
    fn test_arrival_clears_destination_and_progress() {
        let schedule = GameConfig::default().schedule();
        let mut player = player_at(HexCoord::ORIGIN);
        begin_move(&mut player, HexCoord::new(1, 0));

        for _ in 0..10 {
            advance(&mut player, &schedule);
        }
        assert_eq!(player.position, HexCoord::new(1, 0));
        assert!(player.destination.is_none());
        assert!(player.path.is_empty());
        assert_eq!(player.travel_ms, 0);
    }

    #[test]
    fn test_coarse_tick_crosses_several_hexes() {
        let mut schedule = GameConfig::default().schedule();
        schedule.tick_ms = 1200;
        let mut player = player_at(HexCoord::ORIGIN);
        begin_move(&mut player, HexCoord::new(5, 0));

        assert_eq!(advance(&mut player, &schedule), 2);
        assert_eq!(player.position, HexCoord::new(2, 0));
        assert_eq!(player.travel_ms, 200);
    }

    #[test]
    fn test_move_to_current_hex_is_immediately_done() {
        let schedule = GameConfig::default().schedule();
        let mut player = player_at(HexCoord::new(3, -1));
        begin_move(&mut player, HexCoord::new(3, -1));
        assert!(player.path.is_empty());

        advance(&mut player, &schedule);
        assert!(player.destination.is_none());
        assert_eq!(player.position, HexCoord::new(3, -1));
    }
}
