//! Target selection and shot bookkeeping shared by every shooter.
//!
//! Structures pick the nearest eligible player in range each tick; players
//! with auto-targeting enabled pick the nearest hostile structure the same
//! way. Damage itself is applied by the simulation so that lethal hits can
//! trigger the death and game-over transitions in one place.

use serde::{Deserialize, Serialize};

use crate::components::{EntityId, PlayerId, ProjectileSource};
use crate::config::TickSchedule;
use crate::hex::HexCoord;

/// Anything that can deal or receive damage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Combatant {
    /// A player.
    Player(PlayerId),
    /// A tower.
    Tower(EntityId),
    /// A team base.
    Base(EntityId),
}

/// A resolved hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DamageEvent {
    /// Who fired.
    pub attacker: Combatant,
    /// Who was hit.
    pub target: Combatant,
    /// Weapon or structure kind that fired.
    pub source: ProjectileSource,
    /// Health actually removed.
    pub amount: u32,
    /// The hit took the target to zero.
    pub lethal: bool,
}

/// Pick the nearest candidate within `range` of `origin`.
///
/// Ties keep the first candidate found, so callers iterate in id order to
/// make the choice reproducible.
pub fn nearest_in_range<K, I>(origin: HexCoord, range: u32, candidates: I) -> Option<K>
where
    I: IntoIterator<Item = (K, HexCoord)>,
{
    let mut best: Option<(K, u32)> = None;
    for (key, position) in candidates {
        let distance = origin.distance(position);
        if distance > range {
            continue;
        }
        if best.as_ref().map_or(true, |(_, d)| distance < *d) {
            best = Some((key, distance));
        }
    }
    best.map(|(key, _)| key)
}

/// Animation time of a shot from `from` to `to`.
///
/// Heavy shots fly at half speed. Every shot lives at least one tick so
/// that clients get to see it.
#[must_use]
pub fn projectile_lifetime_ms(
    from: HexCoord,
    to: HexCoord,
    source: ProjectileSource,
    schedule: &TickSchedule,
) -> u64 {
    let mut lifetime = u64::from(from.distance(to)) * schedule.projectile_ms_per_hex;
    if source.is_heavy() {
        lifetime *= 2;
    }
    lifetime.max(schedule.tick_ms)
}

/// Whether a shot fired at `created_tick` has finished animating by `now`.
#[must_use]
pub fn projectile_expired(
    created_tick: u64,
    lifetime_ms: u64,
    now: u64,
    schedule: &TickSchedule,
) -> bool {
    schedule.ticks_to_ms(now.saturating_sub(created_tick)) >= lifetime_ms
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GameConfig;

    #[test]
    fn test_nearest_in_range_picks_closest() {
        let candidates = vec![
            (1_u64, HexCoord::new(3, 0)),
            (2, HexCoord::new(1, 0)),
            (3, HexCoord::new(0, 2)),
        ];
        assert_eq!(nearest_in_range(HexCoord::ORIGIN, 3, candidates), Some(2));
    }

    #[test]
    fn test_nearest_in_range_first_found_wins_ties() {
        let candidates = vec![(7_u64, HexCoord::new(0, 2)), (4, HexCoord::new(2, 0))];
        assert_eq!(nearest_in_range(HexCoord::ORIGIN, 2, candidates), Some(7));
    }

    #[test]
    fn test_nearest_in_range_ignores_far_candidates() {
        let candidates = vec![(1_u64, HexCoord::new(4, 0))];
        assert_eq!(nearest_in_range(HexCoord::ORIGIN, 3, candidates), None);
    }

    #[test]
    fn test_projectile_lifetime() {
        let schedule = GameConfig::default().schedule();
        let from = HexCoord::ORIGIN;
        let to = HexCoord::new(4, 0);

        // 20 hexes per second.
        assert_eq!(projectile_lifetime_ms(from, to, ProjectileSource::Laser, &schedule), 200);
        assert_eq!(projectile_lifetime_ms(from, to, ProjectileSource::Lrm, &schedule), 400);
        assert_eq!(
            projectile_lifetime_ms(from, from, ProjectileSource::Tower, &schedule),
            schedule.tick_ms
        );
    }

    #[test]
    fn test_projectile_expiry() {
        let schedule = GameConfig::default().schedule();
        assert!(!projectile_expired(10, 200, 13, &schedule));
        assert!(projectile_expired(10, 200, 14, &schedule));
    }
}
