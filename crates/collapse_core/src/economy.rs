//! Oil capture and regeneration.
//!
//! A player standing still on a rig extracts oil into energy in fixed
//! cycles. The rig only loses what the player actually receives, so an
//! almost-full player never burns oil.

use crate::components::{Landmark, Player};
use crate::config::TickSchedule;
use crate::math::Fixed;

/// Parameters of a capture cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureRules {
    /// Oil requested per completed cycle.
    pub oil_per_capture: Fixed,
    /// Player energy cap.
    pub max_energy: Fixed,
}

/// Advance `player`'s capture of `landmark` by one tick.
///
/// The caller guarantees the player is alive and standing on the rig.
/// Returns the energy granted if a cycle completed this tick.
pub fn advance_capture(
    player: &mut Player,
    landmark: &mut Landmark,
    rules: CaptureRules,
    schedule: &TickSchedule,
) -> Option<Fixed> {
    if !player.is_stationary() || player.energy >= rules.max_energy {
        return None;
    }

    if landmark.capturing_player != Some(player.id) {
        landmark.capturing_player = Some(player.id);
        landmark.capture_ms = 0;
    }

    landmark.capture_ms += schedule.tick_ms;
    if landmark.capture_ms < schedule.capture_ms {
        return None;
    }

    let headroom = rules.max_energy - player.energy;
    let granted = rules
        .oil_per_capture
        .min(landmark.oil)
        .min(headroom)
        .max(Fixed::ZERO);

    player.energy += granted;
    landmark.oil -= granted;
    landmark.capture_ms = 0;

    Some(granted)
}

/// Regenerate one tick of oil, capped at the rig's maximum.
pub fn regenerate(landmark: &mut Landmark, per_tick: Fixed) {
    if landmark.oil < landmark.max_oil {
        landmark.oil = (landmark.oil + per_tick).min(landmark.max_oil);
    }
}
