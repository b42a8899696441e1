//! Test fixtures and helpers.
//!
//! Pre-built matches and player placement helpers for consistent testing.
//! Helpers panic on misuse; they are only meant for tests.

use collapse_core::components::{EntityId, PlayerId, Team};
use collapse_core::config::GameConfig;
use collapse_core::hex::HexCoord;
use collapse_core::intent::{Intent, IntentOutcome};
use collapse_core::simulation::{Simulation, TickEvents};
use fixed::types::I32F32;

/// A fresh match with the default configuration.
///
/// # Panics
///
/// Never, unless the default configuration stops validating.
#[must_use]
pub fn default_sim() -> Simulation {
    sim_with(GameConfig::default())
}

/// A fresh match with `config`.
///
/// # Panics
///
/// Panics if `config` does not validate.
#[must_use]
pub fn sim_with(config: GameConfig) -> Simulation {
    Simulation::new(config).expect("fixture config must be valid")
}

/// A fresh match with the default configuration and another seed.
#[must_use]
pub fn sim_with_seed(seed: u64) -> Simulation {
    sim_with(GameConfig {
        seed,
        ..GameConfig::default()
    })
}

/// Join a player named after their id.
///
/// # Panics
///
/// Panics if the id is already in the match.
pub fn join(sim: &mut Simulation, id: u64, team: Team) -> PlayerId {
    let id = PlayerId(id);
    sim.add_player(id, &format!("tester{}", id.0), team)
        .expect("player id must be unused");
    id
}

/// Teleport a player to `hex` and cancel any move.
///
/// # Panics
///
/// Panics if the player is not in the match.
pub fn place_player(sim: &mut Simulation, id: PlayerId, hex: HexCoord) {
    let player = sim.player_mut(id).expect("player must exist");
    player.position = hex;
    player.stop();
}

/// Set a player's energy.
///
/// # Panics
///
/// Panics if the player is not in the match.
pub fn set_energy(sim: &mut Simulation, id: PlayerId, energy: u32) {
    sim.player_mut(id).expect("player must exist").energy = I32F32::from_num(energy);
}

/// Id of the first landmark (the one at the map centre).
///
/// # Panics
///
/// Panics if the world has no landmark.
#[must_use]
pub fn central_landmark(sim: &Simulation) -> EntityId {
    sim.landmarks()
        .find(|l| l.position == HexCoord::ORIGIN)
        .map(|l| l.id)
        .expect("world has a central landmark")
}

/// Id of the `index`-th neutral defence tower.
///
/// # Panics
///
/// Panics if there are not that many defenders.
#[must_use]
pub fn defender(sim: &Simulation, index: usize) -> EntityId {
    sim.towers()
        .filter(|t| t.kind.landmark_id().is_some())
        .nth(index)
        .map(|t| t.id)
        .expect("defender index in range")
}

/// Id of `team`'s base.
///
/// # Panics
///
/// Panics if the team has no base.
#[must_use]
pub fn base_id(sim: &Simulation, team: Team) -> EntityId {
    sim.base_of(team).map(|b| b.id).expect("team has a base")
}

/// Stop every tower and base from doing damage.
///
/// Structures still pick targets and fire projectiles.
pub fn disarm_structures(sim: &mut Simulation) {
    let towers: Vec<EntityId> = sim.towers().map(|t| t.id).collect();
    for id in towers {
        if let Some(tower) = sim.tower_mut(id) {
            tower.stats.damage = 0;
        }
    }
    let bases: Vec<EntityId> = sim.bases().map(|b| b.id).collect();
    for id in bases {
        if let Some(base) = sim.base_mut(id) {
            base.stats.damage = 0;
        }
    }
}

/// Run `ticks` ticks and collect their events.
pub fn run_ticks(sim: &mut Simulation, ticks: u64) -> Vec<TickEvents> {
    (0..ticks).map(|_| sim.tick()).collect()
}

/// One step of a scripted match: an intent, then some ticks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptStep {
    /// Acting player.
    pub player: PlayerId,
    /// What they ask for.
    pub intent: Intent,
    /// Ticks to run after the intent.
    pub ticks_after: u64,
}

/// Apply a script, ignoring intents the engine refuses.
pub fn run_script(sim: &mut Simulation, script: &[ScriptStep]) -> Vec<IntentOutcome> {
    let mut outcomes = Vec::with_capacity(script.len());
    for step in script {
        match sim.apply_intent(step.player, step.intent.clone()) {
            Ok(outcome) => outcomes.push(outcome),
            Err(error) => tracing::trace!(%error, "Scripted intent refused"),
        }
        for _ in 0..step.ticks_after {
            sim.tick();
        }
    }
    outcomes
}

/// Four players per team walking into the middle with auto-targeting on.
///
/// Deaths, respawns, captures and structure fire all happen within a few
/// hundred ticks.
#[must_use]
pub fn skirmish() -> Simulation {
    let mut config = GameConfig::default();
    config.combat.auto_target_enabled = true;
    config.landmarks.oil_max = 60;
    config.landmarks.oil_min = 20;
    let mut sim = sim_with(config);

    for i in 0..8 {
        let team = if i % 2 == 0 { Team::Green } else { Team::Blue };
        let id = join(&mut sim, i, team);
        let target = HexCoord::new(i as i32 - 4, 0);
        sim.set_destination(id, target);
    }
    sim
}
