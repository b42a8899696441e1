//! Determinism testing utilities.
//!
//! Provides a harness for verifying that the simulation
//! produces identical results given identical inputs.
//!
//! # Testing Strategy
//!
//! Two servers fed the same seed and the same intents must end in the same
//! state. Sources of non-determinism include:
//!
//! - **Floating-point math**: oil and energy use fixed-point arithmetic via
//!   [`collapse_core::math::Fixed`]; timing is converted to integer tick
//!   thresholds once, at configuration time.
//!
//! - **HashMap iteration order**: entity collections are ordered maps and
//!   are always walked in id order.
//!
//! - **System randomness**: spawn points and colours come from the seeded
//!   generator stored in the simulation.
//!
//! # Test Levels
//!
//! 1. **Unit tests**: Individual step determinism (movement, capture, combat)
//! 2. **Property tests**: Random intent scripts still produce identical hashes
//! 3. **Integration tests**: Full match scenarios are reproducible
//! 4. **Parallel tests**: Running N simulations in parallel all match

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::thread;

use collapse_core::replay::Recorder;
use collapse_core::simulation::Simulation;

use crate::fixtures::{run_script, ScriptStep};

/// Result of a determinism test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeterminismResult {
    /// Whether all runs produced identical results.
    pub is_deterministic: bool,
    /// Hashes from each run.
    pub hashes: Vec<u64>,
    /// Number of ticks simulated.
    pub ticks: u64,
}

impl DeterminismResult {
    /// Get all unique hashes (should be 1 for deterministic simulation).
    #[must_use]
    pub fn unique_hashes(&self) -> Vec<u64> {
        let mut unique: Vec<u64> = self.hashes.clone();
        unique.sort_unstable();
        unique.dedup();
        unique
    }

    /// Assert that the simulation was deterministic, with a detailed error message.
    ///
    /// # Panics
    ///
    /// Panics if the simulation produced different hashes across runs.
    pub fn assert_deterministic(&self) {
        if !self.is_deterministic {
            let unique = self.unique_hashes();
            panic!(
                "Simulation is non-deterministic!\n\
                 Runs: {}\n\
                 Ticks: {}\n\
                 Unique hashes: {} (expected 1)\n\
                 All hashes: {:?}",
                self.hashes.len(),
                self.ticks,
                unique.len(),
                self.hashes
            );
        }
    }
}

/// Run a simulation multiple times and verify determinism.
///
/// # Arguments
///
/// * `runs` - Number of times to run the simulation
/// * `ticks` - Number of ticks to simulate per run
/// * `setup` - Function to create initial simulation state
/// * `step` - Function to advance simulation by one tick
/// * `hash` - Function to compute state hash
///
/// # Example
///
/// ```
/// use collapse_test_utils::determinism::verify_determinism;
/// use collapse_test_utils::fixtures::skirmish;
///
/// let result = verify_determinism(
///     3,   // Run 3 times
///     100, // 100 ticks each
///     skirmish,
///     |sim| {
///         sim.tick();
///     },
///     |sim| sim.state_hash(),
/// );
/// result.assert_deterministic();
/// ```
pub fn verify_determinism<S, Setup, Step, HashFn>(
    runs: usize,
    ticks: u64,
    setup: Setup,
    step: Step,
    hash: HashFn,
) -> DeterminismResult
where
    Setup: Fn() -> S,
    Step: Fn(&mut S),
    HashFn: Fn(&S) -> u64,
{
    let mut hashes = Vec::with_capacity(runs);

    for _ in 0..runs {
        let mut state = setup();

        for _ in 0..ticks {
            step(&mut state);
        }

        hashes.push(hash(&state));
    }

    let is_deterministic = hashes.windows(2).all(|w| w[0] == w[1]);

    DeterminismResult {
        is_deterministic,
        hashes,
        ticks,
    }
}

/// Simplified determinism verification for [`Simulation`].
///
/// Runs the simulation twice with identical setup and verifies the final
/// state hashes match exactly.
pub fn verify_simulation_determinism<F>(setup_fn: F, num_ticks: u64) -> bool
where
    F: Fn() -> Simulation,
{
    let result = verify_determinism(
        2,
        num_ticks,
        &setup_fn,
        |sim| {
            sim.tick();
        },
        |sim| sim.state_hash(),
    );
    result.is_deterministic
}

/// Apply the same intent script to two fresh simulations and compare the
/// final hashes.
pub fn verify_script_determinism<F>(setup_fn: F, script: &[ScriptStep]) -> DeterminismResult
where
    F: Fn() -> Simulation,
{
    let hashes: Vec<u64> = (0..2)
        .map(|_| {
            let mut sim = setup_fn();
            run_script(&mut sim, script);
            sim.state_hash()
        })
        .collect();
    let ticks = script.iter().map(|s| s.ticks_after).sum();

    DeterminismResult {
        is_deterministic: hashes[0] == hashes[1],
        hashes,
        ticks,
    }
}

/// Result of parallel simulation runs.
#[derive(Debug, Clone)]
pub struct ParallelSimResult {
    /// Final state hash from each simulation.
    pub hashes: Vec<u64>,
    /// Number of ticks each simulation ran.
    pub ticks: u64,
    /// Number of simulations run.
    pub num_sims: usize,
}

impl ParallelSimResult {
    /// Check if all simulations produced identical results.
    #[must_use]
    pub fn is_deterministic(&self) -> bool {
        self.hashes.windows(2).all(|w| w[0] == w[1])
    }

    /// Assert all simulations matched.
    ///
    /// # Panics
    ///
    /// Panics if simulations produced different hashes.
    pub fn assert_deterministic(&self) {
        if !self.is_deterministic() {
            let mut unique: Vec<u64> = self.hashes.clone();
            unique.sort_unstable();
            unique.dedup();
            panic!(
                "Parallel simulations diverged!\n\
                 Simulations: {}\n\
                 Ticks: {}\n\
                 Unique hashes: {}\n\
                 All hashes: {:?}",
                self.num_sims,
                self.ticks,
                unique.len(),
                self.hashes
            );
        }
    }
}

/// Run N simulations on scoped threads and collect final hashes.
///
/// Catches state that depends on thread scheduling or memory layout.
///
/// # Panics
///
/// Panics if a simulation thread panics.
pub fn run_parallel_simulations_scoped<F>(
    setup_fn: F,
    num_sims: usize,
    num_ticks: u64,
) -> ParallelSimResult
where
    F: Fn() -> Simulation + Sync,
{
    let hashes = thread::scope(|s| {
        let handles: Vec<_> = (0..num_sims)
            .map(|_| {
                s.spawn(|| {
                    let mut sim = setup_fn();
                    for _ in 0..num_ticks {
                        sim.tick();
                    }
                    sim.state_hash()
                })
            })
            .collect();

        handles
            .into_iter()
            .map(|h| h.join().expect("simulation thread panicked"))
            .collect()
    });

    ParallelSimResult {
        hashes,
        ticks: num_ticks,
        num_sims,
    }
}

/// Compare two simulation runs tick-by-tick, finding first divergence.
///
/// # Returns
///
/// `None` if simulations are deterministic, `Some(tick)` if they diverge
/// at that tick.
pub fn find_first_divergence<F>(setup_fn: F, num_ticks: u64) -> Option<u64>
where
    F: Fn() -> Simulation,
{
    let mut sim1 = setup_fn();
    let mut sim2 = setup_fn();

    if sim1.state_hash() != sim2.state_hash() {
        return Some(0);
    }

    for tick in 1..=num_ticks {
        sim1.tick();
        sim2.tick();

        if sim1.state_hash() != sim2.state_hash() {
            return Some(tick);
        }
    }

    None
}

/// Verify that a snapshot round trip preserves simulation state exactly,
/// and that the restored copy keeps evolving identically.
pub fn verify_serialization_determinism<F>(setup_fn: F, num_ticks: u64) -> bool
where
    F: Fn() -> Simulation,
{
    let mut sim = setup_fn();

    for _ in 0..num_ticks {
        sim.tick();
    }

    let Ok(bytes) = sim.serialize() else {
        return false;
    };
    let Ok(mut restored) = Simulation::deserialize(&bytes) else {
        return false;
    };

    if restored.state_hash() != sim.state_hash() {
        return false;
    }

    for _ in 0..num_ticks {
        sim.tick();
        restored.tick();
    }
    restored.state_hash() == sim.state_hash()
}

/// Record a script from a fresh simulation and check that replaying the
/// recording lands on the same hash as the live run.
pub fn verify_recording_determinism<F>(setup_fn: F, script: &[ScriptStep]) -> bool
where
    F: Fn() -> Simulation,
{
    let Ok(mut recorder) = Recorder::new(setup_fn()) else {
        return false;
    };
    for step in script {
        if let Err(error) = recorder.apply_intent(step.player, step.intent.clone()) {
            tracing::trace!(%error, "Scripted intent refused");
        }
        for _ in 0..step.ticks_after {
            recorder.tick();
        }
    }
    let (live, recording) = recorder.finish();

    match recording.replay() {
        Ok(replayed) => replayed.state_hash() == live.state_hash(),
        Err(_) => false,
    }
}

/// Compute a simple hash for any hashable value.
pub fn compute_hash<T: Hash>(value: &T) -> u64 {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}

/// Proptest strategies for intent scripts.
///
/// These strategies generate random but reproducible client behaviour for
/// property-based testing of the simulation.
pub mod strategies {
    use collapse_core::components::{EntityId, PlayerId, Team};
    use collapse_core::hex::HexCoord;
    use collapse_core::intent::Intent;
    use proptest::prelude::*;

    use crate::fixtures::ScriptStep;

    /// A hex inside (or just outside) a map of `radius`.
    ///
    /// Covers the bounding rhombus plus one ring, so some coordinates are
    /// invalid on purpose.
    pub fn arb_hex(radius: i32) -> impl Strategy<Value = HexCoord> {
        let span = radius + 1;
        (-span..=span, -span..=span).prop_map(|(q, r)| HexCoord::new(q, r))
    }

    /// Either team.
    pub fn arb_team() -> impl Strategy<Value = Team> {
        prop_oneof![Just(Team::Green), Just(Team::Blue)]
    }

    /// A small entity id, likely to hit a real tower or base.
    pub fn arb_entity_id() -> impl Strategy<Value = EntityId> {
        0u64..12
    }

    /// Any intent except joining and leaving.
    pub fn arb_action(radius: i32) -> impl Strategy<Value = Intent> {
        prop_oneof![
            4 => arb_hex(radius).prop_map(|destination| Intent::MoveTo { destination }),
            2 => proptest::option::of(arb_entity_id()).prop_map(|target| Intent::TargetTower { target }),
            2 => Just(Intent::FireLaser),
            2 => Just(Intent::FireLrm),
            2 => arb_hex(radius).prop_map(|position| Intent::BuildTower { position }),
        ]
    }

    /// Any intent, including the rare reset, join and disconnect.
    pub fn arb_intent(radius: i32) -> impl Strategy<Value = Intent> {
        prop_oneof![
            12 => arb_action(radius),
            1 => Just(Intent::ResetGame),
            1 => arb_team().prop_map(|team| Intent::Join {
                name: "prop".to_string(),
                team,
            }),
            1 => Just(Intent::Disconnect),
        ]
    }

    /// One scripted step for one of `players` players.
    pub fn arb_script_step(players: u64, radius: i32) -> impl Strategy<Value = ScriptStep> {
        (0..players, arb_intent(radius), 0u64..40).prop_map(|(player, intent, ticks_after)| {
            ScriptStep {
                player: PlayerId(player),
                intent,
                ticks_after,
            }
        })
    }

    /// A script of up to `max_len` steps.
    pub fn arb_script(
        players: u64,
        radius: i32,
        max_len: usize,
    ) -> impl Strategy<Value = Vec<ScriptStep>> {
        proptest::collection::vec(arb_script_step(players, radius), 0..max_len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{default_sim, join, skirmish};
    use collapse_core::components::{PlayerId, Team};
    use collapse_core::intent::Intent;
    use proptest::prelude::*;

    // =========================================================================
    // Basic determinism tests
    // =========================================================================

    #[test]
    fn test_verify_determinism_simple() {
        let result = verify_determinism(3, 100, || 0u64, |n| *n += 1, |n| *n);

        assert!(result.is_deterministic);
        assert_eq!(result.hashes, vec![100, 100, 100]);
    }

    #[test]
    fn test_empty_match_determinism() {
        assert!(verify_simulation_determinism(default_sim, 100));
    }

    #[test]
    fn test_skirmish_determinism() {
        let result = verify_determinism(
            3,
            600,
            skirmish,
            |sim| {
                sim.tick();
            },
            |sim| sim.state_hash(),
        );
        result.assert_deterministic();
    }

    #[test]
    fn test_find_divergence_on_deterministic_sim() {
        assert!(find_first_divergence(skirmish, 300).is_none());
    }

    #[test]
    fn test_different_seeds_diverge() {
        let a = || {
            let mut sim = crate::fixtures::sim_with_seed(1);
            join(&mut sim, 1, Team::Green);
            sim
        };
        let b = || {
            let mut sim = crate::fixtures::sim_with_seed(2);
            join(&mut sim, 1, Team::Green);
            sim
        };
        assert_ne!(a().state_hash(), b().state_hash());
    }

    #[test]
    fn test_combat_events_are_identical() {
        let mut sim1 = skirmish();
        let mut sim2 = skirmish();

        for tick in 0..400 {
            let events1 = sim1.tick();
            let events2 = sim2.tick();
            assert_eq!(events1, events2, "Events differ at tick {tick}");
        }
    }

    // =========================================================================
    // Serialization round-trip tests
    // =========================================================================

    #[test]
    fn test_serialization_preserves_empty_match() {
        assert!(verify_serialization_determinism(default_sim, 0));
    }

    #[test]
    fn test_serialization_preserves_skirmish() {
        assert!(verify_serialization_determinism(skirmish, 250));
    }

    // =========================================================================
    // Parallel simulation tests
    // =========================================================================

    #[test]
    fn test_parallel_skirmishes() {
        let result = run_parallel_simulations_scoped(skirmish, 4, 300);
        assert_eq!(result.hashes.len(), 4);
        result.assert_deterministic();
    }

    #[test]
    fn test_skirmish_recording_replays() {
        let script = [
            ScriptStep {
                player: PlayerId(1),
                intent: Intent::FireLaser,
                ticks_after: 200,
            },
            ScriptStep {
                player: PlayerId(2),
                intent: Intent::FireLrm,
                ticks_after: 200,
            },
        ];
        assert!(verify_recording_determinism(skirmish, &script));
    }

    #[test]
    fn test_compute_hash_is_stable() {
        assert_eq!(compute_hash(&(1u32, "a")), compute_hash(&(1u32, "a")));
    }

    // =========================================================================
    // Property tests
    // =========================================================================

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(24))]

        #[test]
        fn prop_scripts_are_deterministic(script in strategies::arb_script(4, 10, 30)) {
            let result = verify_script_determinism(default_sim, &script);
            prop_assert!(result.is_deterministic, "hashes differ: {:?}", result.hashes);
        }

        #[test]
        fn prop_recordings_replay_exactly(script in strategies::arb_script(4, 10, 30)) {
            prop_assert!(verify_recording_determinism(default_sim, &script));
        }
    }
}
