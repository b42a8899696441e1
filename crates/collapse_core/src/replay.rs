//! Intent recordings for replaying matches.
//!
//! A recording stores a snapshot of the match plus every intent applied
//! after it, stamped with the tick it arrived on. Because the engine is
//! deterministic, replaying those intents against the snapshot reproduces
//! the recorded final state hash.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::components::PlayerId;
use crate::error::{GameError, Result};
use crate::intent::{Intent, IntentOutcome};
use crate::simulation::{Simulation, TickEvents};

/// Recording format version for compatibility.
pub const RECORDING_VERSION: u32 = 1;

/// One intent as it was applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordedIntent {
    /// Ticks processed when the intent was applied.
    pub tick: u64,
    /// Acting player.
    pub player: PlayerId,
    /// The intent.
    pub intent: Intent,
}

/// Snapshot plus intent stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recording {
    /// Format version.
    pub version: u32,
    /// Seed of the recorded match.
    pub seed: u64,
    /// Serialized starting state.
    pub initial_state: Vec<u8>,
    /// Intents in application order.
    pub intents: Vec<RecordedIntent>,
    /// Tick the recording ended on.
    pub final_tick: u64,
    /// State hash at `final_tick`.
    pub final_hash: u64,
}

impl Recording {
    /// Start a recording from the current state of `sim`.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::Serialization`] if the snapshot fails.
    pub fn start(sim: &Simulation) -> Result<Self> {
        Ok(Self {
            version: RECORDING_VERSION,
            seed: sim.config().seed,
            initial_state: sim.serialize()?,
            intents: Vec::new(),
            final_tick: sim.get_tick(),
            final_hash: sim.state_hash(),
        })
    }

    /// Append an intent.
    pub fn record(&mut self, tick: u64, player: PlayerId, intent: Intent) {
        self.intents.push(RecordedIntent {
            tick,
            player,
            intent,
        });
    }

    /// Stamp the end state.
    pub fn finish(&mut self, sim: &Simulation) {
        self.final_tick = sim.get_tick();
        self.final_hash = sim.state_hash();
    }

    /// Number of recorded intents.
    #[must_use]
    pub fn intent_count(&self) -> usize {
        self.intents.len()
    }

    /// Ticks covered by the recording.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::Serialization`] if the snapshot is unreadable.
    pub fn duration(&self) -> Result<u64> {
        let start = Simulation::deserialize(&self.initial_state)?.get_tick();
        Ok(self.final_tick.saturating_sub(start))
    }

    /// Re-run the recorded intents against the snapshot.
    ///
    /// Intents the engine refuses are skipped, exactly as they were when
    /// recorded.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::Serialization`] if the snapshot is unreadable.
    pub fn replay(&self) -> Result<Simulation> {
        let mut sim = Simulation::deserialize(&self.initial_state)?;
        for entry in &self.intents {
            while sim.get_tick() < entry.tick {
                sim.tick();
            }
            if let Err(error) = sim.apply_intent(entry.player, entry.intent.clone()) {
                tracing::trace!(tick = entry.tick, %error, "Replayed intent refused");
            }
        }
        while sim.get_tick() < self.final_tick {
            sim.tick();
        }
        Ok(sim)
    }

    /// Whether replaying reproduces the recorded final hash.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::Serialization`] if the snapshot is unreadable.
    pub fn verify(&self) -> Result<bool> {
        let sim = self.replay()?;
        let matches = sim.get_tick() == self.final_tick && sim.state_hash() == self.final_hash;
        if !matches {
            tracing::warn!(
                tick = sim.get_tick(),
                expected = self.final_hash,
                actual = sim.state_hash(),
                "Replay diverged"
            );
        }
        Ok(matches)
    }

    /// Encode with bincode.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::Serialization`] if encoding fails.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        bincode::serialize(self)
            .map_err(|e| GameError::Serialization(format!("Failed to serialize recording: {e}")))
    }

    /// Decode bytes from [`to_bytes`](Self::to_bytes).
    ///
    /// # Errors
    ///
    /// Returns [`GameError::Serialization`] for bad bytes or another
    /// format version.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let recording: Self = bincode::deserialize(bytes)
            .map_err(|e| GameError::Serialization(format!("Failed to deserialize recording: {e}")))?;
        if recording.version != RECORDING_VERSION {
            return Err(GameError::Serialization(format!(
                "Recording version mismatch: expected {RECORDING_VERSION}, got {}",
                recording.version
            )));
        }
        Ok(recording)
    }

    /// Write to a file.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::Serialization`] if encoding or writing fails.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let bytes = self.to_bytes()?;
        std::fs::write(path.as_ref(), bytes)
            .map_err(|e| GameError::Serialization(format!("Failed to write recording: {e}")))
    }

    /// Read from a file.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::Serialization`] if reading or decoding fails.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let bytes = std::fs::read(path.as_ref())
            .map_err(|e| GameError::Serialization(format!("Failed to read recording: {e}")))?;
        Self::from_bytes(&bytes)
    }
}

/// A simulation that records every intent applied to it.
#[derive(Debug)]
pub struct Recorder {
    sim: Simulation,
    recording: Recording,
}

impl Recorder {
    /// Start recording `sim` from its current state.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::Serialization`] if the snapshot fails.
    pub fn new(sim: Simulation) -> Result<Self> {
        let recording = Recording::start(&sim)?;
        Ok(Self { sim, recording })
    }

    /// The recorded match.
    #[must_use]
    pub const fn simulation(&self) -> &Simulation {
        &self.sim
    }

    /// Record and apply an intent.
    ///
    /// # Errors
    ///
    /// Same as [`Simulation::apply_intent`]; refused intents stay recorded.
    pub fn apply_intent(&mut self, player: PlayerId, intent: Intent) -> Result<IntentOutcome> {
        self.recording.record(self.sim.get_tick(), player, intent.clone());
        self.sim.apply_intent(player, intent)
    }

    /// Advance one tick.
    pub fn tick(&mut self) -> TickEvents {
        self.sim.tick()
    }

    /// Stop recording; returns the match and the finished recording.
    #[must_use]
    pub fn finish(mut self) -> (Simulation, Recording) {
        self.recording.finish(&self.sim);
        (self.sim, self.recording)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::Team;
    use crate::config::GameConfig;
    use crate::hex::HexCoord;

    fn recorded_match() -> (Simulation, Recording) {
        let mut config = GameConfig::default();
        config.combat.auto_target_enabled = true;
        let mut recorder = Recorder::new(Simulation::new(config).unwrap()).unwrap();

        let join = |name: &str, team| Intent::Join {
            name: name.to_string(),
            team,
        };
        recorder.apply_intent(PlayerId(1), join("ada", Team::Green)).unwrap();
        recorder.apply_intent(PlayerId(2), join("bob", Team::Blue)).unwrap();
        for _ in 0..5 {
            recorder.tick();
        }
        recorder
            .apply_intent(
                PlayerId(1),
                Intent::MoveTo {
                    destination: HexCoord::ORIGIN,
                },
            )
            .unwrap();
        recorder
            .apply_intent(
                PlayerId(2),
                Intent::MoveTo {
                    destination: HexCoord::new(0, -2),
                },
            )
            .unwrap();
        for _ in 0..300 {
            recorder.tick();
        }
        recorder.apply_intent(PlayerId(1), Intent::FireLaser).unwrap();
        recorder.apply_intent(PlayerId(2), Intent::Disconnect).unwrap();
        for _ in 0..20 {
            recorder.tick();
        }
        recorder.finish()
    }

    #[test]
    fn test_recording_replays_to_same_state() {
        let (sim, recording) = recorded_match();

        assert_eq!(recording.intent_count(), 6);
        assert_eq!(recording.final_tick, 325);
        assert_eq!(recording.duration().unwrap(), 325);
        assert!(recording.verify().unwrap());

        let replayed = recording.replay().unwrap();
        assert_eq!(replayed.state_hash(), sim.state_hash());
    }

    #[test]
    fn test_tampered_recording_diverges() {
        let (_, mut recording) = recorded_match();
        recording.intents.retain(|entry| entry.intent != Intent::Disconnect);
        assert!(!recording.verify().unwrap());
    }

    #[test]
    fn test_bytes_round_trip() {
        let (_, recording) = recorded_match();
        let bytes = recording.to_bytes().unwrap();
        assert_eq!(Recording::from_bytes(&bytes).unwrap(), recording);
    }

    #[test]
    fn test_version_mismatch_rejected() {
        let (_, mut recording) = recorded_match();
        recording.version = RECORDING_VERSION + 1;
        let bytes = recording.to_bytes().unwrap();

        let err = Recording::from_bytes(&bytes).unwrap_err();
        assert!(err.to_string().contains("version mismatch"));
    }

    #[test]
    fn test_save_and_load() {
        let (_, recording) = recorded_match();
        let path = std::env::temp_dir()
            .join(format!("collapse-recording-{}.bin", std::process::id()));

        recording.save(&path).unwrap();
        let loaded = Recording::load(&path).unwrap();
        let _ = std::fs::remove_file(&path);

        assert_eq!(loaded, recording);
    }

    #[test]
    fn test_load_missing_file() {
        let err = Recording::load("/nonexistent/collapse.rec").unwrap_err();
        assert!(matches!(err, GameError::Serialization(_)));
    }
}
