//! Seeded random number generator owned by the simulation.
//!
//! The generator is part of the simulation state (it is serialized and
//! hashed with everything else), so replaying the same intents against the
//! same seed reproduces spawn points and colours exactly.

use serde::{Deserialize, Serialize};

/// Simple deterministic linear-congruential generator.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SimRng {
    state: u64,
}

impl SimRng {
    /// Create a generator from a seed.
    #[must_use]
    pub const fn new(seed: u64) -> Self {
        Self {
            state: seed.wrapping_add(0x9E37_79B9_7F4A_7C15),
        }
    }

    /// Next raw 64-bit value.
    pub fn next_u64(&mut self) -> u64 {
        self.state = self
            .state
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1_442_695_040_888_963_407);
        // Low LCG bits cycle quickly; hand out the high half.
        self.state >> 32
    }

    /// Uniform integer in the inclusive range `[min, max]`.
    ///
    /// Returns `min` when the range is empty or inverted.
    pub fn range_inclusive(&mut self, min: i32, max: i32) -> i32 {
        if max <= min {
            return min;
        }
        let span = (i64::from(max) - i64::from(min) + 1) as u64;
        min + (self.next_u64() % span) as i32
    }

    /// Uniform index in `[0, len)`. `len` must be non-zero.
    pub fn index(&mut self, len: usize) -> usize {
        debug_assert!(len > 0, "index() on empty range");
        (self.next_u64() % len as u64) as usize
    }
}
