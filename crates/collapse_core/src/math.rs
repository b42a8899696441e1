//! Fixed-point math utilities for deterministic simulation.
//!
//! Fractional quantities that accumulate every tick (oil, energy) use
//! fixed-point arithmetic so that two servers fed the same intents end up
//! with bit-identical state. Floating point is only touched once, when a
//! [`GameConfig`](crate::config::GameConfig) is turned into a
//! [`TickSchedule`](crate::config::TickSchedule).

use fixed::types::I32F32;

/// Fixed-point number type for all simulation math.
///
/// Uses 32 bits for integer part and 32 bits for fractional part.
pub type Fixed = I32F32;

/// Serde support for fixed-point numbers.
///
/// Serializes fixed-point numbers as their raw bit representation (i64)
/// to preserve exact precision across serialization boundaries.
pub mod fixed_serde {
    use super::Fixed;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Serialize a fixed-point number as its raw bit representation.
    pub fn serialize<S>(value: &Fixed, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        value.to_bits().serialize(serializer)
    }

    /// Deserialize a fixed-point number from its raw bit representation.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Fixed, D::Error>
    where
        D: Deserializer<'de>,
    {
        let bits = i64::deserialize(deserializer)?;
        Ok(Fixed::from_bits(bits))
    }
}

/// Convert a non-negative whole amount into fixed-point.
#[must_use]
pub fn fixed_from_u32(value: u32) -> Fixed {
    Fixed::from_num(value)
}

/// Floor a fixed-point amount to a whole number for display.
///
/// Negative values floor to zero.
#[must_use]
pub fn floor_to_u32(value: Fixed) -> u32 {
    if value <= Fixed::ZERO {
        0
    } else {
        value.floor().to_num::<u32>()
    }
}
