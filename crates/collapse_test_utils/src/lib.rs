//! # Collapse Test Utilities
//!
//! Shared testing utilities for all crates:
//! - Determinism test harness
//! - World fixtures and player placement helpers
//! - Property-based testing strategies for intents

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod determinism;
pub mod fixtures;

/// Re-export proptest for convenience.
pub use proptest;
