//! Simulation stepping strategy, frame state, and the desync hash.
//!
//! The world is parameterized by a [`SimulationStrategy`] that determines how
//! an externally supplied delta-time turns into simulation steps. Every step
//! runs the same four-phase pipeline; the strategy only controls how many
//! steps an `advance()` call executes and with what dt.

use crate::fixed::{Fixed64, Frame, Seconds};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Simulation strategy
// ---------------------------------------------------------------------------

/// How the world advances time. Chosen at world construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SimulationStrategy {
    /// One step per `advance(dt)` call, integrating exactly `dt`. The host
    /// drives the loop and owns frame pacing. Deterministic as long as the
    /// host feeds the same dt sequence.
    Frame,

    /// Fixed-timestep mode. `advance(dt)` accumulates real time and runs as
    /// many fixed steps as fit, carrying the remainder forward. Produces
    /// identical state for identical total time regardless of call pattern.
    FixedStep {
        /// Duration of one simulation step, in seconds.
        timestep: Seconds,
    },
}

// ---------------------------------------------------------------------------
// Simulation state
// ---------------------------------------------------------------------------

/// Mutable stepping state tracked by the world.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimState {
    /// Completed simulation steps since world creation.
    pub frame: Frame,

    /// Total simulated time in seconds.
    pub time: Seconds,

    /// Accumulated time remainder for fixed-step mode. Unused in frame mode.
    pub accumulator: Seconds,
}

impl SimState {
    /// Create a new simulation state starting at frame 0.
    pub fn new() -> Self {
        Self {
            frame: 0,
            time: Fixed64::ZERO,
            accumulator: Fixed64::ZERO,
        }
    }
}

impl Default for SimState {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// State hash
// ---------------------------------------------------------------------------

/// A simple deterministic hash of simulation state for desync detection.
///
/// Uses FNV-1a (64-bit) for speed and simplicity. Not cryptographic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateHash(pub u64);

impl StateHash {
    const FNV_OFFSET: u64 = 0xcbf29ce484222325;
    const FNV_PRIME: u64 = 0x100000001b3;

    /// Start a new hash.
    pub fn new() -> Self {
        Self(Self::FNV_OFFSET)
    }

    /// Feed bytes into the hash.
    pub fn write(&mut self, bytes: &[u8]) {
        for &b in bytes {
            self.0 ^= b as u64;
            self.0 = self.0.wrapping_mul(Self::FNV_PRIME);
        }
    }

    /// Feed a u64 into the hash.
    pub fn write_u64(&mut self, v: u64) {
        self.write(&v.to_le_bytes());
    }

    /// Feed a u32 into the hash.
    pub fn write_u32(&mut self, v: u32) {
        self.write(&v.to_le_bytes());
    }

    /// Feed a Fixed64 into the hash.
    pub fn write_fixed64(&mut self, v: Fixed64) {
        self.write(&v.to_bits().to_le_bytes());
    }

    /// Finalize and return the hash value.
    pub fn finish(self) -> u64 {
        self.0
    }
}

impl Default for StateHash {
    fn default() -> Self {
        Self::new()
    }
}
