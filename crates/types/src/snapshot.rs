//! Frozen per-phase metrics snapshots

use serde::{Deserialize, Serialize};

/// Immutable record of a phase's resource consumption, frozen when the phase
/// reaches its terminal state.
///
/// Once frozen a snapshot is never overwritten by later sampling; consumers
/// may read it at any cadence without observing regressions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct PhaseSnapshot {
    /// Wall-clock duration of the phase in milliseconds
    pub wall_clock_ms: u64,
    /// Cumulative CPU seconds across the subprocess and all descendants
    pub cpu_seconds: f64,
    /// Bytes transferred during the phase
    pub bytes_transferred: u64,
    /// Peak memory observed across the process tree, in bytes
    pub peak_memory: u64,
}
