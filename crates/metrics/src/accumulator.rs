//! The per-pipeline metrics accumulator

use std::collections::BTreeMap;
use std::sync::Mutex;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::warn;
use upd_types::{Phase, PhaseSnapshot};

use crate::sample::TreeSample;

/// Running totals across all frozen phases plus the live phase's delta.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct CumulativeMetrics {
    pub cpu_seconds: f64,
    pub bytes_transferred: u64,
    pub peak_memory: u64,
}

/// Live counters for the phase currently in flight.
///
/// Each counter keeps the maximum observed value: a descendant process that
/// exits before the next sample tick must not reduce what has already been
/// observed.
#[derive(Debug, Clone, Copy, Default)]
struct LiveCounters {
    cpu_seconds: f64,
    bytes_transferred: u64,
    peak_memory: u64,
}

impl LiveCounters {
    fn merge_max(&mut self, sample: &TreeSample) {
        self.cpu_seconds = self.cpu_seconds.max(sample.cpu_seconds);
        self.bytes_transferred = self.bytes_transferred.max(sample.bytes_transferred);
        self.peak_memory = self.peak_memory.max(sample.memory_bytes);
    }
}

#[derive(Debug)]
struct ActivePhase {
    phase: Phase,
    started: Instant,
    live: LiveCounters,
}

#[derive(Debug, Default)]
struct Inner {
    active: Option<ActivePhase>,
    frozen: BTreeMap<Phase, PhaseSnapshot>,
    /// Sum of all frozen snapshots (peak memory is a max, not a sum)
    total: CumulativeMetrics,
}

/// Persistent counter store for one pipeline.
///
/// Created once at pipeline start and shared by reference into every task
/// that reads or updates it; there is no process-wide singleton. The
/// accumulator outlives every phase subprocess, which is what keeps
/// historical data across phase transitions and subprocess restarts.
#[derive(Debug, Default)]
pub struct MetricsAccumulator {
    inner: Mutex<Inner>,
}

impl MetricsAccumulator {
    /// Create an empty accumulator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Begin accumulating for `phase`.
    ///
    /// The phase's baseline is the running total at this moment, not zero:
    /// the frozen snapshot later computed for the phase is the delta
    /// accumulated from here.
    pub fn start_phase(&self, phase: Phase) {
        let mut inner = self.inner.lock().unwrap();
        if inner.frozen.contains_key(&phase) {
            warn!(phase = %phase, "start_phase called for an already-frozen phase, ignoring");
            return;
        }
        if let Some(active) = &inner.active {
            warn!(
                previous = %active.phase,
                phase = %phase,
                "start_phase called while a phase was still live"
            );
        }
        inner.active = Some(ActivePhase {
            phase,
            started: Instant::now(),
            live: LiveCounters::default(),
        });
    }

    /// Record one process-tree observation for the live phase.
    ///
    /// Counters that can only increase within a phase (CPU time, bytes)
    /// keep the maximum of the new and retained values, so contributions
    /// from descendants that exited between ticks are not lost. Samples
    /// arriving when no phase is live are ignored.
    pub fn sample(&self, sample: &TreeSample) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(active) = inner.active.as_mut() {
            active.live.merge_max(sample);
        }
    }

    /// Freeze the live phase's snapshot and fold it into the running total.
    ///
    /// Idempotent per phase: once frozen, a snapshot is immutable and later
    /// calls return the frozen value unchanged.
    pub fn complete_phase(&self, phase: Phase) -> PhaseSnapshot {
        let mut inner = self.inner.lock().unwrap();
        if let Some(existing) = inner.frozen.get(&phase) {
            return *existing;
        }

        let (wall_clock_ms, live) = match inner.active.take() {
            Some(active) if active.phase == phase => {
                let elapsed = active.started.elapsed();
                (u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX), active.live)
            }
            other => {
                // Freezing a phase that never started happens on skip paths;
                // record an empty snapshot so the phase map stays complete.
                inner.active = other;
                (0, LiveCounters::default())
            }
        };

        let snapshot = PhaseSnapshot {
            wall_clock_ms,
            cpu_seconds: live.cpu_seconds,
            bytes_transferred: live.bytes_transferred,
            peak_memory: live.peak_memory,
        };
        inner.total.cpu_seconds += snapshot.cpu_seconds;
        inner.total.bytes_transferred += snapshot.bytes_transferred;
        inner.total.peak_memory = inner.total.peak_memory.max(snapshot.peak_memory);
        inner.frozen.insert(phase, snapshot);
        snapshot
    }

    /// Running total across all frozen phases plus the live phase's
    /// un-frozen delta. Non-decreasing for the life of the pipeline.
    #[must_use]
    pub fn cumulative(&self) -> CumulativeMetrics {
        let inner = self.inner.lock().unwrap();
        let live = inner
            .active
            .as_ref()
            .map(|a| a.live)
            .unwrap_or_default();
        CumulativeMetrics {
            cpu_seconds: inner.total.cpu_seconds + live.cpu_seconds,
            bytes_transferred: inner.total.bytes_transferred + live.bytes_transferred,
            peak_memory: inner.total.peak_memory.max(live.peak_memory),
        }
    }

    /// Frozen snapshot for `phase`, if the phase has completed.
    #[must_use]
    pub fn snapshot(&self, phase: Phase) -> Option<PhaseSnapshot> {
        self.inner.lock().unwrap().frozen.get(&phase).copied()
    }

    /// All frozen snapshots, keyed by phase.
    #[must_use]
    pub fn snapshots(&self) -> BTreeMap<Phase, PhaseSnapshot> {
        self.inner.lock().unwrap().frozen.clone()
    }

    /// The phase currently accumulating, if any.
    #[must_use]
    pub fn live_phase(&self) -> Option<Phase> {
        self.inner.lock().unwrap().active.as_ref().map(|a| a.phase)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(cpu: f64, bytes: u64, mem: u64) -> TreeSample {
        TreeSample {
            cpu_seconds: cpu,
            bytes_transferred: bytes,
            memory_bytes: mem,
        }
    }

    #[test]
    fn child_exit_does_not_lose_cpu_time() {
        let metrics = MetricsAccumulator::new();
        metrics.start_phase(Phase::Execute);

        // A child consumed 2 CPU-seconds, then exited before the next tick:
        // the following observation only sees the parent's 0.5s.
        metrics.sample(&sample(2.0, 4096, 1024));
        metrics.sample(&sample(0.5, 1024, 512));

        let snapshot = metrics.complete_phase(Phase::Execute);
        assert!(snapshot.cpu_seconds >= 2.0);
        assert_eq!(snapshot.bytes_transferred, 4096);
        assert_eq!(snapshot.peak_memory, 1024);
    }

    #[test]
    fn frozen_snapshot_is_immutable() {
        let metrics = MetricsAccumulator::new();
        metrics.start_phase(Phase::Check);
        metrics.sample(&sample(1.0, 100, 100));
        let frozen = metrics.complete_phase(Phase::Check);

        // Sampling after the freeze must not mutate the snapshot.
        metrics.sample(&sample(9.0, 9999, 9999));
        assert_eq!(metrics.snapshot(Phase::Check).unwrap(), frozen);
        assert_eq!(metrics.complete_phase(Phase::Check), frozen);
    }

    #[test]
    fn cumulative_is_monotonic_across_phase_transitions() {
        let metrics = MetricsAccumulator::new();

        metrics.start_phase(Phase::Check);
        metrics.sample(&sample(1.0, 1000, 500));
        let before_freeze = metrics.cumulative();
        metrics.complete_phase(Phase::Check);
        let after_freeze = metrics.cumulative();
        assert!(after_freeze.cpu_seconds >= before_freeze.cpu_seconds);
        assert!(after_freeze.bytes_transferred >= before_freeze.bytes_transferred);

        // A fresh subprocess for the next phase starts its counters at zero;
        // the cumulative total must not dip.
        metrics.start_phase(Phase::Execute);
        metrics.sample(&sample(0.1, 10, 50));
        let next_phase = metrics.cumulative();
        assert!(next_phase.cpu_seconds >= after_freeze.cpu_seconds);
        assert!(next_phase.bytes_transferred >= after_freeze.bytes_transferred);
    }

    #[test]
    fn skipped_phase_freezes_empty_snapshot() {
        let metrics = MetricsAccumulator::new();
        let snapshot = metrics.complete_phase(Phase::Download);
        assert_eq!(snapshot, PhaseSnapshot::default());
        assert!(metrics.snapshot(Phase::Download).is_some());
    }

    #[test]
    fn samples_between_phases_are_ignored() {
        let metrics = MetricsAccumulator::new();
        metrics.sample(&sample(5.0, 5000, 5000));
        assert_eq!(metrics.cumulative(), CumulativeMetrics::default());
    }
}
