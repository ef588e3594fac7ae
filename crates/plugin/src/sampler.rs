//! Process-tree sampling
//!
//! The sampler aggregates CPU time, I/O bytes, and memory across a phase
//! subprocess and all of its descendants. Sampling runs on its own cadence,
//! decoupled from consumer refresh rates; the metrics accumulator handles
//! descendants that exit between ticks.

use std::collections::HashMap;
use std::path::Path;

use tracing::trace;
use upd_metrics::TreeSample;

/// Source of process-tree observations for the metrics accumulator.
pub trait TreeSampler: Send + Sync {
    /// Observe the tree rooted at `root_pid`. `None` when the process has
    /// already exited or the platform exposes no per-process accounting.
    fn sample(&self, root_pid: u32) -> Option<TreeSample>;
}

/// Sampler that never observes anything; used where /proc is unavailable.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSampler;

impl TreeSampler for NullSampler {
    fn sample(&self, _root_pid: u32) -> Option<TreeSample> {
        None
    }
}

/// Linux sampler reading `/proc`.
///
/// CPU time comes from `utime + stime + cutime + cstime` in
/// `/proc/<pid>/stat` (the `c*` fields cover already-reaped children), I/O
/// from `/proc/<pid>/io`, and peak memory from `VmHWM` in
/// `/proc/<pid>/status`. Values are summed across the root and every
/// descendant found via the parent-pid map.
#[derive(Debug, Clone)]
pub struct ProcfsSampler {
    ticks_per_second: f64,
}

impl Default for ProcfsSampler {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcfsSampler {
    /// Create a sampler using the system clock-tick rate.
    #[must_use]
    pub fn new() -> Self {
        Self {
            ticks_per_second: clock_ticks_per_second(),
        }
    }

    fn sample_pid(&self, pid: u32) -> Option<TreeSample> {
        let proc_dir = Path::new("/proc").join(pid.to_string());
        let stat = std::fs::read_to_string(proc_dir.join("stat")).ok()?;
        let fields = stat_fields(&stat)?;

        // Fields after comm: index 11..=14 are utime, stime, cutime, cstime.
        let ticks: u64 = fields
            .iter()
            .skip(11)
            .take(4)
            .filter_map(|f| f.parse::<u64>().ok())
            .sum();
        #[allow(clippy::cast_precision_loss)]
        let cpu_seconds = ticks as f64 / self.ticks_per_second;

        let bytes_transferred = std::fs::read_to_string(proc_dir.join("io"))
            .ok()
            .map(|io| {
                io.lines()
                    .filter(|l| l.starts_with("read_bytes:") || l.starts_with("write_bytes:"))
                    .filter_map(|l| l.split_whitespace().nth(1)?.parse::<u64>().ok())
                    .sum()
            })
            .unwrap_or(0);

        let memory_bytes = std::fs::read_to_string(proc_dir.join("status"))
            .ok()
            .and_then(|status| {
                status
                    .lines()
                    .find(|l| l.starts_with("VmHWM:"))
                    .and_then(|l| l.split_whitespace().nth(1)?.parse::<u64>().ok())
            })
            .map_or(0, |kb| kb * 1024);

        Some(TreeSample {
            cpu_seconds,
            bytes_transferred,
            memory_bytes,
        })
    }
}

impl TreeSampler for ProcfsSampler {
    fn sample(&self, root_pid: u32) -> Option<TreeSample> {
        let tree = descendant_pids(root_pid)?;
        trace!(root_pid, processes = tree.len(), "sampling process tree");
        let mut total = self.sample_pid(root_pid)?;
        for pid in tree {
            if pid != root_pid {
                if let Some(sample) = self.sample_pid(pid) {
                    total = total.combine(sample);
                }
            }
        }
        Some(total)
    }
}

/// Fields of `/proc/<pid>/stat` after the parenthesized comm field.
///
/// The comm field can itself contain spaces and parentheses, so the parse
/// anchors on the last `)`.
fn stat_fields(stat: &str) -> Option<Vec<&str>> {
    let after_comm = &stat[stat.rfind(')')? + 1..];
    Some(after_comm.split_whitespace().collect())
}

/// Pids of the tree rooted at `root_pid`, found by scanning `/proc` for
/// parent links. `None` when the root itself is gone.
fn descendant_pids(root_pid: u32) -> Option<Vec<u32>> {
    if !Path::new("/proc").join(root_pid.to_string()).exists() {
        return None;
    }

    let mut children: HashMap<u32, Vec<u32>> = HashMap::new();
    if let Ok(entries) = std::fs::read_dir("/proc") {
        for entry in entries.flatten() {
            let Some(pid) = entry.file_name().to_str().and_then(|n| n.parse::<u32>().ok()) else {
                continue;
            };
            let Ok(stat) = std::fs::read_to_string(entry.path().join("stat")) else {
                continue;
            };
            if let Some(ppid) =
                stat_fields(&stat).and_then(|fields| fields.get(1)?.parse::<u32>().ok())
            {
                children.entry(ppid).or_default().push(pid);
            }
        }
    }

    let mut tree = vec![root_pid];
    let mut queue = vec![root_pid];
    while let Some(pid) = queue.pop() {
        if let Some(kids) = children.get(&pid) {
            for kid in kids {
                tree.push(*kid);
                queue.push(*kid);
            }
        }
    }
    Some(tree)
}

#[cfg(unix)]
fn clock_ticks_per_second() -> f64 {
    use nix::unistd::{sysconf, SysconfVar};
    #[allow(clippy::cast_precision_loss)]
    match sysconf(SysconfVar::CLK_TCK) {
        Ok(Some(ticks)) if ticks > 0 => ticks as f64,
        _ => 100.0,
    }
}

#[cfg(not(unix))]
fn clock_ticks_per_second() -> f64 {
    100.0
}
