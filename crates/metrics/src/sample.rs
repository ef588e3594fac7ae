//! Process-tree samples

use serde::{Deserialize, Serialize};

/// One observation of a phase subprocess's process tree, aggregated across
/// the subprocess and all of its descendants.
///
/// CPU time and bytes transferred are monotonic within a phase as long as
/// every contributor is still alive; when a descendant exits between ticks
/// its contribution disappears from the next observation, which is why the
/// accumulator max-merges rather than overwrites.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct TreeSample {
    /// Total CPU seconds consumed by the tree
    pub cpu_seconds: f64,
    /// Total bytes read and written by the tree
    pub bytes_transferred: u64,
    /// Current resident memory of the tree, in bytes
    pub memory_bytes: u64,
}

impl TreeSample {
    /// Merge another observation into this one by summation (used when
    /// aggregating per-process values into a tree total).
    #[must_use]
    pub fn combine(self, other: TreeSample) -> TreeSample {
        TreeSample {
            cpu_seconds: self.cpu_seconds + other.cpu_seconds,
            bytes_transferred: self.bytes_transferred + other.bytes_transferred,
            memory_bytes: self.memory_bytes + other.memory_bytes,
        }
    }
}
