//! Update phases and plugin capability sets

use serde::{Deserialize, Serialize};

/// One stage of a plugin's update pipeline.
///
/// Phases run strictly in this order within a pipeline; phases a plugin does
/// not support are passed through without side effects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    /// Probe whether the plugin has anything to update
    Check,
    /// Fetch artifacts ahead of execution (only for plugins that can
    /// separate download from apply)
    Download,
    /// Apply the update
    Execute,
}

impl Phase {
    /// All phases in pipeline order.
    pub const ALL: [Phase; 3] = [Phase::Check, Phase::Download, Phase::Execute];

    /// Stable identifier used in events, logs, and the wire protocol.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Check => "check",
            Phase::Download => "download",
            Phase::Execute => "execute",
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Phase {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "check" => Ok(Phase::Check),
            "download" => Ok(Phase::Download),
            "execute" => Ok(Phase::Execute),
            other => Err(format!("unknown phase: {other}")),
        }
    }
}

/// The fixed capability set of a plugin: which phases it implements.
///
/// This replaces runtime probing of the plugin process; the pipeline switches
/// on the declared set, never on call success or failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct PhaseSet {
    phases: [bool; 3],
}

impl PhaseSet {
    /// Empty capability set.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Capability set containing every phase.
    #[must_use]
    pub fn all() -> Self {
        Self {
            phases: [true; 3],
        }
    }

    /// Add a phase to the set (builder style).
    #[must_use]
    pub fn with(mut self, phase: Phase) -> Self {
        self.phases[phase as usize] = true;
        self
    }

    /// Whether the plugin implements `phase`.
    #[must_use]
    pub fn contains(&self, phase: Phase) -> bool {
        self.phases[phase as usize]
    }

    /// Iterate over the phases in the set, in pipeline order.
    pub fn iter(&self) -> impl Iterator<Item = Phase> + '_ {
        Phase::ALL.into_iter().filter(|p| self.contains(*p))
    }

    /// Whether the set is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        !self.phases.iter().any(|p| *p)
    }
}

impl FromIterator<Phase> for PhaseSet {
    fn from_iter<I: IntoIterator<Item = Phase>>(iter: I) -> Self {
        let mut set = Self::empty();
        for phase in iter {
            set = set.with(phase);
        }
        set
    }
}
