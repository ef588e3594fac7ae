//! Plugin descriptors

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::phase::{Phase, PhaseSet};

/// Identifier of a named exclusive system resource (e.g. a package database
/// lock) that multiple plugins may contend for.
pub type ResourceId = String;

/// Immutable description of one update plugin.
///
/// Provided by the plugin collaborator at run start; the engine never
/// mutates it. The resource declarations are per phase: a phase's declared
/// resources are acquired together before its subprocess starts and released
/// when the phase ends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginDescriptor {
    /// Plugin name, unique within a run (e.g. `apt`, `flatpak`, `cargo`)
    pub name: String,
    /// Which phases the plugin implements
    pub phases: PhaseSet,
    /// Exclusive resources required per phase
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub resources: BTreeMap<Phase, BTreeSet<ResourceId>>,
    /// Whether the plugin's execute phase needs elevated privilege
    #[serde(default)]
    pub requires_sudo: bool,
    /// Whether the plugin understands `--dry-run`
    #[serde(default)]
    pub supports_dry_run: bool,
}

impl PluginDescriptor {
    /// Create a descriptor supporting check and execute, with no resources.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            phases: PhaseSet::empty().with(Phase::Check).with(Phase::Execute),
            resources: BTreeMap::new(),
            requires_sudo: false,
            supports_dry_run: false,
        }
    }

    /// Replace the capability set.
    #[must_use]
    pub fn with_phases(mut self, phases: PhaseSet) -> Self {
        self.phases = phases;
        self
    }

    /// Declare exclusive resources for a phase.
    #[must_use]
    pub fn with_resources<I, S>(mut self, phase: Phase, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<ResourceId>,
    {
        self.resources
            .entry(phase)
            .or_default()
            .extend(ids.into_iter().map(Into::into));
        self
    }

    /// Mark the plugin as requiring elevated privilege.
    #[must_use]
    pub fn with_sudo(mut self) -> Self {
        self.requires_sudo = true;
        self
    }

    /// Mark the plugin as supporting dry-run.
    #[must_use]
    pub fn with_dry_run_support(mut self) -> Self {
        self.supports_dry_run = true;
        self
    }

    /// Resources declared for `phase` (empty set when none declared).
    #[must_use]
    pub fn resources_for(&self, phase: Phase) -> BTreeSet<ResourceId> {
        self.resources.get(&phase).cloned().unwrap_or_default()
    }
}
