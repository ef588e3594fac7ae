//! The plugin command surface

use upd_types::Phase;

/// A subcommand of the plugin executable.
///
/// Phases map onto the first three; the rest are probes used to refresh a
/// descriptor's capability flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PluginCommand {
    /// Exit 0 when the plugin has something to update, 1 when not
    IsApplicable,
    /// Fetch artifacts ahead of execution
    Download,
    /// Apply the update; exit 0 success, non-zero failure
    Update { dry_run: bool },
    /// Probe: does the execute phase need elevated privilege?
    DoesRequireSudo,
    /// Probe: can download be separated from execution?
    CanSeparateDownload,
    /// Probe: report download-size / CPU-time estimates as protocol records
    EstimateUpdate,
}

impl PluginCommand {
    /// The subcommand run for `phase`.
    #[must_use]
    pub fn for_phase(phase: Phase, dry_run: bool) -> Self {
        match phase {
            Phase::Check => PluginCommand::IsApplicable,
            Phase::Download => PluginCommand::Download,
            Phase::Execute => PluginCommand::Update { dry_run },
        }
    }

    /// Command-line arguments passed to the plugin executable.
    #[must_use]
    pub fn args(&self) -> Vec<&'static str> {
        match self {
            PluginCommand::IsApplicable => vec!["is-applicable"],
            PluginCommand::Download => vec!["download"],
            PluginCommand::Update { dry_run: false } => vec!["update"],
            PluginCommand::Update { dry_run: true } => vec!["update", "--dry-run"],
            PluginCommand::DoesRequireSudo => vec!["does-require-sudo"],
            PluginCommand::CanSeparateDownload => vec!["can-separate-download"],
            PluginCommand::EstimateUpdate => vec!["estimate-update"],
        }
    }
}

impl std::fmt::Display for PluginCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.args()[0])
    }
}
