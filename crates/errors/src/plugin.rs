//! Plugin process error types

use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum PluginError {
    /// The phase subprocess exited with a non-zero code. Terminal for the
    /// pipeline; later phases are not attempted.
    #[error("plugin {plugin} failed in {phase}: exit code {code}")]
    ProcessFailed {
        plugin: String,
        phase: String,
        code: i32,
    },

    /// The phase subprocess could not be started.
    #[error("failed to spawn plugin {plugin} for {phase}: {message}")]
    SpawnFailed {
        plugin: String,
        phase: String,
        message: String,
    },

    /// A structured progress record on stderr did not parse. Non-fatal; the
    /// record is forwarded as an error event and the phase continues.
    #[error("malformed progress record: {message}")]
    Protocol { message: String },

    /// Graceful termination did not finish within the grace period and the
    /// process had to be killed.
    #[error("plugin {plugin} did not terminate within {grace_ms}ms, killed")]
    TerminationForced { plugin: String, grace_ms: u64 },

    /// The plugin executable was not found.
    #[error("plugin executable not found: {program}")]
    NotFound { program: String },
}
