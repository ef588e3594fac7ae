//! Resource mutex registry error types

use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum ResourceError {
    /// Batch acquisition timed out waiting for a resource mutex.
    ///
    /// Per-pipeline and recoverable; every resource already acquired in the
    /// batch has been released before this is returned.
    #[error("timed out acquiring resource {resource} after {timeout_ms}ms")]
    Timeout { resource: String, timeout_ms: u64 },

    /// Internal bookkeeping invariant violated (e.g. a holder record for a
    /// mutex that was never acquired). Fatal; should not occur in correct
    /// operation.
    #[error("resource registry corrupt: {message}")]
    RegistryCorrupt { message: String },
}
