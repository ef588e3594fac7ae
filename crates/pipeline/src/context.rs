//! Shared execution context for pipelines

use std::sync::Arc;
use std::time::Duration;

use upd_plugin::{ProcessHost, TreeSampler};
use upd_resources::ResourceRegistry;

/// Timing and mode knobs for phase execution.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Timeout for acquiring a phase's resource batch
    pub acquire_timeout: Duration,
    /// Grace period between graceful termination and forced kill
    pub grace_period: Duration,
    /// Process-tree sampling cadence
    pub sample_interval: Duration,
    /// Whether this run is a dry run
    pub dry_run: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            acquire_timeout: Duration::from_secs(120),
            grace_period: Duration::from_secs(5),
            sample_interval: Duration::from_millis(500),
            dry_run: false,
        }
    }
}

/// Collaborators shared by every pipeline in a run.
///
/// The registry is the only state shared across concurrent pipelines; the
/// host and sampler are stateless factories.
#[derive(Clone)]
pub struct PipelineContext {
    /// Named exclusive locks shared across the run
    pub registry: Arc<ResourceRegistry>,
    /// Factory for phase subprocesses
    pub host: Arc<dyn ProcessHost>,
    /// Process-tree observation source
    pub sampler: Arc<dyn TreeSampler>,
    /// Timing and mode configuration
    pub config: PipelineConfig,
}
