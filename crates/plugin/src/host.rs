//! Process host traits
//!
//! The pipeline drives plugin subprocesses only through these traits, which
//! keeps concrete process machinery (and test doubles) out of the state
//! machine.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use upd_errors::Error;
use upd_events::StreamEvent;
use upd_types::PluginDescriptor;

use crate::command::PluginCommand;

/// A running phase subprocess, already wired for event extraction.
#[async_trait]
pub trait PhaseProcess: Send {
    /// OS process id of the subprocess, for tree sampling. `None` once the
    /// process has exited (or for test doubles with no real process).
    fn pid(&self) -> Option<u32>;

    /// Next parsed event from the subprocess's output streams.
    ///
    /// Yields `Output`/`Progress`/`Estimate`/`Error` events as lines
    /// arrive, then exactly one `Exit` event when the process finishes,
    /// then `None`.
    async fn next_event(&mut self) -> Option<StreamEvent>;

    /// Two-stage termination: graceful signal, then forced kill after
    /// `grace`. Reaches the whole process group so descendants are reaped.
    ///
    /// # Errors
    ///
    /// Returns an error if the process could not be signalled at all.
    async fn terminate(&mut self, grace: Duration) -> Result<(), Error>;
}

/// Factory for phase subprocesses.
#[async_trait]
pub trait ProcessHost: Send + Sync {
    /// Start the subprocess for one plugin command.
    ///
    /// # Errors
    ///
    /// Returns an error if the plugin executable cannot be found or
    /// spawned.
    async fn spawn(
        &self,
        plugin: &PluginDescriptor,
        command: PluginCommand,
    ) -> Result<Box<dyn PhaseProcess>, Error>;

    /// Run a probe command to completion and report whether it exited 0.
    ///
    /// # Errors
    ///
    /// Returns an error if the probe process cannot be spawned.
    async fn probe(
        &self,
        plugin: &PluginDescriptor,
        command: PluginCommand,
    ) -> Result<bool, Error> {
        let mut process = self.spawn(plugin, command).await?;
        let mut exit_code = -1;
        while let Some(event) = process.next_event().await {
            if let StreamEvent::Exit { code } = event {
                exit_code = code;
            }
        }
        Ok(exit_code == 0)
    }
}

/// Refresh a descriptor's capability flags by running the plugin's probe
/// commands (`does-require-sudo`, `can-separate-download`).
///
/// # Errors
///
/// Returns an error if a probe process cannot be spawned.
pub async fn refresh_descriptor(
    host: &dyn ProcessHost,
    mut descriptor: PluginDescriptor,
) -> Result<PluginDescriptor, Error> {
    descriptor.requires_sudo = host
        .probe(&descriptor, PluginCommand::DoesRequireSudo)
        .await?;
    if host
        .probe(&descriptor, PluginCommand::CanSeparateDownload)
        .await?
    {
        descriptor.phases = descriptor.phases.with(upd_types::Phase::Download);
    }
    Ok(descriptor)
}

/// Work-size estimate collected from a plugin's `estimate-update` probe.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct UpdateEstimate {
    pub download_bytes: Option<u64>,
    pub cpu_seconds: Option<f64>,
}

/// Run the plugin's `estimate-update` probe and collect the reported
/// estimate. The last estimate record wins; `None` when the plugin exits
/// without reporting one.
///
/// # Errors
///
/// Returns an error if the probe process cannot be spawned.
pub async fn estimate_update(
    host: &dyn ProcessHost,
    descriptor: &PluginDescriptor,
) -> Result<Option<UpdateEstimate>, Error> {
    let mut process = host
        .spawn(descriptor, PluginCommand::EstimateUpdate)
        .await?;
    let mut estimate = None;
    while let Some(event) = process.next_event().await {
        if let StreamEvent::Estimate {
            download_bytes,
            cpu_seconds,
        } = event
        {
            estimate = Some(UpdateEstimate {
                download_bytes,
                cpu_seconds,
            });
        }
    }
    Ok(estimate)
}
