//! The per-plugin pipeline driver

use std::collections::VecDeque;
use std::sync::Arc;

use tokio::time::{interval, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use upd_events::{StreamEvent, StreamSender};
use upd_metrics::MetricsAccumulator;
use upd_plugin::PluginCommand;
use upd_types::{
    Phase, PhaseOutcome, PhaseStatus, PipelineReport, PipelineState, PluginDescriptor,
};

use crate::context::PipelineContext;

/// Lines of output/error tail kept for failure reporting.
const RECENT_OUTPUT_LINES: usize = 8;

/// One plugin's end-to-end run through its supported phases.
///
/// Owned exclusively by the scheduler; mutated only by its own execution
/// task. The metrics accumulator is created with the pipeline and never
/// replaced for the pipeline's lifetime, so accumulated history survives
/// phase transitions and subprocess restarts.
pub struct Pipeline {
    descriptor: PluginDescriptor,
    state: PipelineState,
    metrics: Arc<MetricsAccumulator>,
    events: StreamSender,
    cancel: CancellationToken,
    outcomes: Vec<PhaseOutcome>,
    recent_output: VecDeque<String>,
}

enum PhaseVerdict {
    Advance,
    Skip { reason: String },
    Fail { failure: &'static str },
    Cancelled,
}

impl Pipeline {
    /// Create a pipeline in `Pending` state.
    #[must_use]
    pub fn new(
        descriptor: PluginDescriptor,
        metrics: Arc<MetricsAccumulator>,
        events: StreamSender,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            descriptor,
            state: PipelineState::Pending,
            metrics,
            events,
            cancel,
            outcomes: Vec::new(),
            recent_output: VecDeque::with_capacity(RECENT_OUTPUT_LINES),
        }
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> PipelineState {
        self.state
    }

    /// The pipeline's metrics accumulator, for consumers polling
    /// `cumulative()` at their own cadence.
    #[must_use]
    pub fn metrics(&self) -> Arc<MetricsAccumulator> {
        Arc::clone(&self.metrics)
    }

    /// Drive the pipeline to a terminal state and produce its report.
    ///
    /// Every exit path releases held resources, freezes the live phase
    /// snapshot, and closes the stream channel.
    pub async fn run(mut self, ctx: &PipelineContext) -> PipelineReport {
        let started = Instant::now();
        let mut failure: Option<String> = None;
        info!(plugin = %self.descriptor.name, "pipeline started");

        for phase in Phase::ALL {
            if self.cancel.is_cancelled() {
                self.state = PipelineState::Cancelled;
                failure = Some("cancelled".to_string());
                break;
            }

            if !self.descriptor.phases.contains(phase) {
                // Pass straight through: no resources, no subprocess.
                self.outcomes.push(PhaseOutcome {
                    phase,
                    status: PhaseStatus::Skipped,
                    summary: "not supported by plugin".to_string(),
                });
                self.state = PipelineState::after(phase);
                continue;
            }

            if phase == Phase::Execute
                && ctx.config.dry_run
                && !self.descriptor.supports_dry_run
            {
                self.outcomes.push(PhaseOutcome {
                    phase,
                    status: PhaseStatus::Skipped,
                    summary: "dry-run not supported".to_string(),
                });
                self.state = PipelineState::Skipped;
                break;
            }

            self.state = PipelineState::entering(phase);
            match self.run_phase(ctx, phase).await {
                PhaseVerdict::Advance => {
                    self.state = PipelineState::after(phase);
                }
                PhaseVerdict::Skip { reason } => {
                    debug!(plugin = %self.descriptor.name, %phase, reason, "pipeline skipped");
                    self.state = PipelineState::Skipped;
                    break;
                }
                PhaseVerdict::Fail { failure: kind } => {
                    self.state = PipelineState::Failed;
                    failure = Some(kind.to_string());
                    break;
                }
                PhaseVerdict::Cancelled => {
                    self.state = PipelineState::Cancelled;
                    failure = Some("cancelled".to_string());
                    break;
                }
            }
        }

        if !self.state.is_terminal() {
            self.state = PipelineState::Completed;
        }
        self.events.close();
        info!(plugin = %self.descriptor.name, state = %self.state, "pipeline finished");

        PipelineReport {
            plugin: self.descriptor.name,
            state: self.state,
            outcomes: self.outcomes,
            phase_metrics: self.metrics.snapshots(),
            failure,
            recent_output: self.recent_output.into_iter().collect(),
            duration_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
        }
    }

    /// Run one supported phase to its verdict.
    ///
    /// Resource release and snapshot freezing run on every exit path,
    /// including cancellation while suspended on acquisition, on the
    /// subprocess, or on a full channel.
    async fn run_phase(&mut self, ctx: &PipelineContext, phase: Phase) -> PhaseVerdict {
        let resources = self.descriptor.resources_for(phase);
        let mut guard = tokio::select! {
            () = self.cancel.cancelled() => return PhaseVerdict::Cancelled,
            result = ctx.registry.acquire(
                &self.descriptor.name,
                &resources,
                ctx.config.acquire_timeout,
            ) => match result {
                Ok(guard) => guard,
                Err(error) => {
                    let summary = error.to_string();
                    warn!(plugin = %self.descriptor.name, %phase, %error, "resource acquisition failed");
                    let _ = self.events.emit_error(&summary).await;
                    let _ = self.events.emit_phase_complete(phase, false).await;
                    self.outcomes.push(PhaseOutcome {
                        phase,
                        status: PhaseStatus::Failed,
                        summary,
                    });
                    return PhaseVerdict::Fail {
                        failure: "resource contention",
                    };
                }
            },
        };

        self.metrics.start_phase(phase);

        let dry_run = ctx.config.dry_run && self.descriptor.supports_dry_run;
        let command = PluginCommand::for_phase(phase, dry_run);
        let mut process = match ctx.host.spawn(&self.descriptor, command).await {
            Ok(process) => process,
            Err(error) => {
                self.metrics.complete_phase(phase);
                guard.release();
                let summary = error.to_string();
                let _ = self.events.emit_error(&summary).await;
                let _ = self.events.emit_phase_complete(phase, false).await;
                self.outcomes.push(PhaseOutcome {
                    phase,
                    status: PhaseStatus::Failed,
                    summary,
                });
                return PhaseVerdict::Fail {
                    failure: "process failure",
                };
            }
        };

        // Sampler task: observes the process tree on its own cadence,
        // decoupled from any consumer refresh rate.
        let sampler_stop = CancellationToken::new();
        let sampler_task = process.pid().map(|pid| {
            let stop = sampler_stop.clone();
            let sampler = Arc::clone(&ctx.sampler);
            let metrics = Arc::clone(&self.metrics);
            let cadence = ctx.config.sample_interval;
            tokio::spawn(async move {
                let mut ticker = interval(cadence);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
                loop {
                    tokio::select! {
                        () = stop.cancelled() => break,
                        _ = ticker.tick() => {
                            if let Some(sample) = sampler.sample(pid) {
                                metrics.sample(&sample);
                            }
                        }
                    }
                }
            })
        });

        let mut exit_code = None;
        let mut cancelled = false;
        loop {
            tokio::select! {
                () = self.cancel.cancelled() => {
                    if let Err(error) = process.terminate(ctx.config.grace_period).await {
                        warn!(plugin = %self.descriptor.name, %error, "termination escalated");
                    }
                    cancelled = true;
                    break;
                }
                event = process.next_event() => match event {
                    Some(event) => {
                        self.note_recent(&event);
                        if let StreamEvent::Exit { code } = event {
                            exit_code = Some(code);
                        }
                        // Forward under backpressure while staying cancellable.
                        tokio::select! {
                            () = self.cancel.cancelled() => {
                                if let Err(error) = process.terminate(ctx.config.grace_period).await {
                                    warn!(plugin = %self.descriptor.name, %error, "termination escalated");
                                }
                                cancelled = true;
                                break;
                            }
                            result = self.events.send(event) => {
                                if result.is_err() {
                                    debug!(plugin = %self.descriptor.name, "stream consumer gone");
                                }
                            }
                        }
                    }
                    None => break,
                },
            }
        }

        sampler_stop.cancel();
        if let Some(task) = sampler_task {
            let _ = task.await;
        }

        // Freeze before releasing: the snapshot must exist before the next
        // phase (or a contending pipeline) can start.
        let snapshot = self.metrics.complete_phase(phase);
        guard.release();
        debug!(
            plugin = %self.descriptor.name,
            %phase,
            cpu_seconds = snapshot.cpu_seconds,
            bytes = snapshot.bytes_transferred,
            "phase snapshot frozen"
        );

        if cancelled {
            self.outcomes.push(PhaseOutcome {
                phase,
                status: PhaseStatus::Failed,
                summary: "cancelled".to_string(),
            });
            return PhaseVerdict::Cancelled;
        }

        match exit_code {
            Some(0) => {
                let _ = self.events.emit_phase_complete(phase, true).await;
                self.outcomes.push(PhaseOutcome {
                    phase,
                    status: PhaseStatus::Success,
                    summary: "exit code 0".to_string(),
                });
                PhaseVerdict::Advance
            }
            Some(1) if phase == Phase::Check => {
                // The is-applicable probe reporting "nothing to do".
                let _ = self.events.emit_phase_complete(phase, true).await;
                self.outcomes.push(PhaseOutcome {
                    phase,
                    status: PhaseStatus::Skipped,
                    summary: "nothing to update".to_string(),
                });
                PhaseVerdict::Skip {
                    reason: "nothing to update".to_string(),
                }
            }
            Some(code) => {
                let _ = self.events.emit_phase_complete(phase, false).await;
                self.outcomes.push(PhaseOutcome {
                    phase,
                    status: PhaseStatus::Failed,
                    summary: format!("exit code {code}"),
                });
                PhaseVerdict::Fail {
                    failure: "process failure",
                }
            }
            None => {
                let _ = self.events.emit_phase_complete(phase, false).await;
                self.outcomes.push(PhaseOutcome {
                    phase,
                    status: PhaseStatus::Failed,
                    summary: "subprocess ended without exit status".to_string(),
                });
                PhaseVerdict::Fail {
                    failure: "process failure",
                }
            }
        }
    }

    fn note_recent(&mut self, event: &StreamEvent) {
        let line = match event {
            StreamEvent::Output { text } => text.clone(),
            StreamEvent::Error { message } => format!("error: {message}"),
            _ => return,
        };
        if self.recent_output.len() == RECENT_OUTPUT_LINES {
            self.recent_output.pop_front();
        }
        self.recent_output.push_back(line);
    }
}
