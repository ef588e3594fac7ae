//! Run orchestration

use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use upd_events::{channel, DEFAULT_CHANNEL_CAPACITY};
use upd_metrics::MetricsAccumulator;
use upd_pipeline::{Pipeline, PipelineContext};
use upd_types::{PipelineReport, PipelineState, PluginDescriptor, RunReport};
use uuid::Uuid;

use crate::handle::RunHandle;

/// Factory for concurrent runs over a shared pipeline context.
///
/// The scheduler itself holds no per-run state; every [`Scheduler::start`]
/// call creates a fresh run with its own cancellation token, admission
/// semaphore, and merged event channel.
pub struct Scheduler {
    context: PipelineContext,
    max_concurrency: usize,
    channel_capacity: usize,
}

impl Scheduler {
    /// Create a scheduler running at most `max_concurrency` pipelines at
    /// once (clamped to at least one).
    #[must_use]
    pub fn new(context: PipelineContext, max_concurrency: usize) -> Self {
        Self {
            context,
            max_concurrency: max_concurrency.max(1),
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }

    /// Override the bounded capacity of the stream channels.
    #[must_use]
    pub fn with_channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity;
        self
    }

    /// Start one run over `descriptors`, in submission order.
    ///
    /// Every descriptor gets a pipeline task; an admission semaphore keeps
    /// at most `max_concurrency` of them past the gate at once. A pipeline
    /// holds its admission slot from its first phase until it reaches a
    /// terminal state, so phase boundaries never let extra pipelines in.
    #[must_use]
    pub fn start(&self, descriptors: Vec<PluginDescriptor>) -> RunHandle {
        let run_id = Uuid::new_v4();
        let started = Instant::now();
        let cancel = CancellationToken::new();
        let (merged_tx, merged_rx) = channel(run_id.to_string(), self.channel_capacity);
        let semaphore = Arc::new(Semaphore::new(self.max_concurrency));
        info!(
            %run_id,
            pipelines = descriptors.len(),
            max_concurrency = self.max_concurrency,
            "run started"
        );

        let mut tasks = Vec::with_capacity(descriptors.len());
        let mut forwarders = Vec::with_capacity(descriptors.len());
        for descriptor in descriptors {
            let (tx, mut rx) = channel(descriptor.name.clone(), self.channel_capacity);

            // Forwarder: relays this pipeline's events into the merged
            // stream, preserving their pipeline attribution. Ends when the
            // pipeline closes its channel.
            let merged = merged_tx.clone();
            forwarders.push(tokio::spawn(async move {
                while let Some(envelope) = rx.recv().await {
                    if merged.forward(envelope).await.is_err() {
                        break;
                    }
                }
            }));

            let name = descriptor.name.clone();
            let pipeline = Pipeline::new(
                descriptor,
                Arc::new(MetricsAccumulator::new()),
                tx,
                cancel.child_token(),
            );
            let ctx = self.context.clone();
            let semaphore = Arc::clone(&semaphore);
            let cancel = cancel.clone();
            tasks.push((
                name,
                tokio::spawn(async move {
                    // Admission gate. Cancellation while queued falls
                    // through with no slot; the pipeline then reports
                    // `Cancelled` without running anything.
                    let _permit = tokio::select! {
                        () = cancel.cancelled() => None,
                        permit = Arc::clone(&semaphore).acquire_owned() => permit.ok(),
                    };
                    pipeline.run(&ctx).await
                }),
            ));
        }

        let run_cancel = cancel.clone();
        let join = tokio::spawn(async move {
            let mut pipelines = Vec::with_capacity(tasks.len());
            for (name, task) in tasks {
                match task.await {
                    Ok(report) => pipelines.push(report),
                    Err(error) => {
                        // A panicked pipeline is a failed pipeline, not a
                        // failed run.
                        warn!(plugin = %name, %error, "pipeline task failed");
                        pipelines.push(PipelineReport {
                            plugin: name,
                            state: PipelineState::Failed,
                            outcomes: Vec::new(),
                            phase_metrics: BTreeMap::new(),
                            failure: Some(format!("task failure: {error}")),
                            recent_output: Vec::new(),
                            duration_ms: 0,
                        });
                    }
                }
            }
            for forwarder in forwarders {
                let _ = forwarder.await;
            }
            merged_tx.close();

            let classification = RunReport::classify(&pipelines);
            let cancelled = run_cancel.is_cancelled();
            info!(%run_id, ?classification, cancelled, "run finished");
            RunReport {
                run_id,
                pipelines,
                classification,
                cancelled,
                duration_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
            }
        });

        RunHandle::new(run_id, merged_rx, cancel, join)
    }
}
