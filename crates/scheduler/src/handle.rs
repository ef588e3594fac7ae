//! Handle to a running scheduler run

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use upd_errors::{Error, SchedulerError};
use upd_events::StreamReceiver;
use upd_types::RunReport;
use uuid::Uuid;

/// Consumer-side handle to an in-flight run.
///
/// The merged event stream ends (recv returns `None`) once every pipeline
/// has reached a terminal state, so the natural consumption pattern is to
/// drain [`RunHandle::events`] and then [`RunHandle::join`].
#[derive(Debug)]
pub struct RunHandle {
    run_id: Uuid,
    events: StreamReceiver,
    cancel: CancellationToken,
    join: JoinHandle<RunReport>,
}

impl RunHandle {
    pub(crate) fn new(
        run_id: Uuid,
        events: StreamReceiver,
        cancel: CancellationToken,
        join: JoinHandle<RunReport>,
    ) -> Self {
        Self {
            run_id,
            events,
            cancel,
            join,
        }
    }

    /// Unique identifier of this run.
    #[must_use]
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// The merged event stream of every pipeline in the run.
    pub fn events(&mut self) -> &mut StreamReceiver {
        &mut self.events
    }

    /// Request cancellation of every pipeline in the run. Idempotent.
    ///
    /// Running subprocesses get a graceful termination signal followed by a
    /// forced kill after the grace period; pipelines that have not started
    /// yet report `Cancelled` without running anything.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// A clone of the run's cancellation token, for wiring signal handlers
    /// that outlive this handle's borrows.
    #[must_use]
    pub fn canceller(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Wait for the run to finish and produce its report.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::TaskFailed`] if the aggregation task
    /// panicked or was aborted.
    pub async fn join(self) -> Result<RunReport, Error> {
        self.join.await.map_err(|error| {
            SchedulerError::TaskFailed {
                message: error.to_string(),
            }
            .into()
        })
    }
}
