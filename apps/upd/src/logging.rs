//! Structured logging integration for stream events
//!
//! Converts stream events into tracing records with structured fields so a
//! JSON subscriber or observability tooling sees the same stream the
//! console renderer does.

use tracing::{debug, error, info};
use upd_events::{EventEnvelope, StreamEvent};

/// Log a stream event with structured fields at the appropriate level.
pub fn log_event(envelope: &EventEnvelope) {
    let pipeline = envelope.pipeline.as_str();
    match &envelope.event {
        StreamEvent::Output { text } => {
            debug!(pipeline, text = %text, "plugin output");
        }
        StreamEvent::Progress {
            phase,
            percent,
            message,
        } => {
            debug!(pipeline, %phase, percent, message = %message, "plugin progress");
        }
        StreamEvent::Estimate {
            download_bytes,
            cpu_seconds,
        } => {
            info!(
                pipeline,
                download_bytes = ?download_bytes,
                cpu_seconds = ?cpu_seconds,
                "plugin estimate"
            );
        }
        StreamEvent::Error { message } => {
            error!(pipeline, message = %message, "plugin error");
        }
        StreamEvent::PhaseComplete { phase, success } => {
            if *success {
                info!(pipeline, %phase, "phase completed");
            } else {
                error!(pipeline, %phase, "phase failed");
            }
        }
        StreamEvent::Exit { code } => {
            debug!(pipeline, code, "subprocess exited");
        }
    }
}
