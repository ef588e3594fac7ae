//! Stream event definitions

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use upd_types::Phase;

/// A structured message emitted by a running phase's subprocess.
///
/// `Output` comes from plain stdout/stderr lines; `Progress`, `Estimate` and
/// `Error` come from recognized protocol records on stderr; `PhaseComplete`
/// and `Exit` are synthesized by the pipeline. Immutable once constructed;
/// ownership transfers to the channel on send.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StreamEvent {
    /// A plain output line from the subprocess
    Output { text: String },
    /// Structured progress for the named phase
    Progress {
        phase: Phase,
        percent: u8,
        message: String,
    },
    /// Work-size estimate reported by the plugin
    Estimate {
        #[serde(skip_serializing_if = "Option::is_none")]
        download_bytes: Option<u64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        cpu_seconds: Option<f64>,
    },
    /// An error report (including malformed protocol records)
    Error { message: String },
    /// A phase reached its terminal state
    PhaseComplete { phase: Phase, success: bool },
    /// The phase subprocess exited
    Exit { code: i32 },
}

/// A stream event plus the attribution metadata consumers need once events
/// from many pipelines are merged into one stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope {
    /// Name of the pipeline (plugin) that produced the event
    pub pipeline: String,
    /// Timestamp captured when the event entered the channel
    pub timestamp: DateTime<Utc>,
    /// The event itself
    pub event: StreamEvent,
}

impl EventEnvelope {
    /// Wrap an event with attribution for `pipeline`.
    #[must_use]
    pub fn new(pipeline: impl Into<String>, event: StreamEvent) -> Self {
        Self {
            pipeline: pipeline.into(),
            timestamp: Utc::now(),
            event,
        }
    }
}
