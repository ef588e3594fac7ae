//! Console rendering of the merged event stream

use upd_events::{EventEnvelope, StreamEvent};
use upd_types::{PhaseStatus, RunReport};

use crate::logging::log_event;

/// Renders merged stream events and the final run report.
pub struct EventRenderer {
    json: bool,
    debug: bool,
}

impl EventRenderer {
    pub fn new(json: bool, debug: bool) -> Self {
        Self { json, debug }
    }

    /// Render one event; every event is also logged with structured fields.
    pub fn handle(&self, envelope: &EventEnvelope) {
        log_event(envelope);
        if self.json {
            if let Ok(line) = serde_json::to_string(envelope) {
                println!("{line}");
            }
            return;
        }
        let pipeline = &envelope.pipeline;
        match &envelope.event {
            StreamEvent::Output { text } => println!("[{pipeline}] {text}"),
            StreamEvent::Progress {
                phase,
                percent,
                message,
            } => println!("[{pipeline}] {phase}: {percent}% {message}"),
            StreamEvent::Estimate {
                download_bytes,
                cpu_seconds,
            } => {
                if self.debug {
                    println!(
                        "[{pipeline}] estimate: download {download_bytes:?} bytes, cpu {cpu_seconds:?}s"
                    );
                }
            }
            StreamEvent::Error { message } => eprintln!("[{pipeline}] error: {message}"),
            StreamEvent::PhaseComplete { phase, success } => {
                let verdict = if *success { "done" } else { "failed" };
                println!("[{pipeline}] {phase} {verdict}");
            }
            StreamEvent::Exit { code } => {
                if self.debug {
                    println!("[{pipeline}] exit code {code}");
                }
            }
        }
    }

    /// Render the final run report.
    pub fn render_report(&self, report: &RunReport) {
        if self.json {
            if let Ok(line) = serde_json::to_string_pretty(report) {
                println!("{line}");
            }
            return;
        }
        println!();
        for pipeline in &report.pipelines {
            let mut line = format!("{}: {}", pipeline.plugin, pipeline.state);
            if let Some(failure) = &pipeline.failure {
                line.push_str(&format!(" ({failure})"));
            }
            println!("{line}");
            for outcome in &pipeline.outcomes {
                if outcome.status == PhaseStatus::Failed {
                    println!("  {} failed: {}", outcome.phase, outcome.summary);
                }
            }
            if pipeline.failure.is_some() && !pipeline.recent_output.is_empty() {
                for line in &pipeline.recent_output {
                    println!("  | {line}");
                }
            }
        }
        println!(
            "run {:?} in {}ms{}",
            report.classification,
            report.duration_ms,
            if report.cancelled { " (cancelled)" } else { "" }
        );
    }
}
