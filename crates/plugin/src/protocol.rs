//! The stderr progress protocol
//!
//! Plugins report structured progress as single lines on stderr:
//!
//! ```text
//! upd-protocol: {"kind":"progress","phase":"execute","percent":40,"message":"upgrading"}
//! upd-protocol: {"kind":"estimate","download_bytes":10485760,"cpu_seconds":12.5}
//! upd-protocol: {"kind":"error","message":"mirror unreachable"}
//! ```
//!
//! Each record is parsed independently. A malformed record becomes an
//! `Error` event rather than aborting the phase; an unprefixed stderr line
//! is forwarded as plain output, same as stdout.

use serde::Deserialize;
use upd_events::StreamEvent;
use upd_types::Phase;

/// Prefix that marks a structured record on a plugin's stderr.
pub const PROTOCOL_PREFIX: &str = "upd-protocol: ";

#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case", deny_unknown_fields)]
enum ProtocolRecord {
    Progress {
        phase: Phase,
        percent: f64,
        message: String,
    },
    Estimate {
        #[serde(default)]
        download_bytes: Option<u64>,
        #[serde(default)]
        cpu_seconds: Option<f64>,
    },
    Error {
        message: String,
    },
}

/// Parse one stderr line into a stream event.
#[must_use]
pub fn parse_stderr_line(line: &str) -> StreamEvent {
    let Some(record) = line.strip_prefix(PROTOCOL_PREFIX) else {
        return StreamEvent::Output {
            text: line.to_string(),
        };
    };

    match serde_json::from_str::<ProtocolRecord>(record) {
        Ok(ProtocolRecord::Progress {
            phase,
            percent,
            message,
        }) => {
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            let percent = percent.clamp(0.0, 100.0).round() as u8;
            StreamEvent::Progress {
                phase,
                percent,
                message,
            }
        }
        Ok(ProtocolRecord::Estimate {
            download_bytes,
            cpu_seconds,
        }) => StreamEvent::Estimate {
            download_bytes,
            cpu_seconds,
        },
        Ok(ProtocolRecord::Error { message }) => StreamEvent::Error { message },
        Err(e) => StreamEvent::Error {
            message: format!("malformed progress record: {e}: {record}"),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_stderr_is_output() {
        let event = parse_stderr_line("W: some apt warning");
        assert!(matches!(event, StreamEvent::Output { text } if text == "W: some apt warning"));
    }

    #[test]
    fn progress_record_parses() {
        let line = r#"upd-protocol: {"kind":"progress","phase":"execute","percent":62.5,"message":"upgrading 3/8"}"#;
        match parse_stderr_line(line) {
            StreamEvent::Progress {
                phase,
                percent,
                message,
            } => {
                assert_eq!(phase, Phase::Execute);
                assert_eq!(percent, 63);
                assert_eq!(message, "upgrading 3/8");
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn estimate_record_parses() {
        let line = r#"upd-protocol: {"kind":"estimate","download_bytes":1024}"#;
        match parse_stderr_line(line) {
            StreamEvent::Estimate {
                download_bytes,
                cpu_seconds,
            } => {
                assert_eq!(download_bytes, Some(1024));
                assert_eq!(cpu_seconds, None);
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn malformed_record_becomes_error_event() {
        let line = r#"upd-protocol: {"kind":"progress","percent":"#;
        match parse_stderr_line(line) {
            StreamEvent::Error { message } => {
                assert!(message.contains("malformed progress record"));
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn percent_is_clamped() {
        let line = r#"upd-protocol: {"kind":"progress","phase":"check","percent":250.0,"message":"x"}"#;
        match parse_stderr_line(line) {
            StreamEvent::Progress { percent, .. } => assert_eq!(percent, 100),
            other => panic!("unexpected event: {other:?}"),
        }
    }
}
