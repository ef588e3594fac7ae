#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Plugin process interface for upd
//!
//! A plugin execution is a child process invoked per phase with a documented
//! command surface (`is-applicable`, `download`, `update`, plus probes).
//! The child writes plain text to stdout and single-line structured progress
//! records to stderr; this crate parses both into stream events, manages the
//! subprocess lifecycle (including process-group termination so descendants
//! are reaped), and samples the process tree for the metrics accumulator.

pub mod command;
pub mod host;
pub mod protocol;
pub mod sampler;
pub mod subprocess;

pub use command::PluginCommand;
pub use host::{estimate_update, refresh_descriptor, PhaseProcess, ProcessHost, UpdateEstimate};
pub use protocol::{parse_stderr_line, PROTOCOL_PREFIX};
pub use sampler::{NullSampler, ProcfsSampler, TreeSampler};
pub use subprocess::SubprocessHost;
