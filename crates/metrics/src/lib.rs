#![deny(clippy::pedantic, unsafe_code)]
#![allow(
    clippy::module_name_repetitions,
    clippy::missing_panics_doc // only lock() poisoning, which is not propagated
)]

//! Per-pipeline metrics accumulation for upd
//!
//! One [`MetricsAccumulator`] is created per pipeline and lives for the
//! pipeline's entire run. It is never replaced when a new subprocess or
//! phase starts: accumulated history belongs to the pipeline, not to any
//! one ephemeral process. Completed phases freeze into immutable
//! [`PhaseSnapshot`]s, and the cumulative total is monotonic for the life
//! of the run even as subprocesses come and go.

pub mod accumulator;
pub mod sample;

pub use accumulator::{CumulativeMetrics, MetricsAccumulator};
pub use sample::TreeSample;
pub use upd_types::PhaseSnapshot;
