#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Plugin pipeline state machine for upd
//!
//! One [`Pipeline`] drives one plugin through its supported phases:
//! acquire the phase's declared resources, start the phase subprocess, feed
//! its output into the pipeline's stream channel, sample its process tree
//! into the metrics accumulator, and freeze the phase snapshot when the
//! subprocess exits. Phase N+1 never starts before phase N's snapshot is
//! frozen and its resources are released.
//!
//! Each phase runs a driver loop pulling parsed subprocess events plus a
//! sampler task on its own cadence, communicating only through the bounded
//! stream channel and the accumulator's synchronized methods. Failure of
//! one pipeline never affects another; pipelines contend only through the
//! resource registry.

pub mod context;
pub mod pipeline;

pub use context::{PipelineConfig, PipelineContext};
pub use pipeline::Pipeline;
