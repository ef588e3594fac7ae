#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Core type definitions for the upd update orchestrator
//!
//! This crate provides the fundamental types shared across the engine:
//! phases, pipeline states, plugin descriptors, metrics snapshots, and the
//! report structures handed to external consumers.

pub mod descriptor;
pub mod phase;
pub mod reports;
pub mod snapshot;
pub mod state;

pub use descriptor::{PluginDescriptor, ResourceId};
pub use phase::{Phase, PhaseSet};
pub use reports::{PhaseOutcome, PhaseStatus, PipelineReport, RunClassification, RunReport};
pub use snapshot::PhaseSnapshot;
pub use state::PipelineState;
pub use uuid::Uuid;
