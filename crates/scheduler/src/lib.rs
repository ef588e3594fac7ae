#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Parallel run scheduler for upd
//!
//! The scheduler takes a set of plugin descriptors and runs one pipeline
//! per plugin concurrently, gated by an admission semaphore so at most
//! `max_concurrency` pipelines are active at once. Each pipeline streams
//! its events into a per-pipeline channel; forwarder tasks merge those into
//! one run-level stream handed to the consumer. Pipelines are isolated:
//! one failing, hanging, or cancelled pipeline never affects another
//! except through resource contention.
//!
//! A run is started with [`Scheduler::start`] and observed through the
//! returned [`RunHandle`]: consume merged events until the stream ends,
//! then join for the [`upd_types::RunReport`].

pub mod handle;
pub mod scheduler;

pub use handle::RunHandle;
pub use scheduler::Scheduler;
