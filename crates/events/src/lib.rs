#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Event system for async communication in upd
//!
//! This crate carries subprocess output and structured progress events from
//! running plugin pipelines to consumers through bounded, backpressured
//! channels. All observable output of a pipeline goes through these events;
//! nothing in the engine prints or logs user-facing state directly.
//!
//! ## Architecture
//!
//! - **`StreamEvent`**: the structured messages a phase subprocess produces
//! - **`EventEnvelope`**: a `StreamEvent` plus pipeline attribution metadata
//! - **Bounded channel**: a full channel suspends the producer rather than
//!   dropping events; the last progress event before phase completion is
//!   load-bearing and must never be lost

pub mod channel;
pub mod event;

pub use channel::{channel, ChannelClosed, StreamReceiver, StreamSender};
pub use event::{EventEnvelope, StreamEvent};

/// Default bounded capacity of a pipeline's stream channel.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 256;
