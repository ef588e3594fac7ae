#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Error types for the upd update orchestrator
//!
//! This crate provides fine-grained error types organized by domain. Phase
//! level errors never cross their own pipeline; the scheduler observes only
//! terminal pipeline states, so most of these surface through pipeline
//! reports rather than propagating upward.

use thiserror::Error;

pub mod config;
pub mod plugin;
pub mod resource;
pub mod scheduler;

pub use config::ConfigError;
pub use plugin::PluginError;
pub use resource::ResourceError;
pub use scheduler::SchedulerError;

/// Generic error type for cross-crate boundaries
#[derive(Debug, Clone, Error)]
pub enum Error {
    #[error("resource error: {0}")]
    Resource(#[from] ResourceError),

    #[error("plugin error: {0}")]
    Plugin(#[from] PluginError),

    #[error("scheduler error: {0}")]
    Scheduler(#[from] SchedulerError),

    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("operation cancelled")]
    Cancelled,

    #[error("I/O error: {message}")]
    Io { message: String },
}

impl From<std::io::Error> for Error {
    fn from(error: std::io::Error) -> Self {
        Error::Io {
            message: error.to_string(),
        }
    }
}
