//! Configuration error types

use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {message}")]
    ReadFailed { path: String, message: String },

    #[error("invalid config: {message}")]
    Invalid { message: String },

    #[error("invalid environment variable {name}: {message}")]
    InvalidEnv { name: String, message: String },
}
