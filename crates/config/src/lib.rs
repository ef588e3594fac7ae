#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Configuration management for upd
//!
//! This crate handles loading and merging configuration from:
//! - Default values (hard-coded)
//! - Configuration file (~/.config/upd/config.toml)
//! - Environment variables
//! - CLI flags (applied by the CLI on top of the loaded config)

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::fs;
use upd_errors::{ConfigError, Error};
use upd_types::{Phase, PhaseSet, PluginDescriptor};

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub scheduler: SchedulerConfig,

    #[serde(default)]
    pub resources: ResourceConfig,

    #[serde(default)]
    pub process: ProcessConfig,

    #[serde(default)]
    pub streaming: StreamingConfig,

    #[serde(default)]
    pub metrics: MetricsConfig,

    /// Declared plugins; in production these come from plugin discovery,
    /// but the config file can pin them explicitly.
    #[serde(default, rename = "plugin")]
    pub plugins: Vec<PluginConfig>,
}

/// Scheduler configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Maximum number of simultaneously active pipelines
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
}

/// Resource mutex registry configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceConfig {
    /// Timeout for acquiring a phase's resource batch, in milliseconds
    #[serde(default = "default_acquire_timeout_ms")]
    pub acquire_timeout_ms: u64,
}

/// Subprocess handling configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessConfig {
    /// Grace period between the graceful termination request and the
    /// forced kill, in milliseconds
    #[serde(default = "default_grace_period_ms")]
    pub grace_period_ms: u64,

    /// Directory searched for plugin executables (`upd-plugin-<name>`)
    #[serde(default)]
    pub plugin_dir: Option<String>,
}

/// Stream channel configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamingConfig {
    /// Bounded capacity of each pipeline's event channel
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

/// Metrics sampling configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Process-tree sampling cadence, in milliseconds. Independent of any
    /// consumer refresh cadence.
    #[serde(default = "default_sample_interval_ms")]
    pub sample_interval_ms: u64,
}

/// One declared plugin in the config file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginConfig {
    pub name: String,
    /// Phases the plugin implements (default: check + execute)
    #[serde(default)]
    pub phases: Option<Vec<Phase>>,
    /// Exclusive resources per phase
    #[serde(default)]
    pub resources: BTreeMap<Phase, BTreeSet<String>>,
    #[serde(default)]
    pub requires_sudo: bool,
    #[serde(default)]
    pub supports_dry_run: bool,
}

impl PluginConfig {
    /// Convert to the immutable descriptor handed to the engine.
    #[must_use]
    pub fn to_descriptor(&self) -> PluginDescriptor {
        let mut descriptor = PluginDescriptor::new(&self.name);
        if let Some(phases) = &self.phases {
            descriptor.phases = phases.iter().copied().collect::<PhaseSet>();
        }
        descriptor.resources = self.resources.clone();
        descriptor.requires_sudo = self.requires_sudo;
        descriptor.supports_dry_run = self.supports_dry_run;
        descriptor
    }
}

fn default_max_concurrency() -> usize {
    std::thread::available_parallelism()
        .map(std::num::NonZero::get)
        .unwrap_or(4)
        .min(8)
}

fn default_acquire_timeout_ms() -> u64 {
    120_000
}

fn default_grace_period_ms() -> u64 {
    5_000
}

fn default_channel_capacity() -> usize {
    256
}

fn default_sample_interval_ms() -> u64 {
    500
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_concurrency: default_max_concurrency(),
        }
    }
}

impl Default for ResourceConfig {
    fn default() -> Self {
        Self {
            acquire_timeout_ms: default_acquire_timeout_ms(),
        }
    }
}

impl Default for ProcessConfig {
    fn default() -> Self {
        Self {
            grace_period_ms: default_grace_period_ms(),
            plugin_dir: None,
        }
    }
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            channel_capacity: default_channel_capacity(),
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            sample_interval_ms: default_sample_interval_ms(),
        }
    }
}

impl Config {
    /// Load configuration from a file, falling back to defaults when the
    /// file does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub async fn load_or_default(path: Option<&Path>) -> Result<Self, Error> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = fs::read_to_string(path).await.map_err(|e| {
            Error::Config(ConfigError::ReadFailed {
                path: path.display().to_string(),
                message: e.to_string(),
            })
        })?;
        toml::from_str(&contents).map_err(|e| {
            Error::Config(ConfigError::Invalid {
                message: e.to_string(),
            })
        })
    }

    /// Merge environment variables on top of the loaded values.
    ///
    /// # Errors
    ///
    /// Returns an error if a set variable does not parse.
    pub fn merge_env(&mut self) -> Result<(), Error> {
        if let Some(value) = read_env_parse::<usize>("UPD_MAX_CONCURRENCY")? {
            self.scheduler.max_concurrency = value.max(1);
        }
        if let Some(value) = read_env_parse::<u64>("UPD_ACQUIRE_TIMEOUT_MS")? {
            self.resources.acquire_timeout_ms = value;
        }
        if let Some(value) = read_env_parse::<u64>("UPD_GRACE_PERIOD_MS")? {
            self.process.grace_period_ms = value;
        }
        if let Some(value) = read_env_parse::<usize>("UPD_CHANNEL_CAPACITY")? {
            self.streaming.channel_capacity = value.max(1);
        }
        if let Some(value) = read_env_parse::<u64>("UPD_SAMPLE_INTERVAL_MS")? {
            self.metrics.sample_interval_ms = value.max(1);
        }
        Ok(())
    }

    /// Resource acquisition timeout as a `Duration`.
    #[must_use]
    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_millis(self.resources.acquire_timeout_ms)
    }

    /// Termination grace period as a `Duration`.
    #[must_use]
    pub fn grace_period(&self) -> Duration {
        Duration::from_millis(self.process.grace_period_ms)
    }

    /// Sampler cadence as a `Duration`.
    #[must_use]
    pub fn sample_interval(&self) -> Duration {
        Duration::from_millis(self.metrics.sample_interval_ms)
    }

    /// Descriptors for every plugin declared in the config.
    #[must_use]
    pub fn plugin_descriptors(&self) -> Vec<PluginDescriptor> {
        self.plugins.iter().map(PluginConfig::to_descriptor).collect()
    }
}

fn read_env_parse<T: std::str::FromStr>(name: &str) -> Result<Option<T>, Error>
where
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(value) => value.parse::<T>().map(Some).map_err(|e| {
            Error::Config(ConfigError::InvalidEnv {
                name: name.to_string(),
                message: e.to_string(),
            })
        }),
        Err(_) => Ok(None),
    }
}
