//! Configuration for the executor, the status key protocol and exports.
//!
//! Every field has a default, so an empty JSON object is a valid config.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::ids::DEFAULT_KEY_PREFIX;

/// Worker pool sizing.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ExecutorConfig {
    /// Workers kept alive while idle (default: 2 × available parallelism)
    #[serde(default = "default_core_workers")]
    pub core_workers: usize,

    /// Upper bound on workers when the queue is full (default: 4 × core)
    #[serde(default)]
    pub max_workers: Option<usize>,

    /// Idle time after which a worker above `core_workers` retires (default: 60)
    #[serde(default = "default_keep_alive_secs")]
    pub keep_alive_secs: u64,

    /// Jobs waiting for a worker before the oldest is discarded (default: 300)
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Worker thread name prefix (default: "imex-worker")
    #[serde(default = "default_thread_name")]
    pub thread_name: String,
}

impl ExecutorConfig {
    pub fn max_workers(&self) -> usize {
        self.max_workers.unwrap_or(self.core_workers * 4)
    }

    pub fn keep_alive(&self) -> Duration {
        Duration::from_secs(self.keep_alive_secs)
    }
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            core_workers: default_core_workers(),
            max_workers: None,
            keep_alive_secs: default_keep_alive_secs(),
            queue_capacity: default_queue_capacity(),
            thread_name: default_thread_name(),
        }
    }
}

/// Task key namespace and entry lifetimes.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StatusConfig {
    /// Namespace in front of every task key (default: "IMEX")
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,

    /// Lifetime of the RUNNING entry, i.e. how long a poller waits on a stuck
    /// task before it reads as expired (default: 600)
    #[serde(default = "default_running_ttl_secs")]
    pub running_ttl_secs: u64,

    /// Lifetime of a DONE/FAILED entry (default: 180)
    #[serde(default = "default_result_ttl_secs")]
    pub result_ttl_secs: u64,
}

impl StatusConfig {
    pub fn running_ttl(&self) -> Duration {
        Duration::from_secs(self.running_ttl_secs)
    }

    pub fn result_ttl(&self) -> Duration {
        Duration::from_secs(self.result_ttl_secs)
    }
}

impl Default for StatusConfig {
    fn default() -> Self {
        Self {
            key_prefix: default_key_prefix(),
            running_ttl_secs: default_running_ttl_secs(),
            result_ttl_secs: default_result_ttl_secs(),
        }
    }
}

/// Export scratch space.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ExportConfig {
    /// Directory for temp export files (default: the OS temp directory)
    #[serde(default = "default_temp_dir")]
    pub temp_dir: PathBuf,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            temp_dir: default_temp_dir(),
        }
    }
}

/// Top-level configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ImexConfig {
    #[serde(default)]
    pub executor: ExecutorConfig,

    #[serde(default)]
    pub status: StatusConfig,

    #[serde(default)]
    pub export: ExportConfig,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid configuration: {key}: {message}")]
    Invalid { key: &'static str, message: String },
}

impl ImexConfig {
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: ImexConfig =
            serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let exec = &self.executor;
        if exec.core_workers == 0 {
            return Err(invalid("executor.core_workers", "must be at least 1"));
        }
        if exec.max_workers() < exec.core_workers {
            return Err(invalid(
                "executor.max_workers",
                format!(
                    "{} is below core_workers ({})",
                    exec.max_workers(),
                    exec.core_workers
                ),
            ));
        }
        if exec.queue_capacity == 0 {
            return Err(invalid("executor.queue_capacity", "must be at least 1"));
        }
        if self.status.key_prefix.is_empty() {
            return Err(invalid("status.key_prefix", "must not be empty"));
        }
        if self.status.running_ttl_secs == 0 || self.status.result_ttl_secs == 0 {
            return Err(invalid("status", "TTLs must be at least one second"));
        }
        if self.status.result_ttl_secs > self.status.running_ttl_secs {
            tracing::warn!(
                running_ttl_secs = self.status.running_ttl_secs,
                result_ttl_secs = self.status.result_ttl_secs,
                "finished results outlive running entries"
            );
        }
        Ok(())
    }
}

fn invalid(key: &'static str, message: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        key,
        message: message.into(),
    }
}

fn default_core_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
        * 2
}

fn default_keep_alive_secs() -> u64 {
    60
}

fn default_queue_capacity() -> usize {
    300
}

fn default_thread_name() -> String {
    "imex-worker".to_string()
}

fn default_key_prefix() -> String {
    DEFAULT_KEY_PREFIX.to_string()
}

fn default_running_ttl_secs() -> u64 {
    60 * 10
}

fn default_result_ttl_secs() -> u64 {
    60 * 3
}

fn default_temp_dir() -> PathBuf {
    std::env::temp_dir()
}
