use crate::parallelism::hardware_concurrency;
use serde::{Deserialize, Serialize};
use setpool_error::{Error, Result};
use std::fs;
use std::path::Path;

/// Environment variable that overrides the number of pool threads.
pub const WORKERS_ENV_VAR: &str = "SETPOOL_WORKERS";

/// Default value for workers (number of CPU cores)
fn default_workers() -> usize {
    hardware_concurrency() as usize
}

fn default_queue_capacity() -> usize {
    1024
}

fn default_thread_name() -> String {
    String::from("setpool-worker")
}

/// Configuration of the background worker pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PoolConfig {
    /// Number of background threads
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Maximum number of jobs waiting for a free thread. Submissions beyond
    /// this are rejected, never blocked on.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Prefix of the pool thread names
    #[serde(default = "default_thread_name")]
    pub thread_name: String,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            queue_capacity: default_queue_capacity(),
            thread_name: default_thread_name(),
        }
    }
}

impl PoolConfig {
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    pub fn with_thread_name(mut self, name: impl Into<String>) -> Self {
        self.thread_name = name.into();
        self
    }

    /// Parse configuration from a YAML document.
    pub fn from_yaml_str(contents: &str) -> Result<Self> {
        let config: PoolConfig = serde_yaml::from_str(contents)
            .map_err(|e| Error::Config(format!("Failed to parse YAML config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a YAML file
    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|e| {
            Error::Config(format!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::from_yaml_str(&contents)
    }

    /// Applies `SETPOOL_WORKERS` when it is set.
    pub fn with_env_overrides(self) -> Result<Self> {
        match std::env::var(WORKERS_ENV_VAR) {
            Ok(value) => self.with_workers_override(&value),
            Err(_) => Ok(self),
        }
    }

    fn with_workers_override(mut self, value: &str) -> Result<Self> {
        self.workers = value.trim().parse().map_err(|_| {
            Error::Config(format!(
                "{} must be a positive integer, got {:?}",
                WORKERS_ENV_VAR, value
            ))
        })?;
        self.validate()?;
        Ok(self)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(Error::Config(String::from(
                "workers must be greater than 0",
            )));
        }

        if self.queue_capacity == 0 {
            return Err(Error::Config(String::from(
                "queue_capacity must be greater than 0",
            )));
        }

        Ok(())
    }
}
