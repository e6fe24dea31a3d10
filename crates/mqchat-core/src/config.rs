//! Configuration
//!
//! Queue geometry is fixed so two independently started processes always agree
//! on it. Everything that only affects the local process lives in
//! [`ChatConfig`], which can be loaded from a TOML file.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::errors::{ChatError, ChatResult};

// ----------------------------------------------------------------------------
// Fixed Constants
// ----------------------------------------------------------------------------

/// Messages a channel holds before senders wait
pub const DEFAULT_MAX_BACKLOG: usize = 10;

/// Payload limit of the named two-party pairing
pub const NAMED_MAX_MSG_SIZE: usize = 1024;

/// Payload limit of the fixed A/B pairing
pub const FIXED_ROLE_MAX_MSG_SIZE: usize = 256;

/// Event log location, relative to the working directory
pub const DEFAULT_LOG_PATH: &str = "ipc_log.txt";

// ----------------------------------------------------------------------------
// Local Configuration
// ----------------------------------------------------------------------------

/// Local tuning for one chat process
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    pub log: LogConfig,
    pub queue: QueueConfig,
    pub runtime: RuntimeConfig,
}

/// Event log settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Path of the append-only event log
    pub path: PathBuf,
}

/// Queue transport settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Permission bits for queues this process creates
    pub permissions: u32,
    /// How often a waiting send or receive retries (milliseconds)
    pub poll_interval_ms: u64,
}

/// Session lifecycle settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// How long shutdown waits for the relay loops before aborting them (milliseconds)
    pub shutdown_grace_ms: u64,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_LOG_PATH),
        }
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            permissions: 0o644,
            poll_interval_ms: 20,
        }
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            shutdown_grace_ms: 1000,
        }
    }
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            log: LogConfig::default(),
            queue: QueueConfig::default(),
            runtime: RuntimeConfig::default(),
        }
    }
}

impl ChatConfig {
    /// Parse a TOML document; missing keys keep their defaults
    pub fn from_toml(text: &str) -> ChatResult<Self> {
        let config: ChatConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load_from_file(path: impl AsRef<Path>) -> ChatResult<Self> {
        let text = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            ChatError::Config(format!("Failed to read {}: {}", path.as_ref().display(), e))
        })?;
        Self::from_toml(&text)
    }

    pub fn validate(&self) -> ChatResult<()> {
        if self.log.path.as_os_str().is_empty() {
            return Err(ChatError::Config("log.path must not be empty".into()));
        }
        if self.queue.poll_interval_ms == 0 {
            return Err(ChatError::Config(
                "queue.poll_interval_ms must be greater than zero".into(),
            ));
        }
        if self.queue.permissions > 0o777 {
            return Err(ChatError::Config(format!(
                "queue.permissions {:o} is not a permission mask",
                self.queue.permissions
            )));
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.queue.poll_interval_ms)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.runtime.shutdown_grace_ms)
    }
}
