//! Service configuration, loaded from ~/.pulsecard/config.toml.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{PulsecardError, Result};

/// Root configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PulsecardConfig {
    /// Base URL of the metrics backend, e.g. "http://victoria:8428".
    #[serde(default)]
    pub metrics_url: String,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub delivery: DeliveryConfig,
    /// Directory holding tasks.json / last_run.json.
    #[serde(default = "default_store_dir")]
    pub store_dir: PathBuf,
    /// Trailing note rendered at the bottom of every card.
    #[serde(default = "default_footer")]
    pub footer: String,
}

fn default_store_dir() -> PathBuf {
    home_dir().join("tasks")
}
fn default_footer() -> String {
    "pulsecard".to_string()
}

impl Default for PulsecardConfig {
    fn default() -> Self {
        Self {
            metrics_url: String::new(),
            scheduler: SchedulerConfig::default(),
            delivery: DeliveryConfig::default(),
            store_dir: default_store_dir(),
            footer: default_footer(),
        }
    }
}

/// Scheduler loop tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Seconds between schedule scans.
    #[serde(default = "default_tick")]
    pub tick_secs: u64,
    /// Bounded work queue capacity; overflow enqueues are dropped.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    /// Milliseconds between consecutive task executions.
    #[serde(default = "default_spacing")]
    pub task_spacing_ms: u64,
    /// Floor for every task's minimum re-run interval, seconds.
    #[serde(default = "default_min_rerun_floor")]
    pub min_rerun_floor_secs: u64,
}

fn default_tick() -> u64 {
    60
}
fn default_queue_capacity() -> usize {
    100
}
fn default_spacing() -> u64 {
    500
}
fn default_min_rerun_floor() -> u64 {
    300
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_secs: default_tick(),
            queue_capacity: default_queue_capacity(),
            task_spacing_ms: default_spacing(),
            min_rerun_floor_secs: default_min_rerun_floor(),
        }
    }
}

/// Delivery client tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryConfig {
    /// Per-request timeout, seconds.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    /// Attempts per destination, including the first.
    #[serde(default = "default_attempts")]
    pub max_attempts: u32,
    /// Extra cooldown after a rate-limited destination, seconds.
    #[serde(default = "default_cooldown")]
    pub rate_limit_cooldown_secs: u64,
}

fn default_timeout() -> u64 {
    30
}
fn default_attempts() -> u32 {
    3
}
fn default_cooldown() -> u64 {
    3
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout(),
            max_attempts: default_attempts(),
            rate_limit_cooldown_secs: default_cooldown(),
        }
    }
}

impl PulsecardConfig {
    /// Load config from the default path, falling back to defaults when
    /// no file exists yet.
    pub fn load() -> Result<Self> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load config from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| PulsecardError::Config(format!("Failed to read config: {e}")))?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| PulsecardError::Config(format!("Failed to parse config: {e}")))?;
        Ok(config)
    }

    /// Save config to the default path.
    pub fn save(&self) -> Result<()> {
        let path = Self::default_path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| PulsecardError::Config(format!("Failed to serialize config: {e}")))?;
        std::fs::write(&path, content)?;
        Ok(())
    }

    /// Default config path (~/.pulsecard/config.toml).
    pub fn default_path() -> PathBuf {
        home_dir().join("config.toml")
    }
}

/// The pulsecard home directory (~/.pulsecard).
pub fn home_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".pulsecard")
}
