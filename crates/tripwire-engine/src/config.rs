//! Engine configuration
//!
//! Defaults live in [`defaults`]; hosts overlay environment variables with
//! [`EngineConfig::from_env`] or read a JSON file with [`EngineConfig::load`].

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Single source of truth for file names and default values
pub mod defaults {
    /// Directory holding the persisted graph and blobs
    pub const DATA_DIR: &str = "workflow";
    /// Persisted graph
    pub const WORKFLOW_FILE: &str = "workflow.json";
    /// Opaque node-local data blob
    pub const WORKFLOW_DATA_FILE: &str = "workflow_data.json";
    /// Opaque node-local state blob
    pub const WORKFLOW_STATE_FILE: &str = "workflow_state.json";
    /// Bounded background worker count
    pub const WORKER_POOL_SIZE: usize = 20;
    /// Maximum nodes one walk may visit
    pub const MAX_HOPS: u32 = 1024;
    /// How long shutdown waits for running worker jobs
    pub const DRAIN_TIMEOUT_MS: u64 = 5000;
}

/// Environment variable names
pub mod env {
    pub const DATA_DIR: &str = "TRIPWIRE_DATA_DIR";
    pub const WORKER_POOL_SIZE: &str = "TRIPWIRE_WORKER_POOL_SIZE";
    pub const MAX_HOPS: &str = "TRIPWIRE_MAX_HOPS";
    pub const DRAIN_TIMEOUT_MS: &str = "TRIPWIRE_DRAIN_TIMEOUT_MS";
}

/// Engine configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Directory for the persisted graph and blobs
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// Number of background workers
    #[serde(default = "default_worker_pool_size")]
    pub worker_pool_size: usize,
    /// Hop guard per walk; `None` disables it
    #[serde(default = "default_max_hops")]
    pub max_hops: Option<u32>,
    /// Shutdown drain timeout in milliseconds
    #[serde(default = "default_drain_timeout_ms")]
    pub drain_timeout_ms: u64,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from(defaults::DATA_DIR)
}

fn default_worker_pool_size() -> usize {
    defaults::WORKER_POOL_SIZE
}

fn default_max_hops() -> Option<u32> {
    Some(defaults::MAX_HOPS)
}

fn default_drain_timeout_ms() -> u64 {
    defaults::DRAIN_TIMEOUT_MS
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            worker_pool_size: default_worker_pool_size(),
            max_hops: default_max_hops(),
            drain_timeout_ms: default_drain_timeout_ms(),
        }
    }
}

impl EngineConfig {
    /// Defaults overlaid with `TRIPWIRE_*` environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Defaults overlaid with values from `lookup`
    ///
    /// Malformed values are logged and ignored. A hop limit of `0` disables
    /// the guard.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(dir) = lookup(env::DATA_DIR).filter(|d| !d.trim().is_empty()) {
            config.data_dir = PathBuf::from(dir);
        }
        if let Some(size) = parse_var::<usize>(&lookup, env::WORKER_POOL_SIZE) {
            if size == 0 {
                log::warn!("Ignoring {}=0", env::WORKER_POOL_SIZE);
            } else {
                config.worker_pool_size = size;
            }
        }
        if let Some(hops) = parse_var::<u32>(&lookup, env::MAX_HOPS) {
            config.max_hops = (hops > 0).then_some(hops);
        }
        if let Some(ms) = parse_var::<u64>(&lookup, env::DRAIN_TIMEOUT_MS) {
            config.drain_timeout_ms = ms;
        }

        config
    }

    /// Load configuration from a JSON file; missing keys take defaults
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        let config = serde_json::from_str(&contents)?;
        log::info!("Configuration loaded from {:?}", path.as_ref());
        Ok(config)
    }

    pub fn drain_timeout(&self) -> Duration {
        Duration::from_millis(self.drain_timeout_ms)
    }
}

fn parse_var<T: std::str::FromStr>(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Option<T> {
    let raw = lookup(name)?;
    match raw.trim().parse::<T>() {
        Ok(value) => Some(value),
        Err(_) => {
            log::warn!("Ignoring malformed {}='{}'", name, raw);
            None
        }
    }
}
