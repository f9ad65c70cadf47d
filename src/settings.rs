use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::engine::EngineConfig;
use crate::error::{Result, StopwatchError};

const DEFAULT_TICK_INTERVAL_MS: u64 = 10;
const DEFAULT_SYNC_CEILING_MS: u64 = 60_000;

/// User preferences, stored as TOML. Missing keys fall back to defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub tick_interval_ms: u64,
    /// Elapsed time at which the sync progress bar reads 100%.
    pub sync_ceiling_ms: u64,
    pub log_level: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            tick_interval_ms: DEFAULT_TICK_INTERVAL_MS,
            sync_ceiling_ms: DEFAULT_SYNC_CEILING_MS,
            log_level: "info".to_string(),
        }
    }
}

impl Settings {
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|source| StopwatchError::ReadSettings {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| StopwatchError::ParseSettings {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| StopwatchError::WriteSettings {
                path: path.to_path_buf(),
                source,
            })?;
        }
        fs::write(path, content).map_err(|source| StopwatchError::WriteSettings {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            tick_interval: Duration::from_millis(self.tick_interval_ms.max(1)),
        }
    }
}
