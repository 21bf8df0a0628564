//! Engine configuration, loaded from JSON or built from defaults.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{ChartbookError, Result};

/// Default trailing-edge delay before an edited draft is persisted
pub const DEFAULT_AUTO_SAVE_DELAY_MS: u64 = 1000;

/// Default trailing-edge delay before an edited draft is re-rendered
pub const DEFAULT_AUTO_RENDER_DELAY_MS: u64 = 1500;

pub const DEFAULT_FETCH_TIMEOUT_MS: u64 = 10_000;

/// Timing and behavior knobs of a [`crate::Workbench`]
///
/// Missing keys take their defaults, so `{}` is a valid configuration file:
///
/// ```json
/// {"autoSaveDelayMs": 500, "autoRender": false}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EngineConfig {
    pub auto_save_delay_ms: u64,
    pub auto_render_delay_ms: u64,
    pub auto_save: bool,
    pub auto_render: bool,
    pub fetch_timeout_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            auto_save_delay_ms: DEFAULT_AUTO_SAVE_DELAY_MS,
            auto_render_delay_ms: DEFAULT_AUTO_RENDER_DELAY_MS,
            auto_save: true,
            auto_render: true,
            fetch_timeout_ms: DEFAULT_FETCH_TIMEOUT_MS,
        }
    }
}

impl EngineConfig {
    /// Parse a configuration from JSON text
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text)
            .map_err(|e| ChartbookError::ParseError(format!("Invalid configuration: {}", e)))
    }

    /// Load a configuration file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ChartbookError::StorageError(format!("Reading {}: {}", path.display(), e))
        })?;
        Self::from_json(&content)
    }

    pub fn auto_save_delay(&self) -> Duration {
        Duration::from_millis(self.auto_save_delay_ms)
    }

    pub fn auto_render_delay(&self) -> Duration {
        Duration::from_millis(self.auto_render_delay_ms)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }
}
