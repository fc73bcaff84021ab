// =============================================================================
// Runtime Configuration — startup settings with atomic save
// =============================================================================
//
// Persistence uses an atomic tmp + rename pattern to prevent corruption on
// crash. All fields carry `#[serde(default)]` so that adding new fields
// never breaks loading an older config file.
// =============================================================================

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::types::{Interval, Symbol};

fn default_cache_dir() -> String {
    "series_cache".to_string()
}

fn default_bind_addr() -> String {
    "0.0.0.0:3001".to_string()
}

/// Top-level runtime configuration: which pair/interval to subscribe to on
/// startup, where the series cache lives, and where the HTTP surface binds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Pair subscribed on startup; updated to the last-used pair on shutdown.
    #[serde(default)]
    pub default_symbol: Symbol,

    /// Interval subscribed on startup; updated on shutdown like the symbol.
    #[serde(default)]
    pub default_interval: Interval,

    /// Directory holding one JSON series file per symbol key.
    #[serde(default = "default_cache_dir")]
    pub cache_dir: String,

    /// Address the HTTP/WebSocket surface binds to.
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            default_symbol: Symbol::default(),
            default_interval: Interval::default(),
            cache_dir: default_cache_dir(),
            bind_addr: default_bind_addr(),
        }
    }
}

impl RuntimeConfig {
    /// Load configuration from a JSON file at `path`.
    ///
    /// If the file does not exist, returns an error so the caller can fall
    /// back to defaults with a warning.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read runtime config from {}", path.display()))?;

        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse runtime config from {}", path.display()))?;

        info!(
            path = %path.display(),
            symbol = %config.default_symbol,
            interval = %config.default_interval,
            "runtime config loaded"
        );

        Ok(config)
    }

    /// Persist the current configuration to `path` using an atomic write
    /// (write to `.tmp`, then rename).
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        let content = serde_json::to_string_pretty(self)
            .context("failed to serialise runtime config to JSON")?;

        let tmp_path = path.with_extension("json.tmp");

        std::fs::write(&tmp_path, &content)
            .with_context(|| format!("failed to write tmp config to {}", tmp_path.display()))?;

        std::fs::rename(&tmp_path, path)
            .with_context(|| format!("failed to rename tmp config to {}", path.display()))?;

        info!(path = %path.display(), "runtime config saved (atomic)");
        Ok(())
    }

    /// Apply environment overrides (dotenv has already been loaded).
    pub fn apply_env_overrides(&mut self) {
        if let Ok(addr) = std::env::var("CANDLEVIEW_BIND_ADDR") {
            self.bind_addr = addr;
        }
        if let Ok(dir) = std::env::var("CANDLEVIEW_CACHE_DIR") {
            self.cache_dir = dir;
        }
    }
}
