//! World configuration, loadable from JSON.
//!
//! Every field has a default, so a config file only needs the keys it changes:
//!
//! ```json
//! { "initial_capacity": 1024, "strict_reflection": true }
//! ```

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

/// Tunables for a [`GameWorld`](crate::world::GameWorld).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    /// Initial dense capacity of each component set.
    pub initial_capacity: usize,
    /// Panic, instead of warning, when clone or lifecycle dispatch meets a
    /// component type that was never registered.
    pub strict_reflection: bool,
    /// Log stale command targets at `warn` instead of `debug`.
    pub warn_on_stale_commands: bool,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            initial_capacity: 64,
            strict_reflection: false,
            warn_on_stale_commands: false,
        }
    }
}

impl WorldConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(json).map_err(ConfigError::Parse)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            source: e,
        })?;
        let config = Self::from_json_str(&json)?;
        log::info!("loaded world config from {}", path.display());
        Ok(config)
    }

    pub fn to_json_string(&self) -> Result<String, ConfigError> {
        serde_json::to_string_pretty(self).map_err(ConfigError::Parse)
    }
}

// ── Errors ──────────────────────────────────────────────────────────────

/// Errors from loading a [`WorldConfig`].
#[derive(Debug)]
pub enum ConfigError {
    /// The file could not be read.
    Io {
        path: String,
        source: std::io::Error,
    },
    /// The text was not valid config JSON.
    Parse(serde_json::Error),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io { path, source } => {
                write!(f, "failed to read config {path}: {source}")
            }
            ConfigError::Parse(e) => write!(f, "invalid config: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io { source, .. } => Some(source),
            ConfigError::Parse(e) => Some(e),
        }
    }
}
