//! TOML configuration.
//!
//! ```toml
//! [cache]
//! translator_capacity = 512
//! statement_capacity = 2048
//!
//! [connection]
//! host = "localhost"
//! database = "app"
//! ssl_mode = "disable"
//! ```
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::db::ConnectionConfig;
use crate::error::{Error, Result};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub cache: CacheConfig,
    pub connection: Option<ConnectionConfig>,
}

/// Capacities of the two plan cache levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Compiled translators (level 1).
    pub translator_capacity: usize,
    /// Rendered statements (level 2).
    pub statement_capacity: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            translator_capacity: 512,
            statement_capacity: 2048,
        }
    }
}

impl CacheConfig {
    pub(crate) fn capacities(&self) -> Result<(NonZeroUsize, NonZeroUsize)> {
        let nonzero = |n: usize, what: &str| {
            NonZeroUsize::new(n).ok_or_else(|| Error::Config(format!("{} must be positive", what)))
        };
        Ok((
            nonzero(self.translator_capacity, "cache.translator_capacity")?,
            nonzero(self.statement_capacity, "cache.statement_capacity")?,
        ))
    }
}

impl Config {
    /// `<config dir>/compsql/config.toml`.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("compsql")
            .join("config.toml")
    }

    /// Load `path`, falling back to defaults when the file does not exist.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content).map_err(|e| Error::Config(e.to_string()))?;
        config.cache.capacities()?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| Error::Config(format!("{}: {}", parent.display(), e)))?;
        }
        let content = toml::to_string_pretty(self).map_err(|e| Error::Config(e.to_string()))?;
        std::fs::write(path, content)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))
    }
}
