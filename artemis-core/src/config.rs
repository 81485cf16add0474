//! Tool configuration loaded from TOML.
//!
//! Every field has a default, so a config file only needs the values it
//! changes:
//! ```toml
//! [feed]
//! url = "https://api.entropianexus.com/mobspawns"
//! timeout_secs = 30
//!
//! [database]
//! path = "data/entropia.db"
//! sessions_path = "/home/me/.config/artemis-v2/artemis.db"
//!
//! [matching]
//! planet = "Calypso"
//! tolerance = 0.2
//! limit = 10
//! ```

use crate::error::{ArtemisError, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

pub const DEFAULT_FEED_URL: &str = "https://api.entropianexus.com/mobspawns";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_TOLERANCE: f64 = 0.2;

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct FeedConfig {
    pub url: String,
    pub timeout_secs: u64,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_FEED_URL.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Spawn store and mob catalog
    pub path: PathBuf,
    /// Session tracker database, owned by the companion app
    pub sessions_path: Option<PathBuf>,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./data/entropia.db"),
            sessions_path: None,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct MatchingConfig {
    pub planet: String,
    pub tolerance: f64,
    pub limit: usize,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            planet: "Calypso".to_string(),
            tolerance: DEFAULT_TOLERANCE,
            limit: 10,
        }
    }
}

/// Complete tool configuration.
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct AppConfig {
    pub feed: FeedConfig,
    pub database: DatabaseConfig,
    pub matching: MatchingConfig,
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ArtemisError::Io(std::io::Error::new(
                e.kind(),
                format!("Failed to read config from {:?}: {}", path, e),
            ))
        })?;

        Self::from_str(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn from_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| ArtemisError::Config(format!("Failed to parse config TOML: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.feed.timeout_secs == 0 {
            return Err(ArtemisError::Config("feed.timeout_secs must be positive".to_string()));
        }
        if !(0.0..1.0).contains(&self.matching.tolerance) {
            return Err(ArtemisError::Config(format!(
                "matching.tolerance must be in [0, 1), got {}",
                self.matching.tolerance
            )));
        }
        Ok(())
    }
}
