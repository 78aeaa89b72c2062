//! User configuration loaded from `config.toml`

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Environment variable overriding the configured database path
pub const DATABASE_ENV_VAR: &str = "SHEETSYNC_DATABASE";

const DEFAULT_PROCESS: &str = "Manual Edit";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// SQLite database used by the record commands
    pub database: Option<PathBuf>,
    /// Process label attached to edits made without `--process`
    pub default_process: String,
    /// Write the synthetic row index column when saving workbooks
    pub preserve_row_index: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: None,
            default_process: DEFAULT_PROCESS.to_string(),
            preserve_row_index: false,
        }
    }
}

impl Config {
    /// `<config dir>/sheetsync/config.toml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("sheetsync").join("config.toml"))
    }

    /// Load from `path` (or the default location); a missing file yields defaults
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(p) => Some(p.to_path_buf()),
            None => Self::default_path(),
        };

        let mut config = match path {
            Some(ref p) if p.exists() => {
                let text = std::fs::read_to_string(p)
                    .with_context(|| format!("Failed to read config file: {}", p.display()))?;
                let config = Self::from_toml(&text)
                    .with_context(|| format!("Failed to parse config file: {}", p.display()))?;
                log::debug!("Loaded config from {}", p.display());
                config
            }
            _ => Self::default(),
        };

        if let Ok(database) = std::env::var(DATABASE_ENV_VAR) {
            if !database.trim().is_empty() {
                config.database = Some(PathBuf::from(database));
            }
        }

        Ok(config)
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Database from the command line, falling back to the configured one
    pub fn database_path(&self, cli_override: Option<&Path>) -> Result<PathBuf> {
        cli_override
            .map(Path::to_path_buf)
            .or_else(|| self.database.clone())
            .with_context(|| {
                format!(
                    "No database configured. Pass --database, set {} or add `database` to the config file",
                    DATABASE_ENV_VAR
                )
            })
    }

    /// Process label from the command line, falling back to the configured default
    pub fn process_label(&self, cli_override: Option<&str>) -> String {
        cli_override
            .map(str::to_string)
            .unwrap_or_else(|| self.default_process.clone())
    }
}
