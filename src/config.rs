//! Configuration file support.
//!
//! Settings come from a TOML file; command line flags override them.
//!
//! ```toml
//! database_url = "postgres://localhost/app"
//! migrations_dir = "./migrations"
//! table = "_meta_migrations"
//! strict = false
//! ```

use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::debug;

use crate::error::{MigrateError, MigrateResult};
use crate::sequence::ScanPolicy;
use crate::store::{validate_table_name, DEFAULT_TABLE};

/// Name of the project-local config file.
pub const CONFIG_FILE: &str = "stepmigrate.toml";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub database_url: Option<String>,
    pub migrations_dir: Option<PathBuf>,
    pub table: String,
    pub strict: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: None,
            migrations_dir: None,
            table: DEFAULT_TABLE.to_string(),
            strict: false,
        }
    }
}

impl Config {
    /// Parse a config from TOML text.
    pub fn from_toml(content: &str) -> MigrateResult<Self> {
        let config: Config =
            toml::from_str(content).map_err(|e| MigrateError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load config from `explicit` if given, otherwise from the first of
    /// `./stepmigrate.toml` and `<config dir>/stepmigrate/config.toml` that
    /// exists. Defaults are used when no file is found.
    pub fn load(explicit: Option<&Path>) -> MigrateResult<Self> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }

        for candidate in Self::search_paths() {
            if candidate.is_file() {
                return Self::from_file(&candidate);
            }
        }

        debug!("No config file found, using defaults");
        Ok(Self::default())
    }

    fn from_file(path: &Path) -> MigrateResult<Self> {
        debug!(path = %path.display(), "Loading config");
        let content = std::fs::read_to_string(path).map_err(|e| {
            MigrateError::Config(format!("Could not read '{}': {}", path.display(), e))
        })?;
        Self::from_toml(&content)
    }

    fn search_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from(CONFIG_FILE)];
        if let Some(dir) = dirs::config_dir() {
            paths.push(dir.join("stepmigrate").join("config.toml"));
        }
        paths
    }

    pub fn validate(&self) -> MigrateResult<()> {
        validate_table_name(&self.table)
    }

    pub fn scan_policy(&self) -> ScanPolicy {
        if self.strict {
            ScanPolicy::Strict
        } else {
            ScanPolicy::Lenient
        }
    }
}
