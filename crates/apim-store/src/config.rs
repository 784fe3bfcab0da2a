//! Store configuration
//!
//! Loaded from a TOML file, then overridden by `APIM_*` environment
//! variables. Every field has a default, so an empty file is valid.
//!
//! ```toml
//! dialect = "sqlite"
//! log_profile = "production"
//!
//! [database]
//! path = "/var/lib/apim/management.db"
//! foreign_keys = true
//! journal_mode = "WAL"
//! ```

use crate::errors::{config_error, io_error, Result};
use crate::orm::Dialect;
use apim_core::logging_facility::Profile;
use serde::Deserialize;
use std::path::Path;

pub const ENV_DB_PATH: &str = "APIM_DB_PATH";
pub const ENV_DIALECT: &str = "APIM_DIALECT";
pub const ENV_LOG_PROFILE: &str = "APIM_LOG_PROFILE";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StoreConfig {
    pub database: DatabaseConfig,
    /// SQL flavour used for paging clauses and identifier escaping
    ///
    /// Connections are always SQLite, so any other value is refused.
    pub dialect: Dialect,
    pub log_profile: Profile,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DatabaseConfig {
    /// File path, or `:memory:`
    pub path: String,
    pub foreign_keys: bool,
    pub journal_mode: JournalMode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum JournalMode {
    Wal,
    Delete,
    Memory,
}

impl JournalMode {
    pub fn as_pragma(&self) -> &'static str {
        match self {
            JournalMode::Wal => "WAL",
            JournalMode::Delete => "DELETE",
            JournalMode::Memory => "MEMORY",
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: "apim.db".to_string(),
            foreign_keys: true,
            journal_mode: JournalMode::Wal,
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig::default(),
            dialect: Dialect::Sqlite,
            log_profile: Profile::Development,
        }
    }
}

impl StoreConfig {
    pub fn from_toml_str(source: &str) -> Result<Self> {
        let config: Self = toml::from_str(source)
            .map_err(|e| config_error(format!("Invalid store config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let source = std::fs::read_to_string(path.as_ref())
            .map_err(|e| io_error("config_read", e))?;
        Self::from_toml_str(&source)
    }

    /// Apply `APIM_DB_PATH`, `APIM_DIALECT` and `APIM_LOG_PROFILE`
    pub fn apply_env_overrides(self) -> Result<Self> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary lookup (environment, CLI flags, tests)
    pub fn apply_overrides<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = lookup(ENV_DB_PATH).filter(|p| !p.is_empty()) {
            self.database.path = path;
        }
        if let Some(dialect) = lookup(ENV_DIALECT) {
            self.dialect = dialect.parse().map_err(config_error)?;
        }
        if let Some(profile) = lookup(ENV_LOG_PROFILE) {
            self.log_profile = profile.parse().map_err(config_error)?;
        }
        self.validate()?;
        Ok(self)
    }

    /// Settings the store can actually run with
    pub fn validate(&self) -> Result<()> {
        if self.dialect != Dialect::Sqlite {
            return Err(config_error(format!(
                "Dialect {:?} is not supported by the SQLite store",
                self.dialect
            )));
        }
        Ok(())
    }

    pub fn is_in_memory(&self) -> bool {
        self.database.path == ":memory:"
    }
}
