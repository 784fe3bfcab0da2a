//! Subcommands and the store options they share

pub mod api;
pub mod migrate;
pub mod subscription;

use apim_core::core_types::RequestId;
use apim_core::logging_facility;
use apim_store::{db, StoreConfig};
use clap::Args;
use rusqlite::Connection;
use std::path::PathBuf;

pub type CliResult = Result<(), Box<dyn std::error::Error>>;

/// Where the store lives; the flags win over `APIM_*` variables, which win over the file
#[derive(Debug, Args)]
pub struct StoreArgs {
    /// TOML store configuration
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Database file, overriding the configured path
    #[arg(long, global = true)]
    pub db: Option<String>,
}

impl StoreArgs {
    /// Resolve the configuration, start logging and open the database
    pub fn open(&self) -> Result<(StoreConfig, Connection), Box<dyn std::error::Error>> {
        let mut config = match &self.config {
            Some(path) => StoreConfig::load(path)?,
            None => StoreConfig::default(),
        }
        .apply_env_overrides()?;
        if let Some(path) = &self.db {
            config.database.path = path.clone();
        }

        logging_facility::init(config.log_profile);
        tracing::debug!(path = %config.database.path, dialect = ?config.dialect, "opening store");

        let conn = db::open_with_config(&config)?;
        Ok((config, conn))
    }
}

/// Tag every event of this invocation with a fresh request id
pub fn request_span() -> tracing::span::EnteredSpan {
    let request_id = RequestId::new();
    tracing::info_span!("request", request_id = %request_id).entered()
}
