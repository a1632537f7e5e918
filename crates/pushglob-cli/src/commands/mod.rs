//! CLI command implementations
//!
//! Every command receives a [`CliContext`] with the output format and the
//! configuration path, and builds the adapters it needs from there.

pub mod auto;
pub mod config;
pub mod status;
pub mod sync;
pub mod test;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::debug;

use pushglob_cache::{DatabasePool, SqliteLedgerStore};
use pushglob_core::config::Config;
use pushglob_globus::{GlobusCli, GlobusTransferService};

use crate::output::{get_formatter, OutputFormat, OutputFormatter};

/// Shared invocation settings
#[derive(Debug, Clone)]
pub struct CliContext {
    format: OutputFormat,
    config_path: PathBuf,
}

impl CliContext {
    pub fn new(format: OutputFormat, config_path: PathBuf) -> Self {
        Self {
            format,
            config_path,
        }
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn is_json(&self) -> bool {
        self.format == OutputFormat::Json
    }

    pub fn formatter(&self) -> Box<dyn OutputFormatter> {
        get_formatter(self.format)
    }

    /// Loads and validates the configuration file
    pub fn load_config(&self) -> Result<Config> {
        let config = Config::load_validated(&self.config_path).with_context(|| {
            format!(
                "Failed to load configuration from {}",
                self.config_path.display()
            )
        })?;
        debug!(config_path = %self.config_path.display(), "Loaded configuration");
        Ok(config)
    }
}

/// Opens (creating if needed) the ledger named by the config
pub async fn open_store(config: &Config) -> Result<Arc<SqliteLedgerStore>> {
    let db_path = config.db_path();
    let pool = DatabasePool::new(&db_path)
        .await
        .with_context(|| format!("Failed to open ledger {}", db_path.display()))?;
    Ok(Arc::new(SqliteLedgerStore::new(pool.pool().clone())))
}

/// The Globus adapter configured by `globus_bin` / `globus.timeout_secs`
pub fn transfer_service(config: &Config) -> Arc<GlobusTransferService> {
    Arc::new(GlobusTransferService::new(GlobusCli::from_config(config)))
}
