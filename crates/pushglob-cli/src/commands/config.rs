//! Config command - View and check the pushglob configuration
//!
//! - `show` lists the known endpoints and the local root of every space
//! - `validate` loads the file and reports every problem at once

use anyhow::{bail, Context, Result};
use clap::Subcommand;
use tracing::info;

use pushglob_core::config::{Config, ConfigError};

use super::CliContext;

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Display endpoints and spaces
    Show,
    /// Validate the configuration file
    Validate,
}

impl ConfigCommand {
    pub async fn execute(&self, ctx: &CliContext) -> Result<()> {
        match self {
            ConfigCommand::Show => show(ctx),
            ConfigCommand::Validate => validate(ctx),
        }
    }
}

fn show(ctx: &CliContext) -> Result<()> {
    let formatter = ctx.formatter();
    let config = ctx.load_config()?;

    if ctx.is_json() {
        let json =
            serde_json::to_value(&config).context("Failed to serialize configuration to JSON")?;
        formatter.print_json(&json);
        return Ok(());
    }

    formatter.success(&format!("Configuration ({})", ctx.config_path().display()));
    formatter.info(&format!("Ledger: {}", config.db_path().display()));
    formatter.info(&format!("Local endpoint: {}", config.local_endpoint));
    formatter.info("");
    formatter.info("These are the globus endpoints I know about:");
    for (name, id) in &config.endpoints {
        formatter.info(&format!("  {:<20} {}", name.as_str(), id));
    }
    formatter.info("");
    formatter.info("These are the spaces (and their local paths) I know about:");
    for (name, space) in &config.spaces {
        let root = space
            .local_root(&config.local_endpoint)
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(no local root)".into());
        formatter.info(&format!("  {:<20} {}", name.as_str(), root));
    }
    Ok(())
}

fn validate(ctx: &CliContext) -> Result<()> {
    let formatter = ctx.formatter();
    let path = ctx.config_path();
    info!(config_path = %path.display(), "Validating configuration");

    let errors = match Config::load_validated(path) {
        Ok(_) => Vec::new(),
        Err(ConfigError::Invalid(errors)) => errors,
        Err(e) => return Err(e).context("Configuration could not be read"),
    };

    if ctx.is_json() {
        formatter.print_json(&serde_json::json!({
            "valid": errors.is_empty(),
            "config_path": path.display().to_string(),
            "errors": errors
                .iter()
                .map(|e| serde_json::json!({"field": e.field, "message": e.message}))
                .collect::<Vec<_>>(),
        }));
    } else if errors.is_empty() {
        formatter.success(&format!("{} is valid", path.display()));
    } else {
        formatter.error(&format!(
            "{} has {} problem(s):",
            path.display(),
            errors.len()
        ));
        for err in &errors {
            formatter.info(&format!("- {err}"));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        bail!("invalid configuration")
    }
}
