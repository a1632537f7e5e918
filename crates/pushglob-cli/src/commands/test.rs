//! Test command - Probe Globus endpoints
//!
//! Lists the root of each configured endpoint (or those named with `-e`)
//! and reports how many entries it sees. Nothing is written to the ledger.

use anyhow::Result;
use clap::Args;
use tracing::info;

use pushglob_core::config::Config;
use pushglob_core::domain::EndpointName;
use pushglob_core::ports::ITransferService;

use super::{transfer_service, CliContext};

#[derive(Debug, Args)]
pub struct TestCommand {
    /// Endpoint to probe (repeatable) [default: all configured endpoints]
    #[arg(short, long = "endpoint")]
    pub endpoints: Vec<String>,
}

/// Outcome of probing one endpoint
#[derive(Debug, Clone, PartialEq)]
enum Probe {
    Ok { file_count: usize },
    Failed(String),
}

impl TestCommand {
    pub async fn execute(&self, ctx: &CliContext) -> Result<()> {
        let formatter = ctx.formatter();
        let config = ctx.load_config()?;
        let transfer = transfer_service(&config);

        let targets = self.targets(&config);
        if targets.is_empty() {
            formatter.warn("No endpoints to test");
        } else if self.endpoints.is_empty() {
            formatter.info("Probing configured globus endpoints ...");
        } else {
            formatter.info("Probing requested globus endpoints ...");
        }

        let mut results = Vec::with_capacity(targets.len());
        for name in targets {
            let Some(id) = lookup_id(&config, &name) else {
                formatter.error(&format!("Endpoint '{name}' is not configured"));
                results.push((name, None, Probe::Failed("not configured".into())));
                continue;
            };

            formatter.info(&format!("Testing endpoint '{name}' ({id}) ..."));
            let probe = match transfer.list_endpoint_root(&id).await {
                Ok(listing) => Probe::Ok {
                    file_count: listing.file_count,
                },
                Err(e) => Probe::Failed(e.to_string()),
            };
            info!(endpoint = %name, ok = matches!(probe, Probe::Ok { .. }), "Endpoint probed");

            match &probe {
                Probe::Ok { file_count } => formatter.success(&format!(
                    "'{name}' looks good, {file_count} entries at base level"
                )),
                Probe::Failed(reason) => {
                    formatter.error(&format!("'{name}' looks bad: {reason}"))
                }
            }
            results.push((name, Some(id), probe));
        }

        if ctx.is_json() {
            let endpoints: Vec<_> = results
                .iter()
                .map(|(name, id, probe)| match probe {
                    Probe::Ok { file_count } => serde_json::json!({
                        "endpoint": name,
                        "id": id,
                        "ok": true,
                        "file_count": file_count,
                    }),
                    Probe::Failed(reason) => serde_json::json!({
                        "endpoint": name,
                        "id": id,
                        "ok": false,
                        "error": reason,
                    }),
                })
                .collect();
            formatter.print_json(&serde_json::json!({ "endpoints": endpoints }));
        }

        Ok(())
    }

    /// Endpoints named on the command line, else every configured one
    fn targets(&self, config: &Config) -> Vec<String> {
        if self.endpoints.is_empty() {
            config.endpoints.keys().map(|k| k.to_string()).collect()
        } else {
            self.endpoints.clone()
        }
    }
}

fn lookup_id(config: &Config, name: &str) -> Option<String> {
    let name = EndpointName::new(name).ok()?;
    config.endpoint_id(&name).map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    const YAML: &str = r#"
db_file: /tmp/ledger.sqlite
local_endpoint: laptop
globus_endpoints:
  laptop: 'l-id'
  cluster: 'c-id'
"#;

    #[test]
    fn targets_default_to_all_endpoints() {
        let config = Config::from_yaml(YAML).unwrap();
        let cmd = TestCommand { endpoints: vec![] };
        assert_eq!(cmd.targets(&config), vec!["cluster", "laptop"]);
    }

    #[test]
    fn targets_keep_requested_order() {
        let config = Config::from_yaml(YAML).unwrap();
        let cmd = TestCommand {
            endpoints: vec!["laptop".into(), "tape".into()],
        };
        assert_eq!(cmd.targets(&config), vec!["laptop", "tape"]);
    }

    #[test]
    fn lookup_id_of_unknown_or_blank_endpoint() {
        let config = Config::from_yaml(YAML).unwrap();
        assert_eq!(lookup_id(&config, "cluster").as_deref(), Some("c-id"));
        assert_eq!(lookup_id(&config, "tape"), None);
        assert_eq!(lookup_id(&config, " "), None);
    }
}
