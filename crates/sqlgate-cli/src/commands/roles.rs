//! `sqlgate roles`: print the effective privilege table.

use anyhow::{Context, Result};
use clap::Args;
use sqlgate_core::GatewayConfig;
use sqlgate_policy::PrivilegeTable;
use std::path::PathBuf;

/// Arguments for `sqlgate roles`.
#[derive(Debug, Args)]
pub struct RolesArgs {
    /// Configuration file path. Missing file means built-in grants.
    #[arg(short, long, default_value = "sqlgate.yaml")]
    pub config: PathBuf,

    /// Print as JSON.
    #[arg(long)]
    pub json: bool,
}

pub fn execute(args: RolesArgs) -> Result<()> {
    let config = GatewayConfig::load_or_default(&args.config)
        .with_context(|| format!("Failed to load config file: {}", args.config.display()))?;
    let table = PrivilegeTable::from_config(&config.roles);

    if args.json {
        let map: serde_json::Map<String, serde_json::Value> = table
            .iter()
            .map(|(role, grants)| (role.to_string(), serde_json::json!(grants)))
            .collect();
        println!("{}", serde_json::to_string_pretty(&map)?);
    } else {
        print!("{}", render(&table));
    }
    Ok(())
}

fn render(table: &PrivilegeTable) -> String {
    let mut out = String::new();
    for (role, grants) in table.iter() {
        let grants = grants
            .iter()
            .map(|p| p.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        out.push_str(&format!("{:<8}{}\n", role.as_str(), grants));
    }
    out
}
