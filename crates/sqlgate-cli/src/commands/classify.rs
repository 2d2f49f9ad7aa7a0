//! `sqlgate classify`: show how a statement is classified and gated.
//!
//! Never connects to a database.

use anyhow::{Context, Result};
use clap::Args;
use sqlgate_core::{GatewayConfig, RoleName};
use sqlgate_policy::{PermissionGate, PrivilegeTable};
use std::path::PathBuf;

/// Arguments for `sqlgate classify`.
#[derive(Debug, Args)]
pub struct ClassifyArgs {
    /// SQL statement to classify.
    pub sql: String,

    /// Role to check against.
    #[arg(long, env = "SQLGATE_ROLE", default_value = "read")]
    pub role: RoleName,

    /// Configuration file with privilege overrides.
    #[arg(short, long, default_value = "sqlgate.yaml")]
    pub config: PathBuf,
}

/// Returns whether the statement is allowed.
pub fn execute(args: ClassifyArgs) -> Result<bool> {
    let config = GatewayConfig::load_or_default(&args.config)
        .with_context(|| format!("Failed to load config file: {}", args.config.display()))?;
    let gate = PermissionGate::new(args.role, &PrivilegeTable::from_config(&config.roles));

    let (report, allowed) = report(&gate, &args.sql);
    println!("{}", report);
    Ok(allowed)
}

fn report(gate: &PermissionGate, sql: &str) -> (String, bool) {
    match gate.check(sql) {
        Ok(classification) => (
            format!(
                "command:   {}\nprivilege: {}\nwrite:     {}\ndecision:  allowed for role '{}'",
                classification.command,
                classification.privilege,
                classification.is_write(),
                gate.role()
            ),
            true,
        ),
        Err(denied) => (
            format!(
                "command:   {}\nprivilege: {}\ndecision:  {}",
                denied.command, denied.required, denied
            ),
            false,
        ),
    }
}
