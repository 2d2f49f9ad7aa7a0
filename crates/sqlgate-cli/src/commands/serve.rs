//! `sqlgate serve`: run the MCP server.

use anyhow::{Context, Result};
use clap::Args;
use sqlgate_core::{GatewayConfig, RoleName, Transport};
use sqlgate_mcp::{McpServer, PgConnectionPool, QueryExecutor, ResourceCatalog};
use sqlgate_policy::{PermissionGate, PrivilegeTable};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

/// Arguments for `sqlgate serve`.
#[derive(Debug, Args)]
pub struct ServeArgs {
    /// Configuration file path. Missing file means defaults.
    #[arg(short, long, default_value = "sqlgate.yaml")]
    pub config: PathBuf,

    /// Database URL. Overrides the upstream section of the config file.
    #[arg(long, env = "DATABASE_URL", hide_env_values = true)]
    pub database_url: Option<String>,

    /// Role to run as (read, insert, write, admin). Overrides config file.
    #[arg(long, env = "SQLGATE_ROLE")]
    pub role: Option<RoleName>,

    /// Transport type (stdio or http). Overrides config file.
    #[arg(long)]
    pub transport: Option<Transport>,

    /// HTTP port (only for http transport). Overrides config file.
    #[arg(long)]
    pub port: Option<u16>,
}

impl ServeArgs {
    /// Load the config file and apply command-line overrides.
    pub fn resolve_config(&self) -> Result<GatewayConfig> {
        if !self.config.exists() {
            warn!(config = %self.config.display(), "Config file not found, using defaults");
        }
        let mut config = GatewayConfig::load_or_default(&self.config)
            .with_context(|| format!("Failed to load config file: {}", self.config.display()))?;

        if let Some(url) = &self.database_url {
            config.upstream.database_url = Some(url.clone());
            config.upstream.database_url_env = None;
        }
        if let Some(role) = self.role {
            config.role = role;
        }
        if let Some(transport) = self.transport {
            config.mcp.transport = transport;
        }
        if let Some(port) = self.port {
            config.mcp.port = port;
        }
        Ok(config)
    }
}

pub async fn execute(args: ServeArgs) -> Result<()> {
    let config = args.resolve_config()?;
    let table = PrivilegeTable::from_config(&config.roles);
    let gate = PermissionGate::new(config.role, &table);

    info!(
        role = %config.role,
        granted = %join(gate.granted()),
        transport = %config.mcp.transport,
        "Gateway configuration loaded"
    );

    let pool = PgConnectionPool::connect(&config.upstream)
        .await
        .with_context(|| {
            format!(
                "Failed to connect to database at {}",
                config.upstream.display_target()
            )
        })?;
    let pool = Arc::new(pool);
    info!(target_db = %config.upstream.display_target(), "Connected to upstream database");

    let executor = Arc::new(QueryExecutor::new(gate, pool.clone()));
    let server = McpServer::new(config.mcp.clone(), executor)
        .with_resources(ResourceCatalog::new(pool, config.resources.schema.clone()));

    Arc::new(server).run().await.context("MCP server failed")?;
    info!("MCP server stopped");
    Ok(())
}

fn join<T: std::fmt::Display>(items: &[T]) -> String {
    items
        .iter()
        .map(|item| item.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
