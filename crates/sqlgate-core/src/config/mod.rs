//! Configuration types for the sqlgate SQL gateway.
//!
//! Configuration is loaded from a single YAML file (`sqlgate.yaml` by
//! default). Every section is optional; a missing file section falls back to
//! its defaults, and the CLI may override individual fields afterwards.
//!
//! ```yaml
//! upstream:
//!   database_url_env: DATABASE_URL
//!   pool:
//!     max_connections: 10
//! mcp:
//!   transport: stdio
//! role: insert
//! roles:
//!   admin: [SELECT, INSERT, UPDATE, DELETE, CREATE, ALTER, DROP, TRUNCATE, GRANT]
//! ```

pub mod mcp;
pub mod roles;
pub mod upstream;

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

pub use mcp::{McpConfig, Transport};
pub use roles::{RoleName, RolesConfig};
pub use upstream::{ConnectionPoolConfig, SslMode, UpstreamConfig};

/// Complete gateway configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Upstream Postgres connection.
    #[serde(default)]
    pub upstream: UpstreamConfig,

    /// MCP server configuration.
    #[serde(default)]
    pub mcp: McpConfig,

    /// Role the gateway enforces for every caller.
    #[serde(default)]
    pub role: RoleName,

    /// Overrides for the built-in privilege grants.
    #[serde(default)]
    pub roles: RolesConfig,

    /// Resource listing settings.
    #[serde(default)]
    pub resources: ResourcesConfig,
}

/// Settings for the table/schema resource listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourcesConfig {
    /// Database schema whose tables are enumerated.
    #[serde(default = "default_schema")]
    pub schema: String,
}

impl Default for ResourcesConfig {
    fn default() -> Self {
        Self {
            schema: default_schema(),
        }
    }
}

fn default_schema() -> String {
    "public".to_string()
}

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl GatewayConfig {
    /// Load and validate configuration from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path.as_ref())?;
        Self::from_yaml(&content)
    }

    /// Parse and validate configuration from YAML content.
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load the file if it exists, otherwise start from defaults.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if path.exists() {
            Self::from_file(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.roles.validate()?;
        if self.resources.schema.trim().is_empty() {
            return Err(ConfigError::Config(
                "resources.schema must not be empty".to_string(),
            ));
        }
        if let Some(pool) = &self.upstream.pool
            && pool.max_connections == 0
        {
            return Err(ConfigError::Config(
                "upstream.pool.max_connections must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
