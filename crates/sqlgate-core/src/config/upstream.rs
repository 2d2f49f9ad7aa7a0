//! Upstream database configuration.
//!
//! The gateway talks to exactly one PostgreSQL database. Its location can be
//! given as an environment variable holding a URL, a literal URL, or as
//! individual connection fields.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for the upstream Postgres connection.
///
/// Precedence when building the connection string:
/// 1. `database_url_env`
/// 2. `database_url`
/// 3. Individual connection parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    /// Environment variable name containing the PostgreSQL connection URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database_url_env: Option<String>,

    /// Full PostgreSQL connection URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database_url: Option<String>,

    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_database")]
    pub database: String,

    #[serde(default = "default_username")]
    pub username: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    /// Environment variable containing the password.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password_env: Option<String>,

    /// SSL mode, only applied when the URL is built from individual fields.
    #[serde(default)]
    pub ssl_mode: SslMode,

    /// Connection pool configuration.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pool: Option<ConnectionPoolConfig>,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            database_url_env: None,
            database_url: None,
            host: default_host(),
            port: default_port(),
            database: default_database(),
            username: default_username(),
            password: None,
            password_env: None,
            ssl_mode: SslMode::default(),
            pool: None,
        }
    }
}

/// SSL mode for database connections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SslMode {
    Disable,
    Allow,
    #[default]
    Prefer,
    Require,
    #[serde(rename = "verify-ca")]
    VerifyCa,
    #[serde(rename = "verify-full")]
    VerifyFull,
}

impl SslMode {
    /// Value of the `sslmode` URL parameter.
    pub fn as_str(&self) -> &'static str {
        match self {
            SslMode::Disable => "disable",
            SslMode::Allow => "allow",
            SslMode::Prefer => "prefer",
            SslMode::Require => "require",
            SslMode::VerifyCa => "verify-ca",
            SslMode::VerifyFull => "verify-full",
        }
    }
}

/// Connection pool configuration.
///
/// The checkpoint session holds one pooled connection for as long as it is
/// active, so `max_connections` should leave room for auto-commit callers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionPoolConfig {
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Timeout in seconds when acquiring a connection.
    #[serde(default = "default_acquire_timeout")]
    pub acquire_timeout_seconds: u64,

    /// How long a connection can remain idle before being closed.
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_seconds: u64,
}

impl Default for ConnectionPoolConfig {
    fn default() -> Self {
        Self {
            min_connections: default_min_connections(),
            max_connections: default_max_connections(),
            acquire_timeout_seconds: default_acquire_timeout(),
            idle_timeout_seconds: default_idle_timeout(),
        }
    }
}

impl ConnectionPoolConfig {
    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_secs(self.acquire_timeout_seconds)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_seconds)
    }
}

fn default_min_connections() -> u32 {
    1
}

fn default_max_connections() -> u32 {
    10
}

fn default_acquire_timeout() -> u64 {
    30
}

fn default_idle_timeout() -> u64 {
    600
}

impl UpstreamConfig {
    /// Build a PostgreSQL connection string from this configuration.
    pub fn connection_string(&self) -> String {
        if let Some(env_var) = &self.database_url_env
            && let Ok(url) = std::env::var(env_var)
        {
            return url;
        }

        if let Some(url) = &self.database_url {
            return url.clone();
        }

        let auth = match self.get_password() {
            Some(password) => format!("{}:{}", self.username, password),
            None => self.username.clone(),
        };
        format!(
            "postgresql://{}@{}:{}/{}?sslmode={}",
            auth,
            self.host,
            self.port,
            self.database,
            self.ssl_mode.as_str()
        )
    }

    /// Pool settings, falling back to defaults when the section is absent.
    pub fn pool_config(&self) -> ConnectionPoolConfig {
        self.pool.clone().unwrap_or_default()
    }

    /// Host and database for log lines, never including credentials.
    pub fn display_target(&self) -> String {
        if self.database_url_env.is_some() || self.database_url.is_some() {
            return "<database url>".to_string();
        }
        format!("{}:{}/{}", self.host, self.port, self.database)
    }

    fn get_password(&self) -> Option<String> {
        if let Some(env_var) = &self.password_env
            && let Ok(password) = std::env::var(env_var)
        {
            return Some(password);
        }
        self.password.clone()
    }
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_port() -> u16 {
    5432
}

fn default_database() -> String {
    "postgres".to_string()
}

fn default_username() -> String {
    "postgres".to_string()
}
