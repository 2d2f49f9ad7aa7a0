//! # sqlgate-core
//!
//! Configuration types shared across the sqlgate crates.

// Configuration types shared across all sqlgate crates
pub mod config;

// Re-export commonly used config types for convenience
pub use config::{
    ConfigError, ConnectionPoolConfig, GatewayConfig, McpConfig, ResourcesConfig, RoleName,
    RolesConfig, SslMode, Transport, UpstreamConfig,
};
