//! # sqlgate-mcp
//!
//! MCP (Model Context Protocol) server that lets an AI agent run SQL against
//! PostgreSQL under a fixed role, with an optional checkpoint mode that turns
//! a long-running transaction into an undo history.
//!
//! ## Architecture
//!
//! ```text
//! AI Agent
//!       │
//!       │ MCP protocol (tools/call execute_query | checkpoint)
//!       ▼
//! ┌──────────────────────┐
//! │  sqlgate MCP server  │
//! │  1. Classify SQL     │  ← sqlgate-policy
//! │  2. Gate on role     │
//! │  3. Route:           │
//! │     session active → │  checkpoint connection + SAVEPOINT
//! │     otherwise      → │  pooled connection, BEGIN … COMMIT
//! │  4. Return JSON      │
//! └──────────┬───────────┘
//!            │
//!            ▼
//!     Upstream Postgres
//! ```
//!
//! ## Example Usage
//!
//! ```ignore
//! use sqlgate_core::GatewayConfig;
//! use sqlgate_mcp::{McpServer, PgConnectionPool, QueryExecutor};
//! use sqlgate_policy::{PermissionGate, PrivilegeTable};
//! use std::sync::Arc;
//!
//! let config = GatewayConfig::from_file("sqlgate.yaml")?;
//! let pool = Arc::new(PgConnectionPool::connect(&config.upstream).await?);
//! let gate = PermissionGate::new(config.role, &PrivilegeTable::from_config(&config.roles));
//!
//! let executor = Arc::new(QueryExecutor::new(gate, pool));
//! Arc::new(McpServer::new(config.mcp, executor)).run().await?;
//! ```

pub mod checkpoint;
pub mod db;
pub mod error;
pub mod executor;
pub mod http_transport;
pub mod protocol;
pub mod resources;
pub mod server;
pub mod tools;

// Re-export main types
pub use checkpoint::{Checkpoint, CheckpointAction, CheckpointResult, CheckpointSession};
pub use db::{ConnectionPool, DbConnection, DbError, PgConnectionPool, QueryOutput};
pub use error::{GatewayError, McpError};
pub use executor::{ExecutionResult, QueryExecutor, QueryResult, ResultBody};
pub use protocol::{
    CallToolParams, CallToolResponse, JsonRpcRequest, JsonRpcResponse, ToolAnnotations,
    ToolContent, ToolDefinition,
};
pub use resources::ResourceCatalog;
pub use server::McpServer;
pub use tools::ToolRegistry;
