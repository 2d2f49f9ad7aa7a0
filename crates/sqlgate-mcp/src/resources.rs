//! Table schema resources.
//!
//! Exposes one `postgres://<table>/schema` resource per base table in the
//! configured schema. Reads run in their own read-only transaction on a
//! pooled connection and never touch the checkpoint session.

use crate::db::{ConnectionPool, QueryOutput, ScopedTransaction, quote_literal};
use crate::error::GatewayError;
use crate::protocol::{ResourceContents, ResourceDescriptor};
use serde_json::Value;
use std::sync::Arc;

const URI_SCHEME: &str = "postgres://";
const URI_SUFFIX: &str = "/schema";
const MIME_TYPE: &str = "application/json";

/// Lists tables and describes their columns.
pub struct ResourceCatalog {
    pool: Arc<dyn ConnectionPool>,
    schema: String,
}

impl ResourceCatalog {
    pub fn new(pool: Arc<dyn ConnectionPool>, schema: impl Into<String>) -> Self {
        Self {
            pool,
            schema: schema.into(),
        }
    }

    /// One resource per base table, in table name order.
    pub async fn list(&self) -> Result<Vec<ResourceDescriptor>, GatewayError> {
        let sql = format!(
            "SELECT table_name::text AS table_name FROM information_schema.tables \
             WHERE table_schema = {} AND table_type = 'BASE TABLE' ORDER BY table_name",
            quote_literal(&self.schema)
        );
        let output = self.query(&sql).await?;

        Ok(output
            .rows
            .iter()
            .filter_map(|row| row.get("table_name").and_then(Value::as_str))
            .map(|table| ResourceDescriptor {
                uri: table_uri(table),
                name: format!("\"{}\" database schema", table),
                description: Some(format!("Columns of {}.{}", self.schema, table)),
                mime_type: MIME_TYPE.to_string(),
            })
            .collect())
    }

    /// Column list for the table named by `uri`.
    pub async fn read(&self, uri: &str) -> Result<ResourceContents, GatewayError> {
        let table = parse_table_uri(uri)
            .ok_or_else(|| GatewayError::InvalidArguments(format!("unknown resource: {}", uri)))?;

        let sql = format!(
            "SELECT column_name::text AS column_name, data_type::text AS data_type, \
             is_nullable::text AS is_nullable FROM information_schema.columns \
             WHERE table_schema = {} AND table_name = {} ORDER BY ordinal_position",
            quote_literal(&self.schema),
            quote_literal(table)
        );
        let output = self.query(&sql).await?;
        if output.rows.is_empty() {
            return Err(GatewayError::InvalidArguments(format!(
                "unknown table: {}",
                table
            )));
        }

        let text = serde_json::to_string_pretty(&output.rows)
            .map_err(|e| GatewayError::InvalidArguments(e.to_string()))?;
        Ok(ResourceContents {
            uri: uri.to_string(),
            mime_type: MIME_TYPE.to_string(),
            text,
        })
    }

    async fn query(&self, sql: &str) -> Result<QueryOutput, GatewayError> {
        let conn = self.pool.acquire().await?;
        let mut txn = ScopedTransaction::begin(conn, true).await?;
        let output = txn.execute(sql).await;
        // Nothing to keep from a read-only transaction.
        let rollback = txn.rollback().await;
        let output = output?;
        rollback?;
        Ok(output)
    }
}

fn table_uri(table: &str) -> String {
    format!("{}{}{}", URI_SCHEME, table, URI_SUFFIX)
}

fn parse_table_uri(uri: &str) -> Option<&str> {
    let table = uri.strip_prefix(URI_SCHEME)?.strip_suffix(URI_SUFFIX)?;
    if table.is_empty() || table.contains('/') {
        return None;
    }
    Some(table)
}
