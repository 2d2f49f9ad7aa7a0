//! Database collaborator interface.
//!
//! The gateway only needs two things from the database layer: a pool that
//! hands out connections, and connections that run raw SQL text. Transaction
//! control (`BEGIN`, `SAVEPOINT`, ...) goes through the same `execute` call.
//!
//! Connections are released by dropping them. A connection that still has an
//! unfinished transaction when it is dropped must be closed instead of being
//! returned to the pool; `ScopedTransaction` takes care of flagging that.

pub mod postgres;

#[cfg(test)]
pub(crate) mod mock;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

pub use postgres::PgConnectionPool;

/// Output of one executed statement.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryOutput {
    /// Returned rows as JSON objects keyed by column name.
    pub rows: Vec<Value>,
    /// Rows affected as reported by the database (0 when not reported).
    pub rows_affected: u64,
}

/// Errors from the database layer.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DbError {
    /// Pool exhaustion, network failure, or a closed connection.
    #[error("database connection failed: {0}")]
    Connection(String),

    /// The database rejected the statement. Message is passed through verbatim.
    #[error("{0}")]
    Statement(String),
}

/// A single database connection checked out of a pool.
#[async_trait]
pub trait DbConnection: Send {
    /// Run raw SQL text and collect its rows and affected-row count.
    async fn execute(&mut self, sql: &str) -> Result<QueryOutput, DbError>;

    /// Close the connection on drop instead of returning it to the pool.
    fn discard_on_release(&mut self);
}

/// Source of database connections.
#[async_trait]
pub trait ConnectionPool: Send + Sync {
    /// Check out a connection, waiting until one is available.
    async fn acquire(&self) -> Result<Box<dyn DbConnection>, DbError>;
}

/// A pooled connection inside a transaction, released on every exit path.
///
/// Dropping it without `commit` or `rollback` (early return, panic, or a
/// cancelled future) discards the connection so the half-finished transaction
/// never goes back into the pool.
pub(crate) struct ScopedTransaction {
    conn: Box<dyn DbConnection>,
    open: bool,
}

impl ScopedTransaction {
    /// Begin a transaction on `conn`.
    pub(crate) async fn begin(
        conn: Box<dyn DbConnection>,
        read_only: bool,
    ) -> Result<Self, DbError> {
        let mut txn = Self { conn, open: true };
        txn.conn.execute(begin_statement(read_only)).await?;
        Ok(txn)
    }

    pub(crate) async fn execute(&mut self, sql: &str) -> Result<QueryOutput, DbError> {
        self.conn.execute(sql).await
    }

    pub(crate) async fn commit(mut self) -> Result<(), DbError> {
        self.conn.execute("COMMIT").await?;
        self.open = false;
        Ok(())
    }

    pub(crate) async fn rollback(mut self) -> Result<(), DbError> {
        self.conn.execute("ROLLBACK").await?;
        self.open = false;
        Ok(())
    }
}

impl Drop for ScopedTransaction {
    fn drop(&mut self) {
        if self.open {
            tracing::warn!("Transaction dropped while open, closing its connection");
            self.conn.discard_on_release();
        }
    }
}

/// Statement that opens a transaction, read-only when requested.
pub(crate) fn begin_statement(read_only: bool) -> &'static str {
    if read_only {
        "BEGIN TRANSACTION READ ONLY"
    } else {
        "BEGIN"
    }
}

/// Quote a string as a SQL literal.
pub(crate) fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}
