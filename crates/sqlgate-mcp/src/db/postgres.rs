//! PostgreSQL implementation of the connection pool over `sqlx`.

use super::{ConnectionPool, DbConnection, DbError, QueryOutput};
use async_trait::async_trait;
use futures::TryStreamExt;
use serde_json::{Value, json};
use sqlgate_core::config::UpstreamConfig;
use sqlx::pool::PoolConnection;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{Column, Decode, Either, Executor, PgPool, Postgres, Row, ValueRef};

/// Connection pool backed by `sqlx::PgPool`.
#[derive(Clone)]
pub struct PgConnectionPool {
    pool: PgPool,
}

impl PgConnectionPool {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Build a pool from upstream configuration.
    pub async fn connect(upstream: &UpstreamConfig) -> Result<Self, sqlx::Error> {
        let settings = upstream.pool_config();
        let pool = PgPoolOptions::new()
            .min_connections(settings.min_connections)
            .max_connections(settings.max_connections)
            .acquire_timeout(settings.acquire_timeout())
            .idle_timeout(settings.idle_timeout())
            .connect(&upstream.connection_string())
            .await?;
        Ok(Self { pool })
    }

    pub fn inner(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl ConnectionPool for PgConnectionPool {
    async fn acquire(&self) -> Result<Box<dyn DbConnection>, DbError> {
        let conn = self.pool.acquire().await.map_err(db_error)?;
        Ok(Box::new(PgPooledConnection { conn: Some(conn) }))
    }
}

/// A checked-out connection; returns to the pool when dropped.
struct PgPooledConnection {
    conn: Option<PoolConnection<Postgres>>,
}

#[async_trait]
impl DbConnection for PgPooledConnection {
    async fn execute(&mut self, sql: &str) -> Result<QueryOutput, DbError> {
        let conn = self
            .conn
            .as_mut()
            .ok_or_else(|| DbError::Connection("connection already discarded".to_string()))?;

        // A bare &str runs through the simple query protocol, which is what
        // transaction-control statements and multi-statement text need.
        let mut stream = (&mut **conn).fetch_many(sql);
        let mut output = QueryOutput::default();
        while let Some(item) = stream.try_next().await.map_err(db_error)? {
            match item {
                Either::Left(done) => output.rows_affected += done.rows_affected(),
                Either::Right(row) => output.rows.push(row_to_json(&row)),
            }
        }
        Ok(output)
    }

    fn discard_on_release(&mut self) {
        if let Some(conn) = self.conn.take() {
            // Detached connections are not returned to the pool and close on drop.
            drop(conn.detach());
        }
    }
}

fn db_error(err: sqlx::Error) -> DbError {
    match err {
        sqlx::Error::Database(_)
        | sqlx::Error::ColumnDecode { .. }
        | sqlx::Error::ColumnNotFound(_)
        | sqlx::Error::ColumnIndexOutOfBounds { .. }
        | sqlx::Error::Decode(_)
        | sqlx::Error::TypeNotFound { .. }
        | sqlx::Error::RowNotFound => DbError::Statement(err.to_string()),
        other => DbError::Connection(other.to_string()),
    }
}

/// Convert a row to a JSON object.
///
/// Typed decoding covers the common scalar types; anything else falls back to
/// the value's text representation.
fn row_to_json(row: &PgRow) -> Value {
    let mut obj = serde_json::Map::new();

    for (idx, col) in row.columns().iter().enumerate() {
        let name = col.name();

        let value: Value = if let Ok(v) = row.try_get::<Option<i64>, _>(idx) {
            json!(v)
        } else if let Ok(v) = row.try_get::<Option<i32>, _>(idx) {
            json!(v)
        } else if let Ok(v) = row.try_get::<Option<i16>, _>(idx) {
            json!(v)
        } else if let Ok(v) = row.try_get::<Option<f64>, _>(idx) {
            json!(v)
        } else if let Ok(v) = row.try_get::<Option<f32>, _>(idx) {
            json!(v)
        } else if let Ok(v) = row.try_get::<Option<bool>, _>(idx) {
            json!(v)
        } else if let Ok(v) = row.try_get::<Option<String>, _>(idx) {
            json!(v)
        } else if let Ok(v) = row.try_get::<Option<Value>, _>(idx) {
            v.unwrap_or(Value::Null)
        } else if let Ok(v) = row.try_get::<Option<chrono::DateTime<chrono::Utc>>, _>(idx) {
            json!(v)
        } else if let Ok(v) = row.try_get::<Option<chrono::NaiveDateTime>, _>(idx) {
            json!(v)
        } else if let Ok(v) = row.try_get::<Option<chrono::NaiveDate>, _>(idx) {
            json!(v)
        } else {
            raw_text(row, idx)
        };

        obj.insert(name.to_string(), value);
    }

    Value::Object(obj)
}

/// Decode a column as text without a type check (numeric, uuid, arrays, ...).
fn raw_text(row: &PgRow, idx: usize) -> Value {
    match row.try_get_raw(idx) {
        Ok(raw) if raw.is_null() => Value::Null,
        Ok(raw) => match <String as Decode<'_, Postgres>>::decode(raw) {
            Ok(text) => Value::String(text),
            Err(_) => Value::Null,
        },
        Err(_) => Value::Null,
    }
}
