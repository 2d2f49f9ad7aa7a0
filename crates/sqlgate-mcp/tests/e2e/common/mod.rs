//! Shared test infrastructure for sqlgate end-to-end tests.
//!
//! This module provides:
//! - Docker container management for PostgreSQL
//! - Executor construction per role
//! - Helper functions for test assertions

use serde_json::Value;
use sqlgate_core::config::RoleName;
use sqlgate_mcp::{GatewayError, PgConnectionPool, QueryExecutor, QueryResult, ResultBody};
use sqlgate_policy::{PermissionGate, PrivilegeTable};
use sqlx::PgPool;
use std::process::Command;
use std::sync::Arc;
use std::time::Duration;

// =============================================================================
// DOCKER CONTAINER CONFIGURATION
// =============================================================================

pub const CONTAINER_NAME: &str = "sqlgate_test_postgres";
pub const POSTGRES_PORT: u16 = 5433;
pub const POSTGRES_PASSWORD: &str = "sqlgate_test_password";
pub const DATABASE_NAME: &str = "sqlgate_test";

pub fn database_url() -> String {
    format!(
        "postgres://postgres:{}@localhost:{}/{}",
        POSTGRES_PASSWORD, POSTGRES_PORT, DATABASE_NAME
    )
}

// =============================================================================
// DOCKER CONTAINER MANAGEMENT
// =============================================================================

/// Start a PostgreSQL container for testing
pub fn start_postgres_container() -> Result<(), String> {
    let output = Command::new("docker")
        .args(["ps", "-a", "-q", "-f", &format!("name={}", CONTAINER_NAME)])
        .output()
        .map_err(|e| format!("Failed to check existing container: {}", e))?;

    if !String::from_utf8_lossy(&output.stdout).trim().is_empty() {
        stop_postgres_container();
    }

    let status = Command::new("docker")
        .args([
            "run",
            "-d",
            "--name",
            CONTAINER_NAME,
            "-e",
            &format!("POSTGRES_PASSWORD={}", POSTGRES_PASSWORD),
            "-e",
            &format!("POSTGRES_DB={}", DATABASE_NAME),
            "-p",
            &format!("{}:5432", POSTGRES_PORT),
            "postgres:16-alpine",
        ])
        .status()
        .map_err(|e| format!("Failed to start container: {}", e))?;

    if !status.success() {
        return Err("Failed to start PostgreSQL container".to_string());
    }

    Ok(())
}

/// Stop and remove the PostgreSQL container
pub fn stop_postgres_container() {
    let _ = Command::new("docker")
        .args(["rm", "-f", CONTAINER_NAME])
        .output();
}

/// Wait for PostgreSQL to be ready
pub async fn wait_for_postgres() -> Result<PgPool, String> {
    for attempt in 1..=30 {
        match PgPool::connect(&database_url()).await {
            Ok(pool) => {
                if sqlx::query("SELECT 1").fetch_one(&pool).await.is_ok() {
                    println!("✅ PostgreSQL ready after {} attempts", attempt);
                    return Ok(pool);
                }
            }
            Err(_) => {
                if attempt % 5 == 0 {
                    println!("⏳ Waiting for PostgreSQL... (attempt {})", attempt);
                }
            }
        }
        tokio::time::sleep(Duration::from_millis(500)).await;
    }
    Err("PostgreSQL did not become ready in time".to_string())
}

// =============================================================================
// TEST CONTEXT
// =============================================================================

pub struct TestContext {
    pub pool: PgPool,
}

impl TestContext {
    pub async fn setup() -> Result<Self, String> {
        start_postgres_container()?;
        let pool = wait_for_postgres().await?;
        Ok(Self { pool })
    }

    /// Executor for `role` with its own checkpoint session.
    pub fn executor(&self, role: RoleName) -> QueryExecutor {
        let gate = PermissionGate::new(role, &PrivilegeTable::default());
        QueryExecutor::new(gate, self.gateway_pool())
    }

    pub fn gateway_pool(&self) -> Arc<PgConnectionPool> {
        Arc::new(PgConnectionPool::new(self.pool.clone()))
    }

    /// Drop and recreate `table` as `(id int primary key, name text not null)`.
    pub async fn reset_table(&self, table: &str) {
        sqlx::raw_sql(&format!(
            "DROP TABLE IF EXISTS {table}; \
             CREATE TABLE {table} (id int PRIMARY KEY, name text NOT NULL)"
        ))
        .execute(&self.pool)
        .await
        .expect("reset table");
    }

    /// Names in `table` ordered by id, read outside the gateway.
    pub async fn names(&self, table: &str) -> Vec<String> {
        sqlx::query_scalar(&format!("SELECT name FROM {table} ORDER BY id"))
            .fetch_all(&self.pool)
            .await
            .expect("read names")
    }

    pub async fn table_exists(&self, table: &str) -> bool {
        sqlx::query_scalar::<_, bool>("SELECT to_regclass($1) IS NOT NULL")
            .bind(table)
            .fetch_one(&self.pool)
            .await
            .expect("check table")
    }
}

impl Drop for TestContext {
    fn drop(&mut self) {
        stop_postgres_container();
        println!("🧹 Cleaned up PostgreSQL container");
    }
}

// =============================================================================
// RESULT HELPERS
// =============================================================================

/// Rows of a successful result; panics on an affected-count result.
pub fn rows(result: &QueryResult) -> &[Value] {
    match &result.body {
        ResultBody::Rows { rows } => rows,
        other => panic!("expected rows, got {:?}", other),
    }
}

/// Affected-row count of a successful result; panics on a rows result.
pub fn row_count(result: &QueryResult) -> u64 {
    match &result.body {
        ResultBody::Affected { row_count } => *row_count,
        other => panic!("expected row count, got {:?}", other),
    }
}

/// Assert that an error carries the expected code.
pub fn assert_code(result: Result<impl std::fmt::Debug, GatewayError>, code: &str, msg: &str) {
    match result {
        Ok(value) => panic!("{}: expected {} error, got {:?}", msg, code, value),
        Err(err) => assert_eq!(err.code(), code, "{}: {}", msg, err),
    }
}
