//! In-memory connection pool for tests.
//!
//! Records every statement, counts acquire/release/discard, and can be told
//! to fail or hang on statements containing a pattern (case-insensitive).

use super::{ConnectionPool, DbConnection, DbError, QueryOutput};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct MockState {
    acquired: usize,
    released: usize,
    discarded: usize,
    statements: Vec<String>,
    failures: Vec<(String, DbError)>,
    responses: Vec<(String, Vec<Value>)>,
    hangs: Vec<String>,
    fail_acquire: Option<String>,
}

#[derive(Clone, Default)]
pub(crate) struct MockPool {
    state: Arc<Mutex<MockState>>,
}

impl MockPool {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Fail statements containing `pattern` with a statement error.
    pub(crate) fn fail_on(&self, pattern: &str, message: &str) {
        self.lock().failures.push((
            pattern.to_string(),
            DbError::Statement(message.to_string()),
        ));
    }

    /// Fail statements containing `pattern` with a connection error.
    pub(crate) fn drop_connection_on(&self, pattern: &str) {
        self.lock().failures.push((
            pattern.to_string(),
            DbError::Connection("server closed the connection unexpectedly".to_string()),
        ));
    }

    pub(crate) fn clear_failures(&self) {
        self.lock().failures.clear();
    }

    /// Return `rows` for statements containing `pattern`.
    pub(crate) fn respond_with(&self, pattern: &str, rows: Vec<Value>) {
        self.lock().responses.push((pattern.to_string(), rows));
    }

    /// Never complete statements containing `pattern`.
    pub(crate) fn hang_on(&self, pattern: &str) {
        self.lock().hangs.push(pattern.to_string());
    }

    pub(crate) fn fail_acquire(&self, message: &str) {
        self.lock().fail_acquire = Some(message.to_string());
    }

    pub(crate) fn acquired(&self) -> usize {
        self.lock().acquired
    }

    pub(crate) fn released(&self) -> usize {
        self.lock().released
    }

    pub(crate) fn discarded(&self) -> usize {
        self.lock().discarded
    }

    /// Connections currently checked out.
    pub(crate) fn in_use(&self) -> usize {
        let state = self.lock();
        state.acquired - state.released
    }

    pub(crate) fn statements(&self) -> Vec<String> {
        self.lock().statements.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MockState> {
        self.state.lock().unwrap()
    }
}

#[async_trait]
impl ConnectionPool for MockPool {
    async fn acquire(&self) -> Result<Box<dyn DbConnection>, DbError> {
        let mut state = self.lock();
        if let Some(message) = &state.fail_acquire {
            return Err(DbError::Connection(message.clone()));
        }
        state.acquired += 1;
        Ok(Box::new(MockConnection {
            state: self.state.clone(),
            discard: false,
        }))
    }
}

struct MockConnection {
    state: Arc<Mutex<MockState>>,
    discard: bool,
}

fn matches(sql: &str, pattern: &str) -> bool {
    sql.to_uppercase().contains(&pattern.to_uppercase())
}

#[async_trait]
impl DbConnection for MockConnection {
    async fn execute(&mut self, sql: &str) -> Result<QueryOutput, DbError> {
        let hang = {
            let mut state = self.state.lock().unwrap();
            state.statements.push(sql.to_string());
            if let Some((_, err)) = state.failures.iter().find(|(p, _)| matches(sql, p)) {
                return Err(err.clone());
            }
            state.hangs.iter().any(|p| matches(sql, p))
        };
        if hang {
            std::future::pending::<()>().await;
        }

        let state = self.state.lock().unwrap();
        if let Some((_, rows)) = state.responses.iter().find(|(p, _)| matches(sql, p)) {
            return Ok(QueryOutput {
                rows: rows.clone(),
                rows_affected: rows.len() as u64,
            });
        }
        let keyword = sql.split_whitespace().next().unwrap_or_default().to_uppercase();
        let rows_affected = match keyword.as_str() {
            "INSERT" | "UPDATE" | "DELETE" => 1,
            _ => 0,
        };
        Ok(QueryOutput {
            rows: Vec::new(),
            rows_affected,
        })
    }

    fn discard_on_release(&mut self) {
        self.discard = true;
    }
}

impl Drop for MockConnection {
    fn drop(&mut self) {
        let mut state = self.state.lock().unwrap();
        state.released += 1;
        if self.discard {
            state.discarded += 1;
        }
    }
}
