//! Query execution engine.
//!
//! Every statement is classified and gated first; a denied statement never
//! reaches the pool. Permitted statements run either on the active
//! checkpoint session's connection or, when no session is active, in a
//! short auto-commit transaction on a pooled connection.

use crate::checkpoint::{CheckpointAction, CheckpointResult, CheckpointSession};
use crate::db::{ConnectionPool, DbError, QueryOutput, ScopedTransaction};
use crate::error::GatewayError;
use crate::protocol::{CallToolResponse, ToolContent};
use serde::Serialize;
use serde_json::{Value, json};
use sqlgate_core::config::RoleName;
use sqlgate_policy::{Classification, PermissionGate, Privilege};
use std::sync::Arc;

/// Result of one executed statement.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryResult {
    /// Upper-cased leading keyword of the statement.
    pub command: String,
    #[serde(flatten)]
    pub body: ResultBody,
    /// Checkpoint created for this statement, if any.
    #[serde(rename = "checkpointId", skip_serializing_if = "Option::is_none")]
    pub checkpoint_id: Option<u64>,
}

/// Either the rows a statement produced or its affected-row count.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ResultBody {
    Rows { rows: Vec<Value> },
    Affected {
        #[serde(rename = "rowCount")]
        row_count: u64,
    },
}

impl QueryResult {
    fn from_output(
        classification: &Classification,
        output: QueryOutput,
        checkpoint_id: Option<u64>,
    ) -> Self {
        // Reads always report rows, even when there are none; writes only
        // when they returned some (e.g. RETURNING).
        let body = if !classification.is_write() || !output.rows.is_empty() {
            ResultBody::Rows { rows: output.rows }
        } else {
            ResultBody::Affected {
                row_count: output.rows_affected,
            }
        };
        Self {
            command: classification.command.clone(),
            body,
            checkpoint_id,
        }
    }

    /// Structured JSON form returned to the caller.
    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or_else(|_| json!({ "command": self.command }))
    }

    /// One-line human summary.
    pub fn summary(&self) -> String {
        let base = match &self.body {
            ResultBody::Rows { rows } => format!("{} returned {} row(s)", self.command, rows.len()),
            ResultBody::Affected { row_count } => {
                format!("{} affected {} row(s)", self.command, row_count)
            }
        };
        match self.checkpoint_id {
            Some(id) => format!("{}. Checkpoint {} created.", base, id),
            None => base,
        }
    }
}

/// Outcome of a tool call, ready to be wrapped in a `tools/call` response.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionResult {
    /// Whether the execution was successful.
    pub success: bool,
    /// The result content.
    pub content: Vec<ToolContent>,
    /// Error message if failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ExecutionResult {
    pub fn from_query(result: &QueryResult) -> Self {
        Self {
            success: true,
            content: vec![
                ToolContent::Text {
                    text: result.summary(),
                },
                ToolContent::Json {
                    json: result.to_json(),
                },
            ],
            error: None,
        }
    }

    pub fn from_checkpoint(result: &CheckpointResult) -> Self {
        Self {
            success: true,
            content: vec![
                ToolContent::Text {
                    text: result.message.clone(),
                },
                ToolContent::Json {
                    json: serde_json::to_value(result).unwrap_or_default(),
                },
            ],
            error: None,
        }
    }

    /// Error result carrying the message and its machine-readable code.
    pub fn from_error(err: &GatewayError) -> Self {
        let message = err.to_string();
        Self {
            success: false,
            content: vec![
                ToolContent::Text {
                    text: message.clone(),
                },
                ToolContent::Json {
                    json: json!({ "error": err.code(), "message": message }),
                },
            ],
            error: Some(message),
        }
    }

    pub fn into_response(self) -> CallToolResponse {
        CallToolResponse {
            content: self.content,
            is_error: Some(!self.success),
        }
    }
}

/// Runs gated statements and checkpoint actions.
pub struct QueryExecutor {
    gate: PermissionGate,
    pool: Arc<dyn ConnectionPool>,
    session: Arc<CheckpointSession>,
}

impl QueryExecutor {
    /// Create an executor with its own checkpoint session.
    pub fn new(gate: PermissionGate, pool: Arc<dyn ConnectionPool>) -> Self {
        let read_only = is_read_only(gate.role());
        let session = Arc::new(CheckpointSession::new(pool.clone(), read_only));
        Self::with_session(gate, pool, session)
    }

    /// Create an executor sharing an existing checkpoint session.
    pub fn with_session(
        gate: PermissionGate,
        pool: Arc<dyn ConnectionPool>,
        session: Arc<CheckpointSession>,
    ) -> Self {
        Self {
            gate,
            pool,
            session,
        }
    }

    pub fn role(&self) -> RoleName {
        self.gate.role()
    }

    pub fn granted(&self) -> &[Privilege] {
        self.gate.granted()
    }

    pub fn session(&self) -> &Arc<CheckpointSession> {
        &self.session
    }

    /// Classify, gate, and run one SQL statement.
    pub async fn execute(&self, sql: &str) -> Result<QueryResult, GatewayError> {
        let classification = self.gate.check(sql)?;
        tracing::debug!(command = %classification.command, sql, "Executing statement");

        if let Some(result) = self.session.execute_if_active(sql, &classification).await {
            let (output, checkpoint_id) = result?;
            return Ok(QueryResult::from_output(&classification, output, checkpoint_id));
        }

        let output = self.execute_autocommit(sql).await?;
        tracing::info!(
            role = %self.gate.role(),
            command = %classification.command,
            rows = output.rows.len(),
            rows_affected = output.rows_affected,
            "Statement executed"
        );
        Ok(QueryResult::from_output(&classification, output, None))
    }

    /// Run a `checkpoint` tool action.
    pub async fn checkpoint(
        &self,
        action: CheckpointAction,
        checkpoint_id: Option<u64>,
    ) -> Result<CheckpointResult, GatewayError> {
        self.session.handle(action, checkpoint_id).await
    }

    /// Run `sql` in its own transaction on a pooled connection.
    async fn execute_autocommit(&self, sql: &str) -> Result<QueryOutput, GatewayError> {
        let conn = self.pool.acquire().await?;
        let mut txn = ScopedTransaction::begin(conn, is_read_only(self.gate.role())).await?;

        match txn.execute(sql).await {
            Ok(output) => {
                txn.commit().await?;
                Ok(output)
            }
            Err(source) => {
                let rollback_error = txn.rollback().await.err();
                if let Some(err) = &rollback_error {
                    tracing::warn!(error = %err, "Rollback after failed statement also failed");
                }
                match source {
                    DbError::Connection(_) => Err(GatewayError::Connection(source)),
                    DbError::Statement(_) => Err(GatewayError::Statement {
                        source,
                        rollback_error,
                    }),
                }
            }
        }
    }
}

fn is_read_only(role: RoleName) -> bool {
    role == RoleName::Read
}
