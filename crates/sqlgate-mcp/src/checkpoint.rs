//! Checkpoint session: multi-step undo over savepoints.
//!
//! While a session is active, every statement runs on one dedicated
//! connection inside a single open transaction. Each successful write gets a
//! savepoint named `checkpoint_<id>`, so the caller can roll back to any
//! earlier write, then commit or discard everything at once.
//!
//! ```text
//!            start                      commit / discard
//!   Idle ───────────────► Active ─────────────────────────► Idle
//!                          │  ▲
//!      write / rollback(k) └──┘
//! ```
//!
//! There is one session per process, shared by every caller. A second
//! `start` while active is a no-op that reports the existing session.
//! Rollback is destructive: checkpoints after the target are gone for good
//! and ids are never reused.

use crate::db::{ConnectionPool, DbConnection, QueryOutput, begin_statement};
use crate::error::GatewayError;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use sqlgate_policy::Classification;
use std::fmt;
use std::sync::Arc;
use tokio::sync::Mutex;

/// One write recorded inside the active session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Checkpoint {
    pub id: u64,
    pub query: String,
    pub timestamp: DateTime<Utc>,
}

impl fmt::Display for Checkpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}. {} ({})",
            self.id,
            self.query,
            self.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true)
        )
    }
}

/// Actions accepted by the `checkpoint` tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckpointAction {
    Start,
    List,
    Rollback,
    Commit,
    Discard,
}

/// Outcome of a checkpoint action, rendered as text for the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckpointResult {
    pub action: CheckpointAction,
    /// Whether a session is active after the action.
    pub active: bool,
    pub message: String,
    /// History after the action (empty when idle).
    pub checkpoints: Vec<Checkpoint>,
}

struct ActiveSession {
    conn: Box<dyn DbConnection>,
    /// Last assigned checkpoint id. Never decreases.
    counter: u64,
    history: Vec<Checkpoint>,
}

enum SessionState {
    Idle,
    Active(ActiveSession),
}

/// The process-wide checkpoint session.
pub struct CheckpointSession {
    pool: Arc<dyn ConnectionPool>,
    read_only: bool,
    state: Mutex<SessionState>,
}

impl CheckpointSession {
    /// Create an idle session.
    ///
    /// `read_only` makes the session transaction read-only, matching the
    /// auto-commit behaviour for the `read` role.
    pub fn new(pool: Arc<dyn ConnectionPool>, read_only: bool) -> Self {
        Self {
            pool,
            read_only,
            state: Mutex::new(SessionState::Idle),
        }
    }

    pub async fn is_active(&self) -> bool {
        matches!(*self.state.lock().await, SessionState::Active(_))
    }

    /// Dispatch a `checkpoint` tool call.
    pub async fn handle(
        &self,
        action: CheckpointAction,
        checkpoint_id: Option<u64>,
    ) -> Result<CheckpointResult, GatewayError> {
        match action {
            CheckpointAction::Start => self.start().await,
            CheckpointAction::List => Ok(self.list().await),
            CheckpointAction::Rollback => {
                let id = checkpoint_id.ok_or_else(|| {
                    GatewayError::InvalidArguments(
                        "checkpointId is required for action 'rollback'".to_string(),
                    )
                })?;
                self.rollback(id).await
            }
            CheckpointAction::Commit => self.commit().await,
            CheckpointAction::Discard => self.discard().await,
        }
    }

    /// Open a session. Idempotent while active.
    pub async fn start(&self) -> Result<CheckpointResult, GatewayError> {
        let mut state = self.state.lock().await;
        if let SessionState::Active(session) = &*state {
            return Ok(CheckpointResult {
                action: CheckpointAction::Start,
                active: true,
                message: format!(
                    "Checkpoint mode is already active with {} checkpoint(s). Use 'list' to view them.",
                    session.history.len()
                ),
                checkpoints: session.history.clone(),
            });
        }

        let mut conn = self.pool.acquire().await?;
        if let Err(err) = conn.execute(begin_statement(self.read_only)).await {
            conn.discard_on_release();
            return Err(err.into());
        }

        *state = SessionState::Active(ActiveSession {
            conn,
            counter: 0,
            history: Vec::new(),
        });
        tracing::info!(read_only = self.read_only, "Checkpoint session started");

        Ok(CheckpointResult {
            action: CheckpointAction::Start,
            active: true,
            message: "Checkpoint mode started. Each successful write now creates a checkpoint. \
                      Use 'rollback' with a checkpointId to undo later writes (this cannot be redone), \
                      'commit' to make all changes permanent, or 'discard' to abandon them."
                .to_string(),
            checkpoints: Vec::new(),
        })
    }

    /// Snapshot of the session history.
    pub async fn list(&self) -> CheckpointResult {
        let state = self.state.lock().await;
        match &*state {
            SessionState::Idle => CheckpointResult {
                action: CheckpointAction::List,
                active: false,
                message: "No active checkpoint session.".to_string(),
                checkpoints: Vec::new(),
            },
            SessionState::Active(session) => CheckpointResult {
                action: CheckpointAction::List,
                active: true,
                message: format_history(&session.history),
                checkpoints: session.history.clone(),
            },
        }
    }

    /// Undo every write after checkpoint `id`.
    pub async fn rollback(&self, id: u64) -> Result<CheckpointResult, GatewayError> {
        let mut state = self.state.lock().await;
        let SessionState::Active(session) = &mut *state else {
            return Err(GatewayError::NoActiveSession);
        };

        if !session.history.iter().any(|c| c.id == id) {
            return Err(GatewayError::CheckpointNotFound {
                id,
                available: session.history.iter().map(|c| c.id).collect(),
            });
        }

        session
            .conn
            .execute(&format!("ROLLBACK TO SAVEPOINT {}", savepoint_name(id)))
            .await?;

        let before = session.history.len();
        session.history.retain(|c| c.id <= id);
        let discarded = before - session.history.len();
        tracing::info!(checkpoint_id = id, discarded, "Rolled back to checkpoint");

        Ok(CheckpointResult {
            action: CheckpointAction::Rollback,
            active: true,
            message: format!(
                "Rolled back to checkpoint {}. {} later checkpoint(s) were discarded and cannot be restored.\n{}",
                id,
                discarded,
                format_history(&session.history)
            ),
            checkpoints: session.history.clone(),
        })
    }

    /// Make every change in the session permanent and end it.
    pub async fn commit(&self) -> Result<CheckpointResult, GatewayError> {
        let count = self.finish("COMMIT").await?;
        Ok(CheckpointResult {
            action: CheckpointAction::Commit,
            active: false,
            message: format!(
                "Committed {} checkpoint(s). Changes are now permanent and checkpoint mode has ended.",
                count
            ),
            checkpoints: Vec::new(),
        })
    }

    /// Abandon every change in the session and end it.
    pub async fn discard(&self) -> Result<CheckpointResult, GatewayError> {
        let count = self.close().await?;
        Ok(CheckpointResult {
            action: CheckpointAction::Discard,
            active: false,
            message: format!(
                "Discarded {} checkpoint(s). All changes were rolled back and checkpoint mode has ended.",
                count
            ),
            checkpoints: Vec::new(),
        })
    }

    /// Roll back and end the session, returning how many checkpoints were
    /// discarded.
    pub(crate) async fn close(&self) -> Result<usize, GatewayError> {
        self.finish("ROLLBACK").await
    }

    /// Run `sql` on the session connection if a session is active.
    ///
    /// Returns `None` when idle so the caller can fall back to a pooled
    /// connection. A failed statement leaves the transaction as the database
    /// left it; the session stays active.
    pub(crate) async fn execute_if_active(
        &self,
        sql: &str,
        classification: &Classification,
    ) -> Option<Result<(QueryOutput, Option<u64>), GatewayError>> {
        let mut state = self.state.lock().await;
        let SessionState::Active(session) = &mut *state else {
            return None;
        };
        Some(session.run(sql, classification).await)
    }

    /// End the session with `statement` (COMMIT or ROLLBACK).
    ///
    /// The session is idle afterwards even if the statement fails, since the
    /// database ends the transaction either way.
    async fn finish(&self, statement: &str) -> Result<usize, GatewayError> {
        let mut state = self.state.lock().await;
        let SessionState::Active(mut session) = std::mem::replace(&mut *state, SessionState::Idle)
        else {
            return Err(GatewayError::NoActiveSession);
        };

        let count = session.history.len();
        match session.conn.execute(statement).await {
            Ok(_) => {
                tracing::info!(statement, checkpoints = count, "Checkpoint session ended");
                Ok(count)
            }
            Err(err) => {
                tracing::warn!(statement, error = %err, "Failed to end checkpoint session");
                session.conn.discard_on_release();
                Err(GatewayError::statement(err))
            }
        }
    }
}

impl ActiveSession {
    async fn run(
        &mut self,
        sql: &str,
        classification: &Classification,
    ) -> Result<(QueryOutput, Option<u64>), GatewayError> {
        let output = self.conn.execute(sql).await.map_err(|err| {
            tracing::warn!(error = %err, "Statement failed inside checkpoint session");
            GatewayError::from(err)
        })?;

        if !classification.is_write() {
            return Ok((output, None));
        }

        let id = self.counter + 1;
        if let Err(source) = self
            .conn
            .execute(&format!("SAVEPOINT {}", savepoint_name(id)))
            .await
        {
            tracing::warn!(checkpoint_id = id, error = %source, "Statement ran but savepoint failed");
            return Err(GatewayError::CheckpointNotCreated { id, source });
        }
        self.counter = id;
        self.history.push(Checkpoint {
            id,
            query: sql.to_string(),
            timestamp: Utc::now(),
        });
        tracing::info!(checkpoint_id = id, command = %classification.command, "Checkpoint created");

        Ok((output, Some(id)))
    }
}

fn savepoint_name(id: u64) -> String {
    format!("checkpoint_{}", id)
}

fn format_history(history: &[Checkpoint]) -> String {
    if history.is_empty() {
        return "Checkpoint mode is active. No checkpoints yet.".to_string();
    }
    let mut out = String::from("Checkpoints:");
    for checkpoint in history {
        out.push('\n');
        out.push_str(&checkpoint.to_string());
    }
    out
}
