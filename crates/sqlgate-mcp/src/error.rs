//! Error types for the MCP crate.

use crate::db::DbError;
use sqlgate_policy::PermissionDenied;
use thiserror::Error;

/// Errors surfaced to the caller of a gateway operation.
///
/// Each variant maps to a distinct structured tool error, so callers can tell
/// a denied statement from a failed one.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The role does not grant the statement's privilege. The database was
    /// not contacted.
    #[error(transparent)]
    PermissionDenied(#[from] PermissionDenied),

    /// A checkpoint action that needs a session was issued while idle.
    #[error("No active checkpoint session. Use action 'start' to begin one.")]
    NoActiveSession,

    /// Rollback target is not in the session history.
    #[error("Checkpoint {id} not found. Available checkpoints: {}", format_ids(.available))]
    CheckpointNotFound { id: u64, available: Vec<u64> },

    /// The database rejected the statement.
    ///
    /// `rollback_error` is set when the follow-up rollback in auto-commit mode
    /// failed as well; it never replaces `source`.
    #[error("{source}{}", rollback_suffix(.rollback_error))]
    Statement {
        source: DbError,
        rollback_error: Option<DbError>,
    },

    /// The statement ran inside the session but its savepoint could not be
    /// created. The change is part of the session transaction with no
    /// checkpoint of its own.
    #[error(
        "Statement executed but checkpoint {id} was not created: {source}. The change is still part of the checkpoint session; roll back to an earlier checkpoint or discard to undo it."
    )]
    CheckpointNotCreated { id: u64, source: DbError },

    /// The pool or connection failed before the statement ran.
    #[error("{0}")]
    Connection(DbError),

    /// Tool arguments were missing or malformed.
    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),
}

impl GatewayError {
    /// Stable machine-readable code for the error class.
    pub fn code(&self) -> &'static str {
        match self {
            GatewayError::PermissionDenied(_) => "permission_denied",
            GatewayError::NoActiveSession => "no_active_session",
            GatewayError::CheckpointNotFound { .. } => "checkpoint_not_found",
            GatewayError::Statement { .. } => "statement_failed",
            GatewayError::CheckpointNotCreated { .. } => "checkpoint_not_created",
            GatewayError::Connection(_) => "connection_failed",
            GatewayError::InvalidArguments(_) => "invalid_arguments",
        }
    }

    pub(crate) fn statement(source: DbError) -> Self {
        GatewayError::Statement {
            source,
            rollback_error: None,
        }
    }
}

impl From<DbError> for GatewayError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::Connection(_) => GatewayError::Connection(err),
            DbError::Statement(_) => GatewayError::statement(err),
        }
    }
}

fn format_ids(ids: &[u64]) -> String {
    if ids.is_empty() {
        return "none".to_string();
    }
    ids.iter()
        .map(u64::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

fn rollback_suffix(rollback_error: &Option<DbError>) -> String {
    match rollback_error {
        Some(err) => format!(" (warning: rollback after failure also failed: {})", err),
        None => String::new(),
    }
}

/// Errors that can occur running the MCP server itself.
#[derive(Debug, Error)]
pub enum McpError {
    /// Failed to start the server.
    #[error("failed to start MCP server: {0}")]
    StartupFailed(String),

    /// Transport error.
    #[error("transport error: {0}")]
    TransportError(String),

    /// IO error.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Internal error.
    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}
