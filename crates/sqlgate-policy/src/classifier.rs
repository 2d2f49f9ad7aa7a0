//! Leading-keyword SQL classification.
//!
//! Only the first token is inspected. `SELECT 1; DROP TABLE t` classifies as
//! `SELECT`; the read-only transaction the executor opens for the `read` role
//! is what stops the trailing statement, not this module.

use crate::privilege::Privilege;
use serde::Serialize;

/// Result of classifying one SQL statement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Classification {
    /// Upper-cased leading keyword as written (e.g. `WITH`).
    pub command: String,
    /// Privilege the statement requires (e.g. `SELECT` for `WITH`).
    pub privilege: Privilege,
}

impl Classification {
    pub fn is_write(&self) -> bool {
        self.privilege.is_write()
    }
}

/// Classify SQL text by its leading keyword.
///
/// Total and pure: every input yields a classification. Empty or
/// whitespace-only input yields an empty command, which no role grants.
pub fn classify(sql: &str) -> Classification {
    let command = leading_keyword(sql);
    let privilege = match command.as_str() {
        "SELECT" | "WITH" | "SHOW" | "EXPLAIN" => Privilege::Select,
        "RENAME" => Privilege::Alter,
        other => Privilege::from_token(other),
    };
    Classification { command, privilege }
}

fn leading_keyword(sql: &str) -> String {
    sql.trim()
        .split(|c: char| c.is_whitespace() || c == ';')
        .next()
        .unwrap_or_default()
        .to_uppercase()
}
