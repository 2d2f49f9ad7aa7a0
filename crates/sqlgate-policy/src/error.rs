//! Permission denial error.

use crate::privilege::Privilege;
use serde::Serialize;
use sqlgate_core::config::RoleName;
use thiserror::Error;

/// A statement's required privilege is not granted to the active role.
///
/// Raised before any database work happens.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[error(
    "Permission denied: role '{role}' cannot execute {command} statements (requires {required} privilege; granted: {})",
    join_grants(.granted)
)]
pub struct PermissionDenied {
    pub role: RoleName,
    /// Leading keyword of the rejected statement.
    pub command: String,
    pub required: Privilege,
    pub granted: Vec<Privilege>,
}

fn join_grants(granted: &[Privilege]) -> String {
    if granted.is_empty() {
        return "none".to_string();
    }
    granted
        .iter()
        .map(Privilege::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}
