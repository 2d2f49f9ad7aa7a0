//! Permission gate.

use crate::classifier::{Classification, classify};
use crate::error::PermissionDenied;
use crate::privilege::{Privilege, PrivilegeTable};
use sqlgate_core::config::RoleName;

/// Checks statements against the grants of one role.
///
/// The gate trusts the classifier's single-token view and nothing deeper:
/// absence of the required privilege from the grants is the only reason to
/// deny.
#[derive(Debug, Clone)]
pub struct PermissionGate {
    role: RoleName,
    granted: Vec<Privilege>,
}

impl PermissionGate {
    /// Create a gate for `role` using the grants in `table`.
    pub fn new(role: RoleName, table: &PrivilegeTable) -> Self {
        Self {
            role,
            granted: table.grants(role).to_vec(),
        }
    }

    pub fn role(&self) -> RoleName {
        self.role
    }

    pub fn granted(&self) -> &[Privilege] {
        &self.granted
    }

    /// Classify `sql` and check it against the role's grants.
    pub fn check(&self, sql: &str) -> Result<Classification, PermissionDenied> {
        let classification = classify(sql);
        if self.granted.contains(&classification.privilege) {
            tracing::debug!(
                role = %self.role,
                command = %classification.command,
                "Statement permitted"
            );
            return Ok(classification);
        }

        tracing::warn!(
            role = %self.role,
            command = %classification.command,
            required = %classification.privilege,
            "Statement denied"
        );
        Err(PermissionDenied {
            role: self.role,
            command: classification.command,
            required: classification.privilege,
            granted: self.granted.clone(),
        })
    }
}
