//! Privilege tokens and the role → grants table.

use sqlgate_core::config::{RoleName, RolesConfig};
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;

/// A privilege required to run a class of SQL statement.
///
/// Leading keywords without a known mapping become `Other` with the literal
/// keyword as the privilege name, so they only pass the gate if a role grants
/// that exact name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Privilege {
    Select,
    Insert,
    Update,
    Delete,
    Create,
    Alter,
    Drop,
    Truncate,
    Other(String),
}

impl Privilege {
    /// Build a privilege from an upper-cased token.
    pub fn from_token(token: &str) -> Self {
        match token {
            "SELECT" => Privilege::Select,
            "INSERT" => Privilege::Insert,
            "UPDATE" => Privilege::Update,
            "DELETE" => Privilege::Delete,
            "CREATE" => Privilege::Create,
            "ALTER" => Privilege::Alter,
            "DROP" => Privilege::Drop,
            "TRUNCATE" => Privilege::Truncate,
            other => Privilege::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Privilege::Select => "SELECT",
            Privilege::Insert => "INSERT",
            Privilege::Update => "UPDATE",
            Privilege::Delete => "DELETE",
            Privilege::Create => "CREATE",
            Privilege::Alter => "ALTER",
            Privilege::Drop => "DROP",
            Privilege::Truncate => "TRUNCATE",
            Privilege::Other(name) => name,
        }
    }

    /// Whether statements needing this privilege change the database.
    ///
    /// Everything except `SELECT` counts; inside a checkpoint session these
    /// are the statements that get a savepoint.
    pub fn is_write(&self) -> bool {
        !matches!(self, Privilege::Select)
    }
}

impl fmt::Display for Privilege {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Privilege {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Static mapping from role to its ordered grants.
///
/// Built once at startup and never mutated afterwards.
#[derive(Debug, Clone)]
pub struct PrivilegeTable {
    grants: BTreeMap<RoleName, Vec<Privilege>>,
}

impl Default for PrivilegeTable {
    fn default() -> Self {
        Self::from_config(&RolesConfig::default())
    }
}

impl PrivilegeTable {
    /// Build the table from role configuration.
    ///
    /// The configuration is expected to have passed `RolesConfig::validate`.
    pub fn from_config(config: &RolesConfig) -> Self {
        let grants = config
            .resolve()
            .into_iter()
            .map(|(role, names)| {
                let mut privileges: Vec<Privilege> = Vec::with_capacity(names.len());
                for name in names {
                    let privilege = Privilege::from_token(&name);
                    if !privileges.contains(&privilege) {
                        privileges.push(privilege);
                    }
                }
                (role, privileges)
            })
            .collect();
        Self { grants }
    }

    /// Grants for a role, in configured order.
    pub fn grants(&self, role: RoleName) -> &[Privilege] {
        self.grants.get(&role).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Check whether a role holds a privilege.
    pub fn allows(&self, role: RoleName, privilege: &Privilege) -> bool {
        self.grants(role).contains(privilege)
    }

    /// Iterate roles with their grants, least privileged first.
    pub fn iter(&self) -> impl Iterator<Item = (RoleName, &[Privilege])> {
        self.grants.iter().map(|(role, grants)| (*role, grants.as_slice()))
    }
}
