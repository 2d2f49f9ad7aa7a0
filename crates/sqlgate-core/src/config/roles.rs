//! Role configuration.
//!
//! The gateway knows four fixed roles, each extending the grants of the one
//! before it: `read ⊂ insert ⊂ write ⊂ admin`. The grants themselves have
//! built-in defaults and may be overridden from the config file, as long as
//! the ordering still holds.

use super::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// One of the four fixed gateway roles, ordered from least to most privileged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RoleName {
    #[default]
    Read,
    Insert,
    Write,
    Admin,
}

impl RoleName {
    /// All roles, least privileged first.
    pub const ALL: [RoleName; 4] = [
        RoleName::Read,
        RoleName::Insert,
        RoleName::Write,
        RoleName::Admin,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RoleName::Read => "read",
            RoleName::Insert => "insert",
            RoleName::Write => "write",
            RoleName::Admin => "admin",
        }
    }

    /// Built-in grants for this role.
    pub fn default_grants(&self) -> &'static [&'static str] {
        match self {
            RoleName::Read => &["SELECT"],
            RoleName::Insert => &["SELECT", "INSERT"],
            RoleName::Write => &["SELECT", "INSERT", "UPDATE", "DELETE"],
            RoleName::Admin => &[
                "SELECT", "INSERT", "UPDATE", "DELETE", "CREATE", "ALTER", "DROP", "TRUNCATE",
            ],
        }
    }
}

impl fmt::Display for RoleName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RoleName {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "read" => Ok(RoleName::Read),
            "insert" => Ok(RoleName::Insert),
            "write" => Ok(RoleName::Write),
            "admin" => Ok(RoleName::Admin),
            other => Err(format!(
                "unknown role '{}', expected one of: read, insert, write, admin",
                other
            )),
        }
    }
}

/// Overrides for the built-in privilege grants, keyed by role.
///
/// Roles missing from the map keep their defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct RolesConfig {
    pub overrides: BTreeMap<RoleName, Vec<String>>,
}

impl RolesConfig {
    /// Effective grants for every role, upper-cased, in role order.
    pub fn resolve(&self) -> Vec<(RoleName, Vec<String>)> {
        RoleName::ALL
            .iter()
            .map(|role| {
                let grants = match self.overrides.get(role) {
                    Some(list) => list.iter().map(|p| p.trim().to_ascii_uppercase()).collect(),
                    None => role.default_grants().iter().map(|p| p.to_string()).collect(),
                };
                (*role, grants)
            })
            .collect()
    }

    /// Check that the effective grants keep each role a superset of the previous one.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let resolved = self.resolve();
        for (role, grants) in &resolved {
            if grants.iter().any(|g| g.is_empty()) {
                return Err(ConfigError::Config(format!(
                    "role '{}' has an empty privilege name",
                    role
                )));
            }
        }
        for pair in resolved.windows(2) {
            let (lower, lower_grants) = &pair[0];
            let (higher, higher_grants) = &pair[1];
            if let Some(missing) = lower_grants.iter().find(|g| !higher_grants.contains(g)) {
                return Err(ConfigError::Config(format!(
                    "role '{}' must include every privilege of role '{}' (missing {})",
                    higher, lower, missing
                )));
            }
        }
        Ok(())
    }
}
