//! sqlgate policy enforcement.
//!
//! Every statement the gateway receives is reduced to a single required
//! privilege by looking at its leading keyword, then checked against the
//! grants of the configured role. There is no SQL parsing beyond that first
//! token: a statement is allowed or denied as a whole based on how it starts.
//!
//! ```text
//! SQL text ──► classify() ──► Classification { command, privilege }
//!                                   │
//!                 PrivilegeTable ──►│ PermissionGate::check()
//!                                   ▼
//!                         Ok(Classification) | Err(PermissionDenied)
//! ```

pub mod classifier;
pub mod error;
pub mod gate;
pub mod privilege;

pub use classifier::{Classification, classify};
pub use error::PermissionDenied;
pub use gate::PermissionGate;
pub use privilege::{Privilege, PrivilegeTable};
