//! CLI command implementations for the sqlgate server.

pub mod classify;
pub mod roles;
pub mod serve;
