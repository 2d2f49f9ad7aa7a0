//! Tool registry and the gateway's tool definitions.
//!
//! The gateway exposes exactly two tools: `execute_query` and `checkpoint`.
//! Their descriptions are built per role so the agent can see up front which
//! statements will be accepted.

use crate::protocol::{ToolAnnotations, ToolDefinition};
use serde_json::json;
use sqlgate_core::config::RoleName;
use sqlgate_policy::Privilege;
use std::collections::BTreeMap;

pub const EXECUTE_QUERY: &str = "execute_query";
pub const CHECKPOINT: &str = "checkpoint";

/// Registry of available MCP tools, listed in name order.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, ToolDefinition>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the gateway tools for `role`.
    pub fn for_role(role: RoleName, granted: &[Privilege]) -> Self {
        let mut registry = Self::new();
        registry.register(execute_query_tool(role, granted));
        registry.register(checkpoint_tool());
        registry
    }

    /// Register a tool, replacing any tool of the same name.
    pub fn register(&mut self, tool: ToolDefinition) {
        self.tools.insert(tool.name.clone(), tool);
    }

    pub fn get(&self, name: &str) -> Option<&ToolDefinition> {
        self.tools.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    pub fn list(&self) -> Vec<&ToolDefinition> {
        self.tools.values().collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

fn execute_query_tool(role: RoleName, granted: &[Privilege]) -> ToolDefinition {
    let grants = granted
        .iter()
        .map(Privilege::as_str)
        .collect::<Vec<_>>()
        .join(", ");
    let read_only = granted.iter().all(|p| !p.is_write());

    let description = format!(
        "Execute a single SQL statement against the database. The current role is '{role}' \
         and may run: {grants}. Statements requiring any other privilege are rejected before \
         reaching the database. Transaction control (BEGIN, COMMIT, ROLLBACK, SAVEPOINT) is \
         not accepted here; use the checkpoint tool instead. While checkpoint mode is active, \
         every write creates a numbered checkpoint you can roll back to."
    );

    ToolDefinition {
        name: EXECUTE_QUERY.to_string(),
        description: Some(description),
        input_schema: json!({
            "type": "object",
            "properties": {
                "sql": {
                    "type": "string",
                    "description": "The SQL statement to execute"
                }
            },
            "required": ["sql"]
        }),
        annotations: Some(ToolAnnotations {
            read_only_hint: Some(read_only),
            destructive_hint: Some(!read_only),
        }),
    }
}

fn checkpoint_tool() -> ToolDefinition {
    let description = "Manage checkpoint mode, an undo history for writes. \
        'start' opens a transaction that stays open across calls; each later write \
        creates a checkpoint. 'list' shows checkpoints. 'rollback' returns to a \
        checkpoint (checkpointId required); later checkpoints are discarded and cannot \
        be redone. 'commit' makes all changes permanent. 'discard' abandons all changes.";

    ToolDefinition {
        name: CHECKPOINT.to_string(),
        description: Some(description.to_string()),
        input_schema: json!({
            "type": "object",
            "properties": {
                "action": {
                    "type": "string",
                    "enum": ["start", "list", "rollback", "commit", "discard"],
                    "description": "Checkpoint action to perform"
                },
                "checkpointId": {
                    "type": "integer",
                    "minimum": 1,
                    "description": "Checkpoint to roll back to (rollback only)"
                }
            },
            "required": ["action"]
        }),
        annotations: Some(ToolAnnotations {
            read_only_hint: Some(false),
            destructive_hint: Some(true),
        }),
    }
}
