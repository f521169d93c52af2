//! Store tool: read and write values in agent memory.

use std::sync::Arc;

use serde_json::Value;

use crate::context::ExecutionContext;
use crate::error::{ToolError, ToolResult};
use crate::memory::Memory;
use crate::plan::schema::StoreAction;
use crate::tool::{Tool, ToolArgs};

const NAME: &str = "Store";

/// Key-value access to a shared [`Memory`] backend.
///
/// `write` saves `args.value` (null when absent) and returns `true`.
/// `read` returns the saved value, or null for an unknown key.
#[derive(Clone)]
pub struct Store {
    memory: Arc<dyn Memory>,
}

impl Store {
    pub fn new(memory: Arc<dyn Memory>) -> Self {
        Self { memory }
    }
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store").finish_non_exhaustive()
    }
}

impl Tool for Store {
    fn name(&self) -> &str {
        NAME
    }

    fn description(&self) -> &str {
        "Read or write agent memory (args: action, key, value)."
    }

    fn run(&self, args: &ToolArgs, _context: &mut ExecutionContext) -> ToolResult<Value> {
        let action_name = args.require_str("action", NAME)?;
        let action = StoreAction::parse(action_name).ok_or_else(|| ToolError::InvalidArg {
            tool: NAME.into(),
            arg: "action".into(),
            message: format!("expected \"write\" or \"read\", got \"{action_name}\""),
        })?;
        let key = args.require_str("key", NAME)?;

        match action {
            StoreAction::Write => {
                let value = args.get("value").cloned().unwrap_or(Value::Null);
                self.memory.save(key, value);
                tracing::debug!(key, "memory write");
                Ok(Value::Bool(true))
            }
            StoreAction::Read => Ok(self.memory.load(key).unwrap_or(Value::Null)),
        }
    }
}
