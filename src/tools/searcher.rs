//! Search tool: deterministic result links for a query.
//!
//! Produces `top_k` entries of the form `{"url": "<base>/<i>", "query": q}`.
//! Stands in for a real search backend, which would plug in behind the same
//! tool name.

use serde_json::{Value, json};

use crate::context::ExecutionContext;
use crate::error::{ToolError, ToolResult};
use crate::plan::schema::TOP_K_RANGE;
use crate::tool::{Tool, ToolArgs};

const NAME: &str = "Searcher";

/// Generate search result links.
#[derive(Debug, Clone)]
pub struct Searcher {
    base_url: String,
}

impl Searcher {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

impl Tool for Searcher {
    fn name(&self) -> &str {
        NAME
    }

    fn description(&self) -> &str {
        "Return result links for a query (args: query, top_k)."
    }

    fn run(&self, args: &ToolArgs, _context: &mut ExecutionContext) -> ToolResult<Value> {
        let query = args.require_str("query", NAME)?;
        let top_k = args
            .require("top_k", NAME)?
            .as_i64()
            .filter(|k| TOP_K_RANGE.contains(k))
            .ok_or_else(|| ToolError::InvalidArg {
                tool: NAME.into(),
                arg: "top_k".into(),
                message: format!(
                    "expected an integer between {} and {}",
                    TOP_K_RANGE.start(),
                    TOP_K_RANGE.end()
                ),
            })?;

        let results = (0..top_k)
            .map(|i| json!({ "url": format!("{}/{i}", self.base_url), "query": query }))
            .collect();
        Ok(Value::Array(results))
    }
}
