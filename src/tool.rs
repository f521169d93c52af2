//! Tool system: trait-based tools with bootstrap-time registration.
//!
//! Tools are the executor's interface to the outside world. Each tool
//! implements the [`Tool`] trait and is registered by name in a
//! [`ToolRegistry`] as a factory. The registry is filled during bootstrap,
//! then sealed; after that it is read-only and can be shared across runs.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::{Map, Value};

use crate::context::ExecutionContext;
use crate::error::{RegistryError, RegistryResult, ToolError, ToolResult};

/// Arguments passed to a tool, with every top-level pointer already resolved.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolArgs {
    values: Map<String, Value>,
}

impl ToolArgs {
    /// Create empty arguments.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an argument.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.insert(name.into(), value.into());
        self
    }

    /// Get an argument value.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    /// Get a required argument, returning an error if missing.
    pub fn require(&self, name: &str, tool_name: &str) -> ToolResult<&Value> {
        self.get(name).ok_or_else(|| ToolError::MissingArg {
            tool: tool_name.into(),
            arg: name.into(),
        })
    }

    /// Get a required string argument.
    pub fn require_str(&self, name: &str, tool_name: &str) -> ToolResult<&str> {
        self.require(name, tool_name)?
            .as_str()
            .ok_or_else(|| ToolError::InvalidArg {
                tool: tool_name.into(),
                arg: name.into(),
                message: "expected a string".into(),
            })
    }

    /// Get a required object argument.
    pub fn require_object(&self, name: &str, tool_name: &str) -> ToolResult<&Map<String, Value>> {
        self.require(name, tool_name)?
            .as_object()
            .ok_or_else(|| ToolError::InvalidArg {
                tool: tool_name.into(),
                arg: name.into(),
                message: "expected an object".into(),
            })
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.values
    }
}

impl From<Map<String, Value>> for ToolArgs {
    fn from(values: Map<String, Value>) -> Self {
        Self { values }
    }
}

/// A named primitive the executor can invoke.
///
/// A tool owns its side effects (network, storage, caching). It may read the
/// goal and read/write the context's scratch memory, but the trace is only
/// ever appended to by the executor.
pub trait Tool: Send + Sync {
    /// Unique name, matched against a step's `with`.
    fn name(&self) -> &str;

    /// One-line description for listings.
    fn description(&self) -> &str {
        ""
    }

    /// Execute the tool.
    fn run(&self, args: &ToolArgs, context: &mut ExecutionContext) -> ToolResult<Value>;
}

/// Constructs a fresh tool instance for each step that uses it.
pub type ToolFactory = Arc<dyn Fn() -> Box<dyn Tool> + Send + Sync>;

/// Registry of available tools, keyed by name.
pub struct ToolRegistry {
    factories: BTreeMap<String, ToolFactory>,
    sealed: bool,
}

impl ToolRegistry {
    /// Create a new empty, unsealed registry.
    pub fn new() -> Self {
        Self {
            factories: BTreeMap::new(),
            sealed: false,
        }
    }

    /// Register a factory under `name`. Fails if the name is taken or the
    /// registry is sealed.
    pub fn register(&mut self, name: impl Into<String>, factory: ToolFactory) -> RegistryResult<()> {
        let name = name.into();
        if self.sealed {
            return Err(RegistryError::Sealed { name });
        }
        if self.factories.contains_key(&name) {
            return Err(RegistryError::DuplicateTool { name });
        }
        tracing::debug!(tool = %name, "registered tool");
        self.factories.insert(name, factory);
        Ok(())
    }

    /// Register a cloneable tool instance under its own name.
    pub fn register_tool<T>(&mut self, tool: T) -> RegistryResult<()>
    where
        T: Tool + Clone + 'static,
    {
        let name = tool.name().to_string();
        self.register(name, Arc::new(move || Box::new(tool.clone()) as Box<dyn Tool>))
    }

    /// End the registration phase. Further `register` calls fail.
    pub fn seal(&mut self) {
        self.sealed = true;
    }

    /// Consume the registry, seal it, and share it.
    pub fn sealed(mut self) -> Arc<Self> {
        self.seal();
        Arc::new(self)
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed
    }

    /// Look up a tool factory by name.
    pub fn resolve(&self, name: &str) -> RegistryResult<&ToolFactory> {
        self.factories
            .get(name)
            .ok_or_else(|| RegistryError::ToolNotFound { name: name.into() })
    }

    /// Instantiate a tool by name.
    pub fn instantiate(&self, name: &str) -> RegistryResult<Box<dyn Tool>> {
        self.resolve(name).map(|factory| factory())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Registered tool names, sorted.
    pub fn names(&self) -> Vec<&str> {
        self.factories.keys().map(String::as_str).collect()
    }

    /// Number of registered tools.
    pub fn len(&self) -> usize {
        self.factories.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.factories.keys().collect::<Vec<_>>())
            .field("sealed", &self.sealed)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Clone)]
    struct DummyTool;

    impl Tool for DummyTool {
        fn name(&self) -> &str {
            "dummy"
        }

        fn run(&self, _args: &ToolArgs, _context: &mut ExecutionContext) -> ToolResult<Value> {
            Ok(json!("dummy result"))
        }
    }

    #[test]
    fn register_and_resolve() {
        let mut reg = ToolRegistry::new();
        reg.register_tool(DummyTool).unwrap();
        assert_eq!(reg.len(), 1);
        assert_eq!(reg.names(), vec!["dummy"]);
        let tool = reg.instantiate("dummy").unwrap();
        let mut ctx = ExecutionContext::new("g");
        assert_eq!(tool.run(&ToolArgs::new(), &mut ctx).unwrap(), json!("dummy result"));
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let mut reg = ToolRegistry::new();
        reg.register_tool(DummyTool).unwrap();
        assert!(matches!(
            reg.register_tool(DummyTool),
            Err(RegistryError::DuplicateTool { .. })
        ));
    }

    #[test]
    fn sealed_registry_rejects_registration() {
        let mut reg = ToolRegistry::new();
        reg.seal();
        assert!(reg.is_sealed());
        assert!(matches!(
            reg.register_tool(DummyTool),
            Err(RegistryError::Sealed { .. })
        ));
    }

    #[test]
    fn missing_tool() {
        let reg = ToolRegistry::new().sealed();
        assert!(matches!(
            reg.resolve("nonexistent"),
            Err(RegistryError::ToolNotFound { .. })
        ));
    }

    #[test]
    fn tool_args_accessors() {
        let args = ToolArgs::new()
            .with("url", "http://x")
            .with("schema", json!({"t": "css:h1"}))
            .with("top_k", 3);
        assert_eq!(args.require_str("url", "t").unwrap(), "http://x");
        assert!(args.require_object("schema", "t").is_ok());
        assert!(matches!(
            args.require_str("top_k", "t"),
            Err(ToolError::InvalidArg { .. })
        ));
        assert!(matches!(
            args.require("missing", "t"),
            Err(ToolError::MissingArg { .. })
        ));
    }
}
