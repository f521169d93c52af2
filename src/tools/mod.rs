//! Built-in tools.

pub mod compute;
pub mod fetcher;
pub mod parser;
pub mod searcher;
pub mod store;

use std::sync::Arc;

pub use compute::Compute;
pub use fetcher::Fetcher;
pub use parser::Parser;
pub use searcher::Searcher;
pub use store::Store;

use crate::config::AgentConfig;
use crate::error::RegistryResult;
use crate::memory::Memory;
use crate::tool::ToolRegistry;

/// Register every built-in tool in `registry`.
pub fn register_builtins(
    registry: &mut ToolRegistry,
    config: &AgentConfig,
    memory: Arc<dyn Memory>,
) -> RegistryResult<()> {
    registry.register_tool(Searcher::new(config.searcher.base_url.as_str()))?;
    registry.register_tool(Fetcher::new(&config.fetcher))?;
    registry.register_tool(Parser)?;
    registry.register_tool(Compute)?;
    registry.register_tool(Store::new(memory))?;
    Ok(())
}

/// A sealed registry holding the five built-in tools.
pub fn builtin_registry(
    config: &AgentConfig,
    memory: Arc<dyn Memory>,
) -> RegistryResult<Arc<ToolRegistry>> {
    let mut registry = ToolRegistry::new();
    register_builtins(&mut registry, config, memory)?;
    Ok(registry.sealed())
}
