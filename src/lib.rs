// thiserror's #[error("...{field}...")] format strings reference struct fields,
// but the compiler doesn't see through the derive macro and reports false positives.
#![allow(unused_assignments)]

//! # bicameral-agent
//!
//! A plan-then-execute agent. A planner turns a natural-language goal into a
//! validated [`Plan`] of declarative tool steps; an executor runs the steps
//! in order against a sealed [`ToolRegistry`], threading results between
//! steps through [`Pointer`]s and recording them in a trace.
//!
//! ## Architecture
//!
//! - **Plans** (`plan`): step types, pointers, schema validation, dependency graph
//! - **Planning** (`planner`): the [`Planner`] trait and a template planner
//! - **Execution** (`executor`): fail-fast sequential runs with partial traces
//! - **Tools** (`tool`, `tools`): the [`Tool`] trait, registry, and built-ins
//! - **Memory** (`memory`): key-value backends behind the `Store` tool
//!
//! ## Library usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use bicameral_agent::{
//!     AgentConfig, ExecutionContext, Executor, InMemory, PlanExecutor, Planner,
//!     TemplatePlanner, tools,
//! };
//!
//! let config = AgentConfig::default();
//! let registry = tools::builtin_registry(&config, Arc::new(InMemory::new())).unwrap();
//! let executor = PlanExecutor::new(registry).unwrap();
//!
//! let plan = TemplatePlanner::new(config.planner.clone()).plan("find car deals").unwrap();
//! let mut ctx = ExecutionContext::new("find car deals");
//! let trace = executor.execute(&plan, &mut ctx).unwrap();
//! assert_eq!(trace.len(), plan.len());
//! ```

pub mod config;
pub mod context;
pub mod error;
pub mod executor;
pub mod memory;
pub mod plan;
pub mod planner;
pub mod predicate;
pub mod tool;
pub mod tools;

pub use config::AgentConfig;
pub use context::ExecutionContext;
pub use error::{BicameralError, BicameralResult};
pub use executor::{CancelToken, ExecutionFailure, Executor, PlanExecutor, RunState, Trace};
pub use memory::{InMemory, Memory};
pub use plan::{Plan, PlanStep, Pointer};
pub use planner::{Planner, TemplatePlanner};
pub use tool::{Tool, ToolArgs, ToolRegistry};
