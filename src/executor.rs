//! Plan execution: sequential, fail-fast dispatch of validated steps.
//!
//! The executor walks a [`Plan`] strictly in order. For each step it looks the
//! tool up in the sealed [`ToolRegistry`], substitutes top-level pointers with
//! values from the run's trace, invokes the tool, and appends the result.
//! Any failure aborts the remaining steps; the trace keeps every result
//! completed before the failing step.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use miette::Diagnostic;
use serde_json::Value;
use thiserror::Error;

use crate::config::ExecutorConfig;
use crate::context::ExecutionContext;
use crate::error::{ExecError, ExecResult, RegistryError, RegistryResult};
use crate::plan::{Plan, PlanStep, Pointer, ResolveError};
use crate::tool::{ToolArgs, ToolRegistry};

/// Ordered results of the completed steps; entry `i` belongs to step `i`.
pub type Trace = Vec<Value>;

/// Lifecycle of one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    /// The plan passed validation; no step has started.
    Validated,
    /// Step `step` is being dispatched.
    Running { step: usize },
    /// Every step completed.
    Completed,
    /// Step `step` failed; later steps never ran.
    Failed { step: usize },
}

impl RunState {
    /// Whether no further transition is possible.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed { .. })
    }
}

/// A failed run: the error plus everything completed before it.
#[derive(Debug, Error, Diagnostic)]
#[error("{error}")]
#[diagnostic(forward(error))]
pub struct ExecutionFailure {
    pub error: ExecError,
    /// Terminal state of the run, always [`RunState::Failed`].
    pub state: RunState,
    /// Results of the steps that completed before the failure.
    pub trace: Trace,
}

impl ExecutionFailure {
    /// Index of the step that failed.
    pub fn failed_step(&self) -> usize {
        self.error.step()
    }
}

/// Cooperative cancellation, observed between steps.
///
/// Clones share the same flag, so a token handed to another thread can stop
/// a run. An optional deadline cancels the run once it has passed.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
    deadline: Option<Instant>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// A token that also trips once `timeout` has elapsed from now.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            flag: Arc::default(),
            deadline: Instant::now().checked_add(timeout),
        }
    }

    /// Request cancellation. The current tool call finishes; no new one starts.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst) || self.deadline.is_some_and(|d| Instant::now() >= d)
    }
}

/// Runs plans against a context.
pub trait Executor {
    /// Execute every step, returning the trace or the failure with the partial trace.
    fn execute(&self, plan: &Plan, context: &mut ExecutionContext) -> Result<Trace, ExecutionFailure>;
}

/// The sequential plan executor.
#[derive(Debug, Clone)]
pub struct PlanExecutor {
    registry: Arc<ToolRegistry>,
    config: ExecutorConfig,
}

impl PlanExecutor {
    /// Create an executor over a sealed registry.
    pub fn new(registry: Arc<ToolRegistry>) -> RegistryResult<Self> {
        if !registry.is_sealed() {
            return Err(RegistryError::NotSealed);
        }
        Ok(Self {
            registry,
            config: ExecutorConfig::default(),
        })
    }

    pub fn with_config(mut self, config: ExecutorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Execute with an explicit cancellation token.
    pub fn execute_with_cancel(
        &self,
        plan: &Plan,
        context: &mut ExecutionContext,
        cancel: &CancelToken,
    ) -> Result<Trace, ExecutionFailure> {
        context.begin_run();
        let mut state = RunState::Validated;
        tracing::info!(steps = plan.len(), goal = %context.goal, "starting plan run");

        for (index, step) in plan.iter().enumerate() {
            transition(&mut state, RunState::Running { step: index });
            if let Err(error) = self.run_step(index, step, context, cancel) {
                transition(&mut state, RunState::Failed { step: index });
                tracing::warn!(step = index, tool = %step.with, error = %error, "plan run aborted");
                return Err(ExecutionFailure {
                    error,
                    state,
                    trace: context.run_trace().to_vec(),
                });
            }
        }

        transition(&mut state, RunState::Completed);
        tracing::info!(steps = plan.len(), "plan run completed");
        Ok(context.run_trace().to_vec())
    }

    fn run_step(
        &self,
        index: usize,
        step: &PlanStep,
        context: &mut ExecutionContext,
        cancel: &CancelToken,
    ) -> ExecResult<()> {
        if cancel.is_cancelled() {
            return Err(ExecError::Cancelled { step: index });
        }

        let factory = self
            .registry
            .resolve(&step.with)
            .map_err(|_| ExecError::ToolNotFound {
                step: index,
                name: step.with.clone(),
            })?;

        let args = resolve_args(index, step, context.run_trace())?;
        let tool = factory();

        tracing::debug!(step = index, tool = %step.with, label = %step.step, "running step");
        let result = tool
            .run(&args, context)
            .map_err(|source| ExecError::ToolExecution {
                step: index,
                tool: step.with.clone(),
                source,
            })?;

        context.record(result);
        Ok(())
    }
}

impl Executor for PlanExecutor {
    fn execute(&self, plan: &Plan, context: &mut ExecutionContext) -> Result<Trace, ExecutionFailure> {
        let cancel = match self.config.run_timeout_secs {
            Some(secs) => CancelToken::with_timeout(Duration::from_secs(secs)),
            None => CancelToken::new(),
        };
        self.execute_with_cancel(plan, context, &cancel)
    }
}

fn transition(state: &mut RunState, next: RunState) {
    debug_assert!(!state.is_terminal(), "no transition out of {state:?}");
    tracing::trace!(from = ?state, to = ?next, "run state");
    *state = next;
}

/// Build a step's tool arguments, replacing each top-level pointer with the
/// value it references in `trace`. Nested values are passed through untouched.
pub fn resolve_args(step_index: usize, step: &PlanStep, trace: &[Value]) -> ExecResult<ToolArgs> {
    let mut resolved = serde_json::Map::with_capacity(step.args.len());
    for (name, value) in &step.args {
        let value = match Pointer::detect(value) {
            None => value.clone(),
            Some(Ok(pointer)) => pointer
                .resolve(trace)
                .map_err(|e| pointer_error(step_index, name, value, e))?,
            Some(Err(e)) => return Err(pointer_error(step_index, name, value, e)),
        };
        resolved.insert(name.clone(), value);
    }
    Ok(ToolArgs::from(resolved))
}

fn pointer_error(step: usize, arg: &str, raw: &Value, error: ResolveError) -> ExecError {
    let from = raw.get("from").and_then(Value::as_u64).unwrap_or_default();
    let field = raw
        .get("field")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    match error {
        ResolveError::OutOfRange { from, trace_len } => ExecError::PointerOutOfRange {
            step,
            arg: arg.into(),
            from,
            trace_len,
        },
        ResolveError::Field { reason } => ExecError::PointerField {
            step,
            arg: arg.into(),
            from,
            field,
            reason,
        },
        malformed @ ResolveError::Malformed { .. } => ExecError::PointerField {
            step,
            arg: arg.into(),
            from,
            field,
            reason: malformed.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ToolResult;
    use crate::tool::Tool;
    use serde_json::json;

    /// Echoes its arguments back as the result.
    #[derive(Clone)]
    struct Echo(&'static str);

    impl Tool for Echo {
        fn name(&self) -> &str {
            self.0
        }

        fn run(&self, args: &ToolArgs, _context: &mut ExecutionContext) -> ToolResult<Value> {
            Ok(Value::Object(args.as_map().clone()))
        }
    }

    fn executor(names: &[&'static str]) -> PlanExecutor {
        let mut registry = ToolRegistry::new();
        for &name in names {
            registry.register_tool(Echo(name)).unwrap();
        }
        PlanExecutor::new(registry.sealed()).unwrap()
    }

    #[test]
    fn unsealed_registry_is_rejected() {
        let registry = Arc::new(ToolRegistry::new());
        assert!(matches!(
            PlanExecutor::new(registry),
            Err(RegistryError::NotSealed)
        ));
    }

    #[test]
    fn resolve_args_substitutes_top_level_only() {
        let step = PlanStep::new("p", "Parser")
            .arg("raw", Pointer::new(0, "content"))
            .arg("nested", json!([{"from": 0, "field": "content"}]))
            .arg("literal", json!({"from": 0, "field": "content", "extra": 1}));
        let trace = vec![json!({"content": "<p>hi</p>"})];
        let args = resolve_args(1, &step, &trace).unwrap();
        assert_eq!(args.get("raw"), Some(&json!("<p>hi</p>")));
        assert_eq!(args.get("nested"), Some(&json!([{"from": 0, "field": "content"}])));
        assert_eq!(
            args.get("literal"),
            Some(&json!({"from": 0, "field": "content", "extra": 1}))
        );
    }

    #[test]
    fn resolve_args_maps_errors() {
        let trace = vec![json!({"a": 1})];
        let step = PlanStep::new("p", "Parser").arg("raw", Pointer::new(1, ""));
        assert!(matches!(
            resolve_args(1, &step, &trace),
            Err(ExecError::PointerOutOfRange { step: 1, from: 1, trace_len: 1, .. })
        ));
        let step = PlanStep::new("p", "Parser").arg("raw", Pointer::new(0, "b"));
        assert!(matches!(
            resolve_args(1, &step, &trace),
            Err(ExecError::PointerField { .. })
        ));
        let step = PlanStep::new("p", "Parser").arg("raw", json!({"from": "zero", "field": ""}));
        assert!(matches!(
            resolve_args(1, &step, &trace),
            Err(ExecError::PointerField { .. })
        ));
    }

    #[test]
    fn runs_steps_in_order() {
        let exec = executor(&["Searcher", "Fetcher"]);
        let plan = Plan::new(vec![
            PlanStep::new("s", "Searcher").arg("query", "q").arg("top_k", 1),
            PlanStep::new("f", "Fetcher").arg("url", "http://x"),
        ])
        .unwrap();
        let mut ctx = ExecutionContext::new("g");
        let trace = exec.execute(&plan, &mut ctx).unwrap();
        assert_eq!(trace.len(), 2);
        assert_eq!(trace[1], json!({"url": "http://x"}));
        assert_eq!(ctx.run_trace(), trace.as_slice());
    }

    #[test]
    fn cancelled_token_stops_before_first_step() {
        let exec = executor(&["Searcher"]);
        let plan = Plan::new(vec![PlanStep::new("s", "Searcher").arg("query", "q").arg("top_k", 1)]).unwrap();
        let cancel = CancelToken::new();
        cancel.cancel();
        let mut ctx = ExecutionContext::new("g");
        let failure = exec.execute_with_cancel(&plan, &mut ctx, &cancel).unwrap_err();
        assert!(matches!(failure.error, ExecError::Cancelled { step: 0 }));
        assert_eq!(failure.state, RunState::Failed { step: 0 });
        assert!(failure.state.is_terminal());
        assert!(failure.trace.is_empty());
    }

    #[test]
    fn elapsed_deadline_cancels() {
        let token = CancelToken::with_timeout(Duration::ZERO);
        assert!(token.is_cancelled());
        assert!(!CancelToken::new().is_cancelled());
    }

    #[test]
    fn run_state_terminality() {
        assert!(!RunState::Validated.is_terminal());
        assert!(!RunState::Running { step: 0 }.is_terminal());
        assert!(RunState::Completed.is_terminal());
        assert!(RunState::Failed { step: 2 }.is_terminal());
    }
}
