//! Per-run execution context.
//!
//! An [`ExecutionContext`] carries the goal, a scratch memory map that tools
//! may read and write, informational metadata, and the append-only trace of
//! step results. Only the executor appends to the trace; tools get read access.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// State owned by exactly one execution run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExecutionContext {
    /// The goal text the plan was generated for.
    pub goal: String,
    /// Tool-writable scratch space. The executor never touches it.
    #[serde(default)]
    pub memory: Map<String, Value>,
    /// Informational key/value pairs supplied by the caller.
    #[serde(default)]
    pub metadata: Map<String, Value>,
    #[serde(default)]
    trace: Vec<Value>,
    /// Trace length when the current run began.
    #[serde(skip)]
    run_start: usize,
}

impl ExecutionContext {
    /// Create a fresh context for a goal.
    pub fn new(goal: impl Into<String>) -> Self {
        Self {
            goal: goal.into(),
            ..Default::default()
        }
    }

    /// Attach a metadata entry.
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Every result recorded in this context, across all runs.
    pub fn trace(&self) -> &[Value] {
        &self.trace
    }

    /// Results recorded by the current (or most recent) run.
    ///
    /// Entry `i` is the result of step `i`. Pointers resolve against this view.
    pub fn run_trace(&self) -> &[Value] {
        &self.trace[self.run_start..]
    }

    /// Mark the start of a new run. Earlier results stay in [`trace`](Self::trace).
    pub(crate) fn begin_run(&mut self) {
        self.run_start = self.trace.len();
    }

    /// Append a completed step's result.
    pub(crate) fn record(&mut self, result: Value) {
        self.trace.push(result);
    }
}
