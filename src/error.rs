//! Rich diagnostic error types for the bicameral agent.
//!
//! Each subsystem defines its own error type with miette `#[diagnostic]` derives,
//! providing error codes and help text so callers know exactly what went wrong
//! and at which step.

use miette::Diagnostic;
use thiserror::Error;

/// Top-level error type for the bicameral agent.
///
/// Each variant wraps a subsystem-specific error, preserving the full diagnostic
/// chain through to the user.
#[derive(Debug, Error, Diagnostic)]
pub enum BicameralError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Plan(#[from] PlanError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Exec(#[from] ExecError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Tool(#[from] ToolError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),
}

// ---------------------------------------------------------------------------
// Plan errors
// ---------------------------------------------------------------------------

/// One structural problem found while validating a plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    /// Index of the offending step, `None` for whole-document problems.
    pub step: Option<usize>,
    pub message: String,
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.step {
            Some(step) => write!(f, "step {step}: {}", self.message),
            None => write!(f, "plan: {}", self.message),
        }
    }
}

#[derive(Debug, Error, Diagnostic)]
pub enum PlanError {
    #[error("plan failed validation ({} violation(s)): {}", .violations.len(), summarize(.violations))]
    #[diagnostic(
        code(bicameral::plan::validation),
        help(
            "Every step must match one of the search/fetch/parse/compute/store shapes. \
             No step of an invalid plan is ever executed."
        )
    )]
    Validation { violations: Vec<Violation> },

    #[error("failed to read plan document \"{path}\": {source}")]
    #[diagnostic(
        code(bicameral::plan::read),
        help("Check that the plan file exists and is readable.")
    )]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("plan document is not valid JSON: {message}")]
    #[diagnostic(
        code(bicameral::plan::json),
        help("A plan document is a JSON array of step objects with `step`, `with` and `args` keys.")
    )]
    Json { message: String },
}

fn summarize(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl PlanError {
    /// Build a validation error from a single violation.
    pub fn single(step: Option<usize>, message: impl Into<String>) -> Self {
        Self::Validation {
            violations: vec![Violation {
                step,
                message: message.into(),
            }],
        }
    }
}

// ---------------------------------------------------------------------------
// Execution errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum ExecError {
    #[error("step {step}: tool not found: \"{name}\"")]
    #[diagnostic(
        code(bicameral::exec::tool_not_found),
        help("Register the tool during bootstrap, before the registry is sealed.")
    )]
    ToolNotFound { step: usize, name: String },

    #[error(
        "step {step}: pointer in arg \"{arg}\" references step {from}, \
         but only {trace_len} step(s) have completed"
    )]
    #[diagnostic(
        code(bicameral::exec::pointer_out_of_range),
        help("A pointer may only reference a step that comes strictly before the current one.")
    )]
    PointerOutOfRange {
        step: usize,
        arg: String,
        from: u64,
        trace_len: usize,
    },

    #[error("step {step}: pointer in arg \"{arg}\" cannot walk \"{field}\" on step {from}: {reason}")]
    #[diagnostic(
        code(bicameral::exec::pointer_field),
        help(
            "Fields use `.` for object keys and `[n]` or `n` for array indices. \
             Inspect the referenced step's result in the partial trace."
        )
    )]
    PointerField {
        step: usize,
        arg: String,
        from: u64,
        field: String,
        reason: String,
    },

    #[error("step {step}: tool \"{tool}\" failed: {source}")]
    #[diagnostic(
        code(bicameral::exec::tool_execution),
        help("The tool encountered an error. The partial trace holds every earlier result.")
    )]
    ToolExecution {
        step: usize,
        tool: String,
        #[source]
        source: ToolError,
    },

    #[error("run cancelled before step {step}")]
    #[diagnostic(
        code(bicameral::exec::cancelled),
        help("Cancellation or the run deadline was observed between steps; no further tool was started.")
    )]
    Cancelled { step: usize },
}

impl ExecError {
    /// Index of the step at which the error occurred.
    pub fn step(&self) -> usize {
        match self {
            Self::ToolNotFound { step, .. }
            | Self::PointerOutOfRange { step, .. }
            | Self::PointerField { step, .. }
            | Self::ToolExecution { step, .. }
            | Self::Cancelled { step } => *step,
        }
    }
}

// ---------------------------------------------------------------------------
// Registry errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum RegistryError {
    #[error("tool \"{name}\" is already registered")]
    #[diagnostic(
        code(bicameral::registry::duplicate),
        help("Tool names are unique; re-registration is rejected instead of replacing the tool.")
    )]
    DuplicateTool { name: String },

    #[error("registry is sealed; cannot register \"{name}\"")]
    #[diagnostic(
        code(bicameral::registry::sealed),
        help("All tools must be registered during bootstrap, before `seal()` is called.")
    )]
    Sealed { name: String },

    #[error("registry has not been sealed")]
    #[diagnostic(
        code(bicameral::registry::not_sealed),
        help("Call `seal()` on the registry after bootstrap and before constructing an executor.")
    )]
    NotSealed,

    #[error("tool not found: \"{name}\"")]
    #[diagnostic(
        code(bicameral::registry::tool_not_found),
        help("Check the available tools with `registry.names()`.")
    )]
    ToolNotFound { name: String },
}

// ---------------------------------------------------------------------------
// Tool errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum ToolError {
    #[error("{tool}: missing required argument \"{arg}\"")]
    #[diagnostic(code(bicameral::tool::missing_arg))]
    MissingArg { tool: String, arg: String },

    #[error("{tool}: invalid argument \"{arg}\": {message}")]
    #[diagnostic(code(bicameral::tool::invalid_arg))]
    InvalidArg {
        tool: String,
        arg: String,
        message: String,
    },

    #[error(
        "{tool}: pointer in \"{arg}\" references step {from}, \
         but only {trace_len} step(s) have completed"
    )]
    #[diagnostic(
        code(bicameral::tool::pointer_out_of_range),
        help("Input pointers may only reference steps that come strictly before this one.")
    )]
    PointerOutOfRange {
        tool: String,
        arg: String,
        from: u64,
        trace_len: usize,
    },

    #[error("HTTP error {status} fetching \"{url}\"")]
    #[diagnostic(
        code(bicameral::tool::http_status),
        help("The server answered with a non-success status.")
    )]
    HttpStatus { url: String, status: u16 },

    #[error("transport error fetching \"{url}\": {message}")]
    #[diagnostic(
        code(bicameral::tool::transport),
        help("Check network connectivity and that the host resolves.")
    )]
    Transport { url: String, message: String },

    #[error("invalid selector \"{selector}\": {message}")]
    #[diagnostic(
        code(bicameral::tool::selector),
        help("Selectors are `css:<selector>`, `xpath:<path>` or `regex:<pattern>`.")
    )]
    Selector { selector: String, message: String },

    #[error("compute op \"{op}\" failed: {message}")]
    #[diagnostic(code(bicameral::tool::compute))]
    Compute { op: String, message: String },
}

// ---------------------------------------------------------------------------
// Config errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("failed to read config \"{path}\": {source}")]
    #[diagnostic(
        code(bicameral::config::read),
        help("Check that the config file exists and is readable.")
    )]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write config \"{path}\": {source}")]
    #[diagnostic(code(bicameral::config::write))]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config \"{path}\": {message}")]
    #[diagnostic(
        code(bicameral::config::parse),
        help("The config is TOML with optional [planner], [searcher], [fetcher] and [executor] tables.")
    )]
    Parse { path: String, message: String },
}

/// Convenience alias for plan operations.
pub type PlanResult<T> = std::result::Result<T, PlanError>;

/// Convenience alias for execution operations.
pub type ExecResult<T> = std::result::Result<T, ExecError>;

/// Convenience alias for registry operations.
pub type RegistryResult<T> = std::result::Result<T, RegistryError>;

/// Convenience alias for tool operations.
pub type ToolResult<T> = std::result::Result<T, ToolError>;

/// Convenience alias for config operations.
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Convenience alias for crate-level operations.
pub type BicameralResult<T> = std::result::Result<T, BicameralError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_message_lists_every_violation() {
        let err = PlanError::Validation {
            violations: vec![
                Violation {
                    step: Some(0),
                    message: "top_k must be between 1 and 20".into(),
                },
                Violation {
                    step: None,
                    message: "plan is empty".into(),
                },
            ],
        };
        let msg = err.to_string();
        assert!(msg.contains("2 violation(s)"));
        assert!(msg.contains("step 0: top_k"));
        assert!(msg.contains("plan: plan is empty"));
    }

    #[test]
    fn exec_error_reports_step() {
        let err = ExecError::PointerOutOfRange {
            step: 1,
            arg: "raw".into(),
            from: 5,
            trace_len: 1,
        };
        assert_eq!(err.step(), 1);
        assert_eq!(ExecError::Cancelled { step: 3 }.step(), 3);
    }

    #[test]
    fn subsystem_errors_convert_to_top_level() {
        let err: BicameralError = RegistryError::NotSealed.into();
        assert!(matches!(err, BicameralError::Registry(_)));
    }
}
