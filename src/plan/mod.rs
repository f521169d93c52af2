//! Plans: ordered sequences of declarative tool steps.
//!
//! A [`Plan`] is a list of [`PlanStep`]s. Each step names a tool in `with` and
//! passes it `args`; an argument may be a [`Pointer`] into the result of an
//! earlier step. A `Plan` value can only be obtained through validation, so
//! every plan the executor sees has passed the schema in [`schema`].

pub mod graph;
pub mod pointer;
pub mod schema;

use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{PlanError, PlanResult, Violation};

pub use graph::DependencyGraph;
pub use pointer::{FieldPath, Pointer, ResolveError, Segment};
pub use schema::{ComputeOp, StepKind, StoreAction};

// ---------------------------------------------------------------------------
// Plan types
// ---------------------------------------------------------------------------

/// A single declarative tool invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanStep {
    /// Human-readable label; informational only.
    #[serde(default)]
    pub step: String,
    /// Name of the tool to invoke.
    pub with: String,
    /// Arguments: literals or pointers.
    #[serde(default)]
    pub args: Map<String, Value>,
}

impl PlanStep {
    /// Create a step with no arguments.
    pub fn new(label: impl Into<String>, with: impl Into<String>) -> Self {
        Self {
            step: label.into(),
            with: with.into(),
            args: Map::new(),
        }
    }

    /// Add an argument.
    pub fn arg(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.args.insert(name.into(), value.into());
        self
    }

    /// Pointers among the top-level arguments, in argument order.
    ///
    /// Malformed pointer-shaped values are skipped.
    pub fn top_level_pointers(&self) -> impl Iterator<Item = (&str, Pointer)> {
        self.args
            .iter()
            .filter_map(|(name, value)| match Pointer::detect(value) {
                Some(Ok(p)) => Some((name.as_str(), p)),
                _ => None,
            })
    }
}

/// A validated, immutable sequence of steps.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Plan {
    steps: Vec<PlanStep>,
}

impl Plan {
    /// Validate `steps` as a whole and wrap them into a plan.
    pub fn new(steps: Vec<PlanStep>) -> PlanResult<Self> {
        let violations = schema::validate_steps(&steps);
        if !violations.is_empty() {
            return Err(PlanError::Validation { violations });
        }
        Ok(Self { steps })
    }

    /// Validate a raw plan document (a JSON array of steps).
    ///
    /// Every element is checked; the error lists all problems found.
    pub fn from_json(document: &Value) -> PlanResult<Self> {
        let items = document
            .as_array()
            .ok_or_else(|| PlanError::single(None, "plan document must be an array"))?;

        let mut violations = Vec::new();
        let mut steps = Vec::with_capacity(items.len());
        for (index, item) in items.iter().enumerate() {
            match PlanStep::deserialize(item) {
                Ok(step) => steps.push(step),
                Err(e) => violations.push(Violation {
                    step: Some(index),
                    message: format!("not a step object: {e}"),
                }),
            }
        }

        // Indices stay aligned only when every element parsed.
        if violations.is_empty() {
            violations = schema::validate_steps(&steps);
        }
        if !violations.is_empty() {
            return Err(PlanError::Validation { violations });
        }
        Ok(Self { steps })
    }

    /// Parse and validate a JSON plan document.
    pub fn from_json_str(text: &str) -> PlanResult<Self> {
        let document: Value = serde_json::from_str(text).map_err(|e| PlanError::Json {
            message: e.to_string(),
        })?;
        Self::from_json(&document)
    }

    /// Load and validate a plan document from a file.
    pub fn load(path: &Path) -> PlanResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| PlanError::Read {
            path: path.display().to_string(),
            source: e,
        })?;
        Self::from_json_str(&text)
    }

    pub fn steps(&self) -> &[PlanStep] {
        &self.steps
    }

    pub fn get(&self, index: usize) -> Option<&PlanStep> {
        self.steps.get(index)
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, PlanStep> {
        self.steps.iter()
    }

    /// The plan document form.
    pub fn to_json(&self) -> Value {
        serde_json::to_value(&self.steps).unwrap_or(Value::Null)
    }

    /// Pointer dependencies between steps.
    pub fn dependency_graph(&self) -> DependencyGraph {
        DependencyGraph::build(self)
    }
}

impl<'a> IntoIterator for &'a Plan {
    type Item = &'a PlanStep;
    type IntoIter = std::slice::Iter<'a, PlanStep>;

    fn into_iter(self) -> Self::IntoIter {
        self.steps.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn builder_produces_valid_plan() {
        let plan = Plan::new(vec![
            PlanStep::new("search", "Searcher")
                .arg("query", "cheap cars")
                .arg("top_k", 2),
            PlanStep::new("fetch", "Fetcher").arg("url", "https://example.com"),
        ])
        .unwrap();
        assert_eq!(plan.len(), 2);
        assert_eq!(plan.get(1).unwrap().with, "Fetcher");
    }

    #[test]
    fn from_json_collects_all_violations() {
        let doc = json!([
            {"step": "search", "with": "Searcher", "args": {"query": "q", "top_k": 0}},
            {"step": "fetch", "with": "Fetcher", "args": {"url": "https://ok"}},
            {"step": "store", "with": "Store", "args": {"action": "drop", "key": "k"}}
        ]);
        let Err(PlanError::Validation { violations }) = Plan::from_json(&doc) else {
            panic!("expected validation error");
        };
        let steps: Vec<_> = violations.iter().map(|v| v.step).collect();
        assert_eq!(steps, vec![Some(0), Some(2)]);
    }

    #[test]
    fn from_json_rejects_non_array_and_non_steps() {
        assert!(matches!(
            Plan::from_json(&json!({"with": "Searcher"})),
            Err(PlanError::Validation { .. })
        ));
        assert!(matches!(
            Plan::from_json(&json!([42])),
            Err(PlanError::Validation { .. })
        ));
        assert!(matches!(
            Plan::from_json_str("[{"),
            Err(PlanError::Json { .. })
        ));
    }

    #[test]
    fn json_round_trip_preserves_steps() {
        let text = r#"[{"step":"fetch","with":"Fetcher","args":{"url":"http://x"}}]"#;
        let plan = Plan::from_json_str(text).unwrap();
        assert_eq!(Plan::from_json(&plan.to_json()).unwrap(), plan);
    }

    #[test]
    fn empty_plan_is_valid() {
        assert!(Plan::from_json(&json!([])).unwrap().is_empty());
    }

    #[test]
    fn top_level_pointers_ignore_nested_and_extra_keys() {
        let step = PlanStep::new("parse", "Parser")
            .arg("raw", Pointer::new(0, "content"))
            .arg("nested", json!({"inner": {"from": 0, "field": ""}}))
            .arg("extra", json!({"from": 0, "field": "x", "extra": 1}));
        let pointers: Vec<_> = step.top_level_pointers().collect();
        assert_eq!(pointers, vec![("raw", Pointer::new(0, "content"))]);
    }
}
