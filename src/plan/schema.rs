//! Structural validation of plans.
//!
//! Every step must match exactly one of five shapes, selected by the step's
//! `with` tool name. Validation covers the whole plan and collects every
//! violation; a single bad step rejects the plan before anything runs.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value};

use super::PlanStep;
use super::pointer::Pointer;
use crate::error::Violation;
use crate::predicate::Predicate;

/// Inclusive bounds on `top_k` for search steps.
pub const TOP_K_RANGE: std::ops::RangeInclusive<i64> = 1..=20;

static SELECTOR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(css:|xpath:|regex:).+$").expect("selector pattern is valid"));

/// The five recognized step shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StepKind {
    Search,
    Fetch,
    Parse,
    Compute,
    Store,
}

impl StepKind {
    pub const ALL: [StepKind; 5] = [
        StepKind::Search,
        StepKind::Fetch,
        StepKind::Parse,
        StepKind::Compute,
        StepKind::Store,
    ];

    /// The tool name a step of this kind must carry in `with`.
    pub fn tool_name(self) -> &'static str {
        match self {
            Self::Search => "Searcher",
            Self::Fetch => "Fetcher",
            Self::Parse => "Parser",
            Self::Compute => "Compute",
            Self::Store => "Store",
        }
    }

    pub fn from_tool_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.tool_name() == name)
    }
}

impl std::fmt::Display for StepKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Search => write!(f, "search"),
            Self::Fetch => write!(f, "fetch"),
            Self::Parse => write!(f, "parse"),
            Self::Compute => write!(f, "compute"),
            Self::Store => write!(f, "store"),
        }
    }
}

/// Data operations supported by compute steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComputeOp {
    NormalizePrices,
    MarginCalculation,
    Filter,
    Sort,
    Merge,
}

impl ComputeOp {
    pub const ALL: [ComputeOp; 5] = [
        ComputeOp::NormalizePrices,
        ComputeOp::MarginCalculation,
        ComputeOp::Filter,
        ComputeOp::Sort,
        ComputeOp::Merge,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::NormalizePrices => "normalize_prices",
            Self::MarginCalculation => "margin_calculation",
            Self::Filter => "filter",
            Self::Sort => "sort",
            Self::Merge => "merge",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.as_str() == name)
    }
}

/// Actions supported by store steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreAction {
    Write,
    Read,
}

impl StoreAction {
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "write" => Some(Self::Write),
            "read" => Some(Self::Read),
            _ => None,
        }
    }
}

/// Whether `selector` is a well-formed `css:`/`xpath:`/`regex:` selector.
pub fn is_valid_selector(selector: &str) -> bool {
    SELECTOR_RE.is_match(selector)
}

/// Validate every step, returning all violations found (empty when valid).
pub fn validate_steps(steps: &[PlanStep]) -> Vec<Violation> {
    let mut violations = Vec::new();
    for (index, step) in steps.iter().enumerate() {
        let mut check = StepCheck {
            step: index,
            args: &step.args,
            violations: &mut violations,
        };
        match StepKind::from_tool_name(&step.with) {
            Some(StepKind::Search) => check.search(),
            Some(StepKind::Fetch) => check.fetch(),
            Some(StepKind::Parse) => check.parse(),
            Some(StepKind::Compute) => check.compute(),
            Some(StepKind::Store) => check.store(),
            None => check.fail(format!(
                "\"{}\" matches no step shape (expected one of {})",
                step.with,
                StepKind::ALL
                    .iter()
                    .map(|k| k.tool_name())
                    .collect::<Vec<_>>()
                    .join(", ")
            )),
        }
    }
    violations
}

struct StepCheck<'a> {
    step: usize,
    args: &'a Map<String, Value>,
    violations: &'a mut Vec<Violation>,
}

impl<'a> StepCheck<'a> {
    fn fail(&mut self, message: impl Into<String>) {
        self.violations.push(Violation {
            step: Some(self.step),
            message: message.into(),
        });
    }

    /// Fetch a required argument, recording a violation when absent.
    fn required(&mut self, name: &str) -> Option<&'a Value> {
        let value = self.args.get(name);
        if value.is_none() {
            self.fail(format!("missing required argument \"{name}\""));
        }
        value
    }

    fn required_str(&mut self, name: &str) -> Option<&'a str> {
        let value = self.required(name)?;
        match value.as_str() {
            Some(s) => Some(s),
            None => {
                self.fail(format!("\"{name}\" must be a string"));
                None
            }
        }
    }

    fn search(&mut self) {
        self.required_str("query");
        if let Some(top_k) = self.required("top_k") {
            match top_k.as_i64() {
                Some(k) if TOP_K_RANGE.contains(&k) => {}
                Some(k) => self.fail(format!(
                    "\"top_k\" must be between {} and {}, got {k}",
                    TOP_K_RANGE.start(),
                    TOP_K_RANGE.end()
                )),
                None => self.fail("\"top_k\" must be an integer"),
            }
        }
    }

    fn fetch(&mut self) {
        if let Some(url) = self.required_str("url") {
            if let Err(e) = url::Url::parse(url) {
                self.fail(format!("\"url\" is not a well-formed URI ({url}): {e}"));
            }
        }
    }

    fn parse(&mut self) {
        if let Some(raw) = self.required("raw") {
            self.pointer("raw", raw);
        }
        if let Some(schema) = self.required("schema") {
            match schema.as_object() {
                Some(map) => {
                    for (key, selector) in map {
                        match selector.as_str() {
                            Some(s) if is_valid_selector(s) => {}
                            Some(s) => self.fail(format!(
                                "schema \"{key}\": selector \"{s}\" must start with css:, xpath: or regex:"
                            )),
                            None => self.fail(format!("schema \"{key}\": selector must be a string")),
                        }
                    }
                }
                None => self.fail("\"schema\" must be an object of selectors"),
            }
        }
    }

    fn compute(&mut self) {
        let op = self.required_str("op").and_then(|name| match ComputeOp::parse(name) {
            Some(op) => Some(op),
            None => {
                self.fail(format!(
                    "\"op\" must be one of {}, got \"{name}\"",
                    ComputeOp::ALL.map(ComputeOp::as_str).join(", ")
                ));
                None
            }
        });

        if let Some(inputs) = self.required("inputs") {
            match inputs.as_array() {
                Some(items) => {
                    for (i, item) in items.iter().enumerate() {
                        self.pointer(&format!("inputs[{i}]"), item);
                    }
                }
                None => self.fail("\"inputs\" must be an array of pointers"),
            }
        }

        let args = self.args;
        match args.get("params") {
            None => {}
            Some(Value::Object(params)) => {
                if op == Some(ComputeOp::Filter) {
                    if let Some(predicate) = params.get("predicate") {
                        if let Err(e) = Predicate::from_value(predicate) {
                            self.fail(format!("\"params.predicate\": {e}"));
                        }
                    }
                }
            }
            Some(_) => self.fail("\"params\" must be an object"),
        }
    }

    fn store(&mut self) {
        if let Some(action) = self.required_str("action") {
            if StoreAction::parse(action).is_none() {
                self.fail(format!("\"action\" must be \"write\" or \"read\", got \"{action}\""));
            }
        }
        self.required_str("key");
    }

    fn pointer(&mut self, name: &str, value: &Value) {
        match Pointer::detect(value) {
            Some(Ok(_)) => {}
            Some(Err(e)) => self.fail(format!("\"{name}\": {e}")),
            None => self.fail(format!(
                "\"{name}\" must be a pointer {{\"from\": <step>, \"field\": <path>}}"
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn step(with: &str, args: Value) -> PlanStep {
        PlanStep {
            step: String::new(),
            with: with.into(),
            args: args.as_object().cloned().unwrap_or_default(),
        }
    }

    #[test]
    fn accepts_each_shape() {
        let steps = vec![
            step("Searcher", json!({"query": "cars", "top_k": 3})),
            step("Fetcher", json!({"url": "https://example.com/a"})),
            step(
                "Parser",
                json!({"raw": {"from": 1, "field": "content"}, "schema": {"title": "css:h1"}}),
            ),
            step(
                "Compute",
                json!({"op": "filter", "inputs": [{"from": 2, "field": ""}],
                       "params": {"predicate": {"exists": {"field": "title"}}}}),
            ),
            step("Store", json!({"action": "write", "key": "deals"})),
        ];
        assert!(validate_steps(&steps).is_empty());
    }

    #[test]
    fn top_k_bounds() {
        for (k, ok) in [(0, false), (1, true), (20, true), (21, false)] {
            let v = validate_steps(&[step("Searcher", json!({"query": "q", "top_k": k}))]);
            assert_eq!(v.is_empty(), ok, "top_k = {k}");
        }
        let v = validate_steps(&[step("Searcher", json!({"query": "q", "top_k": "3"}))]);
        assert_eq!(v.len(), 1);
    }

    #[test]
    fn rejects_malformed_url() {
        let v = validate_steps(&[step("Fetcher", json!({"url": "not a uri"}))]);
        assert_eq!(v.len(), 1);
        assert_eq!(v[0].step, Some(0));
    }

    #[test]
    fn parse_requires_pointer_and_prefixed_selectors() {
        let v = validate_steps(&[step(
            "Parser",
            json!({"raw": "<html/>", "schema": {"t": "h1", "u": "css:"}}),
        )]);
        assert_eq!(v.len(), 3);
    }

    #[test]
    fn compute_constraints() {
        let v = validate_steps(&[step(
            "Compute",
            json!({"op": "explode", "inputs": [{"from": 0, "field": "x", "extra": 1}]}),
        )]);
        assert_eq!(v.len(), 2);

        let v = validate_steps(&[step(
            "Compute",
            json!({"op": "filter", "inputs": [], "params": {"predicate": "item > 3"}}),
        )]);
        assert_eq!(v.len(), 1);
    }

    #[test]
    fn store_action_enum() {
        assert!(validate_steps(&[step("Store", json!({"action": "read", "key": "k"}))]).is_empty());
        assert_eq!(
            validate_steps(&[step("Store", json!({"action": "delete", "key": "k"}))]).len(),
            1
        );
    }

    #[test]
    fn unknown_tool_matches_no_shape() {
        let v = validate_steps(&[step("Teleporter", json!({}))]);
        assert_eq!(v.len(), 1);
        assert!(v[0].message.contains("matches no step shape"));
    }

    #[test]
    fn selector_pattern() {
        assert!(is_valid_selector("regex:\\d+"));
        assert!(is_valid_selector("xpath://h1"));
        assert!(!is_valid_selector("css:"));
        assert!(!is_valid_selector("jq:.a"));
    }
}
