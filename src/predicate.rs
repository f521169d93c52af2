//! A restricted predicate language for the `filter` compute op.
//!
//! Predicates are plain JSON data, never evaluated code:
//!
//! ```json
//! {"all": [
//!     {"compare": {"field": "price", "op": "lt", "value": 20000}},
//!     {"not": {"compare": {"field": "make", "op": "eq", "value": "Lada"}}},
//!     {"exists": {"field": "vin"}}
//! ]}
//! ```
//!
//! Field paths use the same syntax as pointer fields (`a.b[0].c`).

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::plan::pointer::FieldPath;

/// Comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    /// Substring for strings, membership for arrays, key presence for objects.
    Contains,
}

/// A boolean test over one item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Predicate {
    /// True when every child holds (true for an empty list).
    All(Vec<Predicate>),
    /// True when some child holds (false for an empty list).
    Any(Vec<Predicate>),
    Not(Box<Predicate>),
    /// True when the field path resolves.
    Exists { field: String },
    Compare {
        field: String,
        op: CompareOp,
        value: Value,
    },
}

impl Predicate {
    /// Parse a predicate from its JSON form.
    pub fn from_value(value: &Value) -> Result<Self, String> {
        serde_json::from_value(value.clone()).map_err(|e| format!("invalid predicate: {e}"))
    }

    /// Evaluate against an item. A missing field makes a comparison false.
    pub fn evaluate(&self, item: &Value) -> bool {
        match self {
            Self::All(children) => children.iter().all(|p| p.evaluate(item)),
            Self::Any(children) => children.iter().any(|p| p.evaluate(item)),
            Self::Not(inner) => !inner.evaluate(item),
            Self::Exists { field } => FieldPath::parse(field).walk(item).is_ok(),
            Self::Compare { field, op, value } => match FieldPath::parse(field).walk(item) {
                Ok(actual) => compare(actual, *op, value),
                Err(_) => false,
            },
        }
    }
}

fn compare(actual: &Value, op: CompareOp, expected: &Value) -> bool {
    match op {
        CompareOp::Eq => loosely_equal(actual, expected),
        CompareOp::Ne => !loosely_equal(actual, expected),
        CompareOp::Lt => order(actual, expected) == Some(Ordering::Less),
        CompareOp::Le => matches!(
            order(actual, expected),
            Some(Ordering::Less | Ordering::Equal)
        ),
        CompareOp::Gt => order(actual, expected) == Some(Ordering::Greater),
        CompareOp::Ge => matches!(
            order(actual, expected),
            Some(Ordering::Greater | Ordering::Equal)
        ),
        CompareOp::Contains => match (actual, expected) {
            (Value::String(haystack), Value::String(needle)) => haystack.contains(needle.as_str()),
            (Value::Array(items), needle) => items.iter().any(|v| loosely_equal(v, needle)),
            (Value::Object(map), Value::String(key)) => map.contains_key(key),
            _ => false,
        },
    }
}

/// JSON equality, except that numbers compare by value (`1 == 1.0`).
fn loosely_equal(a: &Value, b: &Value) -> bool {
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) if a.is_number() && b.is_number() => x == y,
        _ => a == b,
    }
}

/// Ordering between two numbers or two strings; anything else is unordered.
pub(crate) fn order(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        _ => None,
    }
}
