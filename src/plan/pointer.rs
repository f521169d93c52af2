//! Pointers: references from a step's arguments into an earlier step's result.
//!
//! A pointer is written `{"from": <step index>, "field": "<path>"}`. The path
//! uses `.` for object keys and `[n]` (or a bare `n`) for array indices; an
//! empty path selects the whole result.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use thiserror::Error;

/// A reference to a field of a previously completed step's result.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Pointer {
    /// Index of the referenced step.
    pub from: u64,
    /// Path into the referenced result.
    pub field: String,
}

impl Pointer {
    pub fn new(from: u64, field: impl Into<String>) -> Self {
        Self {
            from,
            field: field.into(),
        }
    }

    /// Whether `value` has the pointer shape: an object whose key set is
    /// exactly `{from, field}`. Types of the two members are not checked.
    pub fn is_pointer_shape(value: &Value) -> bool {
        match value {
            Value::Object(map) => {
                map.len() == 2 && map.contains_key("from") && map.contains_key("field")
            }
            _ => false,
        }
    }

    /// Recognize a pointer. Returns `None` for literals, and an error when the
    /// key set matches but `from` or `field` has the wrong type.
    pub fn detect(value: &Value) -> Option<Result<Self, ResolveError>> {
        if !Self::is_pointer_shape(value) {
            return None;
        }
        let from = value.get("from").and_then(Value::as_u64);
        let field = value.get("field").and_then(Value::as_str);
        Some(match (from, field) {
            (Some(from), Some(field)) => Ok(Self::new(from, field)),
            (None, _) => Err(ResolveError::Malformed {
                reason: "`from` must be a non-negative integer".into(),
            }),
            (_, None) => Err(ResolveError::Malformed {
                reason: "`field` must be a string".into(),
            }),
        })
    }

    /// The JSON document form of this pointer.
    pub fn to_value(&self) -> Value {
        json!({ "from": self.from, "field": self.field })
    }

    /// Resolve against the results of the steps completed so far.
    ///
    /// `trace` holds only completed steps, so a pointer at the current step or
    /// any later one is always out of range.
    pub fn resolve(&self, trace: &[Value]) -> Result<Value, ResolveError> {
        let index = usize::try_from(self.from).unwrap_or(usize::MAX);
        let root = trace.get(index).ok_or(ResolveError::OutOfRange {
            from: self.from,
            trace_len: trace.len(),
        })?;
        let path = FieldPath::parse(&self.field);
        path.walk(root).cloned()
    }
}

impl From<Pointer> for Value {
    fn from(pointer: Pointer) -> Self {
        pointer.to_value()
    }
}

/// Why a pointer could not be resolved.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    #[error("step {from} is not in a trace of length {trace_len}")]
    OutOfRange { from: u64, trace_len: usize },

    #[error("{reason}")]
    Field { reason: String },

    #[error("malformed pointer: {reason}")]
    Malformed { reason: String },
}

/// One step of a field path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// A purely numeric segment: indexes an array.
    Index(usize),
    /// Anything else: indexes an object by key.
    Key(String),
}

impl std::fmt::Display for Segment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Index(i) => write!(f, "[{i}]"),
            Self::Key(k) => write!(f, "{k}"),
        }
    }
}

/// A parsed pointer path such as `items[0].price`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FieldPath {
    segments: Vec<Segment>,
}

impl FieldPath {
    /// Parse a path. `[k]` is equivalent to a `.k` segment; empty segments are
    /// skipped, so `""` is the empty path.
    pub fn parse(field: &str) -> Self {
        let normalized = field.replace('[', ".").replace(']', "");
        let segments = normalized
            .split('.')
            .filter(|part| !part.is_empty())
            .map(|part| {
                if part.bytes().all(|b| b.is_ascii_digit()) {
                    part.parse::<usize>()
                        .map(Segment::Index)
                        .unwrap_or_else(|_| Segment::Key(part.to_string()))
                } else {
                    Segment::Key(part.to_string())
                }
            })
            .collect();
        Self { segments }
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Walk the path from `root`, failing on the first inapplicable or absent segment.
    pub fn walk<'a>(&self, root: &'a Value) -> Result<&'a Value, ResolveError> {
        let mut current = root;
        for (depth, segment) in self.segments.iter().enumerate() {
            current = match (segment, current) {
                (Segment::Index(i), Value::Array(items)) => {
                    items.get(*i).ok_or_else(|| ResolveError::Field {
                        reason: format!(
                            "index {i} out of bounds (length {}) at segment {depth}",
                            items.len()
                        ),
                    })?
                }
                (Segment::Key(key), Value::Object(map)) => {
                    map.get(key).ok_or_else(|| ResolveError::Field {
                        reason: format!("missing key \"{key}\" at segment {depth}"),
                    })?
                }
                (segment, other) => {
                    return Err(ResolveError::Field {
                        reason: format!(
                            "segment {depth} ({segment}) cannot index a {}",
                            type_name(other)
                        ),
                    });
                }
            };
        }
        Ok(current)
    }
}

/// Short JSON type name for diagnostics.
pub(crate) fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_exact_shape_only() {
        assert!(Pointer::is_pointer_shape(&json!({"from": 0, "field": "x"})));
        assert!(!Pointer::is_pointer_shape(
            &json!({"from": 0, "field": "x", "extra": 1})
        ));
        assert!(!Pointer::is_pointer_shape(&json!({"from": 0})));
        assert!(!Pointer::is_pointer_shape(&json!([0, "x"])));
        assert!(Pointer::detect(&json!("literal")).is_none());
    }

    #[test]
    fn detect_reports_malformed_members() {
        let bad_from = Pointer::detect(&json!({"from": -1, "field": ""})).unwrap();
        assert!(matches!(bad_from, Err(ResolveError::Malformed { .. })));
        let bad_field = Pointer::detect(&json!({"from": 0, "field": 3})).unwrap();
        assert!(matches!(bad_field, Err(ResolveError::Malformed { .. })));
    }

    #[test]
    fn parses_dotted_and_bracketed_paths() {
        let a = FieldPath::parse("items[0].price");
        let b = FieldPath::parse("items.0.price");
        assert_eq!(a, b);
        assert_eq!(
            a.segments(),
            &[
                Segment::Key("items".into()),
                Segment::Index(0),
                Segment::Key("price".into())
            ]
        );
        assert!(FieldPath::parse("").is_empty());
    }

    #[test]
    fn resolves_whole_value_for_empty_field() {
        let trace = vec![json!([{"url": "u0"}])];
        let value = Pointer::new(0, "").resolve(&trace).unwrap();
        assert_eq!(value, json!([{"url": "u0"}]));
    }

    #[test]
    fn resolves_nested_path() {
        let trace = vec![json!({"content": "<h1>x</h1>"}), json!([{"url": "u0"}, {"url": "u1"}])];
        assert_eq!(
            Pointer::new(0, "content").resolve(&trace).unwrap(),
            json!("<h1>x</h1>")
        );
        assert_eq!(
            Pointer::new(1, "[1].url").resolve(&trace).unwrap(),
            json!("u1")
        );
    }

    #[test]
    fn out_of_range_includes_equal_index() {
        let trace = vec![json!(1), json!(2)];
        assert_eq!(
            Pointer::new(2, "").resolve(&trace),
            Err(ResolveError::OutOfRange {
                from: 2,
                trace_len: 2
            })
        );
        assert!(matches!(
            Pointer::new(5, "").resolve(&trace),
            Err(ResolveError::OutOfRange { .. })
        ));
    }

    #[test]
    fn field_errors_for_shape_and_absence() {
        let trace = vec![json!({"items": [1, 2]})];
        for field in ["missing", "items.5", "items.key", "items.0.deeper"] {
            assert!(
                matches!(
                    Pointer::new(0, field).resolve(&trace),
                    Err(ResolveError::Field { .. })
                ),
                "field {field} should fail"
            );
        }
    }

    #[test]
    fn numeric_segment_does_not_index_objects() {
        let trace = vec![json!({"0": "zero"})];
        assert!(Pointer::new(0, "0").resolve(&trace).is_err());
    }
}
