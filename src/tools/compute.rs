//! Compute tool: data operations over earlier step results.
//!
//! `args.inputs` is an array of pointers. The executor only substitutes
//! top-level arguments, so this tool resolves its own inputs against the
//! run's trace, which it reads through the context.

use std::cmp::Ordering;

use serde_json::{Map, Value, json};

use crate::context::ExecutionContext;
use crate::error::{ToolError, ToolResult};
use crate::plan::pointer::{FieldPath, Pointer, ResolveError, type_name};
use crate::plan::schema::ComputeOp;
use crate::predicate::{Predicate, order};
use crate::tool::{Tool, ToolArgs};

const NAME: &str = "Compute";

/// Run one of the built-in data operations.
#[derive(Debug, Clone, Default)]
pub struct Compute;

impl Tool for Compute {
    fn name(&self) -> &str {
        NAME
    }

    fn description(&self) -> &str {
        "Data operations over step results (args: op, inputs, params)."
    }

    fn run(&self, args: &ToolArgs, context: &mut ExecutionContext) -> ToolResult<Value> {
        let op_name = args.require_str("op", NAME)?;
        let op = ComputeOp::parse(op_name).ok_or_else(|| ToolError::InvalidArg {
            tool: NAME.into(),
            arg: "op".into(),
            message: format!("unknown op \"{op_name}\""),
        })?;
        let inputs = resolve_inputs(args, context.run_trace())?;
        let empty = Map::new();
        let params = match args.get("params") {
            None => &empty,
            Some(Value::Object(map)) => map,
            Some(_) => {
                return Err(ToolError::InvalidArg {
                    tool: NAME.into(),
                    arg: "params".into(),
                    message: "expected an object".into(),
                });
            }
        };

        let result = match op {
            ComputeOp::NormalizePrices => normalize_prices(&inputs),
            ComputeOp::MarginCalculation => margin_calculation(&inputs),
            ComputeOp::Filter => filter(&inputs, params),
            ComputeOp::Sort => sort(&inputs, params),
            ComputeOp::Merge => merge(&inputs),
        };
        result.map_err(|message| ToolError::Compute {
            op: op.as_str().into(),
            message,
        })
    }
}

/// Resolve each pointer in `inputs`; literal entries pass through.
fn resolve_inputs(args: &ToolArgs, trace: &[Value]) -> ToolResult<Vec<Value>> {
    let inputs = match args.get("inputs") {
        None => return Ok(Vec::new()),
        Some(Value::Array(items)) => items,
        Some(_) => {
            return Err(ToolError::InvalidArg {
                tool: NAME.into(),
                arg: "inputs".into(),
                message: "expected an array".into(),
            });
        }
    };

    inputs
        .iter()
        .enumerate()
        .map(|(i, value)| match Pointer::detect(value) {
            None => Ok(value.clone()),
            Some(pointer) => pointer
                .and_then(|p| p.resolve(trace))
                .map_err(|e| match e {
                    ResolveError::OutOfRange { from, trace_len } => ToolError::PointerOutOfRange {
                        tool: NAME.into(),
                        arg: format!("inputs[{i}]"),
                        from,
                        trace_len,
                    },
                    other => ToolError::InvalidArg {
                        tool: NAME.into(),
                        arg: format!("inputs[{i}]"),
                        message: other.to_string(),
                    },
                }),
        })
        .collect()
}

/// Arrays contribute their elements; other values contribute themselves.
fn flatten(inputs: &[Value]) -> Vec<&Value> {
    inputs
        .iter()
        .flat_map(|v| match v {
            Value::Array(items) => items.iter().collect::<Vec<_>>(),
            other => vec![other],
        })
        .collect()
}

/// Parse a price such as `"$12,500"`, `" 99.5 "` or `42`.
fn parse_price(value: &Value) -> Result<f64, String> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s
            .chars()
            .filter(|c| !matches!(c, '$' | ',') && !c.is_whitespace())
            .collect::<String>()
            .parse::<f64>()
            .ok(),
        _ => None,
    };
    parsed
        .filter(|p| p.is_finite())
        .ok_or_else(|| format!("not a price: {value}"))
}

fn normalize_prices(inputs: &[Value]) -> Result<Value, String> {
    let prices = flatten(inputs)
        .into_iter()
        .map(parse_price)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(json!(prices))
}

/// Pairwise `sell - buy` over the first two inputs.
fn margin_calculation(inputs: &[Value]) -> Result<Value, String> {
    let [buy, sell, ..] = inputs else {
        return Err(format!("expected two inputs (buy, sell), got {}", inputs.len()));
    };
    let (Value::Array(buy), Value::Array(sell)) = (buy, sell) else {
        return Err("both inputs must be arrays of prices".into());
    };
    let margins = buy
        .iter()
        .zip(sell)
        .map(|(b, s)| Ok(parse_price(s)? - parse_price(b)?))
        .collect::<Result<Vec<f64>, String>>()?;
    Ok(json!(margins))
}

fn filter(inputs: &[Value], params: &Map<String, Value>) -> Result<Value, String> {
    let predicate = params
        .get("predicate")
        .ok_or("missing params.predicate")
        .map_err(String::from)
        .and_then(Predicate::from_value)?;
    let kept = flatten(inputs)
        .into_iter()
        .filter(|item| predicate.evaluate(item))
        .cloned()
        .collect();
    Ok(Value::Array(kept))
}

fn sort(inputs: &[Value], params: &Map<String, Value>) -> Result<Value, String> {
    let key = params
        .get("key")
        .and_then(Value::as_str)
        .ok_or("missing string params.key")?;
    let descending = params
        .get("descending")
        .and_then(Value::as_bool)
        .unwrap_or(false);
    let path = FieldPath::parse(key);

    let mut keyed = flatten(inputs)
        .into_iter()
        .map(|item| {
            path.walk(item)
                .map(|k| (k, item))
                .map_err(|e| format!("item {item} has no sort key \"{key}\": {e}"))
        })
        .collect::<Result<Vec<_>, _>>()?;

    if let Some((first, _)) = keyed.first() {
        let kind = type_name(first);
        if let Some((odd, _)) = keyed
            .iter()
            .find(|(k, _)| type_name(k) != kind || !matches!(k, Value::Number(_) | Value::String(_)))
        {
            return Err(format!(
                "sort keys must be all numbers or all strings, found {kind} and {}",
                type_name(odd)
            ));
        }
    }

    keyed.sort_by(|(a, _), (b, _)| {
        let ord = order(a, b).unwrap_or(Ordering::Equal);
        if descending { ord.reverse() } else { ord }
    });
    Ok(Value::Array(
        keyed.into_iter().map(|(_, item)| item.clone()).collect(),
    ))
}

/// Left-to-right object merge; later inputs win on key conflicts.
fn merge(inputs: &[Value]) -> Result<Value, String> {
    if inputs.is_empty() {
        return Err("expected at least one object input".into());
    }
    let mut merged = Map::new();
    for (i, input) in inputs.iter().enumerate() {
        let Value::Object(map) = input else {
            return Err(format!("input {i} is a {}, expected an object", type_name(input)));
        };
        merged.extend(map.iter().map(|(k, v)| (k.clone(), v.clone())));
    }
    Ok(Value::Object(merged))
}
