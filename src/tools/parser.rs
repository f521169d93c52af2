//! HTML extraction tool using the `scraper` crate.
//!
//! `args.schema` maps output keys to selectors:
//! - `css:<selector>`: trimmed text of the first matching element.
//! - `xpath:<path>`: a small XPath subset, translated to a CSS selector.
//! - `regex:<pattern>`: the first match in the raw document.
//!
//! A selector that matches nothing yields `null` for its key.

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use serde_json::{Map, Value};

use crate::context::ExecutionContext;
use crate::error::{ToolError, ToolResult};
use crate::tool::{Tool, ToolArgs};

const NAME: &str = "Parser";

/// Extract fields from raw HTML.
#[derive(Debug, Clone, Default)]
pub struct Parser;

impl Tool for Parser {
    fn name(&self) -> &str {
        NAME
    }

    fn description(&self) -> &str {
        "Extract fields from HTML (args: raw, schema of css:/xpath:/regex: selectors)."
    }

    fn run(&self, args: &ToolArgs, _context: &mut ExecutionContext) -> ToolResult<Value> {
        let raw = args.require_str("raw", NAME)?;
        let schema = args.require_object("schema", NAME)?;
        let document = Html::parse_document(raw);

        let mut result = Map::new();
        for (key, selector) in schema {
            let selector = selector.as_str().ok_or_else(|| ToolError::InvalidArg {
                tool: NAME.into(),
                arg: format!("schema.{key}"),
                message: "selector must be a string".into(),
            })?;
            result.insert(key.clone(), extract(&document, raw, selector)?);
        }
        Ok(Value::Object(result))
    }
}

fn extract(document: &Html, raw: &str, selector: &str) -> ToolResult<Value> {
    if let Some(css) = selector.strip_prefix("css:") {
        let parsed = parse_css(selector, css)?;
        Ok(document
            .select(&parsed)
            .next()
            .map(|el| Value::String(element_text(el)))
            .unwrap_or(Value::Null))
    } else if let Some(path) = selector.strip_prefix("xpath:") {
        let query = XPathQuery::translate(path).map_err(|message| ToolError::Selector {
            selector: selector.into(),
            message,
        })?;
        let parsed = parse_css(selector, &query.css)?;
        Ok(match document.select(&parsed).next() {
            None => Value::Null,
            Some(el) => match &query.target {
                XPathTarget::Text => Value::String(element_text(el)),
                XPathTarget::Attr(name) => el
                    .value()
                    .attr(name)
                    .map(|v| Value::String(v.to_string()))
                    .unwrap_or(Value::Null),
            },
        })
    } else if let Some(pattern) = selector.strip_prefix("regex:") {
        let re = Regex::new(pattern).map_err(|e| ToolError::Selector {
            selector: selector.into(),
            message: e.to_string(),
        })?;
        Ok(re
            .find(raw)
            .map(|m| Value::String(m.as_str().to_string()))
            .unwrap_or(Value::Null))
    } else {
        Err(ToolError::Selector {
            selector: selector.into(),
            message: "unknown selector prefix".into(),
        })
    }
}

fn parse_css(selector: &str, css: &str) -> ToolResult<Selector> {
    Selector::parse(css).map_err(|e| ToolError::Selector {
        selector: selector.into(),
        message: e.to_string(),
    })
}

/// Text content with whitespace-only fragments dropped and the rest trimmed.
fn element_text(el: ElementRef<'_>) -> String {
    el.text()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

// ---------------------------------------------------------------------------
// XPath subset
// ---------------------------------------------------------------------------

/// What an XPath expression selects from its element.
#[derive(Debug, Clone, PartialEq, Eq)]
enum XPathTarget {
    Text,
    Attr(String),
}

/// An XPath expression rewritten as a CSS selector plus a target.
///
/// Supported: `/a/b` and `//a//b` element steps, `*`, predicates
/// `[n]`, `[@x]`, `[@x='v']` and `[contains(@x,'v')]`, and a trailing
/// `text()` or `@attr` step.
#[derive(Debug, Clone, PartialEq, Eq)]
struct XPathQuery {
    css: String,
    target: XPathTarget,
}

impl XPathQuery {
    fn translate(expr: &str) -> Result<Self, String> {
        let mut rest = expr.trim();
        if !rest.starts_with('/') {
            return Err("path must start with / or //".into());
        }

        let mut css = String::new();
        let mut target = XPathTarget::Text;
        while !rest.is_empty() {
            let descendant = if let Some(r) = rest.strip_prefix("//") {
                rest = r;
                true
            } else if let Some(r) = rest.strip_prefix('/') {
                rest = r;
                false
            } else {
                return Err(format!("unexpected \"{rest}\""));
            };

            let end = step_end(rest)?;
            let step = &rest[..end];
            rest = &rest[end..];

            if step == "text()" || step.starts_with('@') {
                if !rest.is_empty() {
                    return Err(format!("\"{step}\" must be the last step"));
                }
                if let Some(attr) = step.strip_prefix('@') {
                    if !is_name(attr) {
                        return Err(format!("invalid attribute name \"{attr}\""));
                    }
                    target = XPathTarget::Attr(attr.to_string());
                }
                break;
            }

            let compiled = translate_step(step)?;
            if !css.is_empty() {
                css.push_str(if descendant { " " } else { " > " });
            }
            css.push_str(&compiled);
        }

        if css.is_empty() {
            return Err("path selects no element".into());
        }
        Ok(Self { css, target })
    }
}

/// Byte index of the next `/` outside brackets and quotes.
fn step_end(rest: &str) -> Result<usize, String> {
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    for (i, c) in rest.char_indices() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '\'' | '"') => quote = Some(c),
            (None, '[') => depth += 1,
            (None, ']') => depth = depth.checked_sub(1).ok_or("unbalanced ]")?,
            (None, '/') if depth == 0 => return Ok(i),
            _ => {}
        }
    }
    if depth != 0 || quote.is_some() {
        return Err("unterminated predicate".into());
    }
    Ok(rest.len())
}

fn translate_step(step: &str) -> Result<String, String> {
    let name_end = step.find('[').unwrap_or(step.len());
    let name = &step[..name_end];
    if name != "*" && !is_name(name) {
        return Err(format!("invalid element step \"{step}\""));
    }
    let mut css = name.to_string();

    let mut preds = &step[name_end..];
    while !preds.is_empty() {
        let close = closing_bracket(preds).ok_or("unterminated predicate")?;
        let inner = preds[1..close].trim();
        css.push_str(&translate_predicate(inner)?);
        preds = &preds[close + 1..];
        if !preds.is_empty() && !preds.starts_with('[') {
            return Err(format!("unexpected \"{preds}\" in step \"{step}\""));
        }
    }
    Ok(css)
}

/// Index of the `]` closing the predicate that opens `preds`, skipping quoted text.
fn closing_bracket(preds: &str) -> Option<usize> {
    let mut quote: Option<char> = None;
    for (i, c) in preds.char_indices().skip(1) {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '\'' | '"') => quote = Some(c),
            (None, ']') => return Some(i),
            _ => {}
        }
    }
    None
}

fn translate_predicate(inner: &str) -> Result<String, String> {
    if let Ok(n) = inner.parse::<usize>() {
        if n == 0 {
            return Err("positions start at 1".into());
        }
        return Ok(format!(":nth-of-type({n})"));
    }
    if let Some(args) = inner
        .strip_prefix("contains(")
        .and_then(|s| s.strip_suffix(')'))
    {
        let (attr, value) = args.split_once(',').ok_or("contains() takes two arguments")?;
        let attr = attr.trim().strip_prefix('@').ok_or("contains() needs an @attribute")?;
        let value = unquote(value.trim())?;
        if !is_name(attr) {
            return Err(format!("invalid attribute name \"{attr}\""));
        }
        return Ok(format!("[{attr}*=\"{}\"]", escape(value)));
    }
    if let Some(attr) = inner.strip_prefix('@') {
        return match attr.split_once('=') {
            None if is_name(attr.trim()) => Ok(format!("[{}]", attr.trim())),
            None => Err(format!("invalid attribute name \"{attr}\"")),
            Some((name, value)) => {
                let name = name.trim();
                if !is_name(name) {
                    return Err(format!("invalid attribute name \"{name}\""));
                }
                let value = unquote(value.trim())?;
                Ok(format!("[{name}=\"{}\"]", escape(value)))
            }
        };
    }
    Err(format!("unsupported predicate \"[{inner}]\""))
}

fn unquote(s: &str) -> Result<&str, String> {
    s.strip_prefix('\'')
        .and_then(|r| r.strip_suffix('\''))
        .or_else(|| s.strip_prefix('"').and_then(|r| r.strip_suffix('"')))
        .ok_or_else(|| format!("expected a quoted string, got {s}"))
}

fn escape(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

fn is_name(s: &str) -> bool {
    let mut chars = s.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == ':')
}
