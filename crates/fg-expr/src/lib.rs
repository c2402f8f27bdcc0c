// SPDX-License-Identifier: MIT OR Apache-2.0
//! fg-expr
#![deny(unsafe_code)]
#![warn(missing_docs)]
//!
//! The small, non-Turing-complete expression language used by the mapping
//! layer.  An expression is one of:
//!
//! - `'...'` — a single-quoted string literal (no escapes)
//! - `42` / `-7` — a 64-bit signed integer
//! - `3.25` — a 64-bit float
//! - `input.<path>` / `workflow.<path>` — dotted navigation into a nested map
//! - `route.<name>` — a flat route-parameter lookup
//! - `context.<leaf>` — one of `subject_id`, `tenant_id`, `partition_id`,
//!   `email`
//!
//! Syntax grows only by enumerated prefixes; there is no user-extensible
//! grammar.

use fg_core::RequestContext;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Errors produced while resolving an expression.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExprError {
    /// The expression matches no recognized shape.
    #[error("unrecognized expression '{0}'")]
    Unrecognized(String),
    /// The referenced source was not provided for this request.
    #[error("expression '{expr}' references unavailable source '{source_kind}'")]
    SourceUnavailable {
        /// The full expression.
        expr: String,
        /// The missing source prefix.
        source_kind: &'static str,
    },
    /// The dotted path does not exist in the source.
    #[error("expression '{expr}' resolves to no value (missing '{segment}')")]
    PathMissing {
        /// The full expression.
        expr: String,
        /// The first path segment that failed to resolve.
        segment: String,
    },
    /// `context.` was followed by an unknown leaf.
    #[error("unknown context field '{0}' (expected subject_id, tenant_id, partition_id, or email)")]
    UnknownContextField(String),
}

/// The per-request sources an expression may read.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sources<'a> {
    /// User-entered input fields.
    pub input: Option<&'a Map<String, Value>>,
    /// Flat route parameters.
    pub route: Option<&'a BTreeMap<String, String>>,
    /// The request context.
    pub context: Option<&'a RequestContext>,
    /// Accumulated workflow state.
    pub workflow: Option<&'a Map<String, Value>>,
}

impl<'a> Sources<'a> {
    /// Sources for a plain command execution (no workflow state).
    pub fn for_command(
        input: &'a Map<String, Value>,
        route: &'a BTreeMap<String, String>,
        context: &'a RequestContext,
    ) -> Self {
        Self {
            input: Some(input),
            route: Some(route),
            context: Some(context),
            workflow: None,
        }
    }

    /// Sources for a workflow step invocation: the accumulated state doubles
    /// as the `input` source so step mappings can use either prefix.
    pub fn for_workflow(state: &'a Map<String, Value>, context: &'a RequestContext) -> Self {
        Self {
            input: Some(state),
            route: None,
            context: Some(context),
            workflow: Some(state),
        }
    }
}

/// Resolve `expr` against `sources`.
///
/// Leading and trailing whitespace is trimmed.  Unknown shapes, unavailable
/// sources, and missing paths are all errors; mapping callers surface them
/// as BAD_REQUEST.
pub fn resolve(expr: &str, sources: &Sources<'_>) -> Result<Value, ExprError> {
    let trimmed = expr.trim();

    if let Some(lit) = parse_string_literal(trimmed) {
        return Ok(Value::String(lit.to_string()));
    }
    if let Some(v) = parse_number(trimmed) {
        return Ok(v);
    }

    if let Some(path) = trimmed.strip_prefix("input.") {
        let map = sources.input.ok_or(ExprError::SourceUnavailable {
            expr: trimmed.to_string(),
            source_kind: "input",
        })?;
        return navigate(map, path, trimmed);
    }
    if let Some(path) = trimmed.strip_prefix("workflow.") {
        let map = sources.workflow.ok_or(ExprError::SourceUnavailable {
            expr: trimmed.to_string(),
            source_kind: "workflow",
        })?;
        return navigate(map, path, trimmed);
    }
    if let Some(name) = trimmed.strip_prefix("route.") {
        let route = sources.route.ok_or(ExprError::SourceUnavailable {
            expr: trimmed.to_string(),
            source_kind: "route",
        })?;
        return route
            .get(name)
            .map(|v| Value::String(v.clone()))
            .ok_or_else(|| ExprError::PathMissing {
                expr: trimmed.to_string(),
                segment: name.to_string(),
            });
    }
    if let Some(field) = trimmed.strip_prefix("context.") {
        let rctx = sources.context.ok_or(ExprError::SourceUnavailable {
            expr: trimmed.to_string(),
            source_kind: "context",
        })?;
        return resolve_context_field(rctx, field, trimmed);
    }

    Err(ExprError::Unrecognized(trimmed.to_string()))
}

/// String-coerce a resolved value for use as a path/query/header parameter.
///
/// Strings pass through unquoted; everything else uses its JSON rendering.
pub fn coerce_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn parse_string_literal(s: &str) -> Option<&str> {
    let inner = s.strip_prefix('\'')?.strip_suffix('\'')?;
    // No escapes: an interior quote means this was not a single literal.
    if inner.contains('\'') {
        return None;
    }
    Some(inner)
}

fn parse_number(s: &str) -> Option<Value> {
    let body = s.strip_prefix(['+', '-']).unwrap_or(s);
    if body.is_empty() || !body.chars().all(|c| c.is_ascii_digit() || c == '.') {
        return None;
    }
    match body.matches('.').count() {
        0 => s.parse::<i64>().ok().map(Value::from),
        1 if !body.starts_with('.') && !body.ends_with('.') => {
            s.parse::<f64>().ok().map(Value::from)
        }
        _ => None,
    }
}

fn navigate(map: &Map<String, Value>, path: &str, expr: &str) -> Result<Value, ExprError> {
    let mut current = Value::Object(map.clone());
    for segment in path.split('.') {
        current = match current {
            Value::Object(ref obj) => match obj.get(segment) {
                Some(v) => v.clone(),
                None => {
                    return Err(ExprError::PathMissing {
                        expr: expr.to_string(),
                        segment: segment.to_string(),
                    });
                }
            },
            _ => {
                return Err(ExprError::PathMissing {
                    expr: expr.to_string(),
                    segment: segment.to_string(),
                });
            }
        };
    }
    Ok(current)
}

fn resolve_context_field(
    rctx: &RequestContext,
    field: &str,
    expr: &str,
) -> Result<Value, ExprError> {
    match field {
        "subject_id" => Ok(Value::String(rctx.subject_id.clone())),
        "tenant_id" => Ok(Value::String(rctx.tenant_id.clone())),
        "partition_id" => rctx
            .partition_id
            .clone()
            .map(Value::String)
            .ok_or_else(|| ExprError::PathMissing {
                expr: expr.to_string(),
                segment: "partition_id".to_string(),
            }),
        "email" => rctx
            .email
            .clone()
            .map(Value::String)
            .ok_or_else(|| ExprError::PathMissing {
                expr: expr.to_string(),
                segment: "email".to_string(),
            }),
        other => Err(ExprError::UnknownContextField(other.to_string())),
    }
}
