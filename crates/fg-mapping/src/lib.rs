// SPDX-License-Identifier: MIT OR Apache-2.0
#![deny(unsafe_code)]
#![warn(missing_docs)]
//! The declarative binding layer between YAML mapping specs and concrete
//! backend requests.
//!
//! [`build_input`] turns an [`InputMapping`] plus per-request sources into an
//! [`InvocationInput`]; [`reverse_field_map`] recovers UI field names from a
//! body projection for error translation; [`navigate_path`] and
//! [`project_fields`] reshape response bodies.

use fg_core::{InputMapping, InvocationInput};
use fg_expr::{ExprError, Sources, coerce_to_string};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Errors produced while building an invocation input.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MappingError {
    /// A parameter expression failed to resolve.
    #[error("failed to map {kind} parameter '{name}': {source}")]
    Param {
        /// `path`, `query`, or `header`.
        kind: &'static str,
        /// Parameter name.
        name: String,
        /// Underlying expression error.
        source: ExprError,
    },
    /// A body template or projection expression failed to resolve.
    #[error("failed to map body field '{field}': {source}")]
    BodyField {
        /// Output field name.
        field: String,
        /// Underlying expression error.
        source: ExprError,
    },
    /// The mapping declares a strategy this gateway does not know.
    #[error("unknown body mapping strategy '{0}'")]
    UnknownStrategy(String),
}

// ---------------------------------------------------------------------------
// Input construction
// ---------------------------------------------------------------------------

/// Build an [`InvocationInput`] from a mapping and the request's sources.
///
/// `raw_input` is carried verbatim for schema validation and idempotency
/// hashing regardless of the body strategy.
pub fn build_input(
    mapping: &InputMapping,
    sources: &Sources<'_>,
    raw_input: &Map<String, Value>,
) -> Result<InvocationInput, MappingError> {
    let path_params = resolve_params("path", &mapping.path_params, sources)?;
    let query_params = resolve_params("query", &mapping.query_params, sources)?;
    let headers = resolve_params("header", &mapping.header_params, sources)?;
    let body = build_body(mapping, sources, raw_input)?;

    Ok(InvocationInput {
        path_params,
        query_params,
        headers,
        body,
        raw_input: raw_input.clone(),
    })
}

fn resolve_params(
    kind: &'static str,
    params: &BTreeMap<String, String>,
    sources: &Sources<'_>,
) -> Result<BTreeMap<String, String>, MappingError> {
    let mut out = BTreeMap::new();
    for (name, expr) in params {
        let value = fg_expr::resolve(expr, sources).map_err(|source| MappingError::Param {
            kind,
            name: name.clone(),
            source,
        })?;
        out.insert(name.clone(), coerce_to_string(&value));
    }
    Ok(out)
}

fn build_body(
    mapping: &InputMapping,
    sources: &Sources<'_>,
    raw_input: &Map<String, Value>,
) -> Result<Option<Value>, MappingError> {
    match mapping.body_mapping.as_deref() {
        None | Some("passthrough") => Ok(Some(Value::Object(raw_input.clone()))),
        Some("template") => {
            let mut body = Map::new();
            for (field, expr) in &mapping.body_template {
                let value =
                    fg_expr::resolve(expr, sources).map_err(|source| MappingError::BodyField {
                        field: field.clone(),
                        source,
                    })?;
                body.insert(field.clone(), value);
            }
            Ok(Some(Value::Object(body)))
        }
        Some("projection") => {
            let mut body = Map::new();
            for (backend_field, expr) in &mapping.field_projection {
                let value =
                    fg_expr::resolve(expr, sources).map_err(|source| MappingError::BodyField {
                        field: backend_field.clone(),
                        source,
                    })?;
                body.insert(backend_field.clone(), value);
            }
            Ok(Some(Value::Object(body)))
        }
        Some(other) => Err(MappingError::UnknownStrategy(other.to_string())),
    }
}

// ---------------------------------------------------------------------------
// Reverse field map
// ---------------------------------------------------------------------------

/// Backend field name → original UI field name, derived from a projection.
///
/// Only entries whose expression is `input.<name>` participate; literals,
/// context, and route expressions have no UI-side field to point back at.
pub fn reverse_field_map(field_projection: &BTreeMap<String, String>) -> BTreeMap<String, String> {
    let mut out = BTreeMap::new();
    for (backend_field, expr) in field_projection {
        if let Some(name) = expr.trim().strip_prefix("input.") {
            out.insert(backend_field.clone(), name.to_string());
        }
    }
    out
}

// ---------------------------------------------------------------------------
// Response navigation / projection
// ---------------------------------------------------------------------------

/// Navigate a dotted path into a JSON value. Returns `None` when any segment
/// is missing or the path crosses a non-object.
pub fn navigate_path<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = value;
    for segment in path.split('.') {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

/// Project response-body fields through an output mapping's `fields` table.
///
/// Entries whose dotted path is absent from the body are dropped.
pub fn project_fields(
    body: &Value,
    fields: &BTreeMap<String, String>,
) -> Map<String, Value> {
    let mut out = Map::new();
    for (ui_name, path) in fields {
        if let Some(v) = navigate_path(body, path) {
            out.insert(ui_name.clone(), v.clone());
        }
    }
    out
}
