// SPDX-License-Identifier: MIT OR Apache-2.0
//! The `(service_id, operation_id)` index over loaded OpenAPI documents.

use crate::document::{BodySchema, HttpMethod, OpenApiDocument, Parameter};
use fg_error::FieldError;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

/// A configured backend service: where its spec lives and how to reach it.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceSource {
    /// Service id referenced by operation bindings.
    pub service_id: String,
    /// Path to the OpenAPI document (JSON or YAML).
    pub spec_path: PathBuf,
    /// Base URL override; when absent the spec's first server URL is used.
    #[serde(default)]
    pub base_url: Option<String>,
    /// Per-service call timeout.
    #[serde(default)]
    pub timeout: Option<String>,
}

/// Errors building the index.
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    /// A spec file could not be read.
    #[error("failed to read spec for service '{service_id}' from {path}: {reason}")]
    Read {
        /// Service id being loaded.
        service_id: String,
        /// Path that was requested.
        path: String,
        /// Underlying failure.
        reason: String,
    },
    /// A spec file could not be parsed.
    #[error("failed to parse spec for service '{service_id}': {reason}")]
    Parse {
        /// Service id being loaded.
        service_id: String,
        /// Parse failure detail.
        reason: String,
    },
    /// The same service id was configured twice.
    #[error("duplicate service id '{0}'")]
    DuplicateService(String),
    /// A service has neither a base_url override nor a server entry.
    #[error("service '{0}' has no base url (no override and no servers in spec)")]
    MissingBaseUrl(String),
}

/// One resolved operation.
#[derive(Debug, Clone)]
pub struct IndexedOperation {
    /// Owning service id.
    pub service_id: String,
    /// The `operationId`.
    pub operation_id: String,
    /// HTTP method.
    pub method: HttpMethod,
    /// Path template (`/api/orders/{id}/cancel`).
    pub path: String,
    /// Path-level and operation-level parameters, merged.
    pub parameters: Vec<Parameter>,
    /// JSON request-body schema, when declared.
    pub body_schema: Option<BodySchema>,
    /// Resolved base URL for the owning service.
    pub base_url: String,
    /// Per-service call timeout.
    pub timeout: Option<Duration>,
}

/// Immutable index of every operation across all configured services.
#[derive(Debug, Default)]
pub struct OpenApiIndex {
    ops: HashMap<(String, String), IndexedOperation>,
}

impl OpenApiIndex {
    /// Build the index from configured service sources.
    ///
    /// Operations without an `operationId` are skipped.  Path-level
    /// parameters merge with operation-level parameters (operation wins on
    /// name collision).
    pub fn load(sources: &[ServiceSource]) -> Result<Self, IndexError> {
        let mut index = Self::default();
        let mut seen = std::collections::HashSet::new();

        for source in sources {
            if !seen.insert(source.service_id.clone()) {
                return Err(IndexError::DuplicateService(source.service_id.clone()));
            }
            let text = std::fs::read_to_string(&source.spec_path).map_err(|e| {
                IndexError::Read {
                    service_id: source.service_id.clone(),
                    path: source.spec_path.display().to_string(),
                    reason: e.to_string(),
                }
            })?;
            let doc = OpenApiDocument::parse(&text).map_err(|reason| IndexError::Parse {
                service_id: source.service_id.clone(),
                reason,
            })?;
            index.add_document(source, &doc)?;
        }
        Ok(index)
    }

    /// Index a parsed document under a source record (exposed for tests and
    /// embedded setups).
    pub fn add_document(
        &mut self,
        source: &ServiceSource,
        doc: &OpenApiDocument,
    ) -> Result<(), IndexError> {
        let base_url = source
            .base_url
            .clone()
            .or_else(|| doc.default_base_url().map(String::from))
            .ok_or_else(|| IndexError::MissingBaseUrl(source.service_id.clone()))?;
        let timeout = source.timeout.as_deref().and_then(fg_core::parse_duration);

        for (path, item) in &doc.paths {
            for (method, op) in item.operations() {
                let Some(op_id) = op.operation_id.clone() else {
                    continue;
                };

                let mut parameters = item.parameters.clone();
                for p in &op.parameters {
                    parameters.retain(|existing| existing.name != p.name);
                    parameters.push(p.clone());
                }

                self.ops.insert(
                    (source.service_id.clone(), op_id.clone()),
                    IndexedOperation {
                        service_id: source.service_id.clone(),
                        operation_id: op_id,
                        method,
                        path: path.clone(),
                        parameters,
                        body_schema: op.json_body_schema().cloned(),
                        base_url: base_url.clone(),
                        timeout,
                    },
                );
            }
        }
        Ok(())
    }

    /// Look up an operation.
    pub fn get(&self, service_id: &str, operation_id: &str) -> Option<&IndexedOperation> {
        self.ops
            .get(&(service_id.to_string(), operation_id.to_string()))
    }

    /// Whether the index knows this operation.
    pub fn contains(&self, service_id: &str, operation_id: &str) -> bool {
        self.get(service_id, operation_id).is_some()
    }

    /// Number of indexed operations.
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// `true` when no operations are indexed.
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Validate a request body against an operation's schema.
    ///
    /// Checks required-field presence on object bodies.  A missing operation
    /// yields a single pseudo-field error.
    pub fn validate_request(
        &self,
        service_id: &str,
        operation_id: &str,
        body: &Value,
    ) -> Vec<FieldError> {
        let Some(op) = self.get(service_id, operation_id) else {
            return vec![FieldError::new(
                "_operation",
                "unknown_operation",
                format!("operation '{operation_id}' is not defined for service '{service_id}'"),
            )];
        };
        let Some(schema) = &op.body_schema else {
            return Vec::new();
        };
        let Some(obj) = body.as_object() else {
            return Vec::new();
        };

        schema
            .required
            .iter()
            .filter(|field| !obj.contains_key(*field) || obj[*field].is_null())
            .map(|field| FieldError::required(field))
            .collect()
    }
}

// ===========================================================================
// Tests
// ===========================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write as _;

    const ORDERS_SPEC: &str = r#"{
        "openapi": "3.0.0",
        "servers": [{"url": "http://orders.internal"}],
        "paths": {
            "/api/orders/{id}/cancel": {
                "parameters": [{"name": "id", "in": "path", "required": true}],
                "post": {
                    "operationId": "cancelOrder",
                    "parameters": [{"name": "force", "in": "query"}],
                    "requestBody": {
                        "content": {
                            "application/json": {
                                "schema": {
                                    "type": "object",
                                    "required": ["reason"],
                                    "properties": {
                                        "reason": {"type": "string"},
                                        "note": {"type": "string"}
                                    }
                                }
                            }
                        }
                    }
                }
            },
            "/api/orders": {
                "get": {"operationId": "listOrders"},
                "post": {}
            }
        }
    }"#;

    fn source(service_id: &str) -> ServiceSource {
        ServiceSource {
            service_id: service_id.into(),
            spec_path: PathBuf::new(),
            base_url: None,
            timeout: Some("5s".into()),
        }
    }

    fn orders_index() -> OpenApiIndex {
        let doc = OpenApiDocument::parse(ORDERS_SPEC).unwrap();
        let mut index = OpenApiIndex::default();
        index.add_document(&source("orders-svc"), &doc).unwrap();
        index
    }

    #[test]
    fn indexes_operations_with_ids_only() {
        let index = orders_index();
        assert_eq!(index.len(), 2); // the bare POST /api/orders is skipped
        assert!(index.contains("orders-svc", "cancelOrder"));
        assert!(index.contains("orders-svc", "listOrders"));
    }

    #[test]
    fn merges_path_and_operation_parameters() {
        let index = orders_index();
        let op = index.get("orders-svc", "cancelOrder").unwrap();
        let names: Vec<_> = op.parameters.iter().map(|p| p.name.as_str()).collect();
        assert!(names.contains(&"id"));
        assert!(names.contains(&"force"));
    }

    #[test]
    fn base_url_falls_back_to_first_server() {
        let index = orders_index();
        let op = index.get("orders-svc", "cancelOrder").unwrap();
        assert_eq!(op.base_url, "http://orders.internal");
        assert_eq!(op.timeout, Some(Duration::from_secs(5)));
    }

    #[test]
    fn base_url_override_wins() {
        let doc = OpenApiDocument::parse(ORDERS_SPEC).unwrap();
        let mut index = OpenApiIndex::default();
        let mut src = source("orders-svc");
        src.base_url = Some("http://localhost:8081".into());
        index.add_document(&src, &doc).unwrap();
        assert_eq!(
            index.get("orders-svc", "cancelOrder").unwrap().base_url,
            "http://localhost:8081"
        );
    }

    #[test]
    fn missing_base_url_is_an_error() {
        let doc = OpenApiDocument::parse(r#"{"paths": {}}"#).unwrap();
        let mut index = OpenApiIndex::default();
        let err = index.add_document(&source("bare-svc"), &doc).unwrap_err();
        assert!(matches!(err, IndexError::MissingBaseUrl(_)));
    }

    #[test]
    fn validate_flags_missing_required_fields() {
        let index = orders_index();
        let errors =
            index.validate_request("orders-svc", "cancelOrder", &json!({"note": "hi"}));
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "reason");
        assert_eq!(errors[0].code.as_deref(), Some("required"));
    }

    #[test]
    fn validate_treats_null_as_missing() {
        let index = orders_index();
        let errors =
            index.validate_request("orders-svc", "cancelOrder", &json!({"reason": null}));
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn validate_passes_complete_bodies() {
        let index = orders_index();
        let errors =
            index.validate_request("orders-svc", "cancelOrder", &json!({"reason": "x"}));
        assert!(errors.is_empty());
    }

    #[test]
    fn validate_unknown_operation_is_single_error() {
        let index = orders_index();
        let errors = index.validate_request("orders-svc", "nope", &json!({}));
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].code.as_deref(), Some("unknown_operation"));
    }

    #[test]
    fn validate_skips_non_object_bodies() {
        let index = orders_index();
        assert!(
            index
                .validate_request("orders-svc", "cancelOrder", &json!([1, 2]))
                .is_empty()
        );
    }

    #[test]
    fn load_reads_spec_files() {
        let mut file = tempfile::NamedTempFile::with_suffix(".json").unwrap();
        file.write_all(ORDERS_SPEC.as_bytes()).unwrap();
        let sources = vec![ServiceSource {
            service_id: "orders-svc".into(),
            spec_path: file.path().to_path_buf(),
            base_url: None,
            timeout: None,
        }];
        let index = OpenApiIndex::load(&sources).unwrap();
        assert!(index.contains("orders-svc", "cancelOrder"));
    }

    #[test]
    fn load_rejects_duplicate_service_ids() {
        let mut file = tempfile::NamedTempFile::with_suffix(".json").unwrap();
        file.write_all(ORDERS_SPEC.as_bytes()).unwrap();
        let src = ServiceSource {
            service_id: "orders-svc".into(),
            spec_path: file.path().to_path_buf(),
            base_url: None,
            timeout: None,
        };
        let err = OpenApiIndex::load(&[src.clone(), src]).unwrap_err();
        assert!(matches!(err, IndexError::DuplicateService(_)));
    }
}
