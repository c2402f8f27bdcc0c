// SPDX-License-Identifier: MIT OR Apache-2.0
//! Response shaping: backend invocation result → UI command response.

use fg_core::{CommandResponse, InvocationResult, OutputMapping};
use fg_error::FieldError;
use fg_mapping::project_fields;
use serde_json::Value;
use std::collections::BTreeMap;

/// Message used for every backend 5xx.  Backend detail never reaches the UI.
pub const INTERNAL_ERROR_MESSAGE: &str = "An internal error occurred. Please try again later.";

/// Shape a backend result per the command's output mapping.
///
/// `reverse` maps backend field names back to UI field names for per-field
/// errors (built from the input projection).
pub fn shape_response(
    result: &InvocationResult,
    output: &OutputMapping,
    reverse: &BTreeMap<String, String>,
) -> CommandResponse {
    if result.is_success() {
        return CommandResponse {
            success: true,
            message: output.success_message.clone(),
            data: project_fields(&result.body, &output.fields),
            field_errors: Vec::new(),
            status_code: result.status,
        };
    }

    if result.is_client_error() {
        let code = extract_str(&result.body, &["error", "code"])
            .or_else(|| extract_str(&result.body, &["code"]));
        let backend_message = extract_str(&result.body, &["error", "message"])
            .or_else(|| extract_str(&result.body, &["message"]));

        let message = code
            .as_deref()
            .and_then(|c| output.error_map.get(c).cloned())
            .or(backend_message)
            .unwrap_or_else(|| "The request could not be processed.".to_string());

        return CommandResponse {
            success: false,
            message: Some(message),
            data: Default::default(),
            field_errors: extract_field_errors(&result.body, reverse),
            status_code: result.status,
        };
    }

    CommandResponse {
        success: false,
        message: Some(INTERNAL_ERROR_MESSAGE.to_string()),
        data: Default::default(),
        field_errors: Vec::new(),
        status_code: result.status,
    }
}

fn extract_str(body: &Value, path: &[&str]) -> Option<String> {
    let mut current = body;
    for segment in path {
        current = current.as_object()?.get(*segment)?;
    }
    current.as_str().map(String::from)
}

fn extract_field_errors(body: &Value, reverse: &BTreeMap<String, String>) -> Vec<FieldError> {
    let details = body
        .get("error")
        .and_then(|e| e.get("details"))
        .or_else(|| body.get("details"))
        .and_then(Value::as_array);
    let Some(details) = details else {
        return Vec::new();
    };

    details
        .iter()
        .filter_map(|entry| {
            let field = entry.get("field")?.as_str()?;
            let field = reverse
                .get(field)
                .cloned()
                .unwrap_or_else(|| field.to_string());
            Some(FieldError {
                field,
                code: entry
                    .get("code")
                    .and_then(Value::as_str)
                    .map(String::from),
                message: entry
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or("invalid value")
                    .to_string(),
            })
        })
        .collect()
}

// ===========================================================================
// Tests
// ===========================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn result(status: u16, body: Value) -> InvocationResult {
        InvocationResult {
            status,
            body,
            headers: Default::default(),
        }
    }

    fn output() -> OutputMapping {
        OutputMapping {
            success_message: Some("Order cancelled".into()),
            fields: BTreeMap::from([
                ("order_id".to_string(), "order.id".to_string()),
                ("state".to_string(), "order.status".to_string()),
            ]),
            error_map: BTreeMap::from([(
                "ORDER_SHIPPED".to_string(),
                "This order has already shipped and can no longer be cancelled.".to_string(),
            )]),
        }
    }

    // -- 2xx ----------------------------------------------------------------

    #[test]
    fn success_projects_mapped_fields_only() {
        let body = json!({"order": {"id": "ord-1", "status": "cancelled", "secret": "x"}});
        let resp = shape_response(&result(200, body), &output(), &BTreeMap::new());
        assert!(resp.success);
        assert_eq!(resp.message.as_deref(), Some("Order cancelled"));
        assert_eq!(resp.data["order_id"], "ord-1");
        assert_eq!(resp.data["state"], "cancelled");
        assert!(!resp.data.contains_key("secret"));
        assert_eq!(resp.status_code, 200);
    }

    #[test]
    fn success_with_missing_paths_drops_them() {
        let resp = shape_response(
            &result(201, json!({"order": {"id": "ord-1"}})),
            &output(),
            &BTreeMap::new(),
        );
        assert!(resp.success);
        assert_eq!(resp.data.len(), 1);
    }

    // -- 4xx ----------------------------------------------------------------

    #[test]
    fn client_error_translates_via_error_map() {
        let body = json!({"error": {"code": "ORDER_SHIPPED", "message": "backend text"}});
        let resp = shape_response(&result(422, body), &output(), &BTreeMap::new());
        assert!(!resp.success);
        assert_eq!(
            resp.message.as_deref(),
            Some("This order has already shipped and can no longer be cancelled.")
        );
        assert_eq!(resp.status_code, 422);
    }

    #[test]
    fn client_error_without_map_entry_uses_backend_message() {
        let body = json!({"error": {"code": "UNKNOWN", "message": "no such order"}});
        let resp = shape_response(&result(404, body), &output(), &BTreeMap::new());
        assert_eq!(resp.message.as_deref(), Some("no such order"));
    }

    #[test]
    fn client_error_reads_flat_code_and_message() {
        let body = json!({"code": "ORDER_SHIPPED", "message": "flat"});
        let resp = shape_response(&result(400, body), &output(), &BTreeMap::new());
        assert_eq!(
            resp.message.as_deref(),
            Some("This order has already shipped and can no longer be cancelled.")
        );
    }

    #[test]
    fn client_error_without_any_detail_gets_a_generic_message() {
        let resp = shape_response(&result(400, json!({})), &output(), &BTreeMap::new());
        assert_eq!(
            resp.message.as_deref(),
            Some("The request could not be processed.")
        );
    }

    #[test]
    fn field_errors_reverse_map_to_ui_names() {
        let body = json!({"error": {"details": [
            {"field": "cancellation_reason", "code": "too_long", "message": "too long"},
            {"field": "unmapped", "message": "bad"}
        ]}});
        let reverse = BTreeMap::from([("cancellation_reason".to_string(), "reason".to_string())]);
        let resp = shape_response(&result(422, body), &output(), &reverse);
        assert_eq!(resp.field_errors.len(), 2);
        assert_eq!(resp.field_errors[0].field, "reason");
        assert_eq!(resp.field_errors[0].code.as_deref(), Some("too_long"));
        assert_eq!(resp.field_errors[1].field, "unmapped");
    }

    #[test]
    fn flat_details_are_read_too() {
        let body = json!({"details": [{"field": "reason", "message": "bad"}]});
        let resp = shape_response(&result(422, body), &output(), &BTreeMap::new());
        assert_eq!(resp.field_errors.len(), 1);
    }

    // -- 5xx ----------------------------------------------------------------

    #[test]
    fn server_error_never_leaks_backend_detail() {
        let body = json!({"error": {"message": "panic at line 42 in billing.go"}});
        let resp = shape_response(&result(500, body), &output(), &BTreeMap::new());
        assert!(!resp.success);
        assert_eq!(resp.message.as_deref(), Some(INTERNAL_ERROR_MESSAGE));
        assert!(resp.data.is_empty());
        assert!(resp.field_errors.is_empty());
        let rendered = serde_json::to_string(&resp).unwrap();
        assert!(!rendered.contains("billing.go"));
    }
}
