// SPDX-License-Identifier: MIT OR Apache-2.0
//! End-to-end pipeline tests over a scripted invoker.

use async_trait::async_trait;
use fg_capability::CapabilitySet;
use fg_command::{CollectingObserver, CommandExecutor};
use fg_core::{
    CommandRequest, DomainDefinition, InvocationInput, InvocationResult, OperationBinding,
    RequestContext,
};
use fg_error::{ErrorCode, GatewayError};
use fg_idempotency::MemoryIdempotencyStore;
use fg_invoke::{BreakerConfig, Dispatcher, Invoker, InvokerRegistry, RetryPolicy};
use fg_openapi::{OpenApiDocument, OpenApiIndex, ServiceSource};
use fg_ratelimit::MemoryRateLimiter;
use fg_registry::DefinitionRegistry;
use serde_json::{Value, json};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

const DEFS: &str = r"
domain: orders
commands:
  - id: orders.cancel
    capabilities: ['orders:order:cancel']
    operation:
      type: openapi
      service_id: orders-svc
      operation_id: cancelOrder
    input_mapping:
      path_params:
        id: input.id
      body_mapping: projection
      field_projection:
        cancellation_reason: input.reason
    output_mapping:
      success_message: Order cancelled
      fields:
        order_id: order.id
      error_map:
        ORDER_SHIPPED: This order has already shipped.
    idempotency:
      ttl: 1h
    rate_limit:
      max_requests: 2
      window: 1m
      scope: user
  - id: orders.note
    operation:
      type: openapi
      service_id: orders-svc
      operation_id: cancelOrder
    input_mapping:
      path_params:
        id: input.missing_field
";

const SPEC: &str = r#"{
    "servers": [{"url": "http://orders.internal"}],
    "paths": {
        "/api/orders/{id}/cancel": {
            "post": {
                "operationId": "cancelOrder",
                "requestBody": {
                    "content": {
                        "application/json": {
                            "schema": {
                                "type": "object",
                                "required": ["cancellation_reason"]
                            }
                        }
                    }
                }
            }
        }
    }
}"#;

/// Invoker that returns a fixed outcome and counts calls.
struct Scripted {
    status: u16,
    body: Value,
    calls: Arc<AtomicU32>,
}

#[async_trait]
impl Invoker for Scripted {
    fn name(&self) -> &str {
        "scripted"
    }
    fn supports(&self, _binding: &OperationBinding) -> bool {
        true
    }
    async fn invoke(
        &self,
        _rctx: &RequestContext,
        _binding: &OperationBinding,
        _input: &InvocationInput,
    ) -> Result<InvocationResult, GatewayError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(InvocationResult {
            status: self.status,
            body: self.body.clone(),
            headers: Default::default(),
        })
    }
}

struct Harness {
    executor: CommandExecutor,
    calls: Arc<AtomicU32>,
    observer: Arc<CollectingObserver>,
}

fn harness(status: u16, body: Value) -> Harness {
    let domain: DomainDefinition = serde_yaml::from_str(DEFS).unwrap();
    let registry = Arc::new(DefinitionRegistry::from_domains(vec![domain]).unwrap());

    let doc = OpenApiDocument::parse(SPEC).unwrap();
    let mut index = OpenApiIndex::default();
    index
        .add_document(
            &ServiceSource {
                service_id: "orders-svc".into(),
                spec_path: std::path::PathBuf::new(),
                base_url: None,
                timeout: None,
            },
            &doc,
        )
        .unwrap();
    let index = Arc::new(index);

    let calls = Arc::new(AtomicU32::new(0));
    let mut invokers = InvokerRegistry::new();
    invokers.register(Scripted {
        status,
        body,
        calls: calls.clone(),
    });
    let dispatcher = Arc::new(Dispatcher::new(
        invokers,
        Some(index.clone()),
        BreakerConfig::default(),
        RetryPolicy::none(),
    ));

    let observer = Arc::new(CollectingObserver::new());
    let executor = CommandExecutor::new(registry, dispatcher)
        .with_index(index)
        .with_idempotency(Arc::new(MemoryIdempotencyStore::new()))
        .with_rate_limiter(Arc::new(MemoryRateLimiter::new()))
        .with_observer(observer.clone());

    Harness {
        executor,
        calls,
        observer,
    }
}

fn rctx() -> RequestContext {
    RequestContext::new("user-1", "tenant-a")
}

fn manager_caps() -> CapabilitySet {
    CapabilitySet::from_caps(["orders:*"])
}

fn cancel_request() -> CommandRequest {
    CommandRequest {
        input: json!({"id": "ord-1", "reason": "damaged"})
            .as_object()
            .unwrap()
            .clone(),
        route_params: Default::default(),
        idempotency_key: None,
    }
}

// -- stage 1: lookup --------------------------------------------------------

#[tokio::test]
async fn unknown_command_is_not_found() {
    let h = harness(200, json!({}));
    let err = h
        .executor
        .execute(&rctx(), &manager_caps(), "orders.nope", &cancel_request())
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::NotFound);
    assert_eq!(h.calls.load(Ordering::SeqCst), 0);
}

// -- stage 2: capability gate -----------------------------------------------

#[tokio::test]
async fn missing_capability_is_forbidden_and_backend_untouched() {
    let h = harness(200, json!({}));
    let viewer = CapabilitySet::from_caps(["orders:order:view"]);
    let err = h
        .executor
        .execute(&rctx(), &viewer, "orders.cancel", &cancel_request())
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::Forbidden);
    assert_eq!(h.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn degraded_capabilities_surface_as_unauthorized() {
    let h = harness(200, json!({}));
    let err = h
        .executor
        .execute(
            &rctx(),
            &CapabilitySet::degraded(),
            "orders.cancel",
            &cancel_request(),
        )
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::Unauthorized);
}

// -- stages 3 & 9: idempotency ----------------------------------------------

#[tokio::test]
async fn idempotent_replay_invokes_backend_once() {
    let h = harness(200, json!({"order": {"id": "ord-1"}}));
    let mut request = cancel_request();
    request.idempotency_key = Some("k1".into());

    let first = h
        .executor
        .execute(&rctx(), &manager_caps(), "orders.cancel", &request)
        .await
        .unwrap();
    let second = h
        .executor
        .execute(&rctx(), &manager_caps(), "orders.cancel", &request)
        .await
        .unwrap();

    assert_eq!(first, second);
    assert_eq!(h.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn same_key_different_input_is_conflict() {
    let h = harness(200, json!({"order": {"id": "ord-1"}}));
    let mut request = cancel_request();
    request.idempotency_key = Some("k1".into());
    h.executor
        .execute(&rctx(), &manager_caps(), "orders.cancel", &request)
        .await
        .unwrap();

    let mut altered = request.clone();
    altered.input = json!({"id": "ord-1", "reason": "changed my mind"})
        .as_object()
        .unwrap()
        .clone();
    let err = h
        .executor
        .execute(&rctx(), &manager_caps(), "orders.cancel", &altered)
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::Conflict);
    assert_eq!(h.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn failures_are_not_stored_for_replay() {
    let h = harness(500, json!({}));
    let mut request = cancel_request();
    request.idempotency_key = Some("k1".into());

    for _ in 0..2 {
        let resp = h
            .executor
            .execute(&rctx(), &manager_caps(), "orders.cancel", &request)
            .await
            .unwrap();
        assert!(!resp.success);
    }
    assert_eq!(h.calls.load(Ordering::SeqCst), 2);
}

// -- stage 4: rate limit ----------------------------------------------------

#[tokio::test]
async fn rate_limit_denies_past_the_window_cap() {
    let h = harness(200, json!({"order": {"id": "ord-1"}}));
    for _ in 0..2 {
        h.executor
            .execute(&rctx(), &manager_caps(), "orders.cancel", &cancel_request())
            .await
            .unwrap();
    }
    let err = h
        .executor
        .execute(&rctx(), &manager_caps(), "orders.cancel", &cancel_request())
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::RateLimited);
    assert_eq!(h.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn rate_limit_scope_is_per_user() {
    let h = harness(200, json!({"order": {"id": "ord-1"}}));
    for _ in 0..2 {
        h.executor
            .execute(&rctx(), &manager_caps(), "orders.cancel", &cancel_request())
            .await
            .unwrap();
    }
    let other = RequestContext::new("user-2", "tenant-a");
    assert!(
        h.executor
            .execute(&other, &manager_caps(), "orders.cancel", &cancel_request())
            .await
            .is_ok()
    );
}

// -- stage 5: input mapping -------------------------------------------------

#[tokio::test]
async fn mapping_failure_is_bad_request() {
    let h = harness(200, json!({}));
    let err = h
        .executor
        .execute(&rctx(), &manager_caps(), "orders.note", &cancel_request())
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::BadRequest);
    assert!(err.message.contains("missing_field"));
    assert_eq!(h.calls.load(Ordering::SeqCst), 0);
}

// -- stage 6: schema validation ---------------------------------------------

#[tokio::test]
async fn schema_violation_reports_ui_field_names() {
    let h = harness(200, json!({}));
    let mut request = cancel_request();
    // reason resolves to null, so the projected cancellation_reason fails the
    // required-field check and reverse-maps back to the UI name.
    request.input = json!({"id": "ord-1", "reason": null})
        .as_object()
        .unwrap()
        .clone();

    let err = h
        .executor
        .execute(&rctx(), &manager_caps(), "orders.cancel", &request)
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::ValidationError);
    assert_eq!(err.details.len(), 1);
    assert_eq!(err.details[0].field, "reason");
    assert_eq!(h.calls.load(Ordering::SeqCst), 0);
}

// -- stages 7 & 8: invoke + shape -------------------------------------------

#[tokio::test]
async fn success_shapes_message_and_fields() {
    let h = harness(200, json!({"order": {"id": "ord-1", "internal": "x"}}));
    let resp = h
        .executor
        .execute(&rctx(), &manager_caps(), "orders.cancel", &cancel_request())
        .await
        .unwrap();
    assert!(resp.success);
    assert_eq!(resp.message.as_deref(), Some("Order cancelled"));
    assert_eq!(resp.data["order_id"], "ord-1");
    assert!(!resp.data.contains_key("internal"));
}

#[tokio::test]
async fn backend_422_translates_through_error_map() {
    let h = harness(
        422,
        json!({"error": {"code": "ORDER_SHIPPED", "message": "raw"}}),
    );
    let resp = h
        .executor
        .execute(&rctx(), &manager_caps(), "orders.cancel", &cancel_request())
        .await
        .unwrap();
    assert!(!resp.success);
    assert_eq!(resp.message.as_deref(), Some("This order has already shipped."));
    assert_eq!(resp.status_code, 422);
}

#[tokio::test]
async fn backend_5xx_is_generic() {
    let h = harness(503, json!({"error": {"message": "stack trace"}}));
    let resp = h
        .executor
        .execute(&rctx(), &manager_caps(), "orders.cancel", &cancel_request())
        .await
        .unwrap();
    assert!(!resp.success);
    assert_eq!(
        resp.message.as_deref(),
        Some("An internal error occurred. Please try again later.")
    );
}

// -- stage 10: observer -----------------------------------------------------

#[tokio::test]
async fn exactly_one_event_per_execution() {
    let h = harness(200, json!({"order": {"id": "ord-1"}}));
    h.executor
        .execute(&rctx(), &manager_caps(), "orders.cancel", &cancel_request())
        .await
        .unwrap();
    let _ = h
        .executor
        .execute(&rctx(), &manager_caps(), "orders.nope", &cancel_request())
        .await;

    let events = h.observer.events().await;
    assert_eq!(events.len(), 2);
    assert!(events[0].success);
    assert_eq!(events[1].error.as_deref(), Some("NOT_FOUND"));
}

// -- dry run ----------------------------------------------------------------

#[tokio::test]
async fn validate_never_reaches_the_backend() {
    let h = harness(200, json!({}));
    let findings = h
        .executor
        .validate(&rctx(), &manager_caps(), "orders.cancel", &cancel_request())
        .await
        .unwrap();
    assert!(findings.is_empty());
    assert_eq!(h.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn validate_still_gates_capabilities() {
    let h = harness(200, json!({}));
    let err = h
        .executor
        .validate(
            &rctx(),
            &CapabilitySet::empty(),
            "orders.cancel",
            &cancel_request(),
        )
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::Forbidden);
}
