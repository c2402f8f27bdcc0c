// SPDX-License-Identifier: MIT OR Apache-2.0
//! Shared fixture: a fully wired gateway over a single mock backend.

use axum::Router;
use axum::body::Body;
use axum::http::{Request, Response, StatusCode};
use foregate::capability::{CapabilityResolver, ResolverConfig, YamlPolicyEvaluator};
use foregate::command::{CommandExecutor, LoggingObserver};
use foregate::core::DomainDefinition;
use foregate::descriptor::DescriptorAssembler;
use foregate::idempotency::MemoryIdempotencyStore;
use foregate::invoke::{Dispatcher, InvokerRegistry, OpenApiInvoker, SdkInvoker};
use foregate::lookup::LookupService;
use foregate::openapi::{OpenApiDocument, OpenApiIndex, ServiceSource};
use foregate::ratelimit::MemoryRateLimiter;
use foregate::registry::DefinitionRegistry;
use foregate::search::{SearchConfig, SearchService};
use foregate::server::auth::{Hs256Verifier, TokenVerifier};
use foregate::server::{AppState, build_app};
use foregate::telemetry::MetricsRegistry;
use foregate::workflow::{MemoryWorkflowStore, WorkflowEngine};
use http_body_util::BodyExt;
use jsonwebtoken::{EncodingKey, Header, encode};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

pub const JWT_SECRET: &str = "integration-test-secret";

pub const SPEC: &str = r#"{
    "openapi": "3.0.0",
    "paths": {
        "/api/orders": {
            "get": {"operationId": "listOrders"}
        },
        "/api/orders/{id}/cancel": {
            "parameters": [{"name": "id", "in": "path", "required": true}],
            "post": {
                "operationId": "cancelOrder",
                "requestBody": {
                    "content": {
                        "application/json": {
                            "schema": {
                                "type": "object",
                                "required": ["cancellation_reason"],
                                "properties": {"cancellation_reason": {"type": "string"}}
                            }
                        }
                    }
                }
            }
        },
        "/api/orders/{order_id}/confirm": {
            "post": {"operationId": "confirmOrder"}
        },
        "/api/search/fast": {
            "get": {"operationId": "searchFast"}
        },
        "/api/search/slow": {
            "get": {"operationId": "searchSlow"}
        },
        "/api/statuses": {
            "get": {"operationId": "listStatuses"}
        }
    }
}"#;

pub const DEFS: &str = r"
domain: orders
version: '1'
navigation:
  items:
    - id: orders
      label: Orders
      capabilities: ['orders:order:view']
      children:
        - id: orders-all
          label: All Orders
          route: /orders
        - id: orders-admin
          label: Admin Orders
          route: /orders/admin
          capabilities: ['orders:admin:view']
pages:
  - id: orders.list
    title: Orders
    capabilities: ['orders:order:view']
    data_source:
      operation:
        type: openapi
        service_id: orders-svc
        operation_id: listOrders
    columns:
      - field: reference
        label: Reference
        sortable: true
    actions:
      - id: cancel
        label: Cancel Order
        command_id: orders.cancel
        capabilities: ['orders:order:cancel']
forms:
  - id: orders.approval_form
    title: Approve Order
    capabilities: ['orders:order:view']
    fields:
      - name: approval_notes
        label: Notes
        type: textarea
        required: true
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
        ORDER_SHIPPED: This order has already shipped and can no longer be cancelled.
    idempotency:
      ttl: 1h
workflows:
  - id: orders.approval
    name: Order Approval
    capabilities: ['orders:approval:start']
    initial_step: review
    steps:
      - id: review
        name: Review
        type: human
        capabilities: ['orders:approval:review']
        form_id: orders.approval_form
      - id: confirm
        name: Confirm
        type: system
        operation:
          type: openapi
          service_id: orders-svc
          operation_id: confirmOrder
        input_mapping:
          path_params:
            order_id: workflow.order_id
          body_mapping: template
          body_template:
            approval_notes: workflow.approval_notes
      - id: approved
        name: Approved
        type: terminal
    transitions:
      - from: review
        to: confirm
        event: approve
      - from: confirm
        to: approved
        event: completed
searches:
  - id: orders.fast
    domain: orders
    capabilities: ['orders:order:view']
    operation:
      type: openapi
      service_id: orders-svc
      operation_id: searchFast
    result_path: results
    route_template: /orders/{id}
  - id: orders.slow
    domain: orders
    capabilities: ['orders:order:view']
    operation:
      type: openapi
      service_id: orders-svc
      operation_id: searchSlow
    result_path: results
    route_template: /orders/{id}
lookups:
  - id: orders.statuses
    capabilities: ['orders:order:view']
    operation:
      type: openapi
      service_id: orders-svc
      operation_id: listStatuses
    label_field: name
    value_field: code
    cache:
      scope: tenant
      ttl: 5m
";

fn roles() -> BTreeMap<String, Vec<String>> {
    BTreeMap::from([
        (
            "order_viewer".to_string(),
            vec!["orders:order:view".to_string()],
        ),
        ("order_manager".to_string(), vec!["orders:*".to_string()]),
    ])
}

/// Build the gateway app with every backend call routed to `backend_url`.
pub fn app(backend_url: &str, search_timeout: Duration) -> Router {
    let doc = OpenApiDocument::parse(SPEC).unwrap();
    let mut index = OpenApiIndex::default();
    index
        .add_document(
            &ServiceSource {
                service_id: "orders-svc".into(),
                spec_path: std::path::PathBuf::new(),
                base_url: Some(backend_url.to_string()),
                timeout: Some("2s".into()),
            },
            &doc,
        )
        .unwrap();
    let index = Arc::new(index);

    let domain: DomainDefinition = serde_yaml::from_str(DEFS).unwrap();
    let registry = Arc::new(DefinitionRegistry::from_domains(vec![domain]).unwrap());
    let problems = foregate::registry::validate(&registry, Some(&index));
    assert!(problems.is_empty(), "invalid fixture definitions: {problems:?}");

    let mut invokers = InvokerRegistry::new();
    invokers.register(OpenApiInvoker::new(index.clone(), Duration::from_secs(2)));
    invokers.register(SdkInvoker::new());
    let dispatcher = Arc::new(Dispatcher::new(
        invokers,
        Some(index.clone()),
        Default::default(),
        foregate::invoke::RetryPolicy::none(),
    ));

    let capabilities = Arc::new(CapabilityResolver::new(
        Arc::new(YamlPolicyEvaluator::from_roles(roles())),
        ResolverConfig::default(),
    ));

    let metrics = Arc::new(MetricsRegistry::new());
    let commands = Arc::new(
        CommandExecutor::new(registry.clone(), dispatcher.clone())
            .with_index(index.clone())
            .with_idempotency(Arc::new(MemoryIdempotencyStore::new()))
            .with_rate_limiter(Arc::new(MemoryRateLimiter::new()))
            .with_observer(Arc::new(LoggingObserver)),
    );
    let workflows = Arc::new(WorkflowEngine::new(
        registry.clone(),
        dispatcher.clone(),
        Arc::new(MemoryWorkflowStore::new()),
    ));
    let search = Arc::new(SearchService::new(
        registry.clone(),
        dispatcher.clone(),
        SearchConfig {
            timeout_per_provider: search_timeout,
        },
    ));
    let lookups = Arc::new(LookupService::new(registry.clone(), dispatcher.clone()));
    let descriptors = Arc::new(DescriptorAssembler::new(
        registry.clone(),
        dispatcher.clone(),
    ));
    let verifier: Arc<dyn TokenVerifier> = Arc::new(Hs256Verifier::new(JWT_SECRET, None, None));

    let state = Arc::new(AppState {
        registry,
        capabilities,
        commands,
        workflows,
        search,
        lookups,
        descriptors,
        verifier,
        metrics,
    });
    build_app(state, Duration::from_secs(10), &[])
}

/// Mint a bearer token for the given roles.
pub fn token(subject: &str, tenant: &str, roles: &[&str]) -> String {
    let claims = serde_json::json!({
        "sub": subject,
        "tenant_id": tenant,
        "email": format!("{subject}@example.test"),
        "roles": roles,
        "exp": chrono::Utc::now().timestamp() + 3600,
    });
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(JWT_SECRET.as_bytes()),
    )
    .unwrap()
}

/// Issue a request and decode the JSON body.
pub async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value, Response<Body>) {
    let response = app.clone().oneshot(request).await.unwrap();
    let (parts, body) = response.into_parts();
    let bytes = body.collect().await.unwrap().to_bytes();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (parts.status, json, Response::from_parts(parts, Body::empty()))
}

/// GET with a bearer token.
pub fn get(path: &str, bearer: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(path)
        .header("authorization", format!("Bearer {bearer}"))
        .body(Body::empty())
        .unwrap()
}

/// POST JSON with a bearer token.
pub fn post_json(path: &str, bearer: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(path)
        .header("authorization", format!("Bearer {bearer}"))
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_vec(body).unwrap()))
        .unwrap()
}
