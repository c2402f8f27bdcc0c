// SPDX-License-Identifier: MIT OR Apache-2.0
//! Lookup caching behavior over a counting invoker.

use async_trait::async_trait;
use fg_capability::CapabilitySet;
use fg_core::{
    DomainDefinition, InvocationInput, InvocationResult, OperationBinding, RequestContext,
};
use fg_error::{ErrorCode, GatewayError};
use fg_invoke::{BreakerConfig, Dispatcher, Invoker, InvokerRegistry, RetryPolicy};
use fg_lookup::LookupService;
use fg_registry::DefinitionRegistry;
use serde_json::json;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

const DEFS: &str = r"
domain: orders
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
      ttl: 1h
  - id: orders.carriers
    operation:
      type: openapi
      service_id: orders-svc
      operation_id: listCarriers
    label_field: name
    value_field: id
    cache:
      scope: global
      ttl: 0s
";

struct Counting {
    calls: Arc<AtomicU32>,
}

#[async_trait]
impl Invoker for Counting {
    fn name(&self) -> &str {
        "counting"
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
            status: 200,
            body: json!({"data": [
                {"name": "Open", "code": "open"},
                {"name": "Closed", "code": "closed"},
            ]}),
            headers: Default::default(),
        })
    }
}

fn service() -> (LookupService, Arc<AtomicU32>) {
    let domain: DomainDefinition = serde_yaml::from_str(DEFS).unwrap();
    let registry = Arc::new(DefinitionRegistry::from_domains(vec![domain]).unwrap());
    let calls = Arc::new(AtomicU32::new(0));
    let mut invokers = InvokerRegistry::new();
    invokers.register(Counting {
        calls: calls.clone(),
    });
    let dispatcher = Arc::new(Dispatcher::new(
        invokers,
        None,
        BreakerConfig::default(),
        RetryPolicy::none(),
    ));
    (LookupService::new(registry, dispatcher), calls)
}

fn rctx() -> RequestContext {
    RequestContext::new("user-1", "tenant-a")
}

fn viewer() -> CapabilitySet {
    CapabilitySet::from_caps(["orders:order:view"])
}

#[tokio::test]
async fn miss_then_cached_hit() {
    let (svc, calls) = service();
    let first = svc
        .get(&rctx(), &viewer(), "orders.statuses", None)
        .await
        .unwrap();
    assert!(!first.meta.cached);
    assert_eq!(first.options.len(), 2);
    assert_eq!(first.options[0].label, "Open");
    assert_eq!(first.options[0].value, json!("open"));

    let second = svc
        .get(&rctx(), &viewer(), "orders.statuses", None)
        .await
        .unwrap();
    assert!(second.meta.cached);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn tenant_scope_isolates_cache_entries() {
    let (svc, calls) = service();
    svc.get(&rctx(), &viewer(), "orders.statuses", None)
        .await
        .unwrap();

    let other = RequestContext::new("user-2", "tenant-b");
    let resp = svc
        .get(&other, &viewer(), "orders.statuses", None)
        .await
        .unwrap();
    assert!(!resp.meta.cached);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn expired_ttl_refetches() {
    let (svc, calls) = service();
    svc.get(&rctx(), &viewer(), "orders.carriers", None)
        .await
        .unwrap();
    let resp = svc
        .get(&rctx(), &viewer(), "orders.carriers", None)
        .await
        .unwrap();
    assert!(!resp.meta.cached);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn q_filters_after_cache() {
    let (svc, _) = service();
    svc.get(&rctx(), &viewer(), "orders.statuses", None)
        .await
        .unwrap();
    let resp = svc
        .get(&rctx(), &viewer(), "orders.statuses", Some("clo"))
        .await
        .unwrap();
    assert!(resp.meta.cached);
    assert_eq!(resp.options.len(), 1);
    assert_eq!(resp.options[0].label, "Closed");
}

#[tokio::test]
async fn unknown_lookup_is_not_found() {
    let (svc, _) = service();
    let err = svc
        .get(&rctx(), &viewer(), "orders.nope", None)
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::NotFound);
}

#[tokio::test]
async fn capability_gate_applies() {
    let (svc, calls) = service();
    let err = svc
        .get(&rctx(), &CapabilitySet::empty(), "orders.statuses", None)
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::Forbidden);
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn invalidate_clears_all_scopes_of_a_lookup() {
    let (svc, calls) = service();
    svc.get(&rctx(), &viewer(), "orders.statuses", None)
        .await
        .unwrap();
    svc.invalidate("orders.statuses").await;
    let resp = svc
        .get(&rctx(), &viewer(), "orders.statuses", None)
        .await
        .unwrap();
    assert!(!resp.meta.cached);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}
