// SPDX-License-Identifier: MIT OR Apache-2.0
//! Workflow engine behavior over a scripted invoker.

use async_trait::async_trait;
use chrono::Utc;
use fg_capability::CapabilitySet;
use fg_core::{
    DomainDefinition, InvocationInput, InvocationResult, OperationBinding, RequestContext,
};
use fg_error::{ErrorCode, GatewayError};
use fg_invoke::{BreakerConfig, Dispatcher, Invoker, InvokerRegistry, RetryPolicy};
use fg_registry::DefinitionRegistry;
use fg_workflow::{
    ListFilter, MemoryWorkflowStore, TimeoutProcessor, WorkflowEngine, WorkflowEventKind,
    WorkflowStatus, WorkflowStore,
};
use serde_json::{Map, Value, json};
use std::sync::{Arc, Mutex};

const DEFS: &str = r"
domain: orders
workflows:
  - id: orders.approval
    name: Order Approval
    capabilities: ['orders:approval:start']
    initial_step: review
    steps:
      - id: review
        type: human
        capabilities: ['orders:approval:review']
        form_id: orders.approval_form
      - id: confirm
        type: system
        operation:
          type: openapi
          service_id: orders-svc
          operation_id: confirmOrder
        input_mapping:
          path_params:
            id: workflow.order_id
          body_mapping: template
          body_template:
            approval_notes: workflow.approval_notes
      - id: notify
        type: notification
        operation:
          type: openapi
          service_id: notify-svc
          operation_id: sendNote
      - id: approved
        type: terminal
      - id: rejected
        type: terminal
    transitions:
      - from: review
        to: confirm
        event: approve
      - from: review
        to: rejected
        event: reject
      - from: confirm
        to: notify
        event: completed
      - from: notify
        to: approved
        event: completed
  - id: orders.guarded
    initial_step: triage
    steps:
      - id: triage
        type: human
      - id: fast
        type: terminal
      - id: slow
        type: terminal
    transitions:
      - from: triage
        to: fast
        event: route
        guard: workflow.expedite
      - from: triage
        to: slow
        event: route
  - id: orders.fallible
    initial_step: gate
    steps:
      - id: gate
        type: human
      - id: act
        type: system
        operation:
          type: openapi
          service_id: orders-svc
          operation_id: act
      - id: recover
        type: terminal
      - id: done
        type: terminal
    transitions:
      - from: gate
        to: act
        event: go
      - from: act
        to: done
        event: completed
      - from: act
        to: recover
        event: error
  - id: orders.expiring
    initial_step: wait
    timeout: 1s
    on_timeout: expired
    steps:
      - id: wait
        type: human
      - id: expired
        type: terminal
    transitions: []
";

/// Invoker that records calls and pops scripted outcomes.
#[derive(Default)]
struct Recording {
    outcomes: Mutex<Vec<Result<(u16, Value), GatewayError>>>,
    calls: Mutex<Vec<(OperationBinding, InvocationInput)>>,
}

#[async_trait]
impl Invoker for Recording {
    fn name(&self) -> &str {
        "recording"
    }
    fn supports(&self, _binding: &OperationBinding) -> bool {
        true
    }
    async fn invoke(
        &self,
        _rctx: &RequestContext,
        binding: &OperationBinding,
        input: &InvocationInput,
    ) -> Result<InvocationResult, GatewayError> {
        self.calls
            .lock()
            .unwrap()
            .push((binding.clone(), input.clone()));
        let mut outcomes = self.outcomes.lock().unwrap();
        let outcome = if outcomes.is_empty() {
            Ok((200, json!({})))
        } else {
            outcomes.remove(0)
        };
        outcome.map(|(status, body)| InvocationResult {
            status,
            body,
            headers: Default::default(),
        })
    }
}

struct Shared(Arc<Recording>);

#[async_trait]
impl Invoker for Shared {
    fn name(&self) -> &str {
        self.0.name()
    }
    fn supports(&self, b: &OperationBinding) -> bool {
        self.0.supports(b)
    }
    async fn invoke(
        &self,
        rctx: &RequestContext,
        b: &OperationBinding,
        i: &InvocationInput,
    ) -> Result<InvocationResult, GatewayError> {
        self.0.invoke(rctx, b, i).await
    }
}

fn engine_with(outcomes: Vec<Result<(u16, Value), GatewayError>>) -> (WorkflowEngine, Arc<Recording>) {
    let domain: DomainDefinition = serde_yaml::from_str(DEFS).unwrap();
    let registry = Arc::new(DefinitionRegistry::from_domains(vec![domain]).unwrap());

    let recording = Arc::new(Recording {
        outcomes: Mutex::new(outcomes),
        calls: Mutex::new(Vec::new()),
    });
    let mut invokers = InvokerRegistry::new();
    invokers.register(Shared(recording.clone()));
    let dispatcher = Arc::new(Dispatcher::new(
        invokers,
        None,
        BreakerConfig::default(),
        RetryPolicy::none(),
    ));

    let store = Arc::new(MemoryWorkflowStore::new());
    (
        WorkflowEngine::new(registry, dispatcher, store),
        recording,
    )
}

fn rctx() -> RequestContext {
    RequestContext::new("user-1", "tenant-a")
}

fn full_caps() -> CapabilitySet {
    CapabilitySet::from_caps(["*"])
}

fn obj(value: Value) -> Map<String, Value> {
    value.as_object().unwrap().clone()
}

// -- start ------------------------------------------------------------------

#[tokio::test]
async fn start_creates_an_active_instance_on_the_initial_step() {
    let (engine, recording) = engine_with(vec![]);
    let instance = engine
        .start(
            &rctx(),
            &full_caps(),
            "orders.approval",
            &obj(json!({"order_id": "ord-1"})),
            None,
        )
        .await
        .unwrap();

    assert_eq!(instance.status, WorkflowStatus::Active);
    assert_eq!(instance.current_step, "review");
    assert_eq!(instance.version, 1);
    assert_eq!(instance.state["order_id"], "ord-1");
    assert!(recording.calls.lock().unwrap().is_empty());

    let events = engine
        .store()
        .events("tenant-a", &instance.id)
        .await
        .unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].kind, WorkflowEventKind::StepEntered);
    assert_eq!(events[0].step_id, "review");
}

#[tokio::test]
async fn start_requires_workflow_capabilities() {
    let (engine, _) = engine_with(vec![]);
    let viewer = CapabilitySet::from_caps(["orders:order:view"]);
    let err = engine
        .start(&rctx(), &viewer, "orders.approval", &Map::new(), None)
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::Forbidden);
}

#[tokio::test]
async fn start_unknown_workflow_is_not_found() {
    let (engine, _) = engine_with(vec![]);
    let err = engine
        .start(&rctx(), &full_caps(), "orders.nope", &Map::new(), None)
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::NotFound);
}

#[tokio::test]
async fn start_with_workflow_timeout_sets_expiry() {
    let (engine, _) = engine_with(vec![]);
    let instance = engine
        .start(&rctx(), &full_caps(), "orders.expiring", &Map::new(), None)
        .await
        .unwrap();
    assert!(instance.expires_at.is_some());
}

// -- advance: the approve chain ---------------------------------------------

#[tokio::test]
async fn approve_chain_runs_system_and_notification_to_terminal() {
    let (engine, recording) = engine_with(vec![
        Ok((200, json!({"confirmation_id": "c-9"}))),
        Ok((200, json!({}))),
    ]);
    let instance = engine
        .start(
            &rctx(),
            &full_caps(),
            "orders.approval",
            &obj(json!({"order_id": "ord-1"})),
            None,
        )
        .await
        .unwrap();

    let advanced = engine
        .advance(
            &rctx(),
            &full_caps(),
            &instance.id,
            "approve",
            &obj(json!({"approval_notes": "ok"})),
        )
        .await
        .unwrap();

    assert_eq!(advanced.status, WorkflowStatus::Completed);
    assert_eq!(advanced.current_step, "approved");
    assert_eq!(advanced.version, 2);
    // Response body merged into state.
    assert_eq!(advanced.state["confirmation_id"], "c-9");

    let calls = recording.calls.lock().unwrap();
    assert_eq!(calls.len(), 2);
    // System step mapped its path and body from workflow state.
    assert_eq!(calls[0].1.path_params["id"], "ord-1");
    assert_eq!(calls[0].1.body, Some(json!({"approval_notes": "ok"})));

    drop(calls);
    let events = engine
        .store()
        .events("tenant-a", &instance.id)
        .await
        .unwrap();
    let kinds: Vec<WorkflowEventKind> = events.iter().map(|e| e.kind).collect();
    assert!(kinds.contains(&WorkflowEventKind::StepCompleted));
    assert!(kinds.contains(&WorkflowEventKind::WorkflowCompleted));
}

#[tokio::test]
async fn reject_goes_straight_to_terminal() {
    let (engine, recording) = engine_with(vec![]);
    let instance = engine
        .start(&rctx(), &full_caps(), "orders.approval", &Map::new(), None)
        .await
        .unwrap();

    let advanced = engine
        .advance(&rctx(), &full_caps(), &instance.id, "reject", &Map::new())
        .await
        .unwrap();
    assert_eq!(advanced.status, WorkflowStatus::Completed);
    assert_eq!(advanced.current_step, "rejected");
    assert!(recording.calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn unknown_event_is_invalid_transition() {
    let (engine, _) = engine_with(vec![]);
    let instance = engine
        .start(&rctx(), &full_caps(), "orders.approval", &Map::new(), None)
        .await
        .unwrap();
    let err = engine
        .advance(&rctx(), &full_caps(), &instance.id, "escalate", &Map::new())
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::InvalidTransition);
}

#[tokio::test]
async fn advancing_a_completed_instance_is_not_active() {
    let (engine, _) = engine_with(vec![]);
    let instance = engine
        .start(&rctx(), &full_caps(), "orders.approval", &Map::new(), None)
        .await
        .unwrap();
    engine
        .advance(&rctx(), &full_caps(), &instance.id, "reject", &Map::new())
        .await
        .unwrap();
    let err = engine
        .advance(&rctx(), &full_caps(), &instance.id, "approve", &Map::new())
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::WorkflowNotActive);
}

#[tokio::test]
async fn step_capabilities_gate_advance() {
    let (engine, _) = engine_with(vec![]);
    let starter = CapabilitySet::from_caps(["orders:approval:start"]);
    let instance = engine
        .start(&rctx(), &starter, "orders.approval", &Map::new(), None)
        .await
        .unwrap();
    let err = engine
        .advance(&rctx(), &starter, &instance.id, "approve", &Map::new())
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::StepUnauthorized);
}

// -- guards -----------------------------------------------------------------

#[tokio::test]
async fn guard_selects_the_first_passing_transition() {
    let (engine, _) = engine_with(vec![]);
    let instance = engine
        .start(
            &rctx(),
            &full_caps(),
            "orders.guarded",
            &obj(json!({"expedite": true})),
            None,
        )
        .await
        .unwrap();
    let advanced = engine
        .advance(&rctx(), &full_caps(), &instance.id, "route", &Map::new())
        .await
        .unwrap();
    assert_eq!(advanced.current_step, "fast");
}

#[tokio::test]
async fn failing_guard_falls_through_to_unconditional_transition() {
    let (engine, _) = engine_with(vec![]);
    let instance = engine
        .start(
            &rctx(),
            &full_caps(),
            "orders.guarded",
            &obj(json!({"expedite": false})),
            None,
        )
        .await
        .unwrap();
    let advanced = engine
        .advance(&rctx(), &full_caps(), &instance.id, "route", &Map::new())
        .await
        .unwrap();
    assert_eq!(advanced.current_step, "slow");
}

// -- system failures --------------------------------------------------------

#[tokio::test]
async fn system_failure_follows_the_error_transition() {
    let (engine, _) = engine_with(vec![Ok((500, json!({})))]);
    let instance = engine
        .start(&rctx(), &full_caps(), "orders.fallible", &Map::new(), None)
        .await
        .unwrap();
    let advanced = engine
        .advance(&rctx(), &full_caps(), &instance.id, "go", &Map::new())
        .await
        .unwrap();
    assert_eq!(advanced.current_step, "recover");
    assert_eq!(advanced.status, WorkflowStatus::Completed);
}

#[tokio::test]
async fn system_failure_without_error_transition_suspends() {
    let (engine, recording) = engine_with(vec![
        Err(GatewayError::backend_unavailable("down")),
        Err(GatewayError::backend_unavailable("down")),
    ]);
    // orders.approval's confirm step has no error transition.
    let instance = engine
        .start(
            &rctx(),
            &full_caps(),
            "orders.approval",
            &obj(json!({"order_id": "ord-1"})),
            None,
        )
        .await
        .unwrap();
    let advanced = engine
        .advance(
            &rctx(),
            &full_caps(),
            &instance.id,
            "approve",
            &obj(json!({"approval_notes": "ok"})),
        )
        .await
        .unwrap();
    assert_eq!(advanced.status, WorkflowStatus::Suspended);
    assert_eq!(advanced.current_step, "confirm");
    assert_eq!(recording.calls.lock().unwrap().len(), 1);

    let events = engine
        .store()
        .events("tenant-a", &instance.id)
        .await
        .unwrap();
    assert!(events.iter().any(|e| e.kind == WorkflowEventKind::StepFailed));
}

#[tokio::test]
async fn notification_failure_never_blocks() {
    let (engine, _) = engine_with(vec![
        Ok((200, json!({}))),
        Err(GatewayError::backend_unavailable("notify down")),
    ]);
    let instance = engine
        .start(
            &rctx(),
            &full_caps(),
            "orders.approval",
            &obj(json!({"order_id": "ord-1"})),
            None,
        )
        .await
        .unwrap();
    let advanced = engine
        .advance(
            &rctx(),
            &full_caps(),
            &instance.id,
            "approve",
            &obj(json!({"approval_notes": "ok"})),
        )
        .await
        .unwrap();
    assert_eq!(advanced.status, WorkflowStatus::Completed);
    assert_eq!(advanced.current_step, "approved");
}

// -- tenant isolation -------------------------------------------------------

#[tokio::test]
async fn cross_tenant_access_is_not_found() {
    let (engine, _) = engine_with(vec![]);
    let instance = engine
        .start(&rctx(), &full_caps(), "orders.approval", &Map::new(), None)
        .await
        .unwrap();

    let foreign = RequestContext::new("user-9", "tenant-b");
    let get = engine.get(&foreign, &full_caps(), &instance.id).await;
    assert_eq!(get.unwrap_err().code, ErrorCode::NotFound);

    let advance = engine
        .advance(&foreign, &full_caps(), &instance.id, "approve", &Map::new())
        .await;
    assert_eq!(advance.unwrap_err().code, ErrorCode::NotFound);

    let cancel = engine.cancel(&foreign, &instance.id, None).await;
    assert_eq!(cancel.unwrap_err().code, ErrorCode::NotFound);
}

// -- cancel -----------------------------------------------------------------

#[tokio::test]
async fn cancel_marks_cancelled_and_logs_the_reason() {
    let (engine, _) = engine_with(vec![]);
    let instance = engine
        .start(&rctx(), &full_caps(), "orders.approval", &Map::new(), None)
        .await
        .unwrap();
    let cancelled = engine
        .cancel(&rctx(), &instance.id, Some("duplicate request".into()))
        .await
        .unwrap();
    assert_eq!(cancelled.status, WorkflowStatus::Cancelled);
    assert_eq!(cancelled.version, 2);

    let events = engine
        .store()
        .events("tenant-a", &instance.id)
        .await
        .unwrap();
    let cancel_event = events
        .iter()
        .find(|e| e.kind == WorkflowEventKind::Cancelled)
        .unwrap();
    assert_eq!(cancel_event.comment.as_deref(), Some("duplicate request"));

    let err = engine.cancel(&rctx(), &instance.id, None).await.unwrap_err();
    assert_eq!(err.code, ErrorCode::WorkflowNotActive);
}

// -- get / list -------------------------------------------------------------

#[tokio::test]
async fn descriptor_exposes_allowed_events_and_history() {
    let (engine, _) = engine_with(vec![]);
    let caps = CapabilitySet::from_caps(["orders:approval:start", "orders:approval:review"]);
    let instance = engine
        .start(&rctx(), &caps, "orders.approval", &Map::new(), None)
        .await
        .unwrap();

    let descriptor = engine.get(&rctx(), &caps, &instance.id).await.unwrap();
    let current = descriptor.current_step.unwrap();
    assert_eq!(current.id, "review");
    assert_eq!(current.form_id.as_deref(), Some("orders.approval_form"));
    assert_eq!(current.allowed_events, vec!["approve", "reject"]);
    assert_eq!(descriptor.steps.len(), 5);
    assert!(descriptor.steps.iter().any(|s| s.current));
    assert_eq!(descriptor.history.len(), 1);
}

#[tokio::test]
async fn descriptor_hides_actions_without_step_capability() {
    let (engine, _) = engine_with(vec![]);
    let starter = CapabilitySet::from_caps(["orders:approval:start"]);
    let instance = engine
        .start(&rctx(), &starter, "orders.approval", &Map::new(), None)
        .await
        .unwrap();
    let descriptor = engine.get(&rctx(), &starter, &instance.id).await.unwrap();
    assert!(descriptor.current_step.unwrap().allowed_events.is_empty());
}

#[tokio::test]
async fn list_filters_by_status() {
    let (engine, _) = engine_with(vec![]);
    for _ in 0..3 {
        engine
            .start(&rctx(), &full_caps(), "orders.approval", &Map::new(), None)
            .await
            .unwrap();
    }
    let one = engine
        .start(&rctx(), &full_caps(), "orders.approval", &Map::new(), None)
        .await
        .unwrap();
    engine.cancel(&rctx(), &one.id, None).await.unwrap();

    let active = engine
        .list(
            &rctx(),
            &ListFilter {
                status: Some(WorkflowStatus::Active),
                ..ListFilter::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(active.total_count, 3);
}

// -- timeout processing -----------------------------------------------------

#[tokio::test]
async fn timeout_processor_routes_due_instances() {
    let (engine, _) = engine_with(vec![]);
    let engine = Arc::new(engine);
    let instance = engine
        .start(&rctx(), &full_caps(), "orders.expiring", &Map::new(), None)
        .await
        .unwrap();

    // Force the expiry into the past.
    let mut due = engine
        .store()
        .get("tenant-a", &instance.id)
        .await
        .unwrap()
        .unwrap();
    due.expires_at = Some(Utc::now() - chrono::Duration::seconds(5));
    due.version += 1;
    engine.store().update(&due).await.unwrap();

    let processor = TimeoutProcessor::new(engine.clone(), std::time::Duration::from_secs(60));
    assert_eq!(processor.process_once().await, 1);

    let after = engine
        .store()
        .get("tenant-a", &instance.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(after.status, WorkflowStatus::Completed);
    assert_eq!(after.current_step, "expired");

    let events = engine
        .store()
        .events("tenant-a", &instance.id)
        .await
        .unwrap();
    assert!(events.iter().any(|e| e.kind == WorkflowEventKind::Timeout));

    // A second pass finds nothing due.
    assert_eq!(processor.process_once().await, 0);
}
