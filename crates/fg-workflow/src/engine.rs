// SPDX-License-Identifier: MIT OR Apache-2.0
//! Lifecycle operations and the auto-chain loop.

use crate::descriptor::{InstanceDescriptor, StepDescriptor, StepSummary};
use crate::{
    ListFilter, ListPage, WorkflowEvent, WorkflowEventKind, WorkflowInstance, WorkflowStatus,
    WorkflowStore,
};
use chrono::Utc;
use fg_capability::CapabilitySet;
use fg_core::{RequestContext, StepDefinition, StepType, WorkflowDefinition, parse_duration};
use fg_error::GatewayError;
use fg_expr::Sources;
use fg_invoke::Dispatcher;
use fg_mapping::project_fields;
use fg_registry::DefinitionRegistry;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

/// Actor id recorded on events the engine emits on its own behalf.
const SYSTEM_ACTOR: &str = "system";

/// Drives workflow instances through their definitions.
pub struct WorkflowEngine {
    registry: Arc<DefinitionRegistry>,
    dispatcher: Arc<Dispatcher>,
    store: Arc<dyn WorkflowStore>,
}

/// Accumulates chain effects so one optimistic update persists them all.
struct ChainOutcome {
    events: Vec<WorkflowEvent>,
}

impl WorkflowEngine {
    /// Create an engine.
    pub fn new(
        registry: Arc<DefinitionRegistry>,
        dispatcher: Arc<Dispatcher>,
        store: Arc<dyn WorkflowStore>,
    ) -> Self {
        Self {
            registry,
            dispatcher,
            store,
        }
    }

    /// The store this engine persists through.
    pub fn store(&self) -> &Arc<dyn WorkflowStore> {
        &self.store
    }

    // -----------------------------------------------------------------------
    // start
    // -----------------------------------------------------------------------

    /// Start a new instance.
    pub async fn start(
        &self,
        rctx: &RequestContext,
        caps: &CapabilitySet,
        workflow_id: &str,
        input: &Map<String, Value>,
        idempotency_key: Option<String>,
    ) -> Result<WorkflowInstance, GatewayError> {
        let workflow = self.definition(workflow_id)?;

        if !workflow.capabilities.is_empty() && !caps.has_all(&workflow.capabilities) {
            return Err(GatewayError::forbidden(format!(
                "missing capability to start workflow '{workflow_id}'"
            )));
        }

        let now = Utc::now();
        let expires_at = workflow
            .timeout
            .as_deref()
            .and_then(parse_duration)
            .and_then(|d| chrono::Duration::from_std(d).ok())
            .map(|d| now + d);

        let mut instance = WorkflowInstance {
            id: Uuid::new_v4().to_string(),
            workflow_id: workflow_id.to_string(),
            tenant_id: rctx.tenant_id.clone(),
            partition_id: rctx.partition_id.clone(),
            subject_id: rctx.subject_id.clone(),
            current_step: workflow.initial_step.clone(),
            status: WorkflowStatus::Active,
            state: input.clone(),
            created_at: now,
            updated_at: now,
            expires_at,
            idempotency_key,
            version: 1,
        };

        let mut outcome = ChainOutcome { events: Vec::new() };
        outcome.events.push(WorkflowEvent::new(
            &instance,
            &workflow.initial_step,
            WorkflowEventKind::StepEntered,
            &rctx.subject_id,
        ));

        let initial = workflow.step(&workflow.initial_step).ok_or_else(|| {
            GatewayError::internal(format!(
                "workflow '{workflow_id}' initial step is undeclared"
            ))
        })?;
        if initial.step_type.is_automatic() {
            self.auto_chain(rctx, &workflow, &mut instance, &mut outcome)
                .await;
        }

        instance.updated_at = Utc::now();
        self.store.insert(&instance).await?;
        self.flush_events(&outcome).await;
        Ok(instance)
    }

    // -----------------------------------------------------------------------
    // advance
    // -----------------------------------------------------------------------

    /// Apply `event` to an instance and auto-chain any successor system
    /// steps.  The whole chain persists as one optimistic update.
    pub async fn advance(
        &self,
        rctx: &RequestContext,
        caps: &CapabilitySet,
        instance_id: &str,
        event: &str,
        input: &Map<String, Value>,
    ) -> Result<WorkflowInstance, GatewayError> {
        let mut instance = self.load_owned(rctx, instance_id).await?;

        if !instance.status.accepts_events() {
            return Err(GatewayError::workflow_not_active(format!(
                "workflow instance '{instance_id}' is not active"
            )));
        }

        let workflow = self.definition(&instance.workflow_id)?;
        let step = workflow.step(&instance.current_step).ok_or_else(|| {
            GatewayError::internal(format!(
                "instance '{instance_id}' sits on undeclared step '{}'",
                instance.current_step
            ))
        })?;

        // Per-step capability gate, not the workflow-level one.
        if !step.capabilities.is_empty() && !caps.has_all(&step.capabilities) {
            return Err(GatewayError::step_unauthorized(format!(
                "missing capability for step '{}'",
                step.id
            )));
        }

        // Guard evaluation sees the merged state.
        let mut merged = instance.state.clone();
        for (k, v) in input {
            merged.insert(k.clone(), v.clone());
        }
        let target = workflow
            .transitions_for(&instance.current_step, event)
            .find(|t| Self::guard_passes(t.guard.as_deref(), &merged, rctx))
            .map(|t| t.to.clone())
            .ok_or_else(|| {
                GatewayError::invalid_transition(format!(
                    "no transition for event '{event}' from step '{}'",
                    instance.current_step
                ))
            })?;

        instance.merge_state(input);
        instance.status = WorkflowStatus::Active;
        instance.current_step = target.clone();

        let mut outcome = ChainOutcome { events: Vec::new() };
        outcome.events.push(WorkflowEvent::new(
            &instance,
            &target,
            WorkflowEventKind::StepEntered,
            &rctx.subject_id,
        ));

        self.auto_chain(rctx, &workflow, &mut instance, &mut outcome)
            .await;

        instance.updated_at = Utc::now();
        instance.version += 1;
        self.store.update(&instance).await?;
        self.flush_events(&outcome).await;
        Ok(instance)
    }

    // -----------------------------------------------------------------------
    // cancel
    // -----------------------------------------------------------------------

    /// Cancel an active or suspended instance.
    pub async fn cancel(
        &self,
        rctx: &RequestContext,
        instance_id: &str,
        reason: Option<String>,
    ) -> Result<WorkflowInstance, GatewayError> {
        let mut instance = self.load_owned(rctx, instance_id).await?;

        if !instance.status.accepts_events() {
            return Err(GatewayError::workflow_not_active(format!(
                "workflow instance '{instance_id}' is not active"
            )));
        }

        instance.status = WorkflowStatus::Cancelled;
        instance.updated_at = Utc::now();
        instance.version += 1;
        self.store.update(&instance).await?;

        let mut event = WorkflowEvent::new(
            &instance,
            instance.current_step.clone(),
            WorkflowEventKind::Cancelled,
            &rctx.subject_id,
        );
        if let Some(reason) = reason {
            event = event.with_comment(reason);
        }
        if let Err(err) = self.store.append_event(&event).await {
            warn!(instance = %instance.id, error = %err, "failed to append cancel event");
        }
        Ok(instance)
    }

    // -----------------------------------------------------------------------
    // get / list
    // -----------------------------------------------------------------------

    /// Instance descriptor for the UI.  Cross-tenant access reads as
    /// NOT_FOUND so instance ids cannot be enumerated.
    pub async fn get(
        &self,
        rctx: &RequestContext,
        caps: &CapabilitySet,
        instance_id: &str,
    ) -> Result<InstanceDescriptor, GatewayError> {
        let instance = self.load_owned(rctx, instance_id).await?;
        let workflow = self.definition(&instance.workflow_id)?;

        let current = workflow.step(&instance.current_step);
        let allowed_events = current
            .map(|step| {
                if !step.capabilities.is_empty() && !caps.has_all(&step.capabilities) {
                    return Vec::new();
                }
                let mut events: Vec<String> = workflow
                    .transitions
                    .iter()
                    .filter(|t| t.from == instance.current_step)
                    .filter(|t| t.event != "completed" && t.event != "error")
                    .map(|t| t.event.clone())
                    .collect();
                events.dedup();
                events
            })
            .unwrap_or_default();

        let history = self.store.events(&rctx.tenant_id, &instance.id).await?;

        Ok(InstanceDescriptor {
            id: instance.id.clone(),
            workflow_id: instance.workflow_id.clone(),
            name: workflow.name.clone(),
            status: instance.status,
            current_step: current.map(|step| StepDescriptor {
                id: step.id.clone(),
                name: step.name.clone(),
                step_type: step.step_type,
                form_id: step.form_id.clone(),
                assignee: step.assignee.clone(),
                allowed_events,
            }),
            steps: workflow
                .steps
                .iter()
                .map(|step| StepSummary {
                    id: step.id.clone(),
                    name: step.name.clone(),
                    step_type: step.step_type,
                    current: step.id == instance.current_step,
                })
                .collect(),
            state: instance.state.clone(),
            created_at: instance.created_at,
            updated_at: instance.updated_at,
            expires_at: instance.expires_at,
            history,
        })
    }

    /// List instances in the caller's tenant.
    pub async fn list(
        &self,
        rctx: &RequestContext,
        filter: &ListFilter,
    ) -> Result<ListPage, GatewayError> {
        self.store.list(&rctx.tenant_id, filter).await
    }

    // -----------------------------------------------------------------------
    // timeout entry point (used by the processor)
    // -----------------------------------------------------------------------

    /// Fire the timeout handler for a due instance.  Returns `true` when the
    /// instance was modified.
    pub async fn fire_timeout(&self, instance_id: &str, tenant_id: &str) -> Result<bool, GatewayError> {
        let Some(mut instance) = self.store.get(tenant_id, instance_id).await? else {
            return Ok(false);
        };
        if instance.status != WorkflowStatus::Active {
            return Ok(false);
        }
        let workflow = self.definition(&instance.workflow_id)?;

        let handler = workflow
            .step(&instance.current_step)
            .and_then(|s| s.on_timeout.clone())
            .or_else(|| workflow.on_timeout.clone());
        let Some(handler) = handler else {
            // No handler anywhere: leave the instance untouched.
            return Ok(false);
        };

        let mut outcome = ChainOutcome { events: Vec::new() };
        outcome.events.push(
            WorkflowEvent::new(
                &instance,
                instance.current_step.clone(),
                WorkflowEventKind::Timeout,
                SYSTEM_ACTOR,
            )
            .with_comment(format!("timed out; entering '{handler}'")),
        );

        instance.current_step = handler.clone();
        instance.expires_at = None;
        outcome.events.push(WorkflowEvent::new(
            &instance,
            &handler,
            WorkflowEventKind::StepEntered,
            SYSTEM_ACTOR,
        ));

        let rctx = RequestContext::new(SYSTEM_ACTOR, &instance.tenant_id);
        self.auto_chain(&rctx, &workflow, &mut instance, &mut outcome)
            .await;

        instance.updated_at = Utc::now();
        instance.version += 1;
        self.store.update(&instance).await?;
        self.flush_events(&outcome).await;
        Ok(true)
    }

    // -----------------------------------------------------------------------
    // auto-chain
    // -----------------------------------------------------------------------

    /// Advance through non-human steps until a human step, a terminal, or a
    /// dead end.  Bounded by the step count to survive definition cycles.
    async fn auto_chain(
        &self,
        rctx: &RequestContext,
        workflow: &WorkflowDefinition,
        instance: &mut WorkflowInstance,
        outcome: &mut ChainOutcome,
    ) {
        let mut hops = 0usize;
        loop {
            if hops > workflow.steps.len() {
                warn!(
                    instance = %instance.id,
                    workflow = %workflow.id,
                    "auto-chain exceeded step count; suspending"
                );
                instance.status = WorkflowStatus::Suspended;
                return;
            }
            hops += 1;

            let Some(step) = workflow.step(&instance.current_step) else {
                warn!(
                    instance = %instance.id,
                    step = %instance.current_step,
                    "auto-chain reached undeclared step; suspending"
                );
                instance.status = WorkflowStatus::Suspended;
                return;
            };

            match step.step_type {
                StepType::Human => return,
                StepType::Terminal => {
                    instance.status = WorkflowStatus::Completed;
                    outcome.events.push(WorkflowEvent::new(
                        instance,
                        &step.id,
                        WorkflowEventKind::WorkflowCompleted,
                        SYSTEM_ACTOR,
                    ));
                    return;
                }
                StepType::System => {
                    match self.invoke_step(rctx, instance, step).await {
                        Ok(body) => {
                            Self::merge_step_output(instance, step, &body);
                            outcome.events.push(WorkflowEvent::new(
                                instance,
                                &step.id,
                                WorkflowEventKind::StepCompleted,
                                SYSTEM_ACTOR,
                            ));
                        }
                        Err(err) => {
                            debug!(
                                instance = %instance.id,
                                step = %step.id,
                                error = %err,
                                "system step failed"
                            );
                            let step_id = step.id.clone();
                            if let Some(target) = self.error_target(workflow, &step_id, instance, rctx) {
                                outcome.events.push(
                                    WorkflowEvent::new(
                                        instance,
                                        &step_id,
                                        WorkflowEventKind::StepFailed,
                                        SYSTEM_ACTOR,
                                    )
                                    .with_comment(err.to_string()),
                                );
                                instance.current_step = target.clone();
                                outcome.events.push(WorkflowEvent::new(
                                    instance,
                                    &target,
                                    WorkflowEventKind::StepEntered,
                                    SYSTEM_ACTOR,
                                ));
                                continue;
                            }
                            instance.status = WorkflowStatus::Suspended;
                            outcome.events.push(
                                WorkflowEvent::new(
                                    instance,
                                    &step_id,
                                    WorkflowEventKind::StepFailed,
                                    SYSTEM_ACTOR,
                                )
                                .with_comment(err.to_string()),
                            );
                            return;
                        }
                    }
                }
                StepType::Notification => {
                    // Notification failures never block the chain.
                    if let Err(err) = self.invoke_step(rctx, instance, step).await {
                        warn!(
                            instance = %instance.id,
                            step = %step.id,
                            error = %err,
                            "notification step failed; continuing"
                        );
                    }
                    outcome.events.push(WorkflowEvent::new(
                        instance,
                        &step.id,
                        WorkflowEventKind::StepCompleted,
                        SYSTEM_ACTOR,
                    ));
                }
            }

            // Follow the single unconditional `completed` transition.
            let next = workflow
                .transitions_for(&instance.current_step, "completed")
                .find(|t| Self::guard_passes(t.guard.as_deref(), &instance.state, rctx))
                .map(|t| t.to.clone());
            match next {
                Some(next) => {
                    instance.current_step = next.clone();
                    outcome.events.push(WorkflowEvent::new(
                        instance,
                        &next,
                        WorkflowEventKind::StepEntered,
                        SYSTEM_ACTOR,
                    ));
                }
                None => return,
            }
        }
    }

    async fn invoke_step(
        &self,
        rctx: &RequestContext,
        instance: &WorkflowInstance,
        step: &StepDefinition,
    ) -> Result<Value, GatewayError> {
        let binding = step.operation.as_ref().ok_or_else(|| {
            GatewayError::internal(format!("step '{}' has no operation binding", step.id))
        })?;

        let sources = Sources::for_workflow(&instance.state, rctx);
        let input = fg_mapping::build_input(&step.input_mapping, &sources, &instance.state)
            .map_err(|e| GatewayError::bad_request(e.to_string()))?;

        let result = self.dispatcher.dispatch(rctx, binding, &input).await?;
        if result.is_success() {
            Ok(result.body)
        } else {
            Err(GatewayError::bad_request(format!(
                "step '{}' backend returned status {}",
                step.id, result.status
            )))
        }
    }

    fn merge_step_output(instance: &mut WorkflowInstance, step: &StepDefinition, body: &Value) {
        if step.output_mapping.fields.is_empty() {
            if let Some(obj) = body.as_object() {
                instance.merge_state(obj);
            }
            return;
        }
        let projected = project_fields(body, &step.output_mapping.fields);
        instance.merge_state(&projected);
    }

    fn error_target(
        &self,
        workflow: &WorkflowDefinition,
        step_id: &str,
        instance: &WorkflowInstance,
        rctx: &RequestContext,
    ) -> Option<String> {
        workflow
            .transitions_for(step_id, "error")
            .find(|t| Self::guard_passes(t.guard.as_deref(), &instance.state, rctx))
            .map(|t| t.to.clone())
    }

    /// A guard passes when absent, or when its expression resolves to a
    /// truthy value (boolean true, non-zero number, non-empty string).
    fn guard_passes(guard: Option<&str>, state: &Map<String, Value>, rctx: &RequestContext) -> bool {
        let Some(expr) = guard else {
            return true;
        };
        let sources = Sources::for_workflow(state, rctx);
        match fg_expr::resolve(expr, &sources) {
            Ok(Value::Bool(b)) => b,
            Ok(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0),
            Ok(Value::String(s)) => !s.is_empty(),
            Ok(Value::Null) => false,
            Ok(_) => true,
            Err(_) => false,
        }
    }

    // -----------------------------------------------------------------------
    // helpers
    // -----------------------------------------------------------------------

    fn definition(&self, workflow_id: &str) -> Result<WorkflowDefinition, GatewayError> {
        self.registry
            .workflow(workflow_id)
            .cloned()
            .ok_or_else(|| GatewayError::not_found(format!("workflow '{workflow_id}' not found")))
    }

    async fn load_owned(
        &self,
        rctx: &RequestContext,
        instance_id: &str,
    ) -> Result<WorkflowInstance, GatewayError> {
        self.store
            .get(&rctx.tenant_id, instance_id)
            .await?
            .ok_or_else(|| {
                GatewayError::not_found(format!("workflow instance '{instance_id}' not found"))
            })
    }

    async fn flush_events(&self, outcome: &ChainOutcome) {
        for event in &outcome.events {
            if let Err(err) = self.store.append_event(event).await {
                warn!(instance = %event.instance_id, error = %err, "failed to append workflow event");
            }
        }
    }
}
