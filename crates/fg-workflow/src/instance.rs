// SPDX-License-Identifier: MIT OR Apache-2.0
//! Workflow instance rows and the append-only event log.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Lifecycle status of a workflow instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    /// Accepting events.
    Active,
    /// Reached a terminal step.
    Completed,
    /// Failed beyond recovery.
    Failed,
    /// Cancelled by a caller.
    Cancelled,
    /// Halted after a step failure; may be resumed by an operator.
    Suspended,
}

impl WorkflowStatus {
    /// Terminal statuses forbid further state-changing operations.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    /// Statuses an `advance` call may act on.
    pub fn accepts_events(&self) -> bool {
        matches!(self, Self::Active | Self::Suspended)
    }
}

/// One persistent workflow instance.
///
/// `(tenant_id, id)` is the uniqueness key; every update increments
/// `version` and the store rejects stale writers with CONFLICT.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowInstance {
    /// Instance id.
    pub id: String,
    /// Definition this instance runs.
    pub workflow_id: String,
    /// Owning tenant.
    pub tenant_id: String,
    /// Data partition, when the creating request carried one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub partition_id: Option<String>,
    /// Subject that started the instance.
    pub subject_id: String,
    /// Step the instance currently sits on.
    pub current_step: String,
    /// Lifecycle status.
    pub status: WorkflowStatus,
    /// Accumulated state.
    #[serde(default)]
    pub state: Map<String, Value>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last update time.
    pub updated_at: DateTime<Utc>,
    /// Workflow-level expiry, when the definition declares a timeout.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    /// Idempotency key the start call carried, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub idempotency_key: Option<String>,
    /// Monotonic optimistic-locking version.
    pub version: u64,
}

impl WorkflowInstance {
    /// Merge `input` into the accumulated state (input wins on collision).
    pub fn merge_state(&mut self, input: &Map<String, Value>) {
        for (k, v) in input {
            self.state.insert(k.clone(), v.clone());
        }
    }
}

/// Audit tag on a workflow event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowEventKind {
    /// A step became current.
    StepEntered,
    /// A system/notification step finished successfully.
    StepCompleted,
    /// A system step failed.
    StepFailed,
    /// A step or workflow timeout fired.
    Timeout,
    /// The instance was cancelled.
    Cancelled,
    /// The instance reached a terminal step.
    WorkflowCompleted,
}

/// One append-only audit event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowEvent {
    /// Owning instance.
    pub instance_id: String,
    /// Owning tenant (events share the instance's isolation).
    pub tenant_id: String,
    /// Step the event refers to.
    pub step_id: String,
    /// Event tag.
    pub kind: WorkflowEventKind,
    /// Subject (or `system`) that caused the event.
    pub actor_id: String,
    /// Optional structured payload.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    /// Optional free-text comment.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    /// When the event happened.
    pub timestamp: DateTime<Utc>,
}

impl WorkflowEvent {
    /// Create an event stamped now.
    pub fn new(
        instance: &WorkflowInstance,
        step_id: impl Into<String>,
        kind: WorkflowEventKind,
        actor_id: impl Into<String>,
    ) -> Self {
        Self {
            instance_id: instance.id.clone(),
            tenant_id: instance.tenant_id.clone(),
            step_id: step_id.into(),
            kind,
            actor_id: actor_id.into(),
            data: None,
            comment: None,
            timestamp: Utc::now(),
        }
    }

    /// Attach a comment.
    #[must_use]
    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    /// Attach a payload.
    #[must_use]
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }
}
