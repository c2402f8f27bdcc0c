// SPDX-License-Identifier: MIT OR Apache-2.0
//! Client-facing projections of workflow instances.
//!
//! Descriptors carry no backend identifiers; only step/form ids and state
//! the UI may see.

use crate::{WorkflowEvent, WorkflowStatus};
use chrono::{DateTime, Utc};
use fg_core::{Assignee, StepType};
use serde::Serialize;
use serde_json::{Map, Value};

/// The current step as the UI sees it.
#[derive(Debug, Clone, Serialize)]
pub struct StepDescriptor {
    /// Step id.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Step kind.
    #[serde(rename = "type")]
    pub step_type: StepType,
    /// Form to present on a human step.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub form_id: Option<String>,
    /// Assignee hint.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assignee: Option<Assignee>,
    /// Events the caller may raise from this step.
    pub allowed_events: Vec<String>,
}

/// One row of the step overview.
#[derive(Debug, Clone, Serialize)]
pub struct StepSummary {
    /// Step id.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Step kind.
    #[serde(rename = "type")]
    pub step_type: StepType,
    /// Whether this is the instance's current step.
    pub current: bool,
}

/// Full instance descriptor returned by `GET /ui/workflows/{instanceId}`.
#[derive(Debug, Clone, Serialize)]
pub struct InstanceDescriptor {
    /// Instance id.
    pub id: String,
    /// Definition id.
    pub workflow_id: String,
    /// Workflow display name.
    pub name: String,
    /// Lifecycle status.
    pub status: WorkflowStatus,
    /// Current step, when the instance sits on a declared step.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_step: Option<StepDescriptor>,
    /// All steps with the current one flagged.
    pub steps: Vec<StepSummary>,
    /// Accumulated state.
    pub state: Map<String, Value>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last update time.
    pub updated_at: DateTime<Utc>,
    /// Expiry, when set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    /// Audit history, oldest first.
    pub history: Vec<WorkflowEvent>,
}

/// Compact listing row returned by `GET /ui/workflows`.
#[derive(Debug, Clone, Serialize)]
pub struct InstanceSummary {
    /// Instance id.
    pub id: String,
    /// Definition id.
    pub workflow_id: String,
    /// Lifecycle status.
    pub status: WorkflowStatus,
    /// Current step id.
    pub current_step: String,
    /// Starting subject.
    pub subject_id: String,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last update time.
    pub updated_at: DateTime<Utc>,
}

impl From<&crate::WorkflowInstance> for InstanceSummary {
    fn from(instance: &crate::WorkflowInstance) -> Self {
        Self {
            id: instance.id.clone(),
            workflow_id: instance.workflow_id.clone(),
            status: instance.status,
            current_step: instance.current_step.clone(),
            subject_id: instance.subject_id.clone(),
            created_at: instance.created_at,
            updated_at: instance.updated_at,
        }
    }
}
