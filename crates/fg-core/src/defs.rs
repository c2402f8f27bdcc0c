// SPDX-License-Identifier: MIT OR Apache-2.0
//! The declarative definition model.
//!
//! One YAML file declares one domain: navigation, pages, forms, commands,
//! workflows, searches, and lookups.  These types are the deserialized shape
//! of those files; cross-reference validation lives in `fg-registry`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ---------------------------------------------------------------------------
// Domain file
// ---------------------------------------------------------------------------

/// A whole definition file: one UI domain.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DomainDefinition {
    /// Domain name; capability strings in this file must start with it.
    pub domain: String,
    /// Definition schema version (informational).
    #[serde(default)]
    pub version: String,
    /// Navigation contributed by this domain.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub navigation: Option<NavigationDefinition>,
    /// Page definitions.
    #[serde(default)]
    pub pages: Vec<PageDefinition>,
    /// Form definitions.
    #[serde(default)]
    pub forms: Vec<FormDefinition>,
    /// Command definitions.
    #[serde(default)]
    pub commands: Vec<CommandDefinition>,
    /// Workflow definitions.
    #[serde(default)]
    pub workflows: Vec<WorkflowDefinition>,
    /// Federated-search provider definitions.
    #[serde(default)]
    pub searches: Vec<SearchDefinition>,
    /// Lookup (option list) definitions.
    #[serde(default)]
    pub lookups: Vec<LookupDefinition>,
}

// ---------------------------------------------------------------------------
// Operation binding
// ---------------------------------------------------------------------------

/// How a command, step, badge, or provider reaches a backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OperationBinding {
    /// An operation in an indexed OpenAPI document.
    Openapi {
        /// Service id the spec was registered under.
        service_id: String,
        /// `operationId` within that spec.
        operation_id: String,
    },
    /// A named in-process handler.
    Sdk {
        /// Registered handler name.
        handler: String,
    },
}

impl OperationBinding {
    /// The service this binding targets, when it targets one.
    pub fn service_id(&self) -> Option<&str> {
        match self {
            Self::Openapi { service_id, .. } => Some(service_id),
            Self::Sdk { .. } => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Mappings
// ---------------------------------------------------------------------------

/// Declarative construction of an invocation input.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InputMapping {
    /// Path parameter name → source expression.
    #[serde(default)]
    pub path_params: BTreeMap<String, String>,
    /// Query parameter name → source expression.
    #[serde(default)]
    pub query_params: BTreeMap<String, String>,
    /// Header name → source expression.
    #[serde(default)]
    pub header_params: BTreeMap<String, String>,
    /// Body strategy: `passthrough` (default), `template`, or `projection`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body_mapping: Option<String>,
    /// Output field → expression, used by the `template` strategy.
    #[serde(default)]
    pub body_template: BTreeMap<String, String>,
    /// Backend field → expression, used by the `projection` strategy.
    #[serde(default)]
    pub field_projection: BTreeMap<String, String>,
}

/// Declarative reshaping of a backend response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OutputMapping {
    /// Message returned to the UI on success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub success_message: Option<String>,
    /// UI field name → dotted path into the backend response body.
    #[serde(default)]
    pub fields: BTreeMap<String, String>,
    /// Backend error code → user-safe message.
    #[serde(default)]
    pub error_map: BTreeMap<String, String>,
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

/// Idempotency configuration for a command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdempotencyConfig {
    /// Where the key comes from (currently always the caller).
    #[serde(default)]
    pub key_source: Option<String>,
    /// Cache lifetime as a duration string; defaults to 24h when absent or
    /// unparseable.
    #[serde(default)]
    pub ttl: Option<String>,
}

/// Partitioning scope for a rate limit or cache.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RateLimitScope {
    /// One bucket per subject.
    #[default]
    User,
    /// One bucket per tenant.
    Tenant,
    /// A single shared bucket.
    Global,
}

/// Rate-limit configuration for a command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Maximum requests per window.
    pub max_requests: u32,
    /// Window length as a duration string.
    pub window: String,
    /// Bucket partitioning.
    #[serde(default)]
    pub scope: RateLimitScope,
}

/// A declaratively bound mutating operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandDefinition {
    /// Command id, referenced by pages/forms and the HTTP surface.
    pub id: String,
    /// Capabilities required to execute.
    #[serde(default)]
    pub capabilities: Vec<String>,
    /// Backend binding.
    pub operation: OperationBinding,
    /// Input construction.
    #[serde(default)]
    pub input_mapping: InputMapping,
    /// Response reshaping.
    #[serde(default)]
    pub output_mapping: OutputMapping,
    /// Optional idempotency configuration.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub idempotency: Option<IdempotencyConfig>,
    /// Optional rate limit.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rate_limit: Option<RateLimitConfig>,
}

// ---------------------------------------------------------------------------
// Workflows
// ---------------------------------------------------------------------------

/// Discriminates how the engine treats a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepType {
    /// Waits for a user action (form submission / event).
    Human,
    /// Invokes a backend and merges the response into state.
    System,
    /// Invokes a backend; failures never block the chain.
    Notification,
    /// Completes the workflow.
    Terminal,
}

impl StepType {
    /// Steps the auto-chain loop advances through without user input.
    pub fn is_automatic(&self) -> bool {
        !matches!(self, Self::Human)
    }
}

/// Step assignee declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignee {
    /// Assignee kind (e.g. `role`, `user`).
    #[serde(rename = "type")]
    pub assignee_type: String,
    /// Kind-specific value.
    pub value: String,
}

/// A single workflow step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepDefinition {
    /// Step id, unique within the workflow.
    pub id: String,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Step kind.
    #[serde(rename = "type")]
    pub step_type: StepType,
    /// Capabilities required to act on this step.
    #[serde(default)]
    pub capabilities: Vec<String>,
    /// Form presented on a human step.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub form_id: Option<String>,
    /// Backend binding for system/notification steps.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation: Option<OperationBinding>,
    /// Input construction for the step invocation.
    #[serde(default)]
    pub input_mapping: InputMapping,
    /// Response reshaping merged into workflow state.
    #[serde(default)]
    pub output_mapping: OutputMapping,
    /// Step-level timeout as a duration string.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<String>,
    /// Step to enter when the timeout fires.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_timeout: Option<String>,
    /// Assignee hint for human steps.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignee: Option<Assignee>,
}

/// A guard-gated edge between steps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionDefinition {
    /// Source step id.
    pub from: String,
    /// Target step id.
    pub to: String,
    /// Event that triggers this transition.
    pub event: String,
    /// Optional guard expression evaluated against merged state.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guard: Option<String>,
}

/// A complete workflow state machine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowDefinition {
    /// Workflow id.
    pub id: String,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Capabilities required to start an instance.
    #[serde(default)]
    pub capabilities: Vec<String>,
    /// Step every instance enters first.
    pub initial_step: String,
    /// Workflow-level expiry as a duration string.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<String>,
    /// Step entered when the workflow-level timeout fires.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_timeout: Option<String>,
    /// Ordered steps.
    pub steps: Vec<StepDefinition>,
    /// Ordered transitions.
    #[serde(default)]
    pub transitions: Vec<TransitionDefinition>,
}

impl WorkflowDefinition {
    /// Find a step by id.
    pub fn step(&self, id: &str) -> Option<&StepDefinition> {
        self.steps.iter().find(|s| s.id == id)
    }

    /// Transitions leaving `from` for `event`, in declaration order.
    pub fn transitions_for(
        &self,
        from: &str,
        event: &str,
    ) -> impl Iterator<Item = &TransitionDefinition> {
        self.transitions
            .iter()
            .filter(move |t| t.from == from && t.event == event)
    }
}

// ---------------------------------------------------------------------------
// Pages
// ---------------------------------------------------------------------------

/// Backend binding that feeds a page or form with data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataSourceDefinition {
    /// Backend binding.
    pub operation: OperationBinding,
    /// Input construction for the data call.
    #[serde(default)]
    pub input_mapping: InputMapping,
    /// Dotted path to the item array in the response, when not at the root.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items_path: Option<String>,
    /// Default page size for list data.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_page_size: Option<u32>,
}

/// A list column on a page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnDefinition {
    /// Backend field the column renders.
    pub field: String,
    /// Column header label.
    pub label: String,
    /// Whether the UI may sort by this column.
    #[serde(default)]
    pub sortable: bool,
    /// Render hint (e.g. `text`, `date`, `badge`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
}

/// A filter control on a page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterDefinition {
    /// Backend field the filter applies to.
    pub field: String,
    /// Filter label.
    pub label: String,
    /// Control kind (e.g. `select`, `text`, `date_range`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub control: Option<String>,
    /// Lookup feeding the filter's options.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lookup_id: Option<String>,
}

/// An action the UI can trigger from a page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionDefinition {
    /// Action id.
    pub id: String,
    /// Button label.
    pub label: String,
    /// Command executed by this action.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command_id: Option<String>,
    /// Form opened by this action.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub form_id: Option<String>,
    /// Workflow started by this action.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workflow_id: Option<String>,
    /// Capabilities required to see the action.
    #[serde(default)]
    pub capabilities: Vec<String>,
    /// Confirmation prompt shown before executing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confirm: Option<String>,
}

/// A page descriptor definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageDefinition {
    /// Page id.
    pub id: String,
    /// Page title.
    pub title: String,
    /// Capabilities required to view the page.
    #[serde(default)]
    pub capabilities: Vec<String>,
    /// List data source.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_source: Option<DataSourceDefinition>,
    /// List columns.
    #[serde(default)]
    pub columns: Vec<ColumnDefinition>,
    /// Filter controls.
    #[serde(default)]
    pub filters: Vec<FilterDefinition>,
    /// Page-level actions.
    #[serde(default)]
    pub actions: Vec<ActionDefinition>,
}

// ---------------------------------------------------------------------------
// Forms
// ---------------------------------------------------------------------------

/// A single form field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDefinition {
    /// Field name, also the key in submitted input.
    pub name: String,
    /// Field label.
    pub label: String,
    /// Control kind (e.g. `text`, `number`, `select`, `textarea`).
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub field_type: Option<String>,
    /// Whether the field must be filled.
    #[serde(default)]
    pub required: bool,
    /// Lookup feeding a select control.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lookup_id: Option<String>,
    /// Default value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<serde_json::Value>,
    /// Free-form validation hints forwarded to the UI.
    #[serde(default)]
    pub validation: BTreeMap<String, serde_json::Value>,
}

/// A form descriptor definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormDefinition {
    /// Form id.
    pub id: String,
    /// Form title.
    pub title: String,
    /// Capabilities required to open the form.
    #[serde(default)]
    pub capabilities: Vec<String>,
    /// Command submitted by this form.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submit_command: Option<String>,
    /// Fields in display order.
    #[serde(default)]
    pub fields: Vec<FieldDefinition>,
    /// Pre-fill data source.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_source: Option<DataSourceDefinition>,
}

// ---------------------------------------------------------------------------
// Navigation
// ---------------------------------------------------------------------------

/// A badge on a navigation item, resolved best-effort at request time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BadgeDefinition {
    /// Backend binding producing the count.
    pub operation: OperationBinding,
    /// Dotted path to the numeric count in the response.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count_path: Option<String>,
}

/// One navigation entry, possibly with children.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NavItem {
    /// Item id.
    pub id: String,
    /// Display label.
    pub label: String,
    /// Icon hint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    /// UI route the item links to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub route: Option<String>,
    /// Capabilities required to see the item.
    #[serde(default)]
    pub capabilities: Vec<String>,
    /// Optional badge.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub badge: Option<BadgeDefinition>,
    /// Child items.
    #[serde(default)]
    pub children: Vec<NavItem>,
}

/// Navigation contributed by one domain.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NavigationDefinition {
    /// Top-level items in declaration order.
    #[serde(default)]
    pub items: Vec<NavItem>,
}

// ---------------------------------------------------------------------------
// Search
// ---------------------------------------------------------------------------

/// Field mapping from backend items to search results.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchFields {
    /// Item field holding the result id.
    #[serde(default)]
    pub id_field: Option<String>,
    /// Item field holding the title.
    #[serde(default)]
    pub title_field: Option<String>,
    /// Item field holding the subtitle.
    #[serde(default)]
    pub subtitle_field: Option<String>,
}

/// One federated-search provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchDefinition {
    /// Provider id.
    pub id: String,
    /// Domain the results belong to (also the result category).
    pub domain: String,
    /// Capabilities required to query this provider.
    #[serde(default)]
    pub capabilities: Vec<String>,
    /// Backend binding; invoked with `{"q": query}`.
    pub operation: OperationBinding,
    /// Dotted path to the result array in the response.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_path: Option<String>,
    /// Item → result field mapping.
    #[serde(default)]
    pub fields: SearchFields,
    /// Icon for results from this provider.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    /// Route template (`{id}` substituted per result).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub route_template: Option<String>,
    /// Provider weight applied to position scores.
    #[serde(default = "default_weight")]
    pub weight: f64,
    /// Per-provider result cap.
    #[serde(default = "default_max_results")]
    pub max_results: usize,
}

fn default_weight() -> f64 {
    1.0
}

fn default_max_results() -> usize {
    20
}

// ---------------------------------------------------------------------------
// Lookups
// ---------------------------------------------------------------------------

/// Cache partitioning for lookups.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheScope {
    /// One cache entry per tenant.
    #[default]
    Tenant,
    /// A single shared entry.
    Global,
    /// One entry per subject.
    User,
}

/// Lookup cache configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Cache partitioning.
    #[serde(default)]
    pub scope: CacheScope,
    /// Entry lifetime as a duration string.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl: Option<String>,
}

/// A cached option list definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LookupDefinition {
    /// Lookup id.
    pub id: String,
    /// Capabilities required to read the lookup.
    #[serde(default)]
    pub capabilities: Vec<String>,
    /// Backend binding producing the options.
    pub operation: OperationBinding,
    /// Item field holding the option label.
    pub label_field: String,
    /// Item field holding the option value.
    pub value_field: String,
    /// Cache configuration.
    #[serde(default)]
    pub cache: CacheConfig,
}
