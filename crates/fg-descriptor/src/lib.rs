// SPDX-License-Identifier: MIT OR Apache-2.0
#![deny(unsafe_code)]
#![warn(missing_docs)]
//! Capability-filtered descriptor assembly.
//!
//! Descriptors are the client-facing projection of pages, forms, and
//! navigation.  They carry UI ids only — never a `service_id`,
//! `operation_id`, or any other backend identifier.

use fg_capability::CapabilitySet;
use fg_core::{
    ActionDefinition, ColumnDefinition, FieldDefinition, FilterDefinition, InvocationInput,
    NavItem, RequestContext,
};
use fg_error::GatewayError;
use fg_invoke::Dispatcher;
use fg_registry::DefinitionRegistry;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

// ---------------------------------------------------------------------------
// Descriptor shapes
// ---------------------------------------------------------------------------

/// One visible navigation entry.
#[derive(Debug, Clone, Serialize)]
pub struct NavItemDescriptor {
    /// Item id.
    pub id: String,
    /// Display label.
    pub label: String,
    /// Icon hint.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    /// UI route.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub route: Option<String>,
    /// Badge count, when a badge resolved.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub badge: Option<u64>,
    /// Visible children.
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub children: Vec<NavItemDescriptor>,
}

/// The whole menu tree.
#[derive(Debug, Clone, Serialize)]
pub struct NavigationDescriptor {
    /// Visible top-level items.
    pub items: Vec<NavItemDescriptor>,
}

/// A visible page action.
#[derive(Debug, Clone, Serialize)]
pub struct ActionDescriptor {
    /// Action id.
    pub id: String,
    /// Button label.
    pub label: String,
    /// Command the action executes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command_id: Option<String>,
    /// Form the action opens.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub form_id: Option<String>,
    /// Workflow the action starts.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workflow_id: Option<String>,
    /// Confirmation prompt.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confirm: Option<String>,
}

/// A resolved page descriptor.
#[derive(Debug, Clone, Serialize)]
pub struct PageDescriptor {
    /// Page id.
    pub id: String,
    /// Page title.
    pub title: String,
    /// Whether the page serves list data.
    pub has_data: bool,
    /// List columns.
    pub columns: Vec<ColumnDefinition>,
    /// Filter controls.
    pub filters: Vec<FilterDefinition>,
    /// Actions the caller may trigger.
    pub actions: Vec<ActionDescriptor>,
}

/// A resolved form descriptor.
#[derive(Debug, Clone, Serialize)]
pub struct FormDescriptor {
    /// Form id.
    pub id: String,
    /// Form title.
    pub title: String,
    /// Command the form submits.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub submit_command: Option<String>,
    /// Fields in display order.
    pub fields: Vec<FieldDefinition>,
}

// ---------------------------------------------------------------------------
// Assembler
// ---------------------------------------------------------------------------

/// Assembles descriptors for one request's capability set.
pub struct DescriptorAssembler {
    registry: Arc<DefinitionRegistry>,
    dispatcher: Arc<Dispatcher>,
}

impl DescriptorAssembler {
    /// Create an assembler.
    pub fn new(registry: Arc<DefinitionRegistry>, dispatcher: Arc<Dispatcher>) -> Self {
        Self {
            registry,
            dispatcher,
        }
    }

    /// The menu tree, filtered by capabilities, badges resolved best-effort.
    pub async fn navigation(
        &self,
        rctx: &RequestContext,
        caps: &CapabilitySet,
    ) -> NavigationDescriptor {
        let mut items = Vec::new();
        for item in self.registry.navigation_items() {
            if let Some(descriptor) = self.assemble_nav_item(rctx, caps, item).await {
                items.push(descriptor);
            }
        }
        NavigationDescriptor { items }
    }

    async fn assemble_nav_item(
        &self,
        rctx: &RequestContext,
        caps: &CapabilitySet,
        item: &NavItem,
    ) -> Option<NavItemDescriptor> {
        if !item.capabilities.is_empty() && !caps.has_all(&item.capabilities) {
            return None;
        }

        let mut children = Vec::new();
        for child in &item.children {
            if let Some(descriptor) = Box::pin(self.assemble_nav_item(rctx, caps, child)).await {
                children.push(descriptor);
            }
        }
        // A group with every child filtered away disappears with them.
        if item.route.is_none() && !item.children.is_empty() && children.is_empty() {
            return None;
        }

        let badge = match &item.badge {
            Some(badge) => self.resolve_badge(rctx, badge).await,
            None => None,
        };

        Some(NavItemDescriptor {
            id: item.id.clone(),
            label: item.label.clone(),
            icon: item.icon.clone(),
            route: item.route.clone(),
            badge,
            children,
        })
    }

    /// Badge counts are best-effort: any failure drops the badge, never the
    /// menu item.
    async fn resolve_badge(
        &self,
        rctx: &RequestContext,
        badge: &fg_core::BadgeDefinition,
    ) -> Option<u64> {
        let result = self
            .dispatcher
            .dispatch(rctx, &badge.operation, &InvocationInput::default())
            .await;
        let result = match result {
            Ok(result) if result.is_success() => result,
            Ok(result) => {
                debug!(status = result.status, "badge backend rejected; dropping badge");
                return None;
            }
            Err(err) => {
                debug!(error = %err, "badge resolution failed; dropping badge");
                return None;
            }
        };
        let count = match badge.count_path.as_deref() {
            Some(path) => fg_mapping::navigate_path(&result.body, path)?.clone(),
            None => result.body.get("count")?.clone(),
        };
        count.as_u64()
    }

    /// A page descriptor, or NOT_FOUND / FORBIDDEN.
    pub fn page(
        &self,
        caps: &CapabilitySet,
        page_id: &str,
    ) -> Result<PageDescriptor, GatewayError> {
        let page = self
            .registry
            .page(page_id)
            .ok_or_else(|| GatewayError::not_found(format!("page '{page_id}' not found")))?;

        if !page.capabilities.is_empty() && !caps.has_all(&page.capabilities) {
            return Err(GatewayError::forbidden(format!(
                "missing capability for page '{page_id}'"
            )));
        }

        let actions = page
            .actions
            .iter()
            .filter(|a| a.capabilities.is_empty() || caps.has_all(&a.capabilities))
            .map(action_descriptor)
            .collect();

        Ok(PageDescriptor {
            id: page.id.clone(),
            title: page.title.clone(),
            has_data: page.data_source.is_some(),
            columns: page.columns.clone(),
            filters: page.filters.clone(),
            actions,
        })
    }

    /// A form descriptor, or NOT_FOUND / FORBIDDEN.
    pub fn form(
        &self,
        caps: &CapabilitySet,
        form_id: &str,
    ) -> Result<FormDescriptor, GatewayError> {
        let form = self
            .registry
            .form(form_id)
            .ok_or_else(|| GatewayError::not_found(format!("form '{form_id}' not found")))?;

        if !form.capabilities.is_empty() && !caps.has_all(&form.capabilities) {
            return Err(GatewayError::forbidden(format!(
                "missing capability for form '{form_id}'"
            )));
        }

        Ok(FormDescriptor {
            id: form.id.clone(),
            title: form.title.clone(),
            submit_command: form.submit_command.clone(),
            fields: form.fields.clone(),
        })
    }

    /// Proxied list data for a page: forwards pagination, sorting, and
    /// filters to the page's data source and returns the backend body.
    pub async fn page_data(
        &self,
        rctx: &RequestContext,
        caps: &CapabilitySet,
        page_id: &str,
        params: &BTreeMap<String, String>,
    ) -> Result<Value, GatewayError> {
        let page = self
            .registry
            .page(page_id)
            .ok_or_else(|| GatewayError::not_found(format!("page '{page_id}' not found")))?;
        if !page.capabilities.is_empty() && !caps.has_all(&page.capabilities) {
            return Err(GatewayError::forbidden(format!(
                "missing capability for page '{page_id}'"
            )));
        }
        let source = page.data_source.as_ref().ok_or_else(|| {
            GatewayError::not_found(format!("page '{page_id}' has no data source"))
        })?;

        let mut input = InvocationInput {
            query_params: params.clone(),
            ..InvocationInput::default()
        };
        if let Some(size) = source.default_page_size {
            input
                .query_params
                .entry("page_size".to_string())
                .or_insert_with(|| size.to_string());
        }

        let result = self.dispatcher.dispatch(rctx, &source.operation, &input).await?;
        if !result.is_success() {
            return Err(GatewayError::backend_unavailable(format!(
                "data source for page '{page_id}' returned status {}",
                result.status
            )));
        }
        Ok(result.body)
    }

    /// Form pre-fill data via the form's data source.
    pub async fn form_data(
        &self,
        rctx: &RequestContext,
        caps: &CapabilitySet,
        form_id: &str,
        params: &BTreeMap<String, String>,
    ) -> Result<Value, GatewayError> {
        let form = self
            .registry
            .form(form_id)
            .ok_or_else(|| GatewayError::not_found(format!("form '{form_id}' not found")))?;
        if !form.capabilities.is_empty() && !caps.has_all(&form.capabilities) {
            return Err(GatewayError::forbidden(format!(
                "missing capability for form '{form_id}'"
            )));
        }
        let source = form.data_source.as_ref().ok_or_else(|| {
            GatewayError::not_found(format!("form '{form_id}' has no data source"))
        })?;

        let input = InvocationInput {
            query_params: params.clone(),
            ..InvocationInput::default()
        };
        let result = self.dispatcher.dispatch(rctx, &source.operation, &input).await?;
        if !result.is_success() {
            return Err(GatewayError::backend_unavailable(format!(
                "data source for form '{form_id}' returned status {}",
                result.status
            )));
        }
        Ok(result.body)
    }
}

fn action_descriptor(action: &ActionDefinition) -> ActionDescriptor {
    ActionDescriptor {
        id: action.id.clone(),
        label: action.label.clone(),
        command_id: action.command_id.clone(),
        form_id: action.form_id.clone(),
        workflow_id: action.workflow_id.clone(),
        confirm: action.confirm.clone(),
    }
}
