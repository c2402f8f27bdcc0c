// SPDX-License-Identifier: MIT OR Apache-2.0
//! Workflow persistence with optimistic locking.

use crate::{WorkflowEvent, WorkflowInstance};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fg_error::GatewayError;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Filters for listing instances within a tenant.
#[derive(Debug, Clone, Default)]
pub struct ListFilter {
    /// Keep only this status.
    pub status: Option<crate::WorkflowStatus>,
    /// Keep only instances of this workflow.
    pub workflow_id: Option<String>,
    /// Keep only instances started by this subject.
    pub subject_id: Option<String>,
    /// 1-based page number (defaults to 1).
    pub page: Option<u32>,
    /// Page size (defaults to 20).
    pub page_size: Option<u32>,
}

/// One page of a filtered listing.
#[derive(Debug, Clone)]
pub struct ListPage {
    /// Instances on this page, newest first.
    pub items: Vec<WorkflowInstance>,
    /// Total matches before paging.
    pub total_count: usize,
    /// Page number served.
    pub page: u32,
    /// Page size used.
    pub page_size: u32,
}

/// Persistence seam for workflow instances and their event log.
///
/// `update` MUST atomically check-and-set on `(tenant_id, id, version)`:
/// the carried `version` is the new value, and the write succeeds only when
/// the stored row still holds `version - 1`.
#[async_trait]
pub trait WorkflowStore: Send + Sync {
    /// Insert a new instance; the `(tenant_id, id)` pair must be fresh.
    async fn insert(&self, instance: &WorkflowInstance) -> Result<(), GatewayError>;

    /// Fetch an instance under tenant scope.
    async fn get(
        &self,
        tenant_id: &str,
        id: &str,
    ) -> Result<Option<WorkflowInstance>, GatewayError>;

    /// Optimistically update; stale versions fail with CONFLICT.
    async fn update(&self, instance: &WorkflowInstance) -> Result<(), GatewayError>;

    /// List instances in a tenant.
    async fn list(&self, tenant_id: &str, filter: &ListFilter) -> Result<ListPage, GatewayError>;

    /// Active instances (across tenants) whose expiry is due.
    async fn expiring_before(
        &self,
        deadline: DateTime<Utc>,
    ) -> Result<Vec<WorkflowInstance>, GatewayError>;

    /// Append an audit event.
    async fn append_event(&self, event: &WorkflowEvent) -> Result<(), GatewayError>;

    /// Events for an instance, oldest first.
    async fn events(
        &self,
        tenant_id: &str,
        instance_id: &str,
    ) -> Result<Vec<WorkflowEvent>, GatewayError>;
}

// ---------------------------------------------------------------------------
// In-memory store
// ---------------------------------------------------------------------------

type InstanceKey = (String, String);

/// RwLock-map store for single-process deployments and tests.
#[derive(Default)]
pub struct MemoryWorkflowStore {
    instances: RwLock<HashMap<InstanceKey, WorkflowInstance>>,
    events: RwLock<Vec<WorkflowEvent>>,
}

impl MemoryWorkflowStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl WorkflowStore for MemoryWorkflowStore {
    async fn insert(&self, instance: &WorkflowInstance) -> Result<(), GatewayError> {
        let key = (instance.tenant_id.clone(), instance.id.clone());
        let mut instances = self.instances.write().await;
        if instances.contains_key(&key) {
            return Err(GatewayError::conflict(format!(
                "workflow instance '{}' already exists",
                instance.id
            )));
        }
        instances.insert(key, instance.clone());
        Ok(())
    }

    async fn get(
        &self,
        tenant_id: &str,
        id: &str,
    ) -> Result<Option<WorkflowInstance>, GatewayError> {
        let instances = self.instances.read().await;
        Ok(instances
            .get(&(tenant_id.to_string(), id.to_string()))
            .cloned())
    }

    async fn update(&self, instance: &WorkflowInstance) -> Result<(), GatewayError> {
        let key = (instance.tenant_id.clone(), instance.id.clone());
        let mut instances = self.instances.write().await;
        let stored = instances.get(&key).ok_or_else(|| {
            GatewayError::not_found(format!("workflow instance '{}' not found", instance.id))
        })?;
        if stored.version + 1 != instance.version {
            return Err(GatewayError::conflict(format!(
                "workflow instance '{}' was modified concurrently",
                instance.id
            )));
        }
        instances.insert(key, instance.clone());
        Ok(())
    }

    async fn list(&self, tenant_id: &str, filter: &ListFilter) -> Result<ListPage, GatewayError> {
        let instances = self.instances.read().await;
        let mut matches: Vec<WorkflowInstance> = instances
            .values()
            .filter(|i| i.tenant_id == tenant_id)
            .filter(|i| filter.status.is_none_or(|s| i.status == s))
            .filter(|i| {
                filter
                    .workflow_id
                    .as_deref()
                    .is_none_or(|w| i.workflow_id == w)
            })
            .filter(|i| {
                filter
                    .subject_id
                    .as_deref()
                    .is_none_or(|s| i.subject_id == s)
            })
            .cloned()
            .collect();
        matches.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let total_count = matches.len();
        let page = filter.page.unwrap_or(1).max(1);
        let page_size = filter.page_size.unwrap_or(20).clamp(1, 100);
        let start = ((page - 1) * page_size) as usize;
        let items = matches
            .into_iter()
            .skip(start)
            .take(page_size as usize)
            .collect();

        Ok(ListPage {
            items,
            total_count,
            page,
            page_size,
        })
    }

    async fn expiring_before(
        &self,
        deadline: DateTime<Utc>,
    ) -> Result<Vec<WorkflowInstance>, GatewayError> {
        let instances = self.instances.read().await;
        Ok(instances
            .values()
            .filter(|i| i.status == crate::WorkflowStatus::Active)
            .filter(|i| i.expires_at.is_some_and(|t| t <= deadline))
            .cloned()
            .collect())
    }

    async fn append_event(&self, event: &WorkflowEvent) -> Result<(), GatewayError> {
        self.events.write().await.push(event.clone());
        Ok(())
    }

    async fn events(
        &self,
        tenant_id: &str,
        instance_id: &str,
    ) -> Result<Vec<WorkflowEvent>, GatewayError> {
        let events = self.events.read().await;
        Ok(events
            .iter()
            .filter(|e| e.tenant_id == tenant_id && e.instance_id == instance_id)
            .cloned()
            .collect())
    }
}
