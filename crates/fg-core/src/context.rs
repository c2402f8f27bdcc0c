// SPDX-License-Identifier: MIT OR Apache-2.0
//! Immutable per-request identity and correlation context.
//!
//! A [`RequestContext`] is built once at the transport boundary from verified
//! identity claims and ingested headers, then passed by reference to every
//! operation that does I/O.  The tenant id always originates from the token,
//! never from a request header.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Identity, tenancy, and correlation data for a single request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RequestContext {
    /// Authenticated subject id (JWT `sub`).
    pub subject_id: String,
    /// Subject email, when the token carries one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Tenant id from verified claims.
    pub tenant_id: String,
    /// Optional data-partition qualifier (`X-Partition-Id`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub partition_id: Option<String>,
    /// Originating device id (`X-Device-Id`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,
    /// Roles in token order.
    #[serde(default)]
    pub roles: Vec<String>,
    /// Remaining token claims, verbatim.
    #[serde(default)]
    pub claims: BTreeMap<String, serde_json::Value>,
    /// Correlation id, propagated or generated at the edge.
    pub correlation_id: String,
    /// Trace id for distributed tracing.
    pub trace_id: String,
    /// Span id for distributed tracing.
    pub span_id: String,
    /// Preferred locale (`Accept-Language`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locale: Option<String>,
    /// Caller timezone (`X-Timezone`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,
    /// Raw bearer credential, forwarded to backends on their `Authorization`
    /// header. Never serialized.
    #[serde(skip)]
    pub bearer_token: Option<String>,
}

/// Violations detected by [`RequestContext::validate`].
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ContextError {
    /// The subject id is empty.
    #[error("request context requires a non-empty subject id")]
    MissingSubject,
    /// The tenant id is empty.
    #[error("request context requires a non-empty tenant id")]
    MissingTenant,
}

impl RequestContext {
    /// Create a context for the given subject and tenant.
    pub fn new(subject_id: impl Into<String>, tenant_id: impl Into<String>) -> Self {
        Self {
            subject_id: subject_id.into(),
            tenant_id: tenant_id.into(),
            ..Self::default()
        }
    }

    /// Check the core invariant: non-empty subject and tenant.
    ///
    /// The transport adapter calls this before the context enters the core.
    pub fn validate(&self) -> Result<(), ContextError> {
        if self.subject_id.trim().is_empty() {
            return Err(ContextError::MissingSubject);
        }
        if self.tenant_id.trim().is_empty() {
            return Err(ContextError::MissingTenant);
        }
        Ok(())
    }

    /// Returns `true` if the subject carries the given role.
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }
}
