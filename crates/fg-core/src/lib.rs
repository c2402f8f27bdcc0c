// SPDX-License-Identifier: MIT OR Apache-2.0
//! fg-core
#![deny(unsafe_code)]
#![warn(missing_docs)]
//!
//! The stable contract for the Foregate gateway.
//!
//! Request context, the declarative definition model, invocation payloads,
//! and the command response shape all live here.

/// Per-request identity and correlation context.
pub mod context;
/// The declarative definition model loaded from YAML.
pub mod defs;
/// Duration-string parsing (`"30s"`, `"5m"`, `"24h"`, `"7d"`).
pub mod duration;
/// Invocation input/result payloads and the command response.
pub mod invocation;

pub use context::RequestContext;
pub use defs::{
    ActionDefinition, Assignee, BadgeDefinition, CacheConfig, CacheScope, ColumnDefinition,
    CommandDefinition, DataSourceDefinition, DomainDefinition, FieldDefinition, FilterDefinition,
    FormDefinition, IdempotencyConfig, InputMapping, LookupDefinition, NavItem,
    NavigationDefinition, OperationBinding, OutputMapping, PageDefinition, RateLimitConfig,
    RateLimitScope, SearchDefinition, SearchFields, StepDefinition, StepType,
    TransitionDefinition, WorkflowDefinition,
};
pub use duration::parse_duration;
pub use invocation::{CommandRequest, CommandResponse, InvocationInput, InvocationResult};
