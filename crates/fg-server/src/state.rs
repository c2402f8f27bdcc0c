// SPDX-License-Identifier: MIT OR Apache-2.0
//! Shared application state: the composition of every core service.

use crate::auth::TokenVerifier;
use fg_capability::CapabilityResolver;
use fg_command::CommandExecutor;
use fg_descriptor::DescriptorAssembler;
use fg_lookup::LookupService;
use fg_registry::DefinitionRegistry;
use fg_search::SearchService;
use fg_telemetry::MetricsRegistry;
use fg_workflow::WorkflowEngine;
use std::sync::Arc;

/// Everything the handlers need, built once in the composition root.
pub struct AppState {
    /// Loaded definitions.
    pub registry: Arc<DefinitionRegistry>,
    /// Capability resolution with its cache.
    pub capabilities: Arc<CapabilityResolver>,
    /// The command pipeline.
    pub commands: Arc<CommandExecutor>,
    /// The workflow engine.
    pub workflows: Arc<WorkflowEngine>,
    /// Federated search.
    pub search: Arc<SearchService>,
    /// Cached lookups.
    pub lookups: Arc<LookupService>,
    /// Descriptor assembly.
    pub descriptors: Arc<DescriptorAssembler>,
    /// Token verification.
    pub verifier: Arc<dyn TokenVerifier>,
    /// Process metrics.
    pub metrics: Arc<MetricsRegistry>,
}
