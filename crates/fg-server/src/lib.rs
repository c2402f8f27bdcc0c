// SPDX-License-Identifier: MIT OR Apache-2.0
#![deny(unsafe_code)]
//! HTTP transport for the Foregate gateway.
//!
//! The composition root lives here: [`build_state`] assembles every core
//! service from a [`GatewayConfig`], and [`build_app`] wires the axum
//! router with the middleware chain.

pub mod auth;
pub mod config;
pub mod error;
pub mod middleware;
pub mod routes;
pub mod state;

pub use config::{ConfigError, ConfigWarning, GatewayConfig};
pub use routes::build_app;
pub use state::AppState;

use auth::{Hs256Verifier, TokenVerifier};
use fg_capability::{CapabilityResolver, PolicyEvaluator, ResolverConfig, YamlPolicyEvaluator};
use fg_command::{CommandExecutor, LoggingObserver};
use fg_descriptor::DescriptorAssembler;
use fg_idempotency::MemoryIdempotencyStore;
use fg_invoke::{Dispatcher, InvokerRegistry, OpenApiInvoker, SdkInvoker};
use fg_lookup::LookupService;
use fg_openapi::OpenApiIndex;
use fg_ratelimit::MemoryRateLimiter;
use fg_registry::DefinitionRegistry;
use fg_search::{SearchConfig, SearchService};
use fg_telemetry::MetricsRegistry;
use fg_workflow::{MemoryWorkflowStore, WorkflowEngine};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, warn};

/// Assemble the application state from configuration.
///
/// Registries and indices are built once here and immutable afterwards.
/// `sdk` carries any in-process handlers the deployment registers.
pub fn build_state(config: &GatewayConfig, sdk: SdkInvoker) -> anyhow::Result<Arc<AppState>> {
    let index = Arc::new(OpenApiIndex::load(&config.services)?);
    info!(operations = index.len(), "openapi index built");

    let registry = Arc::new(DefinitionRegistry::load_dir(&config.definitions.dir)?);
    let problems = fg_registry::validate(&registry, Some(&index));
    if !problems.is_empty() {
        anyhow::bail!("definition validation failed: {problems:?}");
    }
    info!(domains = registry.domains().len(), "definitions loaded");

    let mut invokers = InvokerRegistry::new();
    invokers.register(OpenApiInvoker::new(
        index.clone(),
        config.invoke_default_timeout(),
    ));
    invokers.register(sdk);
    let dispatcher = Arc::new(Dispatcher::new(
        invokers,
        Some(index.clone()),
        config.breaker_config(),
        config.retry_policy(),
    ));

    let evaluator: Arc<dyn PolicyEvaluator> = match &config.definitions.policy_file {
        Some(path) => Arc::new(YamlPolicyEvaluator::load(path)?),
        None => {
            warn!("no policy file configured; every subject resolves to an empty capability set");
            Arc::new(YamlPolicyEvaluator::from_roles(BTreeMap::new()))
        }
    };
    let capabilities = Arc::new(CapabilityResolver::new(
        evaluator,
        ResolverConfig {
            cache_ttl: config.capability_cache_ttl(),
        },
    ));

    let metrics = Arc::new(MetricsRegistry::new());
    metrics.declare_counter("fg_commands_total", "Commands executed by outcome");
    metrics.declare_histogram("fg_command_seconds", "Command pipeline duration");

    let commands = Arc::new(
        CommandExecutor::new(registry.clone(), dispatcher.clone())
            .with_index(index.clone())
            .with_idempotency(Arc::new(MemoryIdempotencyStore::new()))
            .with_rate_limiter(Arc::new(MemoryRateLimiter::new()))
            .with_observer(Arc::new(LoggingObserver)),
    );

    let workflows = Arc::new(WorkflowEngine::new(
        registry.clone(),
        dispatcher.clone(),
        Arc::new(MemoryWorkflowStore::new()),
    ));

    let search = Arc::new(SearchService::new(
        registry.clone(),
        dispatcher.clone(),
        SearchConfig {
            timeout_per_provider: config.search_timeout(),
        },
    ));
    let lookups = Arc::new(LookupService::new(registry.clone(), dispatcher.clone()));
    let descriptors = Arc::new(DescriptorAssembler::new(
        registry.clone(),
        dispatcher.clone(),
    ));

    let verifier: Arc<dyn TokenVerifier> = Arc::new(Hs256Verifier::new(
        &config.auth.jwt_secret,
        config.auth.issuer.as_deref(),
        config.auth.audience.as_deref(),
    ));

    Ok(Arc::new(AppState {
        registry,
        capabilities,
        commands,
        workflows,
        search,
        lookups,
        descriptors,
        verifier,
        metrics,
    }))
}
