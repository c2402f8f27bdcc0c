// SPDX-License-Identifier: MIT OR Apache-2.0
//! Invoker registry and the breaker/retry-wrapped dispatcher.

use crate::{BreakerConfig, CircuitBreaker, Invoker, RetryPolicy};
use fg_core::{InvocationInput, InvocationResult, OperationBinding, RequestContext};
use fg_error::GatewayError;
use fg_openapi::{HttpMethod, OpenApiIndex};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// Ordered list of invokers; the first that supports a binding wins.
#[derive(Default)]
pub struct InvokerRegistry {
    invokers: Vec<Arc<dyn Invoker>>,
}

impl InvokerRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an invoker.
    pub fn register(&mut self, invoker: impl Invoker + 'static) {
        self.invokers.push(Arc::new(invoker));
    }

    /// Find the first invoker supporting `binding`.
    pub fn find(&self, binding: &OperationBinding) -> Option<Arc<dyn Invoker>> {
        self.invokers
            .iter()
            .find(|i| i.supports(binding))
            .cloned()
    }
}

/// Dispatches bindings through the registry, wrapping OpenAPI calls with a
/// per-service circuit breaker and the retry policy.
pub struct Dispatcher {
    registry: InvokerRegistry,
    index: Option<Arc<OpenApiIndex>>,
    breakers: RwLock<HashMap<String, Arc<CircuitBreaker>>>,
    breaker_config: BreakerConfig,
    retry: RetryPolicy,
}

impl Dispatcher {
    /// Create a dispatcher.
    pub fn new(
        registry: InvokerRegistry,
        index: Option<Arc<OpenApiIndex>>,
        breaker_config: BreakerConfig,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            registry,
            index,
            breakers: RwLock::new(HashMap::new()),
            breaker_config,
            retry,
        }
    }

    /// Dispatch a call.
    ///
    /// Backend statuses (including 4xx/5xx) return as `Ok`; transport
    /// failures and an open circuit return typed errors.
    pub async fn dispatch(
        &self,
        rctx: &RequestContext,
        binding: &OperationBinding,
        input: &InvocationInput,
    ) -> Result<InvocationResult, GatewayError> {
        let invoker = self.registry.find(binding).ok_or_else(|| {
            GatewayError::internal("no invoker supports the operation binding")
        })?;

        let Some(service_id) = binding.service_id() else {
            // SDK calls carry no service: no breaker, no retry.
            return invoker.invoke(rctx, binding, input).await;
        };

        let breaker = self.breaker_for(service_id).await;
        let method = self.method_of(binding);
        let mut attempt: u32 = 1;

        loop {
            if !breaker.try_acquire() {
                return Err(GatewayError::backend_unavailable(format!(
                    "service '{service_id}' is unavailable (circuit open)"
                )));
            }

            match invoker.invoke(rctx, binding, input).await {
                Ok(result) if result.is_server_error() => {
                    breaker.record_failure();
                    if self.retry.allows_retry(attempt, method) && breaker.state() != crate::BreakerState::Open
                    {
                        debug!(service = %service_id, attempt, status = result.status, "retrying after 5xx");
                        tokio::time::sleep(self.retry.backoff(attempt)).await;
                        attempt += 1;
                        continue;
                    }
                    return Ok(result);
                }
                Ok(result) => {
                    breaker.record_success();
                    return Ok(result);
                }
                Err(err) if err.code.is_backend() => {
                    breaker.record_failure();
                    if self.retry.allows_retry(attempt, method) && breaker.state() != crate::BreakerState::Open
                    {
                        warn!(service = %service_id, attempt, error = %err, "retrying after transport failure");
                        tokio::time::sleep(self.retry.backoff(attempt)).await;
                        attempt += 1;
                        continue;
                    }
                    return Err(err);
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// Breaker state for a service, for readiness and metrics.
    pub async fn breaker_state(&self, service_id: &str) -> Option<crate::BreakerState> {
        self.breakers.read().await.get(service_id).map(|b| b.state())
    }

    async fn breaker_for(&self, service_id: &str) -> Arc<CircuitBreaker> {
        {
            let breakers = self.breakers.read().await;
            if let Some(b) = breakers.get(service_id) {
                return b.clone();
            }
        }
        let mut breakers = self.breakers.write().await;
        breakers
            .entry(service_id.to_string())
            .or_insert_with(|| Arc::new(CircuitBreaker::new(self.breaker_config.clone())))
            .clone()
    }

    fn method_of(&self, binding: &OperationBinding) -> Option<HttpMethod> {
        let OperationBinding::Openapi {
            service_id,
            operation_id,
        } = binding
        else {
            return None;
        };
        self.index
            .as_ref()?
            .get(service_id, operation_id)
            .map(|op| op.method)
    }
}
