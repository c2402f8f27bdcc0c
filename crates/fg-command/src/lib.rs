// SPDX-License-Identifier: MIT OR Apache-2.0
#![deny(unsafe_code)]
#![warn(missing_docs)]
//! The command execution pipeline.
//!
//! Ten stages, strictly ordered; any failure short-circuits:
//!
//! 1. definition lookup
//! 2. capability gate
//! 3. idempotency pre-check
//! 4. rate-limit gate
//! 5. input mapping
//! 6. schema validation
//! 7. backend invocation
//! 8. response shaping
//! 9. idempotency store (success path, best-effort)
//! 10. observer notification (exactly one event per execution)

mod observer;
mod shape;

pub use observer::{CollectingObserver, CommandEvent, CommandObserver, LoggingObserver};
pub use shape::shape_response;

use fg_capability::CapabilitySet;
use fg_core::{CommandRequest, CommandResponse, OperationBinding, RequestContext, parse_duration};
use fg_error::{FieldError, GatewayError};
use fg_expr::Sources;
use fg_idempotency::{CheckOutcome, IdempotencyStore, entry_key, input_hash};
use fg_invoke::Dispatcher;
use fg_mapping::reverse_field_map;
use fg_openapi::OpenApiIndex;
use fg_ratelimit::{RateLimiter, scope_key};
use fg_registry::DefinitionRegistry;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

const DEFAULT_IDEMPOTENCY_TTL: Duration = Duration::from_secs(24 * 3600);
const DEFAULT_RATE_WINDOW: Duration = Duration::from_secs(60);

/// Executes commands through the ten-stage pipeline.
pub struct CommandExecutor {
    registry: Arc<DefinitionRegistry>,
    dispatcher: Arc<Dispatcher>,
    index: Option<Arc<OpenApiIndex>>,
    idempotency: Option<Arc<dyn IdempotencyStore>>,
    limiter: Option<Arc<dyn RateLimiter>>,
    observers: Vec<Arc<dyn CommandObserver>>,
}

impl CommandExecutor {
    /// Create an executor with only the required collaborators wired.
    pub fn new(registry: Arc<DefinitionRegistry>, dispatcher: Arc<Dispatcher>) -> Self {
        Self {
            registry,
            dispatcher,
            index: None,
            idempotency: None,
            limiter: None,
            observers: Vec::new(),
        }
    }

    /// Wire the OpenAPI index (enables schema validation).
    #[must_use]
    pub fn with_index(mut self, index: Arc<OpenApiIndex>) -> Self {
        self.index = Some(index);
        self
    }

    /// Wire an idempotency store.
    #[must_use]
    pub fn with_idempotency(mut self, store: Arc<dyn IdempotencyStore>) -> Self {
        self.idempotency = Some(store);
        self
    }

    /// Wire a rate limiter.
    #[must_use]
    pub fn with_rate_limiter(mut self, limiter: Arc<dyn RateLimiter>) -> Self {
        self.limiter = Some(limiter);
        self
    }

    /// Append an observer.
    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn CommandObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    /// Execute a command.  Backend rejections come back as a failure
    /// [`CommandResponse`]; gateway-side problems are typed errors.
    pub async fn execute(
        &self,
        rctx: &RequestContext,
        caps: &CapabilitySet,
        command_id: &str,
        request: &CommandRequest,
    ) -> Result<CommandResponse, GatewayError> {
        let started = std::time::Instant::now();
        let outcome = self.run_pipeline(rctx, caps, command_id, request).await;

        // Stage 10: exactly one event per execution, success or not.
        let event = CommandEvent::from_outcome(command_id, rctx, &outcome, started.elapsed());
        for observer in &self.observers {
            observer.on_command(&event).await;
        }

        outcome
    }

    /// Dry-run: stages 1–6 only.  Returns the schema-validation findings;
    /// an empty list means the command would pass validation.
    pub async fn validate(
        &self,
        rctx: &RequestContext,
        caps: &CapabilitySet,
        command_id: &str,
        request: &CommandRequest,
    ) -> Result<Vec<FieldError>, GatewayError> {
        // Stage 1: lookup.
        let command = self
            .registry
            .command(command_id)
            .ok_or_else(|| GatewayError::not_found(format!("command '{command_id}' not found")))?;

        // Stage 2: capability gate.
        Self::gate(caps, &command.capabilities, command_id)?;

        // Stage 5: input mapping (3 and 4 are stateful gates; a dry-run must
        // not consume idempotency or rate-limit budget).
        let sources = Sources::for_command(&request.input, &request.route_params, rctx);
        let input = fg_mapping::build_input(&command.input_mapping, &sources, &request.input)
            .map_err(|e| GatewayError::bad_request(e.to_string()))?;

        // Stage 6: schema validation.
        Ok(self.validate_schema(command, &input))
    }

    async fn run_pipeline(
        &self,
        rctx: &RequestContext,
        caps: &CapabilitySet,
        command_id: &str,
        request: &CommandRequest,
    ) -> Result<CommandResponse, GatewayError> {
        // Stage 1: lookup.
        let command = self
            .registry
            .command(command_id)
            .ok_or_else(|| GatewayError::not_found(format!("command '{command_id}' not found")))?;

        // Stage 2: capability gate.
        Self::gate(caps, &command.capabilities, command_id)?;

        // Stage 3: idempotency pre-check.
        let idem = match (&command.idempotency, &request.idempotency_key, &self.idempotency) {
            (Some(cfg), Some(user_key), Some(store)) => {
                let key = entry_key(command_id, user_key);
                let hash = input_hash(&request.input);
                match store.check(&key, &hash).await {
                    CheckOutcome::Hit(cached) => {
                        debug!(command = %command_id, "idempotent replay served from cache");
                        return Ok(cached);
                    }
                    CheckOutcome::Conflict => {
                        return Err(GatewayError::conflict(
                            "idempotency key was already used with different input",
                        ));
                    }
                    CheckOutcome::Miss => Some((key, hash, cfg.ttl.clone(), store.clone())),
                }
            }
            _ => None,
        };

        // Stage 4: rate-limit gate.
        if let (Some(limiter), Some(limit)) = (&self.limiter, &command.rate_limit) {
            let key = scope_key(command_id, limit.scope, rctx);
            let window = parse_duration(&limit.window).unwrap_or_else(|| {
                warn!(command = %command_id, window = %limit.window, "unparseable rate window; using 60s");
                DEFAULT_RATE_WINDOW
            });
            if !limiter.allow(&key, limit.max_requests, window).await {
                return Err(GatewayError::rate_limited("rate limit exceeded"));
            }
        }

        // Stage 5: input mapping.
        let sources = Sources::for_command(&request.input, &request.route_params, rctx);
        let input = fg_mapping::build_input(&command.input_mapping, &sources, &request.input)
            .map_err(|e| GatewayError::bad_request(e.to_string()))?;

        // Stage 6: schema validation.
        let violations = self.validate_schema(command, &input);
        if !violations.is_empty() {
            return Err(GatewayError::validation(violations));
        }

        // Stage 7: invoke.
        let result = self.dispatcher.dispatch(rctx, &command.operation, &input).await?;

        // Stage 8: response shaping.
        let reverse = reverse_field_map(&command.input_mapping.field_projection);
        let response = shape_response(&result, &command.output_mapping, &reverse);

        // Stage 9: idempotency store (success path, best-effort).
        if response.success {
            if let Some((key, hash, ttl, store)) = idem {
                let ttl = ttl
                    .as_deref()
                    .and_then(parse_duration)
                    .unwrap_or(DEFAULT_IDEMPOTENCY_TTL);
                store.store(&key, &hash, &response, ttl).await;
            }
        }

        Ok(response)
    }

    fn gate(
        caps: &CapabilitySet,
        required: &[String],
        command_id: &str,
    ) -> Result<(), GatewayError> {
        if required.is_empty() || caps.has_all(required) {
            return Ok(());
        }
        if caps.is_degraded() {
            Err(GatewayError::unauthorized(
                "capabilities could not be resolved",
            ))
        } else {
            Err(GatewayError::forbidden(format!(
                "missing capability for command '{command_id}'"
            )))
        }
    }

    fn validate_schema(
        &self,
        command: &fg_core::CommandDefinition,
        input: &fg_core::InvocationInput,
    ) -> Vec<FieldError> {
        let OperationBinding::Openapi {
            service_id,
            operation_id,
        } = &command.operation
        else {
            return Vec::new();
        };
        let Some(index) = &self.index else {
            return Vec::new();
        };
        let Some(body) = &input.body else {
            return Vec::new();
        };
        if !body.is_object() {
            return Vec::new();
        }

        let reverse = reverse_field_map(&command.input_mapping.field_projection);
        index
            .validate_request(service_id, operation_id, body)
            .into_iter()
            .map(|mut violation| {
                if let Some(ui_name) = reverse.get(&violation.field) {
                    violation.message = violation
                        .message
                        .replace(&violation.field, ui_name);
                    violation.field = ui_name.clone();
                }
                violation
            })
            .collect()
    }
}
