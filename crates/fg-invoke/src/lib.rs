// SPDX-License-Identifier: MIT OR Apache-2.0
#![deny(unsafe_code)]
#![warn(missing_docs)]
//! The invocation layer: unified dispatch to OpenAPI operations and
//! in-process SDK handlers, wrapped by a per-service circuit breaker and
//! retry policy.

mod breaker;
mod dispatch;
mod http;
mod retry;
mod sdk;

pub use breaker::{BreakerConfig, BreakerState, CircuitBreaker};
pub use dispatch::{Dispatcher, InvokerRegistry};
pub use http::OpenApiInvoker;
pub use retry::RetryPolicy;
pub use sdk::{SdkInvoker, SdkOperation};

use async_trait::async_trait;
use fg_core::{InvocationInput, InvocationResult, OperationBinding, RequestContext};
use fg_error::GatewayError;

/// A backend invoker.  The registry probes `supports` and dispatches to the
/// first invoker that claims the binding.
#[async_trait]
pub trait Invoker: Send + Sync {
    /// Human-readable name used in logs.
    fn name(&self) -> &str;

    /// Whether this invoker handles the given binding.
    fn supports(&self, binding: &OperationBinding) -> bool;

    /// Perform the call.  Backend HTTP statuses (including 4xx/5xx) come
    /// back as an [`InvocationResult`]; transport-level failures surface as
    /// BACKEND_TIMEOUT / BACKEND_UNAVAILABLE errors.
    async fn invoke(
        &self,
        rctx: &RequestContext,
        binding: &OperationBinding,
        input: &InvocationInput,
    ) -> Result<InvocationResult, GatewayError>;
}
