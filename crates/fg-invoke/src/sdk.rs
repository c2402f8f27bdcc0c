// SPDX-License-Identifier: MIT OR Apache-2.0
//! In-process SDK invoker.
//!
//! Some commands never leave the gateway process (composite reads, cache
//! maintenance, feature-flagged shims).  Those bind `{type: sdk, handler}`
//! and resolve to a registered [`SdkOperation`].

use crate::Invoker;
use async_trait::async_trait;
use fg_core::{InvocationInput, InvocationResult, OperationBinding, RequestContext};
use fg_error::GatewayError;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// An in-process operation callable by name.
#[async_trait]
pub trait SdkOperation: Send + Sync {
    /// Perform the operation.  The returned value becomes the response body
    /// of a synthetic 200 result; a [`GatewayError`] propagates as-is.
    async fn call(
        &self,
        rctx: &RequestContext,
        input: &InvocationInput,
    ) -> Result<Value, GatewayError>;
}

/// Invoker resolving `sdk` bindings to registered handlers.
#[derive(Default)]
pub struct SdkInvoker {
    handlers: HashMap<String, Arc<dyn SdkOperation>>,
}

impl SdkInvoker {
    /// Create an empty invoker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler under a name, replacing any previous entry.
    pub fn register(&mut self, name: impl Into<String>, op: impl SdkOperation + 'static) {
        self.handlers.insert(name.into(), Arc::new(op));
    }

    /// Registered handler names, sorted.
    pub fn handler_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

#[async_trait]
impl Invoker for SdkInvoker {
    fn name(&self) -> &str {
        "sdk"
    }

    fn supports(&self, binding: &OperationBinding) -> bool {
        matches!(binding, OperationBinding::Sdk { .. })
    }

    async fn invoke(
        &self,
        rctx: &RequestContext,
        binding: &OperationBinding,
        input: &InvocationInput,
    ) -> Result<InvocationResult, GatewayError> {
        let OperationBinding::Sdk { handler } = binding else {
            return Err(GatewayError::internal("sdk invoker received an openapi binding"));
        };
        let op = self.handlers.get(handler).ok_or_else(|| {
            GatewayError::internal(format!("sdk handler '{handler}' is not registered"))
        })?;
        let body = op.call(rctx, input).await?;
        Ok(InvocationResult {
            status: 200,
            body,
            headers: Default::default(),
        })
    }
}
