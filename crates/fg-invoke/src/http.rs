// SPDX-License-Identifier: MIT OR Apache-2.0
//! HTTP invoker for indexed OpenAPI operations.

use crate::Invoker;
use async_trait::async_trait;
use fg_core::{InvocationInput, InvocationResult, OperationBinding, RequestContext};
use fg_error::GatewayError;
use fg_openapi::{HttpMethod, OpenApiIndex};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Invokes OpenAPI operations over HTTP with reqwest.
pub struct OpenApiInvoker {
    index: Arc<OpenApiIndex>,
    client: reqwest::Client,
    default_timeout: Duration,
}

impl OpenApiInvoker {
    /// Create an invoker over the given index.
    pub fn new(index: Arc<OpenApiIndex>, default_timeout: Duration) -> Self {
        Self {
            index,
            client: reqwest::Client::new(),
            default_timeout,
        }
    }

    /// Substitute path parameters into a template, URL-escaping each value.
    fn render_path(template: &str, params: &BTreeMap<String, String>) -> String {
        let mut out = template.to_string();
        for (name, value) in params {
            let escaped = urlencoding::encode(value);
            out = out.replace(&format!("{{{name}}}"), &escaped);
        }
        out
    }

    /// Strip CR/LF from a header value before it reaches the wire.
    fn sanitize_header(value: &str) -> String {
        value.replace(['\r', '\n'], "")
    }
}

#[async_trait]
impl Invoker for OpenApiInvoker {
    fn name(&self) -> &str {
        "openapi"
    }

    fn supports(&self, binding: &OperationBinding) -> bool {
        matches!(binding, OperationBinding::Openapi { .. })
    }

    async fn invoke(
        &self,
        rctx: &RequestContext,
        binding: &OperationBinding,
        input: &InvocationInput,
    ) -> Result<InvocationResult, GatewayError> {
        let OperationBinding::Openapi {
            service_id,
            operation_id,
        } = binding
        else {
            return Err(GatewayError::internal("openapi invoker received an sdk binding"));
        };

        let op = self.index.get(service_id, operation_id).ok_or_else(|| {
            GatewayError::internal(format!(
                "operation '{operation_id}' is not indexed for service '{service_id}'"
            ))
        })?;

        let path = Self::render_path(&op.path, &input.path_params);
        let url = format!("{}{}", op.base_url.trim_end_matches('/'), path);

        let method = match op.method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Put => reqwest::Method::PUT,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Delete => reqwest::Method::DELETE,
            HttpMethod::Patch => reqwest::Method::PATCH,
            HttpMethod::Head => reqwest::Method::HEAD,
        };

        let mut request = self
            .client
            .request(method, &url)
            .timeout(op.timeout.unwrap_or(self.default_timeout));

        if !input.query_params.is_empty() {
            request = request.query(&input.query_params);
        }

        // Identity and correlation forwarded on every backend call.
        if let Some(token) = &rctx.bearer_token {
            request = request.header("Authorization", Self::sanitize_header(token));
        }
        request = request
            .header("X-Tenant-Id", Self::sanitize_header(&rctx.tenant_id))
            .header("X-Request-Subject", Self::sanitize_header(&rctx.subject_id))
            .header("X-Correlation-Id", Self::sanitize_header(&rctx.correlation_id));
        for (name, value) in &input.headers {
            request = request.header(name, Self::sanitize_header(value));
        }

        if let Some(body) = &input.body {
            request = request.json(body);
        }

        debug!(service = %service_id, operation = %operation_id, url = %url, "invoking backend");

        let response = request.send().await.map_err(|err| {
            if err.is_timeout() {
                GatewayError::backend_timeout(format!("service '{service_id}' timed out"))
            } else {
                GatewayError::backend_unavailable(format!("service '{service_id}' is unreachable"))
            }
        })?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(k, v)| Some((k.to_string(), v.to_str().ok()?.to_string())))
            .collect();
        let bytes = response.bytes().await.map_err(|_| {
            GatewayError::backend_unavailable(format!(
                "service '{service_id}' dropped the connection mid-response"
            ))
        })?;
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };

        Ok(InvocationResult {
            status,
            body,
            headers,
        })
    }
}
