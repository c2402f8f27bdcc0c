// SPDX-License-Identifier: MIT OR Apache-2.0
//! Middleware chain: correlation ids, security headers, CORS, and bearer
//! authentication.

use crate::error::ApiError;
use crate::state::AppState;
use axum::extract::{Request, State};
use axum::http::HeaderValue;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use fg_capability::CapabilitySet;
use fg_core::RequestContext;
use fg_error::GatewayError;
use std::sync::Arc;
use std::time::Instant;
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer};
use tracing::info;
use uuid::Uuid;

/// Correlation id carried through request extensions.
#[derive(Debug, Clone)]
pub struct CorrelationId(pub String);

/// Outermost middleware: assigns the correlation id, stamps the mandatory
/// security headers on every response (errors included), and logs the
/// request with structured fields.
pub async fn correlation_and_security_headers(mut req: Request, next: Next) -> Response {
    let correlation = req
        .headers()
        .get("x-correlation-id")
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty() && v.len() <= 64)
        .map(String::from)
        .unwrap_or_else(fg_telemetry::correlation_id);
    req.extensions_mut()
        .insert(CorrelationId(correlation.clone()));

    let method = req.method().clone();
    let path = req.uri().path().to_owned();
    let start = Instant::now();

    let mut resp = next.run(req).await;

    let headers = resp.headers_mut();
    headers.insert(
        "strict-transport-security",
        HeaderValue::from_static("max-age=31536000; includeSubDomains"),
    );
    headers.insert("x-content-type-options", HeaderValue::from_static("nosniff"));
    headers.insert("x-frame-options", HeaderValue::from_static("DENY"));
    headers.insert("cache-control", HeaderValue::from_static("no-store"));
    headers.insert(
        "referrer-policy",
        HeaderValue::from_static("strict-origin-when-cross-origin"),
    );
    if let Ok(value) = HeaderValue::from_str(&correlation) {
        headers.insert("x-correlation-id", value);
    }

    info!(
        http.method = %method,
        http.path = %path,
        http.status = resp.status().as_u16(),
        http.duration_ms = start.elapsed().as_millis() as u64,
        correlation_id = %correlation,
        "request completed"
    );

    resp
}

/// Authentication middleware for the `/ui` surface.
///
/// Verifies the bearer token, builds the [`RequestContext`] from claims and
/// ingested headers (the tenant comes from the token only), resolves the
/// caller's capabilities, and stores both as request extensions.
pub async fn authenticate(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Response {
    let correlation = req
        .extensions()
        .get::<CorrelationId>()
        .map(|c| c.0.clone())
        .unwrap_or_else(fg_telemetry::correlation_id);

    match build_context(&state, &req, &correlation) {
        Ok(rctx) => {
            let caps = state.capabilities.resolve(&rctx).await;
            req.extensions_mut().insert(rctx);
            req.extensions_mut().insert(caps);
            next.run(req).await
        }
        Err(err) => ApiError(err.with_trace_id(correlation)).into_response(),
    }
}

fn build_context(
    state: &AppState,
    req: &Request,
    correlation: &str,
) -> Result<RequestContext, GatewayError> {
    let header = req
        .headers()
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| GatewayError::unauthorized("missing bearer token"))?;
    let token = header
        .strip_prefix("Bearer ")
        .or_else(|| header.strip_prefix("bearer "))
        .ok_or_else(|| GatewayError::unauthorized("authorization header is not a bearer token"))?;

    let claims = state.verifier.verify(token)?;

    let ingested = |name: &str| {
        req.headers()
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(String::from)
    };

    let rctx = RequestContext {
        subject_id: claims.sub,
        email: claims.email,
        // Tenant identity comes from verified claims; an inbound
        // X-Tenant-Id header is ignored.
        tenant_id: claims.tenant_id,
        partition_id: ingested("x-partition-id"),
        device_id: ingested("x-device-id"),
        roles: claims.roles,
        claims: claims.extra,
        correlation_id: correlation.to_string(),
        trace_id: Uuid::new_v4().simple().to_string(),
        span_id: Uuid::new_v4().simple().to_string()[..16].to_string(),
        locale: ingested("accept-language"),
        timezone: ingested("x-timezone"),
        bearer_token: Some(header.to_string()),
    };
    rctx.validate()
        .map_err(|e| GatewayError::unauthorized(e.to_string()))?;
    Ok(rctx)
}

/// Origin-allowlisted CORS layer.
pub fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|o| HeaderValue::from_str(o).ok())
        .collect();
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
}
