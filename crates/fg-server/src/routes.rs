// SPDX-License-Identifier: MIT OR Apache-2.0
//! Route handlers for the `/ui` surface.

use crate::error::{ApiError, ApiResult};
use crate::middleware;
use crate::state::AppState;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Extension, Json, Router};
use fg_capability::CapabilitySet;
use fg_core::{CommandRequest, RequestContext};
use fg_error::{ErrorCode, GatewayError};
use fg_search::SearchPagination;
use fg_workflow::{InstanceSummary, ListFilter, WorkflowStatus};
use serde::Deserialize;
use serde_json::{Map, Value, json};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::timeout::TimeoutLayer;

/// Build the full application router.
pub fn build_app(
    state: Arc<AppState>,
    handler_timeout: Duration,
    cors_origins: &[String],
) -> Router {
    let authed = Router::new()
        .route("/ui/navigation", get(navigation))
        .route("/ui/pages/{id}", get(page))
        .route("/ui/pages/{id}/data", get(page_data))
        .route("/ui/forms/{id}", get(form))
        .route("/ui/forms/{id}/data", get(form_data))
        .route("/ui/commands/{id}", post(execute_command))
        .route("/ui/workflows", get(list_workflows))
        .route("/ui/workflows/{id}", get(get_workflow))
        .route("/ui/workflows/{id}/start", post(start_workflow))
        .route("/ui/workflows/{id}/advance", post(advance_workflow))
        .route("/ui/workflows/{id}/cancel", post(cancel_workflow))
        .route("/ui/search", get(search))
        .route("/ui/lookups/{id}", get(lookup))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::authenticate,
        ));

    Router::new()
        .route("/ui/health", get(health))
        .route("/ui/ready", get(ready))
        .route("/metrics", get(metrics))
        .merge(authed)
        .layer(TimeoutLayer::new(handler_timeout))
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(middleware::cors_layer(cors_origins))
        .layer(axum::middleware::from_fn(
            middleware::correlation_and_security_headers,
        ))
        .with_state(state)
}

fn handle_panic(_err: Box<dyn std::any::Any + Send + 'static>) -> Response {
    ApiError(GatewayError::internal("internal error")).into_response()
}

// ---------------------------------------------------------------------------
// Public endpoints
// ---------------------------------------------------------------------------

async fn health() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "time": chrono::Utc::now().to_rfc3339(),
    }))
}

async fn ready(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(json!({
        "status": "ready",
        "domains": state.registry.domains().len(),
    }))
}

async fn metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    (
        [("content-type", "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

// ---------------------------------------------------------------------------
// Descriptors
// ---------------------------------------------------------------------------

async fn navigation(
    State(state): State<Arc<AppState>>,
    Extension(rctx): Extension<RequestContext>,
    Extension(caps): Extension<CapabilitySet>,
) -> impl IntoResponse {
    Json(state.descriptors.navigation(&rctx, &caps).await)
}

async fn page(
    State(state): State<Arc<AppState>>,
    Extension(rctx): Extension<RequestContext>,
    Extension(caps): Extension<CapabilitySet>,
    Path(id): Path<String>,
) -> ApiResult<Response> {
    let descriptor = state
        .descriptors
        .page(&caps, &id)
        .map_err(|e| ApiError(e.with_trace_id(&rctx.trace_id)))?;
    Ok(Json(descriptor).into_response())
}

async fn form(
    State(state): State<Arc<AppState>>,
    Extension(rctx): Extension<RequestContext>,
    Extension(caps): Extension<CapabilitySet>,
    Path(id): Path<String>,
) -> ApiResult<Response> {
    let descriptor = state
        .descriptors
        .form(&caps, &id)
        .map_err(|e| ApiError(e.with_trace_id(&rctx.trace_id)))?;
    Ok(Json(descriptor).into_response())
}

/// Forward `page`, `page_size`, `sort`, `sort_dir`, `q`, and `filter[...]`
/// parameters to a page's data source.
fn data_params(raw: &BTreeMap<String, String>) -> BTreeMap<String, String> {
    let mut out = BTreeMap::new();
    for (key, value) in raw {
        if matches!(key.as_str(), "page" | "page_size" | "sort" | "sort_dir" | "q") {
            out.insert(key.clone(), value.clone());
        } else if let Some(field) = key
            .strip_prefix("filter[")
            .and_then(|rest| rest.strip_suffix(']'))
        {
            if !field.is_empty() {
                out.insert(field.to_string(), value.clone());
            }
        }
    }
    out
}

async fn page_data(
    State(state): State<Arc<AppState>>,
    Extension(rctx): Extension<RequestContext>,
    Extension(caps): Extension<CapabilitySet>,
    Path(id): Path<String>,
    Query(raw): Query<BTreeMap<String, String>>,
) -> ApiResult<Json<Value>> {
    let body = state
        .descriptors
        .page_data(&rctx, &caps, &id, &data_params(&raw))
        .await
        .map_err(|e| ApiError(e.with_trace_id(&rctx.trace_id)))?;
    Ok(Json(body))
}

async fn form_data(
    State(state): State<Arc<AppState>>,
    Extension(rctx): Extension<RequestContext>,
    Extension(caps): Extension<CapabilitySet>,
    Path(id): Path<String>,
    Query(raw): Query<BTreeMap<String, String>>,
) -> ApiResult<Json<Value>> {
    let body = state
        .descriptors
        .form_data(&rctx, &caps, &id, &data_params(&raw))
        .await
        .map_err(|e| ApiError(e.with_trace_id(&rctx.trace_id)))?;
    Ok(Json(body))
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

async fn execute_command(
    State(state): State<Arc<AppState>>,
    Extension(rctx): Extension<RequestContext>,
    Extension(caps): Extension<CapabilitySet>,
    Path(id): Path<String>,
    headers: axum::http::HeaderMap,
    Json(mut request): Json<CommandRequest>,
) -> ApiResult<Response> {
    // The header supplies the idempotency key when the body omits it.
    if request.idempotency_key.is_none() {
        request.idempotency_key = headers
            .get("x-idempotency-key")
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(String::from);
    }

    let started = std::time::Instant::now();
    let outcome = state.commands.execute(&rctx, &caps, &id, &request).await;
    state.metrics.inc(
        "fg_commands_total",
        &fg_telemetry::labels([
            ("command", id.as_str()),
            (
                "outcome",
                match &outcome {
                    Ok(r) if r.success => "success",
                    Ok(_) => "rejected",
                    Err(_) => "error",
                },
            ),
        ]),
    );
    state.metrics.observe(
        "fg_command_seconds",
        &fg_telemetry::labels([("command", id.as_str())]),
        started.elapsed(),
    );

    let response = outcome.map_err(|e| ApiError(e.with_trace_id(&rctx.trace_id)))?;
    if response.success {
        return Ok(Json(response).into_response());
    }

    // Backend rejections surface as gateway errors: 4xx → BAD_REQUEST,
    // 5xx → INTERNAL_ERROR, with the translated message and field details.
    let code = if response.status_code >= 500 {
        ErrorCode::InternalError
    } else {
        ErrorCode::BadRequest
    };
    let message = response
        .message
        .unwrap_or_else(|| "The request could not be processed.".to_string());
    Err(ApiError(
        GatewayError::new(code, message)
            .with_details(response.field_errors)
            .with_trace_id(&rctx.trace_id),
    ))
}

// ---------------------------------------------------------------------------
// Workflows
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
struct StartBody {
    #[serde(default)]
    input: Map<String, Value>,
    #[serde(default)]
    idempotency_key: Option<String>,
}

async fn start_workflow(
    State(state): State<Arc<AppState>>,
    Extension(rctx): Extension<RequestContext>,
    Extension(caps): Extension<CapabilitySet>,
    Path(id): Path<String>,
    Json(body): Json<StartBody>,
) -> ApiResult<Response> {
    let instance = state
        .workflows
        .start(&rctx, &caps, &id, &body.input, body.idempotency_key)
        .await
        .map_err(|e| ApiError(e.with_trace_id(&rctx.trace_id)))?;
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "id": instance.id,
            "workflow_id": instance.workflow_id,
            "status": instance.status,
            "current_step": instance.current_step,
        })),
    )
        .into_response())
}

#[derive(Debug, Deserialize)]
struct AdvanceBody {
    event: String,
    #[serde(default)]
    input: Map<String, Value>,
}

async fn advance_workflow(
    State(state): State<Arc<AppState>>,
    Extension(rctx): Extension<RequestContext>,
    Extension(caps): Extension<CapabilitySet>,
    Path(id): Path<String>,
    Json(body): Json<AdvanceBody>,
) -> ApiResult<Json<Value>> {
    let instance = state
        .workflows
        .advance(&rctx, &caps, &id, &body.event, &body.input)
        .await
        .map_err(|e| ApiError(e.with_trace_id(&rctx.trace_id)))?;
    Ok(Json(json!({
        "id": instance.id,
        "workflow_id": instance.workflow_id,
        "status": instance.status,
        "current_step": instance.current_step,
    })))
}

#[derive(Debug, Default, Deserialize)]
struct CancelBody {
    #[serde(default)]
    reason: Option<String>,
}

async fn cancel_workflow(
    State(state): State<Arc<AppState>>,
    Extension(rctx): Extension<RequestContext>,
    Extension(_caps): Extension<CapabilitySet>,
    Path(id): Path<String>,
    Json(body): Json<CancelBody>,
) -> ApiResult<Json<Value>> {
    let instance = state
        .workflows
        .cancel(&rctx, &id, body.reason)
        .await
        .map_err(|e| ApiError(e.with_trace_id(&rctx.trace_id)))?;
    Ok(Json(json!({
        "id": instance.id,
        "status": instance.status,
    })))
}

async fn get_workflow(
    State(state): State<Arc<AppState>>,
    Extension(rctx): Extension<RequestContext>,
    Extension(caps): Extension<CapabilitySet>,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    let descriptor = state
        .workflows
        .get(&rctx, &caps, &id)
        .await
        .map_err(|e| ApiError(e.with_trace_id(&rctx.trace_id)))?;

    // Human steps embed their form descriptor, best-effort.
    let form = descriptor
        .current_step
        .as_ref()
        .and_then(|step| step.form_id.as_deref())
        .and_then(|form_id| state.descriptors.form(&caps, form_id).ok());

    let mut value = serde_json::to_value(&descriptor)
        .map_err(|e| ApiError(GatewayError::internal(e.to_string())))?;
    if let (Some(form), Some(step)) = (form, value.get_mut("current_step")) {
        if let Some(step) = step.as_object_mut() {
            step.insert(
                "form".to_string(),
                serde_json::to_value(&form).unwrap_or(Value::Null),
            );
        }
    }
    Ok(Json(value))
}

#[derive(Debug, Default, Deserialize)]
struct ListParams {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    workflow_id: Option<String>,
    #[serde(default)]
    subject_id: Option<String>,
    #[serde(default)]
    page: Option<u32>,
    #[serde(default)]
    page_size: Option<u32>,
}

async fn list_workflows(
    State(state): State<Arc<AppState>>,
    Extension(rctx): Extension<RequestContext>,
    Extension(_caps): Extension<CapabilitySet>,
    Query(params): Query<ListParams>,
) -> ApiResult<Json<Value>> {
    let status = match params.status.as_deref() {
        None => None,
        Some(raw) => Some(parse_status(raw).map_err(|e| ApiError(e.with_trace_id(&rctx.trace_id)))?),
    };
    let filter = ListFilter {
        status,
        workflow_id: params.workflow_id,
        subject_id: params.subject_id,
        page: params.page,
        page_size: params.page_size,
    };
    let page = state
        .workflows
        .list(&rctx, &filter)
        .await
        .map_err(|e| ApiError(e.with_trace_id(&rctx.trace_id)))?;
    let items: Vec<InstanceSummary> = page.items.iter().map(InstanceSummary::from).collect();
    Ok(Json(json!({
        "items": items,
        "total_count": page.total_count,
        "page": page.page,
        "page_size": page.page_size,
    })))
}

fn parse_status(raw: &str) -> Result<WorkflowStatus, GatewayError> {
    serde_json::from_value(Value::String(raw.to_string()))
        .map_err(|_| GatewayError::bad_request(format!("unknown status '{raw}'")))
}

// ---------------------------------------------------------------------------
// Search and lookups
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
struct SearchParams {
    #[serde(default)]
    q: String,
    #[serde(default)]
    page: Option<u32>,
    #[serde(default)]
    page_size: Option<u32>,
    #[serde(default)]
    domain: Option<String>,
}

async fn search(
    State(state): State<Arc<AppState>>,
    Extension(rctx): Extension<RequestContext>,
    Extension(caps): Extension<CapabilitySet>,
    Query(params): Query<SearchParams>,
) -> ApiResult<Response> {
    let pagination = SearchPagination {
        page: params.page,
        page_size: params.page_size,
        domain: params.domain,
    };
    let response = state
        .search
        .search(&rctx, &caps, &params.q, &pagination)
        .await
        .map_err(|e| ApiError(e.with_trace_id(&rctx.trace_id)))?;
    Ok(Json(response).into_response())
}

#[derive(Debug, Default, Deserialize)]
struct LookupParams {
    #[serde(default)]
    q: Option<String>,
}

async fn lookup(
    State(state): State<Arc<AppState>>,
    Extension(rctx): Extension<RequestContext>,
    Extension(caps): Extension<CapabilitySet>,
    Path(id): Path<String>,
    Query(params): Query<LookupParams>,
) -> ApiResult<Response> {
    let response = state
        .lookups
        .get(&rctx, &caps, &id, params.q.as_deref())
        .await
        .map_err(|e| ApiError(e.with_trace_id(&rctx.trace_id)))?;
    Ok(Json(response).into_response())
}
