// SPDX-License-Identifier: MIT OR Apache-2.0
//! Unified error taxonomy with stable error codes for the Foregate gateway.
//!
//! Every gateway error carries an [`ErrorCode`] (a machine-readable, stable
//! string tag), a user-safe message, optional per-field details, and the
//! trace id of the request that produced it.  The taxonomy maps one-to-one
//! onto HTTP status codes at the transport boundary.

#![deny(unsafe_code)]
#![warn(missing_docs)]

use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// ErrorCode
// ---------------------------------------------------------------------------

/// Machine-readable, stable error code.
///
/// Each variant serialises to a `SCREAMING_SNAKE_CASE` string that is
/// guaranteed not to change across patch releases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// The request was malformed (bad parameters, mapping failure).
    BadRequest,
    /// Authentication is missing or invalid.
    Unauthorized,
    /// The caller lacks a required capability.
    Forbidden,
    /// The referenced definition, instance, or resource does not exist.
    NotFound,
    /// Conflicting state (stale version, idempotency hash mismatch).
    Conflict,
    /// The request body failed schema validation.
    ValidationError,
    /// No transition matches the requested workflow event.
    InvalidTransition,
    /// The caller exceeded a configured rate limit.
    RateLimited,
    /// Catch-all for unexpected internal errors.
    InternalError,
    /// A backend refused the connection or the circuit is open.
    BackendUnavailable,
    /// A backend call exceeded its deadline.
    BackendTimeout,
    /// The workflow instance is in a terminal or suspended-incompatible state.
    WorkflowNotActive,
    /// The caller lacks the capability required by the current step.
    StepUnauthorized,
}

impl ErrorCode {
    /// Stable `&'static str` representation (e.g. `"RATE_LIMITED"`).
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BadRequest => "BAD_REQUEST",
            Self::Unauthorized => "UNAUTHORIZED",
            Self::Forbidden => "FORBIDDEN",
            Self::NotFound => "NOT_FOUND",
            Self::Conflict => "CONFLICT",
            Self::ValidationError => "VALIDATION_ERROR",
            Self::InvalidTransition => "INVALID_TRANSITION",
            Self::RateLimited => "RATE_LIMITED",
            Self::InternalError => "INTERNAL_ERROR",
            Self::BackendUnavailable => "BACKEND_UNAVAILABLE",
            Self::BackendTimeout => "BACKEND_TIMEOUT",
            Self::WorkflowNotActive => "WORKFLOW_NOT_ACTIVE",
            Self::StepUnauthorized => "STEP_UNAUTHORIZED",
        }
    }

    /// HTTP status code this error maps to at the transport boundary.
    pub fn http_status(&self) -> u16 {
        match self {
            Self::BadRequest => 400,
            Self::Unauthorized => 401,
            Self::Forbidden | Self::StepUnauthorized => 403,
            Self::NotFound => 404,
            Self::Conflict | Self::WorkflowNotActive => 409,
            Self::ValidationError | Self::InvalidTransition => 422,
            Self::RateLimited => 429,
            Self::InternalError => 500,
            Self::BackendUnavailable => 502,
            Self::BackendTimeout => 504,
        }
    }

    /// Returns `true` when the failure originated in a downstream backend
    /// rather than in the gateway or the caller.
    pub fn is_backend(&self) -> bool {
        matches!(self, Self::BackendUnavailable | Self::BackendTimeout)
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// FieldError
// ---------------------------------------------------------------------------

/// A validation problem scoped to a single input field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    /// UI-facing field name (reverse-mapped through the input projection).
    pub field: String,
    /// Machine-readable violation code (e.g. `"required"`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    /// Human-readable description.
    pub message: String,
}

impl FieldError {
    /// Create a field error with a violation code.
    pub fn new(
        field: impl Into<String>,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            field: field.into(),
            code: Some(code.into()),
            message: message.into(),
        }
    }

    /// Create a `required` violation for the given field.
    pub fn required(field: impl Into<String>) -> Self {
        let field = field.into();
        let message = format!("field '{field}' is required");
        Self {
            field,
            code: Some("required".into()),
            message,
        }
    }
}

// ---------------------------------------------------------------------------
// GatewayError
// ---------------------------------------------------------------------------

/// Unified gateway error.
///
/// The `message` is always safe to show to an end user; backend failure
/// detail is logged, never carried here.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("[{}] {message}", .code.as_str())]
pub struct GatewayError {
    /// Machine-readable error code.
    pub code: ErrorCode,
    /// User-safe description.
    pub message: String,
    /// Per-field validation details, if any.
    pub details: Vec<FieldError>,
    /// Trace id of the request that produced this error.
    pub trace_id: Option<String>,
}

impl GatewayError {
    /// Create a new error with the given code and message.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: Vec::new(),
            trace_id: None,
        }
    }

    /// Attach per-field details.
    #[must_use]
    pub fn with_details(mut self, details: Vec<FieldError>) -> Self {
        self.details = details;
        self
    }

    /// Attach the originating trace id.
    #[must_use]
    pub fn with_trace_id(mut self, trace_id: impl Into<String>) -> Self {
        self.trace_id = Some(trace_id.into());
        self
    }

    // -- Convenience constructors, one per taxonomy entry --------------------

    /// 400 — malformed request or mapping failure.
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::BadRequest, message)
    }

    /// 401 — missing or invalid authentication.
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Unauthorized, message)
    }

    /// 403 — missing capability.
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Forbidden, message)
    }

    /// 404 — unknown definition or resource.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::NotFound, message)
    }

    /// 409 — conflicting state.
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Conflict, message)
    }

    /// 422 — schema validation failure with field details.
    pub fn validation(details: Vec<FieldError>) -> Self {
        Self::new(ErrorCode::ValidationError, "validation failed").with_details(details)
    }

    /// 422 — no matching workflow transition.
    pub fn invalid_transition(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidTransition, message)
    }

    /// 429 — rate limit exceeded.
    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::RateLimited, message)
    }

    /// 500 — unexpected internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }

    /// 502 — backend unreachable or circuit open.
    pub fn backend_unavailable(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::BackendUnavailable, message)
    }

    /// 504 — backend deadline exceeded.
    pub fn backend_timeout(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::BackendTimeout, message)
    }

    /// 409 — workflow instance not in an advanceable state.
    pub fn workflow_not_active(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::WorkflowNotActive, message)
    }

    /// 403 — caller lacks the current step's capability.
    pub fn step_unauthorized(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::StepUnauthorized, message)
    }

    /// Shorthand for `self.code.http_status()`.
    pub fn http_status(&self) -> u16 {
        self.code.http_status()
    }
}

// ---------------------------------------------------------------------------
// Wire envelope
// ---------------------------------------------------------------------------

/// Body of the error payload inside the wire envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Stable error code.
    pub code: ErrorCode,
    /// User-safe message.
    pub message: String,
    /// Per-field details.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub details: Vec<FieldError>,
    /// Trace id for support correlation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<String>,
}

/// The `{"error": {...}}` envelope every failed response carries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    /// The error payload.
    pub error: ErrorBody,
}

impl From<&GatewayError> for ErrorEnvelope {
    fn from(err: &GatewayError) -> Self {
        Self {
            error: ErrorBody {
                code: err.code,
                message: err.message.clone(),
                details: err.details.clone(),
                trace_id: err.trace_id.clone(),
            },
        }
    }
}
