// SPDX-License-Identifier: MIT OR Apache-2.0
//! The wire error envelope and its axum integration.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use fg_error::{ErrorEnvelope, GatewayError};

/// Axum-facing wrapper over [`GatewayError`].
#[derive(Debug)]
pub struct ApiError(pub GatewayError);

impl From<GatewayError> for ApiError {
    fn from(err: GatewayError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.0.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(ErrorEnvelope::from(&self.0))).into_response()
    }
}

/// Shorthand for handler results.
pub type ApiResult<T> = Result<T, ApiError>;
