// SPDX-License-Identifier: MIT OR Apache-2.0
//! Invocation payloads exchanged between the pipeline and the invokers, and
//! the command response returned to the UI.

use fg_error::FieldError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

// ---------------------------------------------------------------------------
// Invocation input / result
// ---------------------------------------------------------------------------

/// A fully mapped backend call, ready for an invoker.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InvocationInput {
    /// Path template parameters (string-coerced).
    #[serde(default)]
    pub path_params: BTreeMap<String, String>,
    /// Query parameters (string-coerced).
    #[serde(default)]
    pub query_params: BTreeMap<String, String>,
    /// Extra headers mapped from the definition.
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    /// JSON request body, when the strategy produced one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
    /// The raw user input the body was built from; schema validation and
    /// idempotency hashing read this.
    #[serde(default)]
    pub raw_input: Map<String, Value>,
}

/// What came back from a backend call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvocationResult {
    /// HTTP status code (SDK handlers report 200 on success).
    pub status: u16,
    /// Parsed response body; `Value::Null` when empty or unparseable.
    pub body: Value,
    /// Response headers.
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

impl InvocationResult {
    /// Returns `true` for 2xx statuses.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Returns `true` for 4xx statuses.
    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status)
    }

    /// Returns `true` for 5xx statuses.
    pub fn is_server_error(&self) -> bool {
        self.status >= 500
    }
}

// ---------------------------------------------------------------------------
// Command request / response
// ---------------------------------------------------------------------------

/// Body of `POST /ui/commands/{commandId}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CommandRequest {
    /// User-entered input fields.
    #[serde(default)]
    pub input: Map<String, Value>,
    /// Route parameters from the page the command was triggered on.
    #[serde(default)]
    pub route_params: BTreeMap<String, String>,
    /// Caller-supplied idempotency key (`X-Idempotency-Key` fills this when
    /// the body omits it).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub idempotency_key: Option<String>,
}

/// What the UI receives after a command execution.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CommandResponse {
    /// Whether the backend accepted the command.
    pub success: bool,
    /// User-facing message (success message or translated error).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Projected response fields.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub data: Map<String, Value>,
    /// Per-field errors extracted from a backend rejection.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub field_errors: Vec<FieldError>,
    /// Backend status code the response was shaped from.
    pub status_code: u16,
}
