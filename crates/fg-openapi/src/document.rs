// SPDX-License-Identifier: MIT OR Apache-2.0
//! Minimal deserialized shape of an OpenAPI 3.x document.
//!
//! Only the parts the gateway consumes are modeled; everything else is
//! ignored during deserialization.

use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt;

/// HTTP methods an operation can bind to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    /// GET
    Get,
    /// PUT
    Put,
    /// POST
    Post,
    /// DELETE
    Delete,
    /// PATCH
    Patch,
    /// HEAD
    Head,
}

impl HttpMethod {
    /// Uppercase wire form.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Put => "PUT",
            Self::Post => "POST",
            Self::Delete => "DELETE",
            Self::Patch => "PATCH",
            Self::Head => "HEAD",
        }
    }

    /// Methods safe to retry without an idempotency guarantee from the
    /// backend (HTTP semantics: GET/HEAD/PUT/DELETE).
    pub fn is_idempotent(&self) -> bool {
        matches!(self, Self::Get | Self::Head | Self::Put | Self::Delete)
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a parameter is carried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterLocation {
    /// Path template segment.
    Path,
    /// Query string.
    Query,
    /// Request header.
    Header,
    /// Cookie (accepted, unused by the gateway).
    Cookie,
}

/// A path- or operation-level parameter.
#[derive(Debug, Clone, Deserialize)]
pub struct Parameter {
    /// Parameter name.
    pub name: String,
    /// Carrier location.
    #[serde(rename = "in")]
    pub location: ParameterLocation,
    /// Whether the spec marks the parameter required.
    #[serde(default)]
    pub required: bool,
}

/// JSON request-body schema, reduced to what validation reads.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BodySchema {
    /// Declared `type`, when present.
    #[serde(rename = "type", default)]
    pub schema_type: Option<String>,
    /// Required property names.
    #[serde(default)]
    pub required: Vec<String>,
    /// Property map (kept raw; only key presence matters here).
    #[serde(default)]
    pub properties: BTreeMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct MediaType {
    #[serde(default)]
    pub schema: Option<BodySchema>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct RequestBody {
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub content: BTreeMap<String, MediaType>,
}

/// One operation under a path item.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Operation {
    /// The `operationId`; operations without one are skipped by the index.
    #[serde(rename = "operationId", default)]
    pub operation_id: Option<String>,
    /// Operation-level parameters.
    #[serde(default)]
    pub parameters: Vec<Parameter>,
    /// Request body declaration.
    #[serde(rename = "requestBody", default)]
    pub(crate) request_body: Option<RequestBody>,
}

impl Operation {
    /// The JSON body schema, when one is declared.
    pub fn json_body_schema(&self) -> Option<&BodySchema> {
        self.request_body
            .as_ref()?
            .content
            .get("application/json")?
            .schema
            .as_ref()
    }
}

/// One path template with its per-method operations.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PathItem {
    /// Parameters shared by every operation under this path.
    #[serde(default)]
    pub parameters: Vec<Parameter>,
    /// GET operation.
    #[serde(default)]
    pub get: Option<Operation>,
    /// PUT operation.
    #[serde(default)]
    pub put: Option<Operation>,
    /// POST operation.
    #[serde(default)]
    pub post: Option<Operation>,
    /// DELETE operation.
    #[serde(default)]
    pub delete: Option<Operation>,
    /// PATCH operation.
    #[serde(default)]
    pub patch: Option<Operation>,
    /// HEAD operation.
    #[serde(default)]
    pub head: Option<Operation>,
}

impl PathItem {
    /// Iterate declared operations with their methods.
    pub fn operations(&self) -> impl Iterator<Item = (HttpMethod, &Operation)> {
        [
            (HttpMethod::Get, self.get.as_ref()),
            (HttpMethod::Put, self.put.as_ref()),
            (HttpMethod::Post, self.post.as_ref()),
            (HttpMethod::Delete, self.delete.as_ref()),
            (HttpMethod::Patch, self.patch.as_ref()),
            (HttpMethod::Head, self.head.as_ref()),
        ]
        .into_iter()
        .filter_map(|(m, op)| op.map(|op| (m, op)))
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct Server {
    #[serde(default)]
    pub url: String,
}

/// A whole OpenAPI document, reduced to the indexed surface.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OpenApiDocument {
    /// Server list; the first URL is the default base url.
    #[serde(default)]
    pub(crate) servers: Vec<Server>,
    /// Path templates.
    #[serde(default)]
    pub paths: BTreeMap<String, PathItem>,
}

impl OpenApiDocument {
    /// Parse a document from JSON or YAML text.
    pub fn parse(text: &str) -> Result<Self, String> {
        if text.trim_start().starts_with('{') {
            serde_json::from_str(text).map_err(|e| e.to_string())
        } else {
            serde_yaml::from_str(text).map_err(|e| e.to_string())
        }
    }

    /// First server URL, if any.
    pub fn default_base_url(&self) -> Option<&str> {
        self.servers.first().map(|s| s.url.as_str()).filter(|u| !u.is_empty())
    }
}
