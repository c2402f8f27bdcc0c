// SPDX-License-Identifier: MIT OR Apache-2.0
#![deny(unsafe_code)]
#![warn(missing_docs)]
//! Per-service OpenAPI documents, indexed by `(service_id, operation_id)`.
//!
//! The index is built once at startup from the configured service sources and
//! treated as immutable thereafter.  Validation is deliberately shallow:
//! required-field presence on object bodies, matching what the gateway can
//! check without a full JSON-Schema engine.

mod document;
mod index;

pub use document::{
    BodySchema, HttpMethod, OpenApiDocument, Operation, Parameter, ParameterLocation, PathItem,
};
pub use index::{IndexError, IndexedOperation, OpenApiIndex, ServiceSource};
