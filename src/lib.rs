// SPDX-License-Identifier: MIT OR Apache-2.0
//! Foregate: a metadata-driven backend-for-frontend gateway.
//!
//! This facade re-exports the workspace crates so embedders can take a
//! single dependency.  The binary lives in `fg-server`.

pub use fg_capability as capability;
pub use fg_command as command;
pub use fg_core as core;
pub use fg_descriptor as descriptor;
pub use fg_error as error;
pub use fg_expr as expr;
pub use fg_idempotency as idempotency;
pub use fg_invoke as invoke;
pub use fg_lookup as lookup;
pub use fg_mapping as mapping;
pub use fg_openapi as openapi;
pub use fg_ratelimit as ratelimit;
pub use fg_registry as registry;
pub use fg_search as search;
pub use fg_server as server;
pub use fg_telemetry as telemetry;
pub use fg_workflow as workflow;
