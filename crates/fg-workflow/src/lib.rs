// SPDX-License-Identifier: MIT OR Apache-2.0
#![deny(unsafe_code)]
#![warn(missing_docs)]
//! The workflow engine.
//!
//! A workflow instance is a persistent state-machine record plus an
//! append-only event log.  All mutation goes through a [`WorkflowStore`]
//! that enforces optimistic locking on `(tenant_id, id, version)`; the
//! engine drives transitions, auto-chains non-human steps, and a periodic
//! processor fires step and workflow timeouts.

mod descriptor;
mod engine;
mod instance;
mod store;
mod timeout;

pub use descriptor::{InstanceDescriptor, InstanceSummary, StepDescriptor, StepSummary};
pub use engine::WorkflowEngine;
pub use instance::{WorkflowEvent, WorkflowEventKind, WorkflowInstance, WorkflowStatus};
pub use store::{ListFilter, ListPage, MemoryWorkflowStore, WorkflowStore};
pub use timeout::TimeoutProcessor;
