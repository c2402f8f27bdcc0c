// SPDX-License-Identifier: MIT OR Apache-2.0
#![deny(unsafe_code)]
#![warn(missing_docs)]
//! Capability authorization substrate.
//!
//! A [`CapabilitySet`] answers wildcard-aware membership questions over
//! `domain:resource:action` strings.  The [`CapabilityResolver`] produces
//! sets from a pluggable [`PolicyEvaluator`], caching per
//! `(subject_id, tenant_id)` with a TTL.

mod resolver;
mod set;
mod yaml_policy;

pub use resolver::{CapabilityResolver, PolicyEvaluator, ResolverConfig};
pub use set::CapabilitySet;
pub use yaml_policy::{PolicyError, YamlPolicyEvaluator};
