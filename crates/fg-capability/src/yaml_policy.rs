// SPDX-License-Identifier: MIT OR Apache-2.0
//! Reference policy evaluator backed by a YAML role map.
//!
//! The file maps role names to capability lists:
//!
//! ```yaml
//! roles:
//!   order_viewer:
//!     - orders:order:view
//!   order_manager:
//!     - orders:*
//! ```
//!
//! A request's set is the union over its roles.  [`YamlPolicyEvaluator::sync`]
//! re-reads the file.

use crate::{CapabilitySet, PolicyEvaluator};
use async_trait::async_trait;
use fg_core::RequestContext;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::PathBuf;
use tokio::sync::RwLock;

/// Errors loading the role-map file.
#[derive(Debug, thiserror::Error)]
pub enum PolicyError {
    /// The file could not be read.
    #[error("failed to read policy file {path}: {source}")]
    Io {
        /// Path that was requested.
        path: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// The file is not valid YAML of the expected shape.
    #[error("failed to parse policy file {path}: {source}")]
    Parse {
        /// Path that was requested.
        path: String,
        /// Underlying YAML error.
        source: serde_yaml::Error,
    },
}

#[derive(Debug, Default, Deserialize)]
struct PolicyFile {
    #[serde(default)]
    roles: BTreeMap<String, Vec<String>>,
}

/// [`PolicyEvaluator`] reading a role → capabilities YAML file.
#[derive(Debug)]
pub struct YamlPolicyEvaluator {
    path: PathBuf,
    roles: RwLock<BTreeMap<String, Vec<String>>>,
}

impl YamlPolicyEvaluator {
    /// Load the role map from `path`.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, PolicyError> {
        let path = path.into();
        let roles = Self::read_file(&path)?;
        Ok(Self {
            path,
            roles: RwLock::new(roles),
        })
    }

    /// Build an evaluator from an in-memory role map (tests, embedded use).
    pub fn from_roles(roles: BTreeMap<String, Vec<String>>) -> Self {
        Self {
            path: PathBuf::new(),
            roles: RwLock::new(roles),
        }
    }

    fn read_file(path: &PathBuf) -> Result<BTreeMap<String, Vec<String>>, PolicyError> {
        let text = std::fs::read_to_string(path).map_err(|source| PolicyError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let file: PolicyFile = serde_yaml::from_str(&text).map_err(|source| PolicyError::Parse {
            path: path.display().to_string(),
            source,
        })?;
        Ok(file.roles)
    }
}

#[async_trait]
impl PolicyEvaluator for YamlPolicyEvaluator {
    async fn evaluate(&self, rctx: &RequestContext) -> anyhow::Result<CapabilitySet> {
        let roles = self.roles.read().await;
        let mut set = CapabilitySet::empty();
        for role in &rctx.roles {
            if let Some(caps) = roles.get(role) {
                for cap in caps {
                    set.insert(cap.clone());
                }
            }
        }
        Ok(set)
    }

    async fn sync(&self) -> anyhow::Result<()> {
        if self.path.as_os_str().is_empty() {
            return Ok(());
        }
        let fresh = Self::read_file(&self.path)?;
        *self.roles.write().await = fresh;
        Ok(())
    }
}
