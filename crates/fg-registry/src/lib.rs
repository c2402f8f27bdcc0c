// SPDX-License-Identifier: MIT OR Apache-2.0
#![deny(unsafe_code)]
#![warn(missing_docs)]
//! Definition registry: loads the per-domain YAML files and indexes their
//! contents by id.
//!
//! The registry is built once at startup and treated as immutable
//! thereafter; live reload must replace the whole registry atomically.

mod validate;

pub use validate::validate;

use fg_core::{
    CommandDefinition, DomainDefinition, FormDefinition, LookupDefinition, NavItem,
    PageDefinition, SearchDefinition, WorkflowDefinition,
};
use std::collections::HashMap;
use std::path::Path;

/// Errors producing a registry.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// A definition directory or file could not be read.
    #[error("failed to read definitions from {path}: {reason}")]
    Io {
        /// Path that was requested.
        path: String,
        /// Underlying failure.
        reason: String,
    },
    /// A definition file is not valid YAML of the expected shape.
    #[error("failed to parse definition file {path}: {reason}")]
    Parse {
        /// Offending file.
        path: String,
        /// Parse failure detail.
        reason: String,
    },
    /// The same id was declared twice.
    #[error("duplicate {kind} id '{id}'")]
    DuplicateId {
        /// Definition kind (`command`, `page`, ...).
        kind: &'static str,
        /// The colliding id.
        id: String,
    },
    /// Cross-reference validation failed.
    #[error("definition validation failed: {0:?}")]
    Invalid(Vec<String>),
}

/// Immutable, indexed view over every loaded domain.
#[derive(Debug, Default)]
pub struct DefinitionRegistry {
    domains: Vec<DomainDefinition>,
    commands: HashMap<String, (usize, CommandDefinition)>,
    workflows: HashMap<String, (usize, WorkflowDefinition)>,
    pages: HashMap<String, (usize, PageDefinition)>,
    forms: HashMap<String, (usize, FormDefinition)>,
    lookups: HashMap<String, (usize, LookupDefinition)>,
}

impl DefinitionRegistry {
    /// Build a registry from already-parsed domains.
    pub fn from_domains(domains: Vec<DomainDefinition>) -> Result<Self, RegistryError> {
        let mut registry = Self {
            domains,
            ..Self::default()
        };
        for idx in 0..registry.domains.len() {
            let domain = registry.domains[idx].clone();
            for cmd in &domain.commands {
                if registry
                    .commands
                    .insert(cmd.id.clone(), (idx, cmd.clone()))
                    .is_some()
                {
                    return Err(RegistryError::DuplicateId {
                        kind: "command",
                        id: cmd.id.clone(),
                    });
                }
            }
            for wf in &domain.workflows {
                if registry
                    .workflows
                    .insert(wf.id.clone(), (idx, wf.clone()))
                    .is_some()
                {
                    return Err(RegistryError::DuplicateId {
                        kind: "workflow",
                        id: wf.id.clone(),
                    });
                }
            }
            for page in &domain.pages {
                if registry
                    .pages
                    .insert(page.id.clone(), (idx, page.clone()))
                    .is_some()
                {
                    return Err(RegistryError::DuplicateId {
                        kind: "page",
                        id: page.id.clone(),
                    });
                }
            }
            for form in &domain.forms {
                if registry
                    .forms
                    .insert(form.id.clone(), (idx, form.clone()))
                    .is_some()
                {
                    return Err(RegistryError::DuplicateId {
                        kind: "form",
                        id: form.id.clone(),
                    });
                }
            }
            for lookup in &domain.lookups {
                if registry
                    .lookups
                    .insert(lookup.id.clone(), (idx, lookup.clone()))
                    .is_some()
                {
                    return Err(RegistryError::DuplicateId {
                        kind: "lookup",
                        id: lookup.id.clone(),
                    });
                }
            }
        }
        Ok(registry)
    }

    /// Load every `*.yaml` / `*.yml` file in a directory (sorted by name).
    pub fn load_dir(dir: impl AsRef<Path>) -> Result<Self, RegistryError> {
        let dir = dir.as_ref();
        let entries = std::fs::read_dir(dir).map_err(|e| RegistryError::Io {
            path: dir.display().to_string(),
            reason: e.to_string(),
        })?;

        let mut paths: Vec<_> = entries
            .filter_map(Result::ok)
            .map(|e| e.path())
            .filter(|p| {
                matches!(
                    p.extension().and_then(|e| e.to_str()),
                    Some("yaml") | Some("yml")
                )
            })
            .collect();
        paths.sort();

        let mut domains = Vec::new();
        for path in paths {
            let text = std::fs::read_to_string(&path).map_err(|e| RegistryError::Io {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;
            let domain: DomainDefinition =
                serde_yaml::from_str(&text).map_err(|e| RegistryError::Parse {
                    path: path.display().to_string(),
                    reason: e.to_string(),
                })?;
            tracing::info!(domain = %domain.domain, file = %path.display(), "loaded definition file");
            domains.push(domain);
        }
        Self::from_domains(domains)
    }

    /// All loaded domains, in load order.
    pub fn domains(&self) -> &[DomainDefinition] {
        &self.domains
    }

    /// Look up a command by id.
    pub fn command(&self, id: &str) -> Option<&CommandDefinition> {
        self.commands.get(id).map(|(_, c)| c)
    }

    /// Look up a workflow by id.
    pub fn workflow(&self, id: &str) -> Option<&WorkflowDefinition> {
        self.workflows.get(id).map(|(_, w)| w)
    }

    /// Look up a page by id.
    pub fn page(&self, id: &str) -> Option<&PageDefinition> {
        self.pages.get(id).map(|(_, p)| p)
    }

    /// Look up a form by id.
    pub fn form(&self, id: &str) -> Option<&FormDefinition> {
        self.forms.get(id).map(|(_, f)| f)
    }

    /// Look up a lookup definition by id.
    pub fn lookup(&self, id: &str) -> Option<&LookupDefinition> {
        self.lookups.get(id).map(|(_, l)| l)
    }

    /// The domain a form belongs to.
    pub fn form_domain(&self, id: &str) -> Option<&str> {
        self.forms
            .get(id)
            .map(|(idx, _)| self.domains[*idx].domain.as_str())
    }

    /// Every search provider definition across all domains.
    pub fn searches(&self) -> impl Iterator<Item = &SearchDefinition> {
        self.domains.iter().flat_map(|d| d.searches.iter())
    }

    /// Navigation items merged across domains, in load order.
    pub fn navigation_items(&self) -> Vec<&NavItem> {
        self.domains
            .iter()
            .filter_map(|d| d.navigation.as_ref())
            .flat_map(|n| n.items.iter())
            .collect()
    }
}
