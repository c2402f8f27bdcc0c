// SPDX-License-Identifier: MIT OR Apache-2.0
#![deny(unsafe_code)]
#![warn(missing_docs)]
//! Cached option lists.
//!
//! A lookup definition binds a backend operation producing `{label, value}`
//! options.  Results cache under a scope qualifier (tenant, global, or user)
//! with a per-definition TTL; an optional `q` filters labels client-side.

use fg_capability::CapabilitySet;
use fg_core::{CacheScope, InvocationInput, LookupDefinition, RequestContext, parse_duration};
use fg_error::GatewayError;
use fg_invoke::Dispatcher;
use fg_registry::DefinitionRegistry;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

const DEFAULT_TTL: Duration = Duration::from_secs(300);

/// One selectable option.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LookupOption {
    /// Display label.
    pub label: String,
    /// Submitted value.
    pub value: Value,
}

/// Metadata block of a lookup response.
#[derive(Debug, Clone, Serialize)]
pub struct LookupMeta {
    /// Whether the options came from the cache.
    pub cached: bool,
}

/// The full lookup response.
#[derive(Debug, Clone, Serialize)]
pub struct LookupResponse {
    /// Options, after the optional `q` filter.
    pub options: Vec<LookupOption>,
    /// Cache metadata.
    pub meta: LookupMeta,
}

struct CacheEntry {
    options: Vec<LookupOption>,
    expires_at: Instant,
}

/// Cached lookup provider.
pub struct LookupService {
    registry: Arc<DefinitionRegistry>,
    dispatcher: Arc<Dispatcher>,
    cache: RwLock<HashMap<String, CacheEntry>>,
}

impl LookupService {
    /// Create a service with an empty cache.
    pub fn new(registry: Arc<DefinitionRegistry>, dispatcher: Arc<Dispatcher>) -> Self {
        Self {
            registry,
            dispatcher,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Fetch (or serve from cache) the option list for `lookup_id`.
    pub async fn get(
        &self,
        rctx: &RequestContext,
        caps: &CapabilitySet,
        lookup_id: &str,
        q: Option<&str>,
    ) -> Result<LookupResponse, GatewayError> {
        let def = self
            .registry
            .lookup(lookup_id)
            .cloned()
            .ok_or_else(|| GatewayError::not_found(format!("lookup '{lookup_id}' not found")))?;

        if !def.capabilities.is_empty() && !caps.has_all(&def.capabilities) {
            return Err(GatewayError::forbidden(format!(
                "missing capability for lookup '{lookup_id}'"
            )));
        }

        let key = cache_key(lookup_id, def.cache.scope, rctx);

        {
            let cache = self.cache.read().await;
            if let Some(entry) = cache.get(&key) {
                if entry.expires_at > Instant::now() {
                    return Ok(LookupResponse {
                        options: filter_options(&entry.options, q),
                        meta: LookupMeta { cached: true },
                    });
                }
            }
        }

        let options = self.fetch(rctx, &def).await?;
        let ttl = def
            .cache
            .ttl
            .as_deref()
            .and_then(parse_duration)
            .unwrap_or(DEFAULT_TTL);
        {
            let mut cache = self.cache.write().await;
            cache.insert(
                key,
                CacheEntry {
                    options: options.clone(),
                    expires_at: Instant::now() + ttl,
                },
            );
        }

        Ok(LookupResponse {
            options: filter_options(&options, q),
            meta: LookupMeta { cached: false },
        })
    }

    /// Drop every cached entry for a lookup id (all scopes).
    pub async fn invalidate(&self, lookup_id: &str) {
        let prefix = format!("{lookup_id}:");
        let mut cache = self.cache.write().await;
        cache.retain(|key, _| !key.starts_with(&prefix));
    }

    async fn fetch(
        &self,
        rctx: &RequestContext,
        def: &LookupDefinition,
    ) -> Result<Vec<LookupOption>, GatewayError> {
        let result = self
            .dispatcher
            .dispatch(rctx, &def.operation, &InvocationInput::default())
            .await?;
        if !result.is_success() {
            return Err(GatewayError::backend_unavailable(format!(
                "lookup '{}' backend returned status {}",
                def.id, result.status
            )));
        }

        let items = extract_items(&result.body);
        Ok(items
            .iter()
            .filter_map(|item| {
                let label = item.get(&def.label_field)?;
                let label = match label {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                let value = item.get(&def.value_field)?.clone();
                Some(LookupOption { label, value })
            })
            .collect())
    }
}

/// Cache key: lookup id plus the scope qualifier.
fn cache_key(lookup_id: &str, scope: CacheScope, rctx: &RequestContext) -> String {
    match scope {
        CacheScope::Tenant => format!("{lookup_id}:tenant:{}", rctx.tenant_id),
        CacheScope::Global => format!("{lookup_id}:global"),
        CacheScope::User => format!("{lookup_id}:user:{}", rctx.subject_id),
    }
}

/// Option arrays may sit at the root, under `.data`, or under `.items`.
fn extract_items(body: &Value) -> Vec<Value> {
    if let Some(items) = body.as_array() {
        return items.clone();
    }
    for key in ["data", "items"] {
        if let Some(items) = body.get(key).and_then(Value::as_array) {
            return items.clone();
        }
    }
    Vec::new()
}

/// Case-insensitive substring match on the label.
fn filter_options(options: &[LookupOption], q: Option<&str>) -> Vec<LookupOption> {
    match q.map(str::trim).filter(|q| !q.is_empty()) {
        None => options.to_vec(),
        Some(q) => {
            let needle = q.to_lowercase();
            options
                .iter()
                .filter(|o| o.label.to_lowercase().contains(&needle))
                .cloned()
                .collect()
        }
    }
}
