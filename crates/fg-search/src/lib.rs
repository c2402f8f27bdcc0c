// SPDX-License-Identifier: MIT OR Apache-2.0
#![deny(unsafe_code)]
#![warn(missing_docs)]
//! Federated search across declaratively bound domain providers.
//!
//! Eligible providers are launched concurrently, each with its own deadline;
//! results are merged, deduplicated by `route + "|" + id` keeping the best
//! score, sorted, and paged.  A single provider's failure never fails the
//! request.

use fg_capability::CapabilitySet;
use fg_core::{InvocationInput, RequestContext, SearchDefinition};
use fg_error::GatewayError;
use fg_invoke::Dispatcher;
use fg_registry::DefinitionRegistry;
use serde::Serialize;
use serde_json::{Value, json};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::debug;

/// Hard bounds on pagination.
const MAX_PAGE_SIZE: u32 = 50;
const DEFAULT_PAGE_SIZE: u32 = 20;
const MIN_QUERY_LEN: usize = 2;

/// Search tuning.
#[derive(Debug, Clone)]
pub struct SearchConfig {
    /// Deadline for each provider leg.
    pub timeout_per_provider: Duration,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            timeout_per_provider: Duration::from_secs(2),
        }
    }
}

/// Pagination and domain filter for a search call.
#[derive(Debug, Clone, Default)]
pub struct SearchPagination {
    /// 1-based page (defaults to 1).
    pub page: Option<u32>,
    /// Page size (clamped to 1..=50, defaults to 20).
    pub page_size: Option<u32>,
    /// Restrict to one domain.
    pub domain: Option<String>,
}

/// One merged search result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResult {
    /// Item id.
    pub id: String,
    /// Primary display line.
    pub title: String,
    /// Secondary display line.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subtitle: Option<String>,
    /// Result category (the provider's domain).
    pub category: String,
    /// Icon hint.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    /// UI route for the result.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub route: Option<String>,
    /// Merge/sort score.
    pub score: f64,
}

/// Per-provider completion status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderStatus {
    /// The provider answered in time.
    Ok,
    /// The provider missed its deadline.
    Timeout,
    /// The provider failed.
    Error,
}

/// Metadata block of a search response.
#[derive(Debug, Clone, Serialize)]
pub struct SearchMeta {
    /// Status per provider id.
    pub providers: BTreeMap<String, ProviderStatus>,
    /// Wall-clock time of the whole search.
    pub query_time_ms: u64,
}

/// The full search response.
#[derive(Debug, Clone, Serialize)]
pub struct SearchResponse {
    /// Results for the requested page.
    pub results: Vec<SearchResult>,
    /// Merged result count before paging.
    pub total_count: usize,
    /// Page served.
    pub page: u32,
    /// Page size used.
    pub page_size: u32,
    /// Provider statuses and timing.
    pub meta: SearchMeta,
}

/// Federated search service.
pub struct SearchService {
    registry: Arc<DefinitionRegistry>,
    dispatcher: Arc<Dispatcher>,
    config: SearchConfig,
}

impl SearchService {
    /// Create a service.
    pub fn new(
        registry: Arc<DefinitionRegistry>,
        dispatcher: Arc<Dispatcher>,
        config: SearchConfig,
    ) -> Self {
        Self {
            registry,
            dispatcher,
            config,
        }
    }

    /// Run a federated search.
    pub async fn search(
        &self,
        rctx: &RequestContext,
        caps: &CapabilitySet,
        query: &str,
        pagination: &SearchPagination,
    ) -> Result<SearchResponse, GatewayError> {
        let query = query.trim();
        if query.chars().count() < MIN_QUERY_LEN {
            return Err(GatewayError::bad_request(
                "search query must be at least 2 characters",
            ));
        }

        let page = pagination.page.unwrap_or(1).max(1);
        let page_size = pagination
            .page_size
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .clamp(1, MAX_PAGE_SIZE);

        // Eligible providers: domain filter plus the caller's capabilities.
        let providers: Vec<SearchDefinition> = self
            .registry
            .searches()
            .filter(|def| {
                pagination
                    .domain
                    .as_deref()
                    .is_none_or(|d| def.domain == d)
            })
            .filter(|def| def.capabilities.is_empty() || caps.has_all(&def.capabilities))
            .cloned()
            .collect();

        let started = std::time::Instant::now();
        let (results, statuses) = self.fan_out(rctx, query, providers).await;

        // Merge: dedup by route|id keeping the highest score, sort, page.
        let mut best: HashMap<String, SearchResult> = HashMap::new();
        for result in results {
            let key = format!(
                "{}|{}",
                result.route.as_deref().unwrap_or_default(),
                result.id
            );
            match best.get(&key) {
                Some(existing) if existing.score >= result.score => {}
                _ => {
                    best.insert(key, result);
                }
            }
        }
        let mut merged: Vec<SearchResult> = best.into_values().collect();
        merged.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });

        let total_count = merged.len();
        let start = ((page - 1) * page_size) as usize;
        let results: Vec<SearchResult> = merged
            .into_iter()
            .skip(start)
            .take(page_size as usize)
            .collect();

        Ok(SearchResponse {
            results,
            total_count,
            page,
            page_size,
            meta: SearchMeta {
                providers: statuses,
                query_time_ms: started.elapsed().as_millis() as u64,
            },
        })
    }

    /// Launch one task per provider over a bounded channel; a closer task
    /// drops the sender once every leg has finished.
    async fn fan_out(
        &self,
        rctx: &RequestContext,
        query: &str,
        providers: Vec<SearchDefinition>,
    ) -> (Vec<SearchResult>, BTreeMap<String, ProviderStatus>) {
        let (tx, mut rx) = mpsc::channel::<(String, ProviderStatus, Vec<SearchResult>)>(
            providers.len().max(1),
        );

        let mut handles = Vec::new();
        for def in providers {
            let tx = tx.clone();
            let dispatcher = self.dispatcher.clone();
            let rctx = rctx.clone();
            let query = query.to_string();
            let deadline = self.config.timeout_per_provider;
            handles.push(tokio::spawn(async move {
                let provider_id = def.id.clone();
                let outcome = tokio::time::timeout(
                    deadline,
                    query_provider(&dispatcher, &rctx, &def, &query),
                )
                .await;
                let (status, results) = match outcome {
                    Ok(Ok(results)) => (ProviderStatus::Ok, results),
                    Ok(Err(err)) => {
                        debug!(provider = %provider_id, error = %err, "search provider failed");
                        (ProviderStatus::Error, Vec::new())
                    }
                    Err(_) => (ProviderStatus::Timeout, Vec::new()),
                };
                let _ = tx.send((provider_id, status, results)).await;
            }));
        }
        drop(tx);

        // Closer task: await every leg so the channel closes.
        tokio::spawn(async move {
            for handle in handles {
                let _ = handle.await;
            }
        });

        let mut statuses = BTreeMap::new();
        let mut all = Vec::new();
        while let Some((provider_id, status, results)) = rx.recv().await {
            statuses.insert(provider_id, status);
            all.extend(results);
        }
        (all, statuses)
    }
}

/// Position score interpolates linearly from 1.0 (first) to 0.5 (last).
fn position_score(index: usize, total: usize) -> f64 {
    if total <= 1 {
        return 1.0;
    }
    1.0 - 0.5 * (index as f64 / (total - 1) as f64)
}

async fn query_provider(
    dispatcher: &Dispatcher,
    rctx: &RequestContext,
    def: &SearchDefinition,
    query: &str,
) -> Result<Vec<SearchResult>, GatewayError> {
    let input = InvocationInput {
        query_params: BTreeMap::from([("q".to_string(), query.to_string())]),
        ..InvocationInput::default()
    };
    let result = dispatcher.dispatch(rctx, &def.operation, &input).await?;
    if !result.is_success() {
        return Err(GatewayError::bad_request(format!(
            "provider '{}' returned status {}",
            def.id, result.status
        )));
    }

    let items = match def.result_path.as_deref() {
        Some(path) => fg_mapping::navigate_path(&result.body, path)
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default(),
        None => result.body.as_array().cloned().unwrap_or_default(),
    };

    let capped: Vec<Value> = items.into_iter().take(def.max_results).collect();
    let total = capped.len();

    Ok(capped
        .iter()
        .enumerate()
        .map(|(i, item)| {
            let id = field_str(item, def.fields.id_field.as_deref().unwrap_or("id"));
            let title = field_str(item, def.fields.title_field.as_deref().unwrap_or("title"));
            let subtitle = def
                .fields
                .subtitle_field
                .as_deref()
                .map(|f| field_str(item, f))
                .filter(|s| !s.is_empty());
            let route = def
                .route_template
                .as_ref()
                .map(|template| template.replace("{id}", &id));
            SearchResult {
                id,
                title,
                subtitle,
                category: def.domain.clone(),
                icon: def.icon.clone(),
                route,
                score: def.weight * position_score(i, total),
            }
        })
        .collect())
}

fn field_str(item: &Value, field: &str) -> String {
    match item.get(field) {
        Some(Value::String(s)) => s.clone(),
        Some(other) if !other.is_null() => other.to_string(),
        _ => String::new(),
    }
}

/// Round-trippable helper for tests: wrap items at a dot path the way the
/// extraction reads them back.
pub fn build_body(items: &[Value], path: Option<&str>) -> Value {
    let array = Value::Array(items.to_vec());
    match path {
        None => array,
        Some(path) => {
            let mut current = array;
            for segment in path.rsplit('.') {
                current = json!({ segment: current });
            }
            current
        }
    }
}

// ===========================================================================
// Tests
// ===========================================================================
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn position_score_interpolates() {
        assert_eq!(position_score(0, 1), 1.0);
        assert_eq!(position_score(0, 3), 1.0);
        assert_eq!(position_score(1, 3), 0.75);
        assert_eq!(position_score(2, 3), 0.5);
    }

    #[test]
    fn build_body_extract_roundtrip() {
        let items = vec![json!({"id": "a"}), json!({"id": "b"})];
        let body = build_body(&items, Some("data.results"));
        let back = fg_mapping::navigate_path(&body, "data.results")
            .and_then(Value::as_array)
            .cloned()
            .unwrap();
        assert_eq!(back, items);

        let flat = build_body(&items, None);
        assert_eq!(flat.as_array().unwrap(), &items);
    }

    #[test]
    fn field_str_handles_non_strings() {
        assert_eq!(field_str(&json!({"id": 42}), "id"), "42");
        assert_eq!(field_str(&json!({"id": "x"}), "id"), "x");
        assert_eq!(field_str(&json!({}), "id"), "");
        assert_eq!(field_str(&json!({"id": null}), "id"), "");
    }
}
