// SPDX-License-Identifier: MIT OR Apache-2.0
//! TTL-cached capability resolution.

use crate::CapabilitySet;
use async_trait::async_trait;
use fg_core::RequestContext;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::warn;

// ---------------------------------------------------------------------------
// PolicyEvaluator
// ---------------------------------------------------------------------------

/// Produces the capability set for a request context.
///
/// The reference implementation is [`crate::YamlPolicyEvaluator`]; remote
/// policy engines and database-backed evaluators implement the same trait.
#[async_trait]
pub trait PolicyEvaluator: Send + Sync {
    /// Evaluate the full capability set for the given context.
    async fn evaluate(&self, rctx: &RequestContext) -> anyhow::Result<CapabilitySet>;

    /// Reload backing data (role maps, remote policy bundles).
    async fn sync(&self) -> anyhow::Result<()> {
        Ok(())
    }

    /// Resource-scoped check.  The default derives from [`Self::evaluate`];
    /// evaluators with native resource support override this.
    async fn evaluate_resource(
        &self,
        rctx: &RequestContext,
        cap: &str,
        _resource: &str,
    ) -> anyhow::Result<bool> {
        Ok(self.evaluate(rctx).await?.has(cap))
    }
}

// ---------------------------------------------------------------------------
// CapabilityResolver
// ---------------------------------------------------------------------------

/// Tuning for the resolver cache.
#[derive(Debug, Clone)]
pub struct ResolverConfig {
    /// How long a resolved set stays cached.
    pub cache_ttl: Duration,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            cache_ttl: Duration::from_secs(60),
        }
    }
}

type CacheKey = (String, String);

struct CacheEntry {
    caps: CapabilitySet,
    expires_at: Instant,
}

/// Resolves capability sets with a per-`(subject, tenant)` TTL cache.
///
/// Evaluator failure yields [`CapabilitySet::degraded`] — the conservative
/// empty set — and a warning log; gates downstream decide whether that
/// surfaces as UNAUTHORIZED.
pub struct CapabilityResolver {
    evaluator: std::sync::Arc<dyn PolicyEvaluator>,
    cache: RwLock<HashMap<CacheKey, CacheEntry>>,
    config: ResolverConfig,
}

impl CapabilityResolver {
    /// Create a resolver over the given evaluator.
    pub fn new(evaluator: std::sync::Arc<dyn PolicyEvaluator>, config: ResolverConfig) -> Self {
        Self {
            evaluator,
            cache: RwLock::new(HashMap::new()),
            config,
        }
    }

    /// Resolve the capability set for `rctx`, consulting the cache first.
    pub async fn resolve(&self, rctx: &RequestContext) -> CapabilitySet {
        let key = (rctx.subject_id.clone(), rctx.tenant_id.clone());

        {
            let cache = self.cache.read().await;
            if let Some(entry) = cache.get(&key) {
                if entry.expires_at > Instant::now() {
                    return entry.caps.clone();
                }
            }
        }

        match self.evaluator.evaluate(rctx).await {
            Ok(caps) => {
                let mut cache = self.cache.write().await;
                cache.insert(
                    key,
                    CacheEntry {
                        caps: caps.clone(),
                        expires_at: Instant::now() + self.config.cache_ttl,
                    },
                );
                caps
            }
            Err(err) => {
                warn!(
                    subject = %rctx.subject_id,
                    tenant = %rctx.tenant_id,
                    error = %err,
                    "capability resolution failed; defaulting to empty set"
                );
                CapabilitySet::degraded()
            }
        }
    }

    /// Drop the cached entry for `(subject_id, tenant_id)`.
    pub async fn invalidate(&self, subject_id: &str, tenant_id: &str) {
        let mut cache = self.cache.write().await;
        cache.remove(&(subject_id.to_string(), tenant_id.to_string()));
    }

    /// Ask the evaluator to reload its backing data and clear the cache.
    pub async fn sync(&self) -> anyhow::Result<()> {
        self.evaluator.sync().await?;
        self.cache.write().await.clear();
        Ok(())
    }
}
