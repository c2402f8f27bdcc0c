// SPDX-License-Identifier: MIT OR Apache-2.0
#![deny(unsafe_code)]
#![warn(missing_docs)]
//! Scoped sliding-window rate limiting.
//!
//! A scope key partitions the shared namespace per user, tenant, or
//! globally: `rl:{command}:user:{subject}`, `rl:{command}:tenant:{tenant}`,
//! `rl:{command}:global`.  The in-memory limiter keeps one timestamp window
//! per key; distributed deployments implement [`RateLimiter`] over their
//! shared store.

use async_trait::async_trait;
use fg_core::{RateLimitScope, RequestContext};
use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// Build the bucket key for a command execution.
pub fn scope_key(command_id: &str, scope: RateLimitScope, rctx: &RequestContext) -> String {
    match scope {
        RateLimitScope::User => format!("rl:{command_id}:user:{}", rctx.subject_id),
        RateLimitScope::Tenant => format!("rl:{command_id}:tenant:{}", rctx.tenant_id),
        RateLimitScope::Global => format!("rl:{command_id}:global"),
    }
}

/// A keyed rate limiter.
#[async_trait]
pub trait RateLimiter: Send + Sync {
    /// Returns `true` when the call under `key` is admitted.
    async fn allow(&self, key: &str, max_requests: u32, window: Duration) -> bool;
}

/// In-memory sliding-window limiter.
#[derive(Default)]
pub struct MemoryRateLimiter {
    windows: Mutex<HashMap<String, VecDeque<Instant>>>,
}

impl MemoryRateLimiter {
    /// Create an empty limiter.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RateLimiter for MemoryRateLimiter {
    async fn allow(&self, key: &str, max_requests: u32, window: Duration) -> bool {
        let now = Instant::now();
        let mut windows = self.windows.lock().await;
        let timestamps = windows.entry(key.to_string()).or_default();

        // Expire timestamps outside the window.
        while let Some(&front) = timestamps.front() {
            if now.duration_since(front) > window {
                timestamps.pop_front();
            } else {
                break;
            }
        }

        if timestamps.len() as u32 >= max_requests {
            return false;
        }
        timestamps.push_back(now);
        true
    }
}
