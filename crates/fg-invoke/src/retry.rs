// SPDX-License-Identifier: MIT OR Apache-2.0
//! Exponential-backoff retry policy for backend calls.

use fg_openapi::HttpMethod;
use std::time::Duration;

/// Per-service retry tuning.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total tries, including the first attempt.
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub initial_backoff: Duration,
    /// Backoff multiplier applied per retry.
    pub multiplier: f64,
    /// Backoff ceiling.
    pub max_backoff: Duration,
    /// When set, only GET/HEAD/PUT/DELETE calls are retried.
    pub idempotent_only: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(100),
            multiplier: 2.0,
            max_backoff: Duration::from_secs(2),
            idempotent_only: true,
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Whether another attempt may follow `attempt` (1-based) for a call
    /// using `method`.  The failure kind (transport error or 5xx) is the
    /// caller's to establish; this only checks attempt count and method.
    pub fn allows_retry(&self, attempt: u32, method: Option<HttpMethod>) -> bool {
        if attempt >= self.max_attempts {
            return false;
        }
        if self.idempotent_only {
            return method.is_some_and(|m| m.is_idempotent());
        }
        true
    }

    /// Backoff before retry number `retry` (1-based).
    pub fn backoff(&self, retry: u32) -> Duration {
        let factor = self.multiplier.powi(retry.saturating_sub(1) as i32);
        let raw = self.initial_backoff.as_secs_f64() * factor;
        Duration::from_secs_f64(raw.min(self.max_backoff.as_secs_f64()))
    }
}
