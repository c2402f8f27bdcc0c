// SPDX-License-Identifier: MIT OR Apache-2.0
//! Periodic timeout processing.
//!
//! Scans for active instances whose expiry is due and routes each through
//! its timeout handler.  One instance's failure never aborts the batch.

use crate::{WorkflowEngine, WorkflowStore as _};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Drives [`WorkflowEngine::fire_timeout`] on an interval.
pub struct TimeoutProcessor {
    engine: Arc<WorkflowEngine>,
    interval: Duration,
}

impl TimeoutProcessor {
    /// Create a processor ticking every `interval`.
    pub fn new(engine: Arc<WorkflowEngine>, interval: Duration) -> Self {
        Self { engine, interval }
    }

    /// One scan pass.  Returns how many instances were timed out.
    pub async fn process_once(&self) -> usize {
        let due = match self.engine.store().expiring_before(Utc::now()).await {
            Ok(due) => due,
            Err(err) => {
                warn!(error = %err, "timeout scan failed");
                return 0;
            }
        };

        let mut fired = 0;
        for instance in due {
            match self
                .engine
                .fire_timeout(&instance.id, &instance.tenant_id)
                .await
            {
                Ok(true) => {
                    debug!(instance = %instance.id, "workflow timeout fired");
                    fired += 1;
                }
                Ok(false) => {}
                Err(err) => {
                    warn!(instance = %instance.id, error = %err, "timeout processing failed for instance");
                }
            }
        }
        fired
    }

    /// Run until the shutdown signal resolves.
    pub async fn run(self, shutdown: tokio::sync::watch::Receiver<bool>) {
        let mut shutdown = shutdown;
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.process_once().await;
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        debug!("timeout processor stopping");
                        return;
                    }
                }
            }
        }
    }
}
