// SPDX-License-Identifier: MIT OR Apache-2.0
//! Command observers: the audit seam of the pipeline.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fg_core::{CommandResponse, RequestContext};
use fg_error::GatewayError;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::info;

/// One audit event per command execution.
#[derive(Debug, Clone)]
pub struct CommandEvent {
    /// Executed command id.
    pub command_id: String,
    /// Acting subject.
    pub subject_id: String,
    /// Acting tenant.
    pub tenant_id: String,
    /// Whether the command succeeded end-to-end.
    pub success: bool,
    /// Backend status code, when the pipeline reached shaping.
    pub status_code: Option<u16>,
    /// Wall-clock pipeline duration.
    pub duration: Duration,
    /// Gateway error code, when the pipeline failed before shaping.
    pub error: Option<String>,
    /// When the event was emitted.
    pub timestamp: DateTime<Utc>,
}

impl CommandEvent {
    /// Build the event for a finished execution.
    pub fn from_outcome(
        command_id: &str,
        rctx: &RequestContext,
        outcome: &Result<CommandResponse, GatewayError>,
        duration: Duration,
    ) -> Self {
        let (success, status_code, error) = match outcome {
            Ok(response) => (response.success, Some(response.status_code), None),
            Err(err) => (false, None, Some(err.code.as_str().to_string())),
        };
        Self {
            command_id: command_id.to_string(),
            subject_id: rctx.subject_id.clone(),
            tenant_id: rctx.tenant_id.clone(),
            success,
            status_code,
            duration,
            error,
            timestamp: Utc::now(),
        }
    }
}

/// Receives one event per command execution.  Observer failures never fail
/// the request.
#[async_trait]
pub trait CommandObserver: Send + Sync {
    /// Handle an event.
    async fn on_command(&self, event: &CommandEvent);
}

/// Observer that logs each event with structured fields.
#[derive(Debug, Default)]
pub struct LoggingObserver;

#[async_trait]
impl CommandObserver for LoggingObserver {
    async fn on_command(&self, event: &CommandEvent) {
        info!(
            command = %event.command_id,
            subject = %event.subject_id,
            tenant = %event.tenant_id,
            success = event.success,
            status = event.status_code,
            duration_ms = event.duration.as_millis() as u64,
            error = event.error.as_deref(),
            "command executed"
        );
    }
}

/// Observer that collects events in memory (tests, diagnostics).
#[derive(Debug, Default)]
pub struct CollectingObserver {
    events: Mutex<Vec<CommandEvent>>,
}

impl CollectingObserver {
    /// Create an empty collector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the collected events.
    pub async fn events(&self) -> Vec<CommandEvent> {
        self.events.lock().await.clone()
    }
}

#[async_trait]
impl CommandObserver for CollectingObserver {
    async fn on_command(&self, event: &CommandEvent) {
        self.events.lock().await.push(event.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_from_success_outcome() {
        let rctx = RequestContext::new("user-1", "tenant-a");
        let outcome = Ok(CommandResponse {
            success: true,
            status_code: 200,
            ..CommandResponse::default()
        });
        let event =
            CommandEvent::from_outcome("orders.cancel", &rctx, &outcome, Duration::from_millis(5));
        assert!(event.success);
        assert_eq!(event.status_code, Some(200));
        assert!(event.error.is_none());
    }

    #[test]
    fn event_from_error_outcome() {
        let rctx = RequestContext::new("user-1", "tenant-a");
        let outcome = Err(GatewayError::forbidden("no"));
        let event =
            CommandEvent::from_outcome("orders.cancel", &rctx, &outcome, Duration::from_millis(5));
        assert!(!event.success);
        assert_eq!(event.status_code, None);
        assert_eq!(event.error.as_deref(), Some("FORBIDDEN"));
    }

    #[test]
    fn event_from_backend_rejection() {
        let rctx = RequestContext::new("user-1", "tenant-a");
        let outcome = Ok(CommandResponse {
            success: false,
            status_code: 422,
            ..CommandResponse::default()
        });
        let event =
            CommandEvent::from_outcome("orders.cancel", &rctx, &outcome, Duration::ZERO);
        assert!(!event.success);
        assert_eq!(event.status_code, Some(422));
        assert!(event.error.is_none());
    }

    #[tokio::test]
    async fn collector_accumulates() {
        let collector = CollectingObserver::new();
        let rctx = RequestContext::new("user-1", "tenant-a");
        let outcome = Ok(CommandResponse::default());
        let event = CommandEvent::from_outcome("a", &rctx, &outcome, Duration::ZERO);
        collector.on_command(&event).await;
        collector.on_command(&event).await;
        assert_eq!(collector.events().await.len(), 2);
    }
}
