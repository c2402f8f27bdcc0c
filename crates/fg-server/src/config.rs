// SPDX-License-Identifier: MIT OR Apache-2.0
//! Gateway configuration: TOML loading, validation, and advisory warnings.

use fg_core::parse_duration;
use fg_openapi::ServiceSource;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Errors that can occur during configuration loading or validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The requested configuration file was not found or unreadable.
    #[error("config file not found: {path}")]
    FileNotFound {
        /// Path that was requested.
        path: String,
    },
    /// The file could not be parsed as valid TOML.
    #[error("failed to parse config: {reason}")]
    ParseError {
        /// Human-readable parse error detail.
        reason: String,
    },
    /// Semantic validation failed (one or more problems).
    #[error("config validation failed: {reasons:?}")]
    ValidationError {
        /// Individual validation failure messages.
        reasons: Vec<String>,
    },
}

/// Advisory-level issues that do not prevent operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigWarning {
    /// A duration string failed to parse and a default applies.
    UnparseableDuration {
        /// The offending field.
        field: &'static str,
        /// The raw value.
        value: String,
    },
    /// CORS allows every origin.
    OpenCors,
}

/// HTTP server settings.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerSection {
    /// Bind address, e.g. `0.0.0.0:8080`.
    #[serde(default = "default_bind")]
    pub bind_addr: String,
    /// Whole-request deadline.
    #[serde(default = "default_handler_timeout")]
    pub handler_timeout: String,
    /// Allow-listed CORS origins.
    #[serde(default)]
    pub cors_allowed_origins: Vec<String>,
}

fn default_bind() -> String {
    "127.0.0.1:8080".to_string()
}

fn default_handler_timeout() -> String {
    "30s".to_string()
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            bind_addr: default_bind(),
            handler_timeout: default_handler_timeout(),
            cors_allowed_origins: Vec::new(),
        }
    }
}

/// Authentication settings.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuthSection {
    /// HS256 signing secret for the reference verifier.
    #[serde(default)]
    pub jwt_secret: String,
    /// Expected `iss` claim, when set.
    #[serde(default)]
    pub issuer: Option<String>,
    /// Expected `aud` claim, when set.
    #[serde(default)]
    pub audience: Option<String>,
}

/// Definition and policy file locations.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DefinitionsSection {
    /// Directory of per-domain YAML definition files.
    pub dir: PathBuf,
    /// Role → capabilities policy file.
    #[serde(default)]
    pub policy_file: Option<PathBuf>,
}

/// Capability resolver settings.
#[derive(Debug, Clone, Deserialize)]
pub struct CapabilitiesSection {
    /// TTL of the `(subject, tenant)` capability cache.
    #[serde(default = "default_cap_ttl")]
    pub cache_ttl: String,
}

fn default_cap_ttl() -> String {
    "60s".to_string()
}

impl Default for CapabilitiesSection {
    fn default() -> Self {
        Self {
            cache_ttl: default_cap_ttl(),
        }
    }
}

/// Federated search settings.
#[derive(Debug, Clone, Deserialize)]
pub struct SearchSection {
    /// Per-provider deadline.
    #[serde(default = "default_provider_timeout")]
    pub timeout_per_provider: String,
}

fn default_provider_timeout() -> String {
    "2s".to_string()
}

impl Default for SearchSection {
    fn default() -> Self {
        Self {
            timeout_per_provider: default_provider_timeout(),
        }
    }
}

/// Workflow engine settings.
#[derive(Debug, Clone, Deserialize)]
pub struct WorkflowsSection {
    /// Timeout-processor tick interval.
    #[serde(default = "default_wf_interval")]
    pub timeout_interval: String,
}

fn default_wf_interval() -> String {
    "30s".to_string()
}

impl Default for WorkflowsSection {
    fn default() -> Self {
        Self {
            timeout_interval: default_wf_interval(),
        }
    }
}

/// Invocation-layer tuning shared across services.
#[derive(Debug, Clone, Deserialize)]
pub struct InvocationSection {
    /// Fallback backend-call timeout.
    #[serde(default = "default_invoke_timeout")]
    pub default_timeout: String,
    /// Retry attempts (including the first try).
    #[serde(default = "default_retry_attempts")]
    pub retry_max_attempts: u32,
    /// Backoff before the first retry.
    #[serde(default = "default_retry_initial")]
    pub retry_initial_backoff: String,
    /// Backoff multiplier.
    #[serde(default = "default_retry_multiplier")]
    pub retry_multiplier: f64,
    /// Backoff ceiling.
    #[serde(default = "default_retry_max")]
    pub retry_max_backoff: String,
    /// Restrict retries to idempotent methods.
    #[serde(default = "default_true")]
    pub retry_idempotent_only: bool,
    /// Consecutive failures that open a circuit.
    #[serde(default = "default_failure_threshold")]
    pub breaker_failure_threshold: u32,
    /// Consecutive half-open successes that close it.
    #[serde(default = "default_success_threshold")]
    pub breaker_success_threshold: u32,
    /// Open-circuit hold time.
    #[serde(default = "default_open_timeout")]
    pub breaker_open_timeout: String,
}

fn default_invoke_timeout() -> String {
    "10s".to_string()
}
fn default_retry_attempts() -> u32 {
    3
}
fn default_retry_initial() -> String {
    "100ms".to_string()
}
fn default_retry_multiplier() -> f64 {
    2.0
}
fn default_retry_max() -> String {
    "2s".to_string()
}
fn default_true() -> bool {
    true
}
fn default_failure_threshold() -> u32 {
    5
}
fn default_success_threshold() -> u32 {
    1
}
fn default_open_timeout() -> String {
    "30s".to_string()
}

impl Default for InvocationSection {
    fn default() -> Self {
        Self {
            default_timeout: default_invoke_timeout(),
            retry_max_attempts: default_retry_attempts(),
            retry_initial_backoff: default_retry_initial(),
            retry_multiplier: default_retry_multiplier(),
            retry_max_backoff: default_retry_max(),
            retry_idempotent_only: true,
            breaker_failure_threshold: default_failure_threshold(),
            breaker_success_threshold: default_success_threshold(),
            breaker_open_timeout: default_open_timeout(),
        }
    }
}

/// Top-level gateway configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GatewayConfig {
    /// HTTP server settings.
    #[serde(default)]
    pub server: ServerSection,
    /// Authentication settings.
    #[serde(default)]
    pub auth: AuthSection,
    /// Definition locations.
    #[serde(default)]
    pub definitions: DefinitionsSection,
    /// Capability resolver settings.
    #[serde(default)]
    pub capabilities: CapabilitiesSection,
    /// Search settings.
    #[serde(default)]
    pub search: SearchSection,
    /// Workflow settings.
    #[serde(default)]
    pub workflows: WorkflowsSection,
    /// Invocation tuning.
    #[serde(default)]
    pub invocation: InvocationSection,
    /// Backend services and their OpenAPI specs.
    #[serde(default)]
    pub services: Vec<ServiceSource>,
}

impl GatewayConfig {
    /// Load a configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
            path: path.display().to_string(),
        })?;
        toml::from_str(&text).map_err(|e| ConfigError::ParseError {
            reason: e.to_string(),
        })
    }

    /// Validate and collect advisory warnings.
    pub fn validate(&self) -> Result<Vec<ConfigWarning>, ConfigError> {
        let mut reasons = Vec::new();
        let mut warnings = Vec::new();

        if self.auth.jwt_secret.trim().is_empty() {
            reasons.push("auth.jwt_secret must be set".to_string());
        }
        if self.definitions.dir.as_os_str().is_empty() {
            reasons.push("definitions.dir must be set".to_string());
        }
        if self.invocation.retry_max_attempts == 0 {
            reasons.push("invocation.retry_max_attempts must be at least 1".to_string());
        }
        if self.invocation.breaker_failure_threshold == 0 {
            reasons.push("invocation.breaker_failure_threshold must be at least 1".to_string());
        }
        for source in &self.services {
            if source.service_id.trim().is_empty() {
                reasons.push("services entry with empty service_id".to_string());
            }
        }

        for (field, value) in [
            ("server.handler_timeout", &self.server.handler_timeout),
            ("capabilities.cache_ttl", &self.capabilities.cache_ttl),
            ("search.timeout_per_provider", &self.search.timeout_per_provider),
            ("workflows.timeout_interval", &self.workflows.timeout_interval),
            ("invocation.default_timeout", &self.invocation.default_timeout),
        ] {
            if parse_duration(value).is_none() {
                warnings.push(ConfigWarning::UnparseableDuration {
                    field,
                    value: value.clone(),
                });
            }
        }
        if self.server.cors_allowed_origins.iter().any(|o| o == "*") {
            warnings.push(ConfigWarning::OpenCors);
        }

        if reasons.is_empty() {
            Ok(warnings)
        } else {
            Err(ConfigError::ValidationError { reasons })
        }
    }

    /// Parsed handler timeout with its default.
    pub fn handler_timeout(&self) -> Duration {
        parse_duration(&self.server.handler_timeout).unwrap_or(Duration::from_secs(30))
    }

    /// Parsed capability cache TTL with its default.
    pub fn capability_cache_ttl(&self) -> Duration {
        parse_duration(&self.capabilities.cache_ttl).unwrap_or(Duration::from_secs(60))
    }

    /// Parsed per-provider search deadline with its default.
    pub fn search_timeout(&self) -> Duration {
        parse_duration(&self.search.timeout_per_provider).unwrap_or(Duration::from_secs(2))
    }

    /// Parsed workflow timeout-processor interval with its default.
    pub fn workflow_timeout_interval(&self) -> Duration {
        parse_duration(&self.workflows.timeout_interval).unwrap_or(Duration::from_secs(30))
    }

    /// Parsed default backend timeout with its default.
    pub fn invoke_default_timeout(&self) -> Duration {
        parse_duration(&self.invocation.default_timeout).unwrap_or(Duration::from_secs(10))
    }

    /// The retry policy this config describes.
    pub fn retry_policy(&self) -> fg_invoke::RetryPolicy {
        fg_invoke::RetryPolicy {
            max_attempts: self.invocation.retry_max_attempts,
            initial_backoff: parse_duration(&self.invocation.retry_initial_backoff)
                .unwrap_or(Duration::from_millis(100)),
            multiplier: self.invocation.retry_multiplier,
            max_backoff: parse_duration(&self.invocation.retry_max_backoff)
                .unwrap_or(Duration::from_secs(2)),
            idempotent_only: self.invocation.retry_idempotent_only,
        }
    }

    /// The breaker configuration this config describes.
    pub fn breaker_config(&self) -> fg_invoke::BreakerConfig {
        fg_invoke::BreakerConfig {
            failure_threshold: self.invocation.breaker_failure_threshold,
            success_threshold: self.invocation.breaker_success_threshold,
            open_timeout: parse_duration(&self.invocation.breaker_open_timeout)
                .unwrap_or(Duration::from_secs(30)),
        }
    }
}
