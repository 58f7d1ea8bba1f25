//! Configuration loading
//!
//! One TOML document configures the whole resilience surface: the endpoint,
//! per-operation retry profiles, per-dependency breaker settings with their
//! fallback strategy, the offline queue, and the orchestrator's polling
//! knobs. Values are validated while lowering into the typed configs the
//! components consume; a payment profile with more than one attempt is
//! rejected here, before anything runs.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tracing::info;

use prismflow_common::{
    BackoffKind, CircuitBreakerConfig, OperationKind, QueueConfig, RetryConfig, RetryProfiles,
};
use prismflow_core::OrchestratorConfig;
use prismflow_domain::{PrismError, Result};

use crate::api::client::TransformClientConfig;

/// Configured fallback strategy tag for a breaker.
///
/// `Custom` fallbacks carry code and cannot come from a config file; they
/// are wired programmatically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FallbackKind {
    Reject,
    Cache,
    Queue,
}

#[derive(Debug, Clone, Deserialize, Default)]
struct RawEndpoint {
    base_url: Option<String>,
    user_agent: Option<String>,
    request_timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
struct RawRetry {
    max_attempts: Option<u32>,
    base_delay_ms: Option<u64>,
    max_delay_ms: Option<u64>,
    backoff_multiplier: Option<f64>,
    strategy: Option<String>,
    retryable_patterns: Option<Vec<String>>,
    retryable_statuses: Option<Vec<u16>>,
    timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
struct RawRetrySections {
    submit: Option<RawRetry>,
    poll: Option<RawRetry>,
    upload: Option<RawRetry>,
    auth: Option<RawRetry>,
    payment: Option<RawRetry>,
}

#[derive(Debug, Clone, Deserialize)]
struct RawBreaker {
    failure_threshold: Option<u32>,
    recovery_timeout_ms: Option<u64>,
    monitoring_window_ms: Option<u64>,
    half_open_max_calls: Option<u32>,
    fallback: Option<FallbackKind>,
}

#[derive(Debug, Clone, Deserialize, Default)]
struct RawQueue {
    capacity: Option<usize>,
    base_retry_delay_ms: Option<u64>,
    drain_interval_ms: Option<u64>,
    persistence_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Default)]
struct RawOrchestrator {
    service_name: Option<String>,
    poll_initial_interval_ms: Option<u64>,
    poll_max_interval_ms: Option<u64>,
    poll_budget_ms: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
struct RawConfig {
    #[serde(default)]
    endpoint: RawEndpoint,
    #[serde(default)]
    retry: RawRetrySections,
    #[serde(default)]
    breakers: HashMap<String, RawBreaker>,
    #[serde(default)]
    queue: RawQueue,
    #[serde(default)]
    orchestrator: RawOrchestrator,
}

/// Breaker settings for one named dependency.
#[derive(Debug, Clone)]
pub struct BreakerSettings {
    pub config: CircuitBreakerConfig,
    pub fallback: FallbackKind,
}

/// Validated application configuration.
#[derive(Debug, Clone)]
pub struct PrismConfig {
    client: TransformClientConfig,
    profiles: RetryProfiles,
    breakers: HashMap<String, BreakerSettings>,
    queue: QueueConfig,
    orchestrator: OrchestratorConfig,
}

impl PrismConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(input: &str) -> Result<Self> {
        let raw: RawConfig = toml::from_str(input)
            .map_err(|err| PrismError::config(format!("invalid TOML: {err}")))?;
        Self::from_raw(raw)
    }

    /// Load and validate a configuration file.
    pub fn load(path: &Path) -> Result<Self> {
        let input = std::fs::read_to_string(path).map_err(|err| {
            PrismError::config(format!("cannot read {}: {err}", path.display()))
        })?;
        let config = Self::from_toml_str(&input)?;
        info!(path = %path.display(), "configuration loaded");
        Ok(config)
    }

    /// All defaults; equivalent to an empty TOML document.
    pub fn defaults() -> Self {
        Self::from_raw(RawConfig::default()).unwrap_or_else(|_| Self {
            client: TransformClientConfig::default(),
            profiles: RetryProfiles::default(),
            breakers: HashMap::new(),
            queue: QueueConfig::default(),
            orchestrator: OrchestratorConfig::default(),
        })
    }

    pub fn client_config(&self) -> &TransformClientConfig {
        &self.client
    }

    pub fn retry_profiles(&self) -> &RetryProfiles {
        &self.profiles
    }

    /// Per-dependency breaker settings keyed by service name.
    pub fn breaker_settings(&self) -> &HashMap<String, BreakerSettings> {
        &self.breakers
    }

    pub fn queue_config(&self) -> &QueueConfig {
        &self.queue
    }

    pub fn orchestrator_config(&self) -> &OrchestratorConfig {
        &self.orchestrator
    }

    fn from_raw(raw: RawConfig) -> Result<Self> {
        let defaults = TransformClientConfig::default();
        let client = TransformClientConfig {
            base_url: raw.endpoint.base_url.unwrap_or(defaults.base_url),
            user_agent: raw.endpoint.user_agent.unwrap_or(defaults.user_agent),
            request_timeout: raw
                .endpoint
                .request_timeout_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.request_timeout),
        };
        client.validate()?;

        let mut profiles = RetryProfiles::default();
        let sections = [
            (OperationKind::Submit, raw.retry.submit),
            (OperationKind::Poll, raw.retry.poll),
            (OperationKind::Upload, raw.retry.upload),
            (OperationKind::Auth, raw.retry.auth),
            (OperationKind::Payment, raw.retry.payment),
        ];
        for (kind, section) in sections {
            if let Some(section) = section {
                let config = lower_retry(kind, section)?;
                profiles = profiles.with_profile(kind, config)?;
            }
        }

        let mut breakers = HashMap::new();
        for (name, section) in raw.breakers {
            let settings = lower_breaker(&section)?;
            breakers.insert(name, settings);
        }

        let queue_defaults = QueueConfig::default();
        let queue = QueueConfig {
            capacity: raw.queue.capacity.unwrap_or(queue_defaults.capacity),
            base_retry_delay: raw
                .queue
                .base_retry_delay_ms
                .map(Duration::from_millis)
                .unwrap_or(queue_defaults.base_retry_delay),
            drain_interval: raw
                .queue
                .drain_interval_ms
                .map(Duration::from_millis)
                .unwrap_or(queue_defaults.drain_interval),
            persistence_path: raw.queue.persistence_path,
        };
        queue.validate()?;

        let orchestrator_defaults = OrchestratorConfig::default();
        let orchestrator = OrchestratorConfig {
            service_name: raw
                .orchestrator
                .service_name
                .unwrap_or(orchestrator_defaults.service_name),
            poll_initial_interval: raw
                .orchestrator
                .poll_initial_interval_ms
                .map(Duration::from_millis)
                .unwrap_or(orchestrator_defaults.poll_initial_interval),
            poll_max_interval: raw
                .orchestrator
                .poll_max_interval_ms
                .map(Duration::from_millis)
                .unwrap_or(orchestrator_defaults.poll_max_interval),
            poll_budget: raw
                .orchestrator
                .poll_budget_ms
                .map(Duration::from_millis)
                .unwrap_or(orchestrator_defaults.poll_budget),
        };
        orchestrator.validate()?;

        Ok(Self {
            client,
            profiles,
            breakers,
            queue,
            orchestrator,
        })
    }
}

fn lower_retry(kind: OperationKind, raw: RawRetry) -> Result<RetryConfig> {
    let defaults = RetryConfig::default();
    let strategy = match raw.strategy.as_deref() {
        None => defaults.strategy,
        Some("fixed") => BackoffKind::Fixed,
        Some("linear") => BackoffKind::Linear,
        Some("exponential") => BackoffKind::Exponential,
        Some("jitter") => BackoffKind::Jitter,
        Some(other) => {
            return Err(PrismError::config(format!(
                "unknown backoff strategy '{other}' for {kind} operations"
            )))
        }
    };

    Ok(RetryConfig {
        max_attempts: raw.max_attempts.unwrap_or(defaults.max_attempts),
        base_delay: raw
            .base_delay_ms
            .map(Duration::from_millis)
            .unwrap_or(defaults.base_delay),
        max_delay: raw
            .max_delay_ms
            .map(Duration::from_millis)
            .unwrap_or(defaults.max_delay),
        backoff_multiplier: raw.backoff_multiplier.unwrap_or(defaults.backoff_multiplier),
        strategy,
        retryable_patterns: raw.retryable_patterns.unwrap_or_default(),
        retryable_statuses: raw
            .retryable_statuses
            .unwrap_or(defaults.retryable_statuses),
        timeout: raw
            .timeout_ms
            .map(Duration::from_millis)
            .unwrap_or(defaults.timeout),
    })
}

fn lower_breaker(raw: &RawBreaker) -> Result<BreakerSettings> {
    let defaults = CircuitBreakerConfig::default();
    let config = CircuitBreakerConfig {
        failure_threshold: raw.failure_threshold.unwrap_or(defaults.failure_threshold),
        recovery_timeout: raw
            .recovery_timeout_ms
            .map(Duration::from_millis)
            .unwrap_or(defaults.recovery_timeout),
        monitoring_window: raw
            .monitoring_window_ms
            .map(Duration::from_millis)
            .unwrap_or(defaults.monitoring_window),
        half_open_max_calls: raw
            .half_open_max_calls
            .unwrap_or(defaults.half_open_max_calls),
    };
    config.validate()?;
    Ok(BreakerSettings {
        config,
        fallback: raw.fallback.unwrap_or(FallbackKind::Reject),
    })
}
