//! Generic retry execution with configurable backoff
//!
//! This module provides the retry mechanism used for every call to the
//! external service. It supports fixed, linear, exponential and jittered
//! backoff, per-operation-type configuration, and error classification that
//! distinguishes transient failures (retried) from permanent ones
//! (propagated immediately, without sleeping first).

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, instrument, warn};

use prismflow_domain::constants::{
    DEFAULT_BACKOFF_MULTIPLIER, DEFAULT_BASE_DELAY, DEFAULT_CALL_TIMEOUT, DEFAULT_MAX_ATTEMPTS,
    DEFAULT_MAX_DELAY, RETRYABLE_HTTP_STATUSES,
};
use prismflow_domain::{ErrorClassification, PrismError, Result};

use super::random::{RandomSource, ThreadRandom};

/// Backoff strategy for computing the delay before the next attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackoffKind {
    /// Always `base_delay`
    Fixed,
    /// `base_delay * attempt`
    Linear,
    /// `base_delay * multiplier^(attempt - 1)`, capped at `max_delay`
    Exponential,
    /// Exponential, scaled by a uniform factor in `[0.5, 1.0]` to avoid
    /// synchronized retry storms across many clients
    Jitter,
}

impl fmt::Display for BackoffKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fixed => write!(f, "fixed"),
            Self::Linear => write!(f, "linear"),
            Self::Exponential => write!(f, "exponential"),
            Self::Jitter => write!(f, "jitter"),
        }
    }
}

/// Operation types with their own named retry configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    Submit,
    Poll,
    Upload,
    Auth,
    /// Payment-adjacent calls are never retried; see
    /// [`RetryConfig::validate_for`].
    Payment,
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Submit => write!(f, "submit"),
            Self::Poll => write!(f, "poll"),
            Self::Upload => write!(f, "upload"),
            Self::Auth => write!(f, "auth"),
            Self::Payment => write!(f, "payment"),
        }
    }
}

/// Configuration for retry behavior, immutable per operation type.
///
/// Invariants (enforced by [`RetryConfig::validate`]):
/// `max_delay >= base_delay > 0`, `max_attempts >= 1`.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Total number of attempts, including the first
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub backoff_multiplier: f64,
    pub strategy: BackoffKind,
    /// Substrings matched against the error display text
    pub retryable_patterns: Vec<String>,
    /// HTTP statuses retried in addition to the classification defaults
    pub retryable_statuses: Vec<u16>,
    /// Per-call deadline handed to the timeout executor
    pub timeout: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay: DEFAULT_BASE_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
            backoff_multiplier: DEFAULT_BACKOFF_MULTIPLIER,
            strategy: BackoffKind::Exponential,
            retryable_patterns: Vec::new(),
            retryable_statuses: RETRYABLE_HTTP_STATUSES.to_vec(),
            timeout: DEFAULT_CALL_TIMEOUT,
        }
    }
}

impl RetryConfig {
    /// Create a configuration builder.
    pub fn builder() -> RetryConfigBuilder {
        RetryConfigBuilder::default()
    }

    /// Validate the configuration invariants.
    pub fn validate(&self) -> Result<()> {
        if self.max_attempts == 0 {
            return Err(PrismError::config("max_attempts must be at least 1"));
        }
        if self.base_delay.is_zero() {
            return Err(PrismError::config("base_delay must be greater than zero"));
        }
        if self.max_delay < self.base_delay {
            return Err(PrismError::config(format!(
                "max_delay ({:?}) must not be less than base_delay ({:?})",
                self.max_delay, self.base_delay
            )));
        }
        if self.backoff_multiplier < 1.0 {
            return Err(PrismError::config(
                "backoff_multiplier must be at least 1.0",
            ));
        }
        if self.timeout.is_zero() {
            return Err(PrismError::config("timeout must be greater than zero"));
        }
        Ok(())
    }

    /// Validate for a specific operation type.
    ///
    /// Payment operations must use a single attempt; retrying a payment call
    /// risks a double charge, so this is rejected outright rather than
    /// defaulted around.
    pub fn validate_for(&self, kind: OperationKind) -> Result<()> {
        self.validate()?;
        if kind == OperationKind::Payment && self.max_attempts != 1 {
            return Err(PrismError::config(format!(
                "payment operations must use max_attempts = 1, got {}",
                self.max_attempts
            )));
        }
        Ok(())
    }

    /// Whether the error should be retried under this configuration.
    ///
    /// True when the error is classified retryable, its HTTP status is in
    /// `retryable_statuses`, or its display text matches one of
    /// `retryable_patterns`. Validation and cancellation are never retried.
    pub fn is_retryable(&self, error: &PrismError) -> bool {
        if matches!(
            error,
            PrismError::Validation { .. } | PrismError::Cancelled { .. }
        ) {
            return false;
        }
        if error.is_retryable() {
            return true;
        }
        if let PrismError::Api { status, .. } = error {
            if self.retryable_statuses.contains(status) {
                return true;
            }
        }
        let text = error.to_string();
        self.retryable_patterns
            .iter()
            .any(|pattern| text.contains(pattern.as_str()))
    }

    /// Compute the delay after the given attempt (1-based).
    ///
    /// Exponential and linear delays are monotonically non-decreasing and
    /// never exceed `max_delay`.
    pub fn delay_for_attempt(&self, attempt: u32, random: &dyn RandomSource) -> Duration {
        let attempt = attempt.max(1);
        let raw = match self.strategy {
            BackoffKind::Fixed => self.base_delay,
            BackoffKind::Linear => self.base_delay.saturating_mul(attempt),
            BackoffKind::Exponential => self.exponential_delay(attempt),
            BackoffKind::Jitter => {
                let factor = 0.5 + 0.5 * random.next_f64();
                let millis = self.exponential_delay(attempt).as_millis() as f64 * factor;
                Duration::from_millis(millis as u64)
            }
        };
        raw.min(self.max_delay)
    }

    fn exponential_delay(&self, attempt: u32) -> Duration {
        // Cap the exponent so the f64 math cannot overflow to infinity.
        let exponent = (attempt - 1).min(32) as i32;
        let millis =
            self.base_delay.as_millis() as f64 * self.backoff_multiplier.powi(exponent);
        let capped = millis.min(self.max_delay.as_millis() as f64);
        Duration::from_millis(capped as u64)
    }
}

/// Builder for [`RetryConfig`] with a fluent API.
#[derive(Debug, Default)]
pub struct RetryConfigBuilder {
    config: RetryConfig,
}

impl RetryConfigBuilder {
    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.config.max_attempts = attempts;
        self
    }

    pub fn base_delay(mut self, delay: Duration) -> Self {
        self.config.base_delay = delay;
        self
    }

    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.config.max_delay = delay;
        self
    }

    pub fn backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.config.backoff_multiplier = multiplier;
        self
    }

    pub fn strategy(mut self, strategy: BackoffKind) -> Self {
        self.config.strategy = strategy;
        self
    }

    pub fn retryable_pattern<S: Into<String>>(mut self, pattern: S) -> Self {
        self.config.retryable_patterns.push(pattern.into());
        self
    }

    pub fn retryable_statuses(mut self, statuses: Vec<u16>) -> Self {
        self.config.retryable_statuses = statuses;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    pub fn build(self) -> Result<RetryConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// Named retry configurations, one per operation type.
///
/// The payment profile is pinned to a single attempt; [`RetryProfiles::new`]
/// and [`RetryProfiles::with_profile`] both reject anything else.
#[derive(Debug, Clone)]
pub struct RetryProfiles {
    submit: RetryConfig,
    poll: RetryConfig,
    upload: RetryConfig,
    auth: RetryConfig,
    payment: RetryConfig,
}

impl Default for RetryProfiles {
    fn default() -> Self {
        Self {
            submit: RetryConfig::default(),
            poll: RetryConfig {
                max_attempts: 2,
                timeout: Duration::from_secs(10),
                ..RetryConfig::default()
            },
            upload: RetryConfig {
                max_attempts: 4,
                timeout: Duration::from_secs(120),
                ..RetryConfig::default()
            },
            auth: RetryConfig {
                max_attempts: 2,
                ..RetryConfig::default()
            },
            payment: RetryConfig {
                max_attempts: 1,
                ..RetryConfig::default()
            },
        }
    }
}

impl RetryProfiles {
    /// Build profiles from explicit configurations, validating each against
    /// its operation type. Unspecified kinds keep their defaults.
    pub fn new(configs: HashMap<OperationKind, RetryConfig>) -> Result<Self> {
        let mut profiles = Self::default();
        for (kind, config) in configs {
            profiles = profiles.with_profile(kind, config)?;
        }
        Ok(profiles)
    }

    /// Replace the configuration for one operation type.
    pub fn with_profile(mut self, kind: OperationKind, config: RetryConfig) -> Result<Self> {
        config.validate_for(kind)?;
        match kind {
            OperationKind::Submit => self.submit = config,
            OperationKind::Poll => self.poll = config,
            OperationKind::Upload => self.upload = config,
            OperationKind::Auth => self.auth = config,
            OperationKind::Payment => self.payment = config,
        }
        Ok(self)
    }

    /// Look up the configuration for an operation type.
    pub fn profile(&self, kind: OperationKind) -> &RetryConfig {
        match kind {
            OperationKind::Submit => &self.submit,
            OperationKind::Poll => &self.poll,
            OperationKind::Upload => &self.upload,
            OperationKind::Auth => &self.auth,
            OperationKind::Payment => &self.payment,
        }
    }
}

/// Executes operations with retry and backoff.
pub struct RetryExecutor {
    config: RetryConfig,
    random: Arc<dyn RandomSource>,
}

impl RetryExecutor {
    /// Create an executor with the thread-local randomness source.
    pub fn new(config: RetryConfig) -> Self {
        Self::with_random(config, Arc::new(ThreadRandom))
    }

    /// Create an executor with an injected randomness source.
    pub fn with_random(config: RetryConfig, random: Arc<dyn RandomSource>) -> Self {
        Self { config, random }
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Execute an operation, retrying transient failures with backoff.
    ///
    /// Non-retryable errors propagate untouched and immediately. When
    /// attempts run out, the last error is wrapped in
    /// [`PrismError::RetriesExhausted`] with the attempt count. The executor
    /// never sleeps before giving up.
    #[instrument(skip(self, operation), fields(max_attempts = self.config.max_attempts))]
    pub async fn execute<F, Fut, T>(&self, operation_name: &str, mut operation: F) -> Result<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt: u32 = 1;

        loop {
            debug!(
                operation = operation_name,
                attempt,
                max_attempts = self.config.max_attempts,
                "executing operation"
            );

            match operation(attempt).await {
                Ok(value) => {
                    if attempt > 1 {
                        debug!(
                            operation = operation_name,
                            attempt, "operation succeeded after retries"
                        );
                    }
                    return Ok(value);
                }
                Err(error) => {
                    if !self.config.is_retryable(&error) {
                        debug!(
                            operation = operation_name,
                            attempt,
                            error = %error,
                            "non-retryable failure, aborting"
                        );
                        return Err(error);
                    }
                    if attempt >= self.config.max_attempts {
                        warn!(
                            operation = operation_name,
                            attempts = attempt,
                            error = %error,
                            "all retry attempts exhausted"
                        );
                        return Err(PrismError::retries_exhausted(attempt, error));
                    }

                    let delay = self.config.delay_for_attempt(attempt, &*self.random);
                    warn!(
                        operation = operation_name,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %error,
                        "operation failed, retrying after backoff"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}
