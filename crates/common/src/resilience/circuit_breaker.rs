//! Per-dependency circuit breaker with fallback strategies
//!
//! The breaker watches retryable-classified failures within a rolling
//! monitoring window and fails fast once a dependency is known to be down,
//! instead of letting every caller rediscover the outage. After a recovery
//! timeout it admits a bounded number of probes; one probe success closes
//! the circuit, any probe failure reopens it.
//!
//! Non-retryable errors (validation and the like) pass through without
//! affecting circuit health: they say nothing about the dependency.
//!
//! When the circuit rejects a call, the configured [`FallbackPlan`] decides
//! what the caller sees: a `CircuitOpen` error, the last good cached
//! response, a queued offline action, or a custom handler's result.

use std::collections::VecDeque;
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tracing::{debug, info, instrument, warn};

use prismflow_domain::constants::{
    DEFAULT_FAILURE_THRESHOLD, DEFAULT_HALF_OPEN_MAX_CALLS, DEFAULT_MONITORING_WINDOW,
    DEFAULT_RECOVERY_TIMEOUT,
};
use prismflow_domain::{ErrorClassification, PrismError, Result};

use super::clock::{Clock, SystemClock};
use crate::queue::{OfflineAction, OfflineQueue};

/// Circuit breaker states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Circuit is closed, allowing requests
    Closed,
    /// Circuit is open, rejecting requests
    Open,
    /// Circuit is half-open, allowing limited probes to test recovery
    HalfOpen,
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Closed => write!(f, "CLOSED"),
            Self::Open => write!(f, "OPEN"),
            Self::HalfOpen => write!(f, "HALF_OPEN"),
        }
    }
}

/// Configuration for circuit breaker behavior
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Retryable failures within the monitoring window before opening
    pub failure_threshold: u32,
    /// Time to wait after the last failure before probing recovery
    pub recovery_timeout: Duration,
    /// Rolling window over which failures are counted
    pub monitoring_window: Duration,
    /// Maximum concurrent probes allowed while half-open
    pub half_open_max_calls: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: DEFAULT_FAILURE_THRESHOLD,
            recovery_timeout: DEFAULT_RECOVERY_TIMEOUT,
            monitoring_window: DEFAULT_MONITORING_WINDOW,
            half_open_max_calls: DEFAULT_HALF_OPEN_MAX_CALLS,
        }
    }
}

impl CircuitBreakerConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.failure_threshold == 0 {
            return Err(PrismError::config("failure_threshold must be at least 1"));
        }
        if self.half_open_max_calls == 0 {
            return Err(PrismError::config("half_open_max_calls must be at least 1"));
        }
        if self.monitoring_window.is_zero() {
            return Err(PrismError::config(
                "monitoring_window must be greater than zero",
            ));
        }
        if self.recovery_timeout.is_zero() {
            return Err(PrismError::config(
                "recovery_timeout must be greater than zero",
            ));
        }
        Ok(())
    }
}

/// Snapshot of breaker state for monitoring
#[derive(Debug, Clone)]
pub struct CircuitBreakerStats {
    pub name: String,
    pub state: CircuitState,
    pub failures_in_window: u32,
    pub success_count: u64,
    pub half_open_probes_used: u32,
    pub last_failure_age: Option<Duration>,
    pub last_success_age: Option<Duration>,
}

/// Result of a call executed through the breaker's fallback dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallOutcome<T> {
    /// The dependency answered
    Fresh(T),
    /// The circuit was open; this is the last good response
    Cached(T),
    /// The circuit was open; the request was handed to the offline queue
    Queued { action_id: String },
}

impl<T> CallOutcome<T> {
    /// The carried value, if the outcome has one.
    pub fn into_value(self) -> Option<T> {
        match self {
            Self::Fresh(value) | Self::Cached(value) => Some(value),
            Self::Queued { .. } => None,
        }
    }

    pub fn is_queued(&self) -> bool {
        matches!(self, Self::Queued { .. })
    }
}

/// Single-slot cache of the last good response, shared across calls.
#[derive(Debug)]
pub struct ResponseCache<T> {
    slot: Arc<Mutex<Option<T>>>,
}

impl<T> Clone for ResponseCache<T> {
    fn clone(&self) -> Self {
        Self {
            slot: Arc::clone(&self.slot),
        }
    }
}

impl<T: Clone> ResponseCache<T> {
    pub fn new() -> Self {
        Self {
            slot: Arc::new(Mutex::new(None)),
        }
    }

    /// Remember the most recent good response.
    pub fn store(&self, value: T) {
        let mut slot = match self.slot.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *slot = Some(value);
    }

    /// The last good response, if any.
    pub fn last(&self) -> Option<T> {
        match self.slot.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn clear(&self) {
        if let Ok(mut slot) = self.slot.lock() {
            *slot = None;
        }
    }
}

impl<T: Clone> Default for ResponseCache<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Handler type for [`FallbackPlan::Custom`].
pub type CustomFallback<T> =
    Arc<dyn Fn(PrismError) -> Result<CallOutcome<T>> + Send + Sync>;

/// What to do when the circuit rejects a call.
///
/// One variant per strategy, each carrying only the data it needs; resolved
/// by exhaustive match in [`CircuitBreaker::execute_with_fallback`].
pub enum FallbackPlan<T> {
    /// Surface `CircuitOpen` immediately
    Reject,
    /// Serve the last good response, or `CircuitOpen` if none is cached
    Cache(ResponseCache<T>),
    /// Hand the request to the offline queue and report it as queued
    Enqueue {
        queue: Arc<OfflineQueue>,
        make_action: Arc<dyn Fn() -> OfflineAction + Send + Sync>,
    },
    /// Caller-supplied handler
    Custom(CustomFallback<T>),
}

impl<T> fmt::Debug for FallbackPlan<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Reject => write!(f, "Reject"),
            Self::Cache(_) => write!(f, "Cache"),
            Self::Enqueue { .. } => write!(f, "Enqueue"),
            Self::Custom(_) => write!(f, "Custom"),
        }
    }
}

#[derive(Debug)]
struct BreakerInner {
    state: CircuitState,
    /// Instants of retryable failures inside the monitoring window
    failure_times: VecDeque<Instant>,
    success_count: u64,
    half_open_probes: u32,
    last_failure_at: Option<Instant>,
    last_success_at: Option<Instant>,
}

enum Admission {
    Allow { probe: bool },
    Reject { retry_after: Option<Duration> },
}

/// Circuit breaker guarding one named dependency.
///
/// All state transitions happen under a single mutex so interleaved async
/// callers cannot both observe CLOSED and race a redundant OPEN transition.
pub struct CircuitBreaker {
    name: String,
    config: CircuitBreakerConfig,
    inner: Mutex<BreakerInner>,
    clock: Arc<dyn Clock>,
}

impl fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("name", &self.name)
            .field("state", &self.state())
            .field("config", &self.config)
            .finish()
    }
}

impl CircuitBreaker {
    /// Create a breaker with the system clock.
    pub fn new<S: Into<String>>(name: S, config: CircuitBreakerConfig) -> Result<Self> {
        Self::with_clock(name, config, Arc::new(SystemClock))
    }

    /// Create a breaker with a custom clock (useful for testing).
    pub fn with_clock<S: Into<String>>(
        name: S,
        config: CircuitBreakerConfig,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            name: name.into(),
            config,
            inner: Mutex::new(BreakerInner {
                state: CircuitState::Closed,
                failure_times: VecDeque::new(),
                success_count: 0,
                half_open_probes: 0,
                last_failure_at: None,
                last_success_at: None,
            }),
            clock,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current state. The OPEN → HALF_OPEN transition happens on admission,
    /// not on observation.
    pub fn state(&self) -> CircuitState {
        self.lock_inner().state
    }

    /// Snapshot of the breaker for monitoring.
    pub fn stats(&self) -> CircuitBreakerStats {
        let now = self.clock.now();
        let mut inner = self.lock_inner();
        Self::prune_window(&mut inner, now, self.config.monitoring_window);
        CircuitBreakerStats {
            name: self.name.clone(),
            state: inner.state,
            failures_in_window: inner.failure_times.len() as u32,
            success_count: inner.success_count,
            half_open_probes_used: inner.half_open_probes,
            last_failure_age: inner.last_failure_at.map(|t| now.duration_since(t)),
            last_success_age: inner.last_success_at.map(|t| now.duration_since(t)),
        }
    }

    /// Reset the breaker to a pristine closed state.
    pub fn reset(&self) {
        let mut inner = self.lock_inner();
        inner.state = CircuitState::Closed;
        inner.failure_times.clear();
        inner.half_open_probes = 0;
        inner.last_failure_at = None;
        info!(breaker = %self.name, "circuit breaker manually reset");
    }

    /// Execute an operation under circuit protection.
    ///
    /// Returns `CircuitOpen` when the call is rejected; otherwise runs the
    /// operation, records the result, and propagates it.
    #[instrument(skip(self, operation), fields(breaker = %self.name))]
    pub async fn execute<F, Fut, T>(&self, operation: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        match self.admit() {
            Admission::Reject { retry_after } => {
                debug!(breaker = %self.name, "circuit open, rejecting call");
                Err(self.open_error(retry_after))
            }
            Admission::Allow { probe } => match operation().await {
                Ok(value) => {
                    self.on_success(probe);
                    Ok(value)
                }
                Err(error) => {
                    self.on_failure(&error, probe);
                    Err(error)
                }
            },
        }
    }

    /// Execute an operation, resolving rejections through `fallback`.
    ///
    /// Successful fresh responses refresh the cache when the plan is
    /// `Cache`, so later open periods have something to serve.
    #[instrument(skip(self, operation, fallback), fields(breaker = %self.name, fallback = ?fallback))]
    pub async fn execute_with_fallback<F, Fut, T>(
        &self,
        operation: F,
        fallback: &FallbackPlan<T>,
    ) -> Result<CallOutcome<T>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
        T: Clone,
    {
        match self.admit() {
            Admission::Allow { probe } => match operation().await {
                Ok(value) => {
                    self.on_success(probe);
                    if let FallbackPlan::Cache(cache) = fallback {
                        cache.store(value.clone());
                    }
                    Ok(CallOutcome::Fresh(value))
                }
                Err(error) => {
                    self.on_failure(&error, probe);
                    Err(error)
                }
            },
            Admission::Reject { retry_after } => {
                let open_error = self.open_error(retry_after);
                match fallback {
                    FallbackPlan::Reject => Err(open_error),
                    FallbackPlan::Cache(cache) => match cache.last() {
                        Some(value) => {
                            debug!(breaker = %self.name, "serving cached response while open");
                            Ok(CallOutcome::Cached(value))
                        }
                        None => Err(open_error),
                    },
                    FallbackPlan::Enqueue { queue, make_action } => {
                        let action = make_action();
                        let action_id = action.id.clone();
                        queue.enqueue(action).await?;
                        info!(
                            breaker = %self.name,
                            action_id = %action_id,
                            "circuit open, request queued for later sync"
                        );
                        Ok(CallOutcome::Queued { action_id })
                    }
                    FallbackPlan::Custom(handler) => handler(open_error),
                }
            }
        }
    }

    /// Record a success observed outside `execute` (e.g. streamed calls).
    pub fn record_success(&self) {
        self.on_success(false);
    }

    /// Record a failure observed outside `execute`.
    pub fn record_failure(&self, error: &PrismError) {
        self.on_failure(error, false);
    }

    fn open_error(&self, retry_after: Option<Duration>) -> PrismError {
        match retry_after {
            Some(after) => PrismError::circuit_open_with_retry(&self.name, after),
            None => PrismError::circuit_open(&self.name),
        }
    }

    fn admit(&self) -> Admission {
        let now = self.clock.now();
        let mut inner = self.lock_inner();

        match inner.state {
            CircuitState::Closed => Admission::Allow { probe: false },
            CircuitState::Open => {
                let elapsed = inner
                    .last_failure_at
                    .map(|t| now.duration_since(t))
                    .unwrap_or(Duration::MAX);
                if elapsed >= self.config.recovery_timeout {
                    inner.state = CircuitState::HalfOpen;
                    inner.half_open_probes = 1;
                    info!(breaker = %self.name, "recovery timeout elapsed, probing");
                    Admission::Allow { probe: true }
                } else {
                    Admission::Reject {
                        retry_after: Some(self.config.recovery_timeout - elapsed),
                    }
                }
            }
            CircuitState::HalfOpen => {
                if inner.half_open_probes < self.config.half_open_max_calls {
                    inner.half_open_probes += 1;
                    Admission::Allow { probe: true }
                } else {
                    // Probe budget spent; treat as open.
                    Admission::Reject { retry_after: None }
                }
            }
        }
    }

    fn on_success(&self, probe: bool) {
        let now = self.clock.now();
        let mut inner = self.lock_inner();
        inner.success_count += 1;
        inner.last_success_at = Some(now);

        match inner.state {
            CircuitState::HalfOpen => {
                inner.state = CircuitState::Closed;
                inner.failure_times.clear();
                inner.half_open_probes = 0;
                info!(breaker = %self.name, "probe succeeded, circuit closed");
            }
            CircuitState::Closed => {}
            CircuitState::Open => {
                // A stale probe finishing after the circuit reopened must not
                // close it again.
                debug!(breaker = %self.name, probe, "success recorded while open, ignoring");
            }
        }
    }

    fn on_failure(&self, error: &PrismError, probe: bool) {
        // The retry layer runs inside the breaker, so exhausted retries
        // arrive wrapped; circuit health is judged by the root failure.
        if !probe && !error.root_failure().is_retryable() {
            debug!(
                breaker = %self.name,
                error = %error,
                "non-retryable failure, circuit health unaffected"
            );
            return;
        }

        let now = self.clock.now();
        let mut inner = self.lock_inner();
        inner.last_failure_at = Some(now);

        if probe {
            inner.state = CircuitState::Open;
            inner.half_open_probes = 0;
            warn!(breaker = %self.name, "probe failed, circuit reopened");
            return;
        }

        inner.failure_times.push_back(now);
        Self::prune_window(&mut inner, now, self.config.monitoring_window);

        if inner.state == CircuitState::Closed
            && inner.failure_times.len() as u32 >= self.config.failure_threshold
        {
            inner.state = CircuitState::Open;
            inner.half_open_probes = 0;
            warn!(
                breaker = %self.name,
                failures = inner.failure_times.len(),
                window_ms = self.config.monitoring_window.as_millis() as u64,
                "failure threshold reached, circuit opened"
            );
        }
    }

    fn prune_window(inner: &mut BreakerInner, now: Instant, window: Duration) {
        while let Some(front) = inner.failure_times.front() {
            if now.duration_since(*front) > window {
                inner.failure_times.pop_front();
            } else {
                break;
            }
        }
    }

    fn lock_inner(&self) -> std::sync::MutexGuard<'_, BreakerInner> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn!(breaker = %self.name, "breaker state lock poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }
}
