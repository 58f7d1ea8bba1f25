//! Named circuit breaker registry
//!
//! Unrelated dependencies ("external-ai-api", "payment-gateway") must fail
//! independently, so each gets its own lazily-created breaker looked up by
//! name. The registry is an explicit value owned by the application context
//! and passed by handle; tests construct a fresh one per case.

use std::sync::Arc;

use dashmap::DashMap;
use tracing::{debug, warn};

use prismflow_domain::Result;

use super::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitBreakerStats};
use super::clock::{Clock, SystemClock};

/// Registry of named circuit breakers, created on first use.
///
/// The registry only looks up and creates breakers; it never mutates their
/// state. Breakers are never removed, only reset.
pub struct BreakerRegistry {
    breakers: DashMap<String, Arc<CircuitBreaker>>,
    configs: DashMap<String, CircuitBreakerConfig>,
    default_config: CircuitBreakerConfig,
    clock: Arc<dyn Clock>,
}

impl BreakerRegistry {
    /// Create a registry with a default configuration for unnamed services.
    pub fn new(default_config: CircuitBreakerConfig) -> Self {
        Self::with_clock(default_config, Arc::new(SystemClock))
    }

    /// Create a registry whose breakers share a custom clock.
    pub fn with_clock(default_config: CircuitBreakerConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            breakers: DashMap::new(),
            configs: DashMap::new(),
            default_config,
            clock,
        }
    }

    /// Register a per-service configuration, used when that service's
    /// breaker is first created. Has no effect on an already-created breaker.
    pub fn configure<S: Into<String>>(&self, name: S, config: CircuitBreakerConfig) -> Result<()> {
        config.validate()?;
        self.configs.insert(name.into(), config);
        Ok(())
    }

    /// Look up the breaker for a dependency, creating it lazily.
    pub fn breaker(&self, name: &str) -> Arc<CircuitBreaker> {
        if let Some(existing) = self.breakers.get(name) {
            return Arc::clone(&existing);
        }

        let config = self
            .configs
            .get(name)
            .map(|entry| entry.clone())
            .unwrap_or_else(|| self.default_config.clone());

        let created = self.breakers.entry(name.to_string()).or_insert_with(|| {
            debug!(breaker = name, "creating circuit breaker");
            let breaker = CircuitBreaker::with_clock(name, config, Arc::clone(&self.clock))
                .unwrap_or_else(|err| {
                    warn!(breaker = name, error = %err, "invalid breaker config, using defaults");
                    CircuitBreaker::with_clock(
                        name,
                        CircuitBreakerConfig::default(),
                        Arc::clone(&self.clock),
                    )
                    .expect("default breaker config is valid")
                });
            Arc::new(breaker)
        });
        Arc::clone(&created)
    }

    /// Number of breakers created so far.
    pub fn len(&self) -> usize {
        self.breakers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.breakers.is_empty()
    }

    /// Snapshot every breaker for monitoring.
    pub fn stats(&self) -> Vec<CircuitBreakerStats> {
        self.breakers
            .iter()
            .map(|entry| entry.value().stats())
            .collect()
    }

    /// Reset every breaker to closed.
    pub fn reset_all(&self) {
        for entry in self.breakers.iter() {
            entry.value().reset();
        }
    }
}

impl Default for BreakerRegistry {
    fn default() -> Self {
        Self::new(CircuitBreakerConfig::default())
    }
}
