//! Application context
//!
//! One explicit context value owns the process-wide resilience state: the
//! breaker registry, the offline queue, the retry profiles and the
//! randomness source. It is constructed once at startup and passed by
//! handle; nothing here is ambient or global, so tests build a fresh
//! context per case.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use prismflow_common::{
    BreakerRegistry, OfflineQueue, QueueConfig, RandomSource, RetryProfiles, ThreadRandom,
};
use prismflow_domain::Result;

use crate::ports::ConnectivityProbe;

/// Shared handles to the resilience infrastructure.
pub struct CoreContext {
    registry: Arc<BreakerRegistry>,
    queue: Arc<OfflineQueue>,
    profiles: RetryProfiles,
    random: Arc<dyn RandomSource>,
}

impl CoreContext {
    /// Build a context from explicit parts.
    pub fn new(
        registry: Arc<BreakerRegistry>,
        queue: Arc<OfflineQueue>,
        profiles: RetryProfiles,
    ) -> Self {
        Self {
            registry,
            queue,
            profiles,
            random: Arc::new(ThreadRandom),
        }
    }

    /// Build a context with default registry, queue and profiles.
    pub async fn with_defaults() -> Result<Self> {
        let queue = OfflineQueue::open(QueueConfig::default())
            .await
            .map_err(prismflow_domain::PrismError::from)?;
        Ok(Self::new(
            Arc::new(BreakerRegistry::default()),
            Arc::new(queue),
            RetryProfiles::default(),
        ))
    }

    /// Replace the randomness source (deterministic backoff in tests).
    pub fn with_random(mut self, random: Arc<dyn RandomSource>) -> Self {
        self.random = random;
        self
    }

    pub fn registry(&self) -> &Arc<BreakerRegistry> {
        &self.registry
    }

    pub fn queue(&self) -> &Arc<OfflineQueue> {
        &self.queue
    }

    pub fn profiles(&self) -> &RetryProfiles {
        &self.profiles
    }

    pub fn random(&self) -> &Arc<dyn RandomSource> {
        &self.random
    }

    /// Spawn a task that keeps the queue's connectivity flag in step with a
    /// probe, checking on `interval`. Cancel the token to stop it.
    pub fn spawn_connectivity_watch(
        &self,
        probe: Arc<dyn ConnectivityProbe>,
        interval: Duration,
        shutdown: CancellationToken,
    ) -> JoinHandle<()> {
        let queue = Arc::clone(&self.queue);
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    () = shutdown.cancelled() => break,
                    () = tokio::time::sleep(interval) => {}
                }
                let online = probe.is_online().await;
                queue.set_online(online);
            }
            debug!("connectivity watch stopped");
        })
    }
}

impl std::fmt::Debug for CoreContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreContext")
            .field("breakers", &self.registry.len())
            .field("queued_actions", &self.queue.len())
            .finish()
    }
}

/// Probe that always reports online; useful for tests and environments
/// without a connectivity signal.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysOnline;

#[async_trait]
impl ConnectivityProbe for AlwaysOnline {
    async fn is_online(&self) -> bool {
        true
    }
}
