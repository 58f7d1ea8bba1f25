//! Job lifecycle orchestration
//!
//! `JobOrchestrator` owns every tracked job: it submits through the
//! resilience stack, polls status on an adaptive interval, fetches results
//! on completion, and exposes cancellation. Observers receive read-only
//! projections over watch channels.

mod engine;

use std::time::Duration;

use prismflow_domain::constants::{
    DEFAULT_POLL_BUDGET, DEFAULT_POLL_INITIAL_INTERVAL, DEFAULT_POLL_MAX_INTERVAL,
};
use prismflow_domain::{Job, JobSpec, PrismError, Result};

pub use engine::{JobOrchestrator, QueueReplayHandler};

/// Default breaker name for the external transformation service.
pub const TRANSFORM_SERVICE: &str = "external-ai-api";

/// Orchestrator tuning knobs.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Breaker name the transform service is guarded by
    pub service_name: String,
    /// First sleep between polls; doubles geometrically
    pub poll_initial_interval: Duration,
    /// Ceiling of the poll interval
    pub poll_max_interval: Duration,
    /// Wall-clock budget for the whole polling phase, distinct from the
    /// per-call deadline
    pub poll_budget: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            service_name: TRANSFORM_SERVICE.to_string(),
            poll_initial_interval: DEFAULT_POLL_INITIAL_INTERVAL,
            poll_max_interval: DEFAULT_POLL_MAX_INTERVAL,
            poll_budget: DEFAULT_POLL_BUDGET,
        }
    }
}

impl OrchestratorConfig {
    /// Validate the configuration invariants.
    pub fn validate(&self) -> Result<()> {
        if self.service_name.is_empty() {
            return Err(PrismError::config("service_name must not be empty"));
        }
        if self.poll_initial_interval.is_zero() {
            return Err(PrismError::config(
                "poll_initial_interval must be greater than zero",
            ));
        }
        if self.poll_max_interval < self.poll_initial_interval {
            return Err(PrismError::config(
                "poll_max_interval must not be less than poll_initial_interval",
            ));
        }
        if self.poll_budget.is_zero() {
            return Err(PrismError::config("poll_budget must be greater than zero"));
        }
        Ok(())
    }
}

/// A submission request: the job spec plus ids of queued actions (e.g.
/// pending uploads) that must sync before a deferred submission may run.
#[derive(Debug, Clone)]
pub struct JobRequest {
    pub spec: JobSpec,
    pub depends_on: Vec<String>,
}

impl From<JobSpec> for JobRequest {
    fn from(spec: JobSpec) -> Self {
        Self {
            spec,
            depends_on: Vec::new(),
        }
    }
}

/// What a submission produced.
#[derive(Debug, Clone)]
pub enum SubmitOutcome {
    /// The service accepted the job; polling has started
    Submitted { job: Job },
    /// Offline or dependency down: the submission is queued and will run
    /// when the service is reachable again
    Queued { action_id: String },
}

impl SubmitOutcome {
    pub fn job(&self) -> Option<&Job> {
        match self {
            Self::Submitted { job } => Some(job),
            Self::Queued { .. } => None,
        }
    }

    pub fn is_queued(&self) -> bool {
        matches!(self, Self::Queued { .. })
    }
}
