//! Orchestrator engine
//!
//! ## Resilience composition
//!
//! Every network call runs through circuit breaker → retry → timeout. The
//! breaker guards the named service so unrelated dependencies fail
//! independently; the retry executor absorbs transient failures; the
//! timeout executor enforces the per-call deadline and propagates
//! cancellation into the transport.
//!
//! ## Single-flight
//!
//! Status polls and result fetches are coalesced per job id: a second
//! caller while one request is outstanding awaits the same in-flight call
//! instead of issuing a duplicate. Within one job, polls are strictly
//! sequential.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use prismflow_common::{
    ActionKind, CallOutcome, FallbackPlan, OfflineAction, OperationKind, Priority, RetryExecutor,
    SyncHandler, TimeoutExecutor,
};
use prismflow_domain::{
    Artifact, Job, JobId, JobSpec, JobStatus, PrismError, RemoteStatus, Result,
};

use super::{JobRequest, OrchestratorConfig, SubmitOutcome};
use crate::context::CoreContext;
use crate::ports::TransformService;
use crate::single_flight::SingleFlight;

struct JobEntry {
    watch: watch::Sender<Job>,
    cancel: CancellationToken,
}

/// Orchestrates submission, polling, result fetching and cancellation of
/// transformation jobs.
///
/// Jobs are owned exclusively by the orchestrator; callers observe them
/// through snapshots and watch-channel subscriptions.
pub struct JobOrchestrator {
    ctx: Arc<CoreContext>,
    service: Arc<dyn TransformService>,
    config: OrchestratorConfig,
    jobs: Mutex<HashMap<JobId, JobEntry>>,
    poll_flight: SingleFlight<JobId, RemoteStatus>,
    fetch_flight: SingleFlight<JobId, Vec<Artifact>>,
    /// Self-handle for spawning poll loops; upgrades fail only during
    /// teardown, when starting new loops would be wrong anyway.
    weak_self: Weak<JobOrchestrator>,
}

impl JobOrchestrator {
    /// Create an orchestrator over the given context and service.
    pub fn new(
        ctx: Arc<CoreContext>,
        service: Arc<dyn TransformService>,
        config: OrchestratorConfig,
    ) -> Result<Arc<Self>> {
        config.validate()?;
        Ok(Arc::new_cyclic(|weak_self| Self {
            ctx,
            service,
            config,
            jobs: Mutex::new(HashMap::new()),
            poll_flight: SingleFlight::new(),
            fetch_flight: SingleFlight::new(),
            weak_self: weak_self.clone(),
        }))
    }

    /// Submit a transformation job.
    ///
    /// Online with a healthy dependency, this returns `Submitted` with the
    /// tracked job in `Pending` state and polling underway. Offline, or
    /// with the circuit open, the submission is hydrated into the offline
    /// queue as a critical action and `Queued` is returned; the job will be
    /// submitted when the service is reachable again. A failure after
    /// retries with a healthy breaker surfaces one terminal error and
    /// creates no job.
    #[instrument(skip(self, request))]
    pub async fn submit(&self, request: impl Into<JobRequest>) -> Result<SubmitOutcome> {
        let request = request.into();
        request.spec.validate()?;
        let payload = serde_json::to_value(&request.spec)?;

        if !self.ctx.queue().is_online() {
            let action = Self::submit_action(payload, request.depends_on.clone());
            let action_id = action.id.clone();
            self.ctx
                .queue()
                .enqueue(action)
                .await
                .map_err(PrismError::from)?;
            info!(action_id = %action_id, "offline, submission queued for later sync");
            return Ok(SubmitOutcome::Queued { action_id });
        }

        let breaker = self.ctx.registry().breaker(&self.config.service_name);
        let depends_on = request.depends_on.clone();
        let plan: FallbackPlan<JobId> = FallbackPlan::Enqueue {
            queue: Arc::clone(self.ctx.queue()),
            make_action: Arc::new(move || {
                Self::submit_action(payload.clone(), depends_on.clone())
            }),
        };

        let outcome = breaker
            .execute_with_fallback(|| self.submit_call(&request.spec), &plan)
            .await?;

        match outcome {
            CallOutcome::Fresh(job_id) | CallOutcome::Cached(job_id) => {
                let job = self.register_job(job_id, request.spec.region.clone());
                info!(job = %job.id, "job submitted, polling started");
                Ok(SubmitOutcome::Submitted { job })
            }
            CallOutcome::Queued { action_id } => {
                info!(action_id = %action_id, "dependency down, submission queued");
                Ok(SubmitOutcome::Queued { action_id })
            }
        }
    }

    /// Snapshot of a tracked job.
    pub fn job(&self, job_id: &JobId) -> Option<Job> {
        let jobs = self.lock_jobs();
        jobs.get(job_id).map(|entry| entry.watch.borrow().clone())
    }

    /// Snapshots of every tracked job.
    pub fn jobs(&self) -> Vec<Job> {
        let jobs = self.lock_jobs();
        jobs.values()
            .map(|entry| entry.watch.borrow().clone())
            .collect()
    }

    /// Subscribe to a job's state changes.
    pub fn subscribe(&self, job_id: &JobId) -> Option<watch::Receiver<Job>> {
        let jobs = self.lock_jobs();
        jobs.get(job_id).map(|entry| entry.watch.subscribe())
    }

    /// Issue one status poll immediately, coalescing with any in-flight
    /// poll for the same job.
    pub async fn poll_now(&self, job_id: &JobId) -> Result<Job> {
        let cancel = self.entry_cancel(job_id)?;
        let snapshot = self.job(job_id).ok_or_else(|| unknown_job(job_id))?;
        if snapshot.status.is_terminal() {
            return Ok(snapshot);
        }

        let status = self
            .poll_flight
            .run(job_id.clone(), {
                let future = self.poll_status_future(job_id, cancel.clone());
                move || future
            })
            .await?;

        self.apply_remote_status(job_id, status);
        if status == RemoteStatus::Success {
            self.finish_success(job_id, &cancel).await;
        }
        self.job(job_id).ok_or_else(|| unknown_job(job_id))
    }

    /// Retry fetching results for a job that succeeded but whose fetch
    /// failed; the job is never resubmitted.
    pub async fn retry_fetch(&self, job_id: &JobId) -> Result<Job> {
        let snapshot = self.job(job_id).ok_or_else(|| unknown_job(job_id))?;
        if snapshot.status != JobStatus::Succeeded {
            return Err(PrismError::validation(
                "job_id",
                format!("job '{job_id}' has not succeeded, nothing to fetch"),
            ));
        }
        if !snapshot.fetch_failed {
            return Ok(snapshot);
        }

        let cancel = self.entry_cancel(job_id)?;
        let artifacts = self.fetch_results(job_id, cancel).await?;
        self.update_job(job_id, |job| {
            job.results = artifacts.clone();
            job.fetch_failed = false;
        })
        .ok_or_else(|| unknown_job(job_id))
    }

    /// Cancel a job.
    ///
    /// The local transition to `Cancelled` happens immediately and stops
    /// the poll loop; the remote service is notified best-effort in the
    /// background, and an unreachable service never blocks cancellation.
    #[instrument(skip(self))]
    pub fn cancel(&self, job_id: &JobId) -> Result<Job> {
        let cancel = self.entry_cancel(job_id)?;
        cancel.cancel();

        let snapshot = self
            .update_job(job_id, |job| {
                if !job.status.is_terminal() {
                    job.status = JobStatus::Cancelled;
                }
            })
            .ok_or_else(|| unknown_job(job_id))?;

        let service = Arc::clone(&self.service);
        let id = job_id.clone();
        tokio::spawn(async move {
            if let Err(error) = service.cancel(&id).await {
                debug!(job = %id, error = %error, "remote cancel failed, local state already cancelled");
            }
        });

        info!(job = %job_id, "job cancelled");
        Ok(snapshot)
    }

    /// Handler that replays queued actions through this orchestrator.
    pub fn replay_handler(&self) -> Arc<QueueReplayHandler> {
        Arc::new(QueueReplayHandler {
            orchestrator: self.weak_self.clone(),
            delegate: None,
        })
    }

    /// Replay handler that forwards non-job action kinds to `delegate`.
    pub fn replay_handler_with_delegate(
        &self,
        delegate: Arc<dyn SyncHandler>,
    ) -> Arc<QueueReplayHandler> {
        Arc::new(QueueReplayHandler {
            orchestrator: self.weak_self.clone(),
            delegate: Some(delegate),
        })
    }

    /// Submit through breaker → retry → timeout without the queue fallback;
    /// used when replaying an already-queued submission, where a failure
    /// leaves the action queued for the next pass.
    async fn submit_replayed(&self, spec: &JobSpec) -> Result<Job> {
        let breaker = self.ctx.registry().breaker(&self.config.service_name);
        let job_id = breaker.execute(|| self.submit_call(spec)).await?;
        Ok(self.register_job(job_id, spec.region.clone()))
    }

    async fn submit_call(&self, spec: &JobSpec) -> Result<JobId> {
        let profile = self.ctx.profiles().profile(OperationKind::Submit).clone();
        let retry = RetryExecutor::with_random(profile.clone(), Arc::clone(self.ctx.random()));
        let timeout = TimeoutExecutor::new(profile.timeout);
        let service = Arc::clone(&self.service);
        let spec = spec.clone();

        retry
            .execute("submit", move |_attempt| {
                let timeout = timeout.clone();
                let service = Arc::clone(&service);
                let spec = spec.clone();
                async move {
                    timeout
                        .run("submit", move |token| async move {
                            service.submit(&spec, &token).await
                        })
                        .await
                }
            })
            .await
    }

    /// Track a freshly-submitted job and start its poll loop.
    fn register_job(&self, job_id: JobId, region: String) -> Job {
        let job = Job::new(job_id.clone(), region);
        let (tx, _rx) = watch::channel(job.clone());
        let cancel = CancellationToken::new();

        self.lock_jobs().insert(
            job_id.clone(),
            JobEntry {
                watch: tx,
                cancel: cancel.clone(),
            },
        );

        if let Some(orchestrator) = self.weak_self.upgrade() {
            tokio::spawn(async move {
                orchestrator.run_poll_loop(job_id, cancel).await;
            });
        }

        job
    }

    /// Poll a job until a terminal state, the wall-clock budget runs out,
    /// or the job is cancelled.
    ///
    /// The interval starts near-immediate and doubles up to the configured
    /// ceiling, trading responsiveness against load on the external
    /// service.
    async fn run_poll_loop(self: Arc<Self>, job_id: JobId, cancel: CancellationToken) {
        let started = tokio::time::Instant::now();
        let mut interval = self.config.poll_initial_interval;

        loop {
            if cancel.is_cancelled() {
                debug!(job = %job_id, "poll loop stopped by cancellation");
                return;
            }
            if started.elapsed() >= self.config.poll_budget {
                warn!(
                    job = %job_id,
                    budget_ms = self.config.poll_budget.as_millis() as u64,
                    "polling budget exceeded, failing job"
                );
                self.update_job(&job_id, |job| {
                    if job.status.can_transition_to(JobStatus::Failed) {
                        job.status = JobStatus::Failed;
                    }
                });
                return;
            }

            let poll = self
                .poll_flight
                .run(job_id.clone(), {
                    let future = self.poll_status_future(&job_id, cancel.clone());
                    move || future
                })
                .await;

            match poll {
                Ok(status) => {
                    self.apply_remote_status(&job_id, status);
                    match status {
                        RemoteStatus::Success => {
                            self.finish_success(&job_id, &cancel).await;
                            return;
                        }
                        RemoteStatus::Failed => {
                            info!(job = %job_id, "remote job failed");
                            return;
                        }
                        RemoteStatus::Queued | RemoteStatus::Running => {}
                    }
                }
                Err(PrismError::Cancelled { .. }) => {
                    debug!(job = %job_id, "in-flight poll cancelled");
                    return;
                }
                Err(error) => {
                    // One coalesced message per failed poll round; the retry
                    // layer already absorbed per-attempt noise.
                    warn!(job = %job_id, error = %error, "status poll failed, will poll again");
                    self.update_job(&job_id, |job| {
                        job.attempts += 1;
                        job.last_polled_at = Some(Utc::now());
                    });
                }
            }

            tokio::select! {
                () = tokio::time::sleep(interval) => {}
                () = cancel.cancelled() => return,
            }
            interval = (interval * 2).min(self.config.poll_max_interval);
        }
    }

    /// Build the owned future for one resilient status call; shared among
    /// coalesced pollers, so it captures no borrows.
    fn poll_status_future(
        &self,
        job_id: &JobId,
        parent: CancellationToken,
    ) -> impl std::future::Future<Output = Result<RemoteStatus>> + Send + 'static {
        let breaker = self.ctx.registry().breaker(&self.config.service_name);
        let profile = self.ctx.profiles().profile(OperationKind::Poll).clone();
        let random = Arc::clone(self.ctx.random());
        let service = Arc::clone(&self.service);
        let id = job_id.clone();

        async move {
            breaker
                .execute(|| async {
                    let retry = RetryExecutor::with_random(profile.clone(), Arc::clone(&random));
                    let timeout = TimeoutExecutor::new(profile.timeout);
                    let service = Arc::clone(&service);
                    let id = id.clone();
                    let parent = parent.clone();
                    retry
                        .execute("poll", move |_attempt| {
                            let timeout = timeout.clone();
                            let service = Arc::clone(&service);
                            let id = id.clone();
                            let parent = parent.clone();
                            async move {
                                timeout
                                    .run_cancellable("poll", &parent, move |token| async move {
                                        service.status(&id, &token).await
                                    })
                                    .await
                            }
                        })
                        .await
                })
                .await
        }
    }

    /// Fetch results once through the resilience stack, coalescing
    /// concurrent fetches for the same job.
    async fn fetch_results(
        &self,
        job_id: &JobId,
        parent: CancellationToken,
    ) -> Result<Vec<Artifact>> {
        let breaker = self.ctx.registry().breaker(&self.config.service_name);
        let profile = self.ctx.profiles().profile(OperationKind::Poll).clone();
        let random = Arc::clone(self.ctx.random());
        let service = Arc::clone(&self.service);
        let id = job_id.clone();

        self.fetch_flight
            .run(job_id.clone(), move || async move {
                breaker
                    .execute(|| async {
                        let retry =
                            RetryExecutor::with_random(profile.clone(), Arc::clone(&random));
                        let timeout = TimeoutExecutor::new(profile.timeout);
                        let service = Arc::clone(&service);
                        let id = id.clone();
                        let parent = parent.clone();
                        retry
                            .execute("fetch_results", move |_attempt| {
                                let timeout = timeout.clone();
                                let service = Arc::clone(&service);
                                let id = id.clone();
                                let parent = parent.clone();
                                async move {
                                    timeout
                                        .run_cancellable(
                                            "fetch_results",
                                            &parent,
                                            move |token| async move {
                                                service.result(&id, &token).await
                                            },
                                        )
                                        .await
                                }
                            })
                            .await
                    })
                    .await
            })
            .await
    }

    /// Transition to `Succeeded`, fetching results exactly once. A fetch
    /// failure leaves the job succeeded with empty results and the
    /// fetch-error flag set so the caller can retry the fetch alone.
    async fn finish_success(&self, job_id: &JobId, cancel: &CancellationToken) {
        if let Some(job) = self.job(job_id) {
            if job.status == JobStatus::Succeeded {
                return;
            }
        }

        let fetch = self.fetch_results(job_id, cancel.clone()).await;
        self.update_job(job_id, |job| {
            if job.status.can_transition_to(JobStatus::Succeeded) {
                job.status = JobStatus::Succeeded;
            }
            match &fetch {
                Ok(artifacts) => {
                    job.results = artifacts.clone();
                    job.fetch_failed = false;
                }
                Err(_) => {
                    job.fetch_failed = true;
                }
            }
        });

        match fetch {
            Ok(artifacts) => {
                info!(job = %job_id, artifacts = artifacts.len(), "job succeeded");
            }
            Err(error) => {
                warn!(
                    job = %job_id,
                    error = %error,
                    "result fetch failed, job succeeded without artifacts"
                );
            }
        }
    }

    fn apply_remote_status(&self, job_id: &JobId, status: RemoteStatus) -> Option<Job> {
        self.update_job(job_id, |job| {
            job.attempts += 1;
            job.last_polled_at = Some(Utc::now());
            match status {
                RemoteStatus::Queued | RemoteStatus::Success => {}
                RemoteStatus::Running => {
                    if job.status.can_transition_to(JobStatus::Running) {
                        job.status = JobStatus::Running;
                    }
                }
                RemoteStatus::Failed => {
                    if job.status.can_transition_to(JobStatus::Failed) {
                        job.status = JobStatus::Failed;
                    }
                }
            }
        })
    }

    fn update_job<F: FnOnce(&mut Job)>(&self, job_id: &JobId, mutate: F) -> Option<Job> {
        let jobs = self.lock_jobs();
        let entry = jobs.get(job_id)?;
        let mut job = entry.watch.borrow().clone();
        mutate(&mut job);
        entry.watch.send_replace(job.clone());
        Some(job)
    }

    fn entry_cancel(&self, job_id: &JobId) -> Result<CancellationToken> {
        self.lock_jobs()
            .get(job_id)
            .map(|entry| entry.cancel.clone())
            .ok_or_else(|| unknown_job(job_id))
    }

    fn submit_action(payload: serde_json::Value, depends_on: Vec<String>) -> OfflineAction {
        OfflineAction::new(ActionKind::SubmitJob, payload, Priority::Critical, epoch_millis())
            .with_dependencies(depends_on)
    }

    fn lock_jobs(&self) -> std::sync::MutexGuard<'_, HashMap<JobId, JobEntry>> {
        match self.jobs.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn!("job map lock poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }
}

impl std::fmt::Debug for JobOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobOrchestrator")
            .field("service_name", &self.config.service_name)
            .field("tracked_jobs", &self.lock_jobs().len())
            .finish()
    }
}

/// Replays queued actions through the orchestrator during sync.
pub struct QueueReplayHandler {
    orchestrator: Weak<JobOrchestrator>,
    delegate: Option<Arc<dyn SyncHandler>>,
}

#[async_trait]
impl SyncHandler for QueueReplayHandler {
    async fn apply(&self, action: &OfflineAction) -> Result<()> {
        let Some(orchestrator) = self.orchestrator.upgrade() else {
            return Err(PrismError::cancelled("queue replay"));
        };
        match action.kind {
            ActionKind::SubmitJob => {
                let spec: JobSpec = serde_json::from_value(action.payload.clone())?;
                let job = orchestrator.submit_replayed(&spec).await?;
                info!(job = %job.id, action_id = %action.id, "queued submission replayed");
                Ok(())
            }
            ActionKind::CancelJob => {
                let id: JobId = serde_json::from_value(action.payload.clone())?;
                // Best effort by contract; an unreachable service must not
                // keep the action in the queue forever.
                if let Err(error) = orchestrator.service.cancel(&id).await {
                    debug!(job = %id, error = %error, "queued remote cancel failed");
                }
                Ok(())
            }
            kind => match &self.delegate {
                Some(delegate) => delegate.apply(action).await,
                None => Err(PrismError::internal(format!(
                    "no sync handler for '{kind}' actions"
                ))),
            },
        }
    }
}

fn unknown_job(job_id: &JobId) -> PrismError {
    PrismError::validation("job_id", format!("unknown job '{job_id}'"))
}

fn epoch_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
