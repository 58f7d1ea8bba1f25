//! HTTP client for the external transformation service
//!
//! Implements the `TransformService` port over reqwest. The client does no
//! retrying and no circuit breaking of its own; the orchestrator wraps
//! every call in the resilience stack, so this layer only translates
//! requests, honors cancellation, and lowers transport failures into the
//! workspace error taxonomy.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client as ReqwestClient, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};
use uuid::Uuid;

use prismflow_domain::{Artifact, JobId, JobSpec, PrismError, RemoteStatus, Result};

use super::wire::{ResultResponse, StatusResponse, SubmitResponse, WireJobSpec};
use crate::errors::{from_reqwest, from_status};
use prismflow_core::ports::TransformService;

/// Configuration for the transform service client.
#[derive(Debug, Clone)]
pub struct TransformClientConfig {
    /// Base URL of the service (e.g. "https://api.example.com/v1")
    pub base_url: String,
    pub user_agent: String,
    /// Transport-level timeout; the resilience stack enforces its own
    /// per-call deadline on top
    pub request_timeout: Duration,
}

impl Default for TransformClientConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.prismflow.dev/v1".to_string(),
            user_agent: format!("prismflow/{}", env!("CARGO_PKG_VERSION")),
            request_timeout: Duration::from_secs(30),
        }
    }
}

impl TransformClientConfig {
    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.base_url.is_empty() {
            return Err(PrismError::config("base_url must not be empty"));
        }
        if self.request_timeout.is_zero() {
            return Err(PrismError::config(
                "request_timeout must be greater than zero",
            ));
        }
        Ok(())
    }
}

/// reqwest-backed implementation of the transform service port.
pub struct HttpTransformClient {
    client: ReqwestClient,
    config: TransformClientConfig,
}

impl HttpTransformClient {
    /// Build a client from configuration.
    pub fn new(config: TransformClientConfig) -> Result<Self> {
        config.validate()?;
        let client = ReqwestClient::builder()
            .timeout(config.request_timeout)
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|err| PrismError::config(format!("failed to build HTTP client: {err}")))?;
        Ok(Self { client, config })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    /// Send a request, honoring cancellation, and parse a JSON response.
    ///
    /// Cancellation aborts the in-flight request by dropping it, which
    /// closes the connection; the caller sees `Cancelled`.
    async fn execute_json<T: DeserializeOwned>(
        &self,
        operation: &str,
        request: RequestBuilder,
        cancel: &CancellationToken,
    ) -> Result<T> {
        let response = tokio::select! {
            response = request.send() => {
                response.map_err(|err| from_reqwest(operation, self.config.request_timeout, err))?
            }
            () = cancel.cancelled() => {
                debug!(operation, "request cancelled before response");
                return Err(PrismError::cancelled(operation));
            }
        };

        let status = response.status();
        debug!(operation, status = status.as_u16(), "response received");

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(from_status(status.as_u16(), body));
        }

        response
            .json::<T>()
            .await
            .map_err(|err| PrismError::serialization(format!("{operation} response: {err}")))
    }
}

#[async_trait]
impl TransformService for HttpTransformClient {
    /// Submit a job.
    ///
    /// The payload uses the string-scalar wire encoding, and each submit
    /// carries a fresh idempotency key so transport-level duplicates are
    /// harmless.
    #[instrument(skip(self, spec, cancel))]
    async fn submit(&self, spec: &JobSpec, cancel: &CancellationToken) -> Result<JobId> {
        let request = self
            .client
            .post(self.url("/jobs"))
            .header("Idempotency-Key", Uuid::new_v4().to_string())
            .json(&WireJobSpec::from(spec));

        let response: SubmitResponse = self.execute_json("submit", request, cancel).await?;
        Ok(JobId::from(response.job_id))
    }

    #[instrument(skip(self, cancel), fields(job = %id))]
    async fn status(&self, id: &JobId, cancel: &CancellationToken) -> Result<RemoteStatus> {
        let request = self.client.get(self.url(&format!("/jobs/{id}/status")));
        let response: StatusResponse = self.execute_json("status", request, cancel).await?;
        Ok(response.status)
    }

    #[instrument(skip(self, cancel), fields(job = %id))]
    async fn result(&self, id: &JobId, cancel: &CancellationToken) -> Result<Vec<Artifact>> {
        let request = self.client.get(self.url(&format!("/jobs/{id}/result")));
        let response: ResultResponse = self.execute_json("result", request, cancel).await?;
        Ok(response.artifacts.into_iter().map(Artifact::from).collect())
    }

    /// Best-effort cancel; a 404 (job already gone) counts as success.
    #[instrument(skip(self), fields(job = %id))]
    async fn cancel(&self, id: &JobId) -> Result<()> {
        let request = self.client.post(self.url(&format!("/jobs/{id}/cancel")));
        let token = CancellationToken::new();
        let result: Result<serde_json::Value> =
            self.execute_json("cancel", request, &token).await;

        match result {
            Ok(_) => Ok(()),
            Err(PrismError::Api { status, .. }) if status == StatusCode::NOT_FOUND.as_u16() => {
                Ok(())
            }
            Err(PrismError::Serialization { .. }) => Ok(()), // empty body is fine
            Err(err) => Err(err),
        }
    }
}
