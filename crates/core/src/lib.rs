//! # PrismFlow Core
//!
//! Job orchestration for long-running image-transformation jobs.
//!
//! This crate composes the resilience primitives from `prismflow-common`
//! into the job lifecycle: submit through circuit breaker → retry →
//! timeout, hydrate submissions into the offline queue when the dependency
//! is down or the device is offline, poll job status on an adaptive
//! interval, fetch results once on completion, and expose best-effort
//! cancellation.
//!
//! The external transformation service is consumed only through the
//! [`ports::TransformService`] trait; `prismflow-infra` provides the HTTP
//! implementation.

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::complexity, clippy::suspicious)]

pub mod context;
pub mod orchestrator;
pub mod ports;
pub mod single_flight;

pub use context::CoreContext;
pub use orchestrator::{JobOrchestrator, JobRequest, OrchestratorConfig, SubmitOutcome};
pub use ports::{ConnectivityProbe, TransformService};
pub use single_flight::SingleFlight;
