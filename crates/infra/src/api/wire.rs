//! Wire encoding for the external transformation service
//!
//! The wrapped service has a documented quirk: every scalar field of a
//! submitted job spec, numeric ones included, must be serialized as a JSON
//! string. That rule lives here, at the serialization boundary, and nowhere
//! else; the domain types keep native numerics.

use serde::{Deserialize, Serialize};

use prismflow_domain::{Artifact, JobSpec, RemoteStatus};

/// Submit payload with every scalar stringified.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct WireJobSpec {
    pub source_url: String,
    pub transform: String,
    pub width: String,
    pub height: String,
    pub strength: String,
    pub region: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<String>,
}

impl From<&JobSpec> for WireJobSpec {
    fn from(spec: &JobSpec) -> Self {
        Self {
            source_url: spec.source_url.clone(),
            transform: spec.transform.clone(),
            width: spec.width.to_string(),
            height: spec.height.to_string(),
            strength: spec.strength.to_string(),
            region: spec.region.clone(),
            seed: spec.seed.map(|seed| seed.to_string()),
        }
    }
}

/// Response to a submit call.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitResponse {
    pub job_id: String,
}

/// Response to a status call.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub status: RemoteStatus,
}

/// One artifact as the service reports it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireArtifact {
    pub id: String,
    pub url: String,
    pub content_type: String,
    pub width: u32,
    pub height: u32,
}

impl From<WireArtifact> for Artifact {
    fn from(wire: WireArtifact) -> Self {
        Self {
            id: wire.id,
            url: wire.url,
            content_type: wire.content_type,
            width: wire.width,
            height: wire.height,
        }
    }
}

/// Response to a result call.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultResponse {
    pub artifacts: Vec<WireArtifact>,
}
