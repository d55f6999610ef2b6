//! Voice-training and speech-synthesis service capabilities.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Errors returned by the voice-training or synthesis service.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum ServiceError {
    /// A network failure, timeout, or server-side error that may succeed on retry.
    #[error("Transient service error: {0}")]
    Transient(String),

    /// The service rate-limited the request.
    #[error("Service throttled: {0}")]
    Throttled(String),

    /// The subscription key was rejected.
    #[error("Service permission denied: {0}")]
    PermissionDenied(String),

    /// The requested job or model does not exist.
    #[error("Service resource not found: {0}")]
    NotFound(String),

    /// The service rejected the request (4xx other than auth/not-found).
    #[error("Service rejected request ({status}): {message}")]
    Rejected {
        /// HTTP-like status code reported by the service.
        status: u16,
        /// Error detail reported by the service.
        message: String,
    },

    /// The service answered with a body that could not be understood.
    #[error("Invalid service response: {0}")]
    InvalidResponse(String),

    /// Other unexpected errors.
    #[error("Service error: {0}")]
    Other(String),
}

impl ServiceError {
    /// Whether retrying the same request may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient(_) | Self::Throttled(_))
    }
}

/// Lifecycle state of a training job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
}

impl JobStatus {
    /// Terminal states admit no further transitions.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// A request to train a custom voice model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrainingSubmission {
    /// Display name of the voice model.
    pub name: String,
    /// Resolvable reference to the uploaded dataset manifest.
    pub manifest_reference: String,
    /// Locale tag of the recordings, e.g. `en-US`.
    pub locale: String,
    /// Free-form description stored with the model.
    pub description: String,
}

/// Snapshot of a training job as reported by the service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobStatusReport {
    pub job_id: String,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// External service that trains custom voice models asynchronously.
#[async_trait]
pub trait VoiceTrainingService: Send + Sync {
    /// Submits a training request and returns the job as initially reported.
    async fn submit_training(
        &self,
        submission: &TrainingSubmission,
    ) -> Result<JobStatusReport, ServiceError>;

    /// Queries the current state of a previously submitted job.
    async fn job_status(&self, job_id: &str) -> Result<JobStatusReport, ServiceError>;
}

/// Text-to-speech synthesis with a named voice.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Synthesizes `text` and returns a RIFF WAV payload.
    async fn synthesize(&self, text: &str, voice_name: &str) -> Result<Bytes, ServiceError>;
}
