use crate::model::VoiceModel;
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use thiserror::Error;
use vocalis_abstraction::{ServiceError, StoreError};

pub type TrainingResult<T> = std::result::Result<T, TrainingError>;

#[derive(Debug, Error)]
pub enum TrainingError {
    /// The dataset manifest is malformed or incomplete. Fix and rerun.
    #[error("invalid dataset {}: {}", .path.display(), .problems.join("; "))]
    DatasetFormat { path: PathBuf, problems: Vec<String> },

    /// A single file could not be transferred.
    #[error("upload of {remote_key} failed after {attempts} attempt(s): {cause}")]
    Upload { remote_key: String, attempts: u32, cause: String },

    /// At least one file of a batch could not be transferred. Nothing in the
    /// batch should be considered done.
    #[error("{}", describe_batch(.succeeded, .failed))]
    BatchUpload { succeeded: BTreeSet<String>, failed: BTreeMap<String, String> },

    /// Status polling failed repeatedly; the training outcome is unknown.
    #[error("monitoring of job {job_id} gave up after {consecutive_failures} consecutive failures: {cause}")]
    Monitoring { job_id: String, consecutive_failures: u32, cause: String },

    /// Required settings are missing.
    #[error("missing required configuration: {}", .missing.join(", "))]
    Configuration { missing: Vec<String> },

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("training request rejected: {0}")]
    Submission(#[source] ServiceError),

    #[error("training of voice model {} ({}) failed", .model.name, .model.model_id)]
    TrainingFailed { model: Box<VoiceModel> },

    #[error("storage error: {0}")]
    Storage(#[from] StoreError),

    #[error("audio error: {0}")]
    Audio(String),

    #[error("cancelled: {0}")]
    Cancelled(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

fn describe_batch(succeeded: &BTreeSet<String>, failed: &BTreeMap<String, String>) -> String {
    let listed = failed
        .iter()
        .map(|(key, cause)| format!("{key} ({cause})"))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "{} of {} file(s) failed to upload: {}",
        failed.len(),
        failed.len() + succeeded.len(),
        listed
    )
}
