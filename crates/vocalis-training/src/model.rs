use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use vocalis_abstraction::{JobStatus, JobStatusReport};

/// A custom voice model and the state of its training job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoiceModel {
    pub model_id: String,
    pub name: String,
    pub locale: String,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl VoiceModel {
    /// Builds the descriptor from the job as reported at submission.
    pub fn from_report(name: impl Into<String>, locale: impl Into<String>, report: JobStatusReport) -> Self {
        Self {
            model_id: report.job_id,
            name: name.into(),
            locale: locale.into(),
            status: report.status,
            created_at: report.created_at,
            updated_at: report.updated_at,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Applies a fresh status report. Returns whether the status changed.
    ///
    /// A model in a terminal state is never modified.
    pub(crate) fn apply(&mut self, report: &JobStatusReport) -> bool {
        if self.is_terminal() {
            return false;
        }
        let changed = self.status != report.status;
        self.status = report.status;
        self.updated_at = report.updated_at;
        changed
    }
}
