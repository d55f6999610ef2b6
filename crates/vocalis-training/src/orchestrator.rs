//! Top level flow: upload the dataset, submit training, wait for the outcome.

use crate::error::{TrainingError, TrainingResult};
use crate::model::VoiceModel;
use crate::monitor::TrainingJobMonitor;
use crate::pipeline::DatasetUploadPipeline;
use crate::progress::{ProgressEvent, ProgressSink};
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use vocalis_abstraction::{JobStatus, TrainingSubmission, VoiceTrainingService};

pub const MAX_MODEL_NAME_LEN: usize = 64;

static LOCALE_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-z]{2,3}(-[A-Z][a-z]{3})?(-([A-Z]{2}|[0-9]{3}))?$")
        .expect("locale regex should be valid")
});

/// Creates and trains custom voices end to end.
pub struct VoiceModelOrchestrator {
    pipeline: DatasetUploadPipeline,
    service: Arc<dyn VoiceTrainingService>,
    monitor: TrainingJobMonitor,
    progress: Arc<dyn ProgressSink>,
    description: Option<String>,
}

impl VoiceModelOrchestrator {
    pub fn new(
        pipeline: DatasetUploadPipeline,
        service: Arc<dyn VoiceTrainingService>,
        monitor: TrainingJobMonitor,
        progress: Arc<dyn ProgressSink>,
    ) -> Self {
        Self { pipeline, service, monitor, progress, description: None }
    }

    /// Description sent with every training request instead of the generated one.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub async fn create_voice(
        &self,
        model_name: &str,
        dataset_path: &Path,
        locale: &str,
    ) -> TrainingResult<VoiceModel> {
        self.create_voice_with_cancel(model_name, dataset_path, locale, &CancellationToken::new())
            .await
    }

    /// Runs every step in order and stops at the first failure.
    ///
    /// A model is only returned once its training job has succeeded.
    pub async fn create_voice_with_cancel(
        &self,
        model_name: &str,
        dataset_path: &Path,
        locale: &str,
        cancel: &CancellationToken,
    ) -> TrainingResult<VoiceModel> {
        validate_model_name(model_name)?;
        validate_locale(locale)?;

        info!(model = model_name, locale, dataset = %dataset_path.display(), "Creating custom voice");

        let batch = self
            .pipeline
            .upload_with_cancel(dataset_path, cancel)
            .await
            .inspect_err(|e| error!(model = model_name, "Dataset upload failed: {}", e))?;

        let manifest_key = DatasetUploadPipeline::manifest_key(dataset_path)?;
        let submission = TrainingSubmission {
            name: model_name.to_string(),
            manifest_reference: self.pipeline.store().object_url(&manifest_key),
            locale: locale.to_string(),
            description: self.description.clone().unwrap_or_else(|| {
                format!(
                    "Custom voice {model_name} trained on {} audio file(s)",
                    batch.succeeded.len().saturating_sub(1)
                )
            }),
        };

        let report = self.service.submit_training(&submission).await.map_err(|e| {
            error!(model = model_name, "Training submission failed: {}", e);
            TrainingError::Submission(e)
        })?;

        info!(model = model_name, job_id = %report.job_id, status = %report.status, "Training job submitted");
        self.progress.on_event(ProgressEvent::JobSubmitted {
            job_id: report.job_id.clone(),
            status: report.status,
        });

        let model = VoiceModel::from_report(model_name, locale, report);
        let model = self
            .monitor
            .await_completion(model, cancel)
            .await
            .inspect_err(|e| error!(model = model_name, "Training monitoring failed: {}", e))?;

        if model.status == JobStatus::Failed {
            error!(model = model_name, job_id = %model.model_id, "Voice training failed");
            return Err(TrainingError::TrainingFailed { model: Box::new(model) });
        }

        info!(model = model_name, job_id = %model.model_id, "Custom voice ready");
        Ok(model)
    }
}

/// Model names are 1 to 64 characters of letters, digits, spaces, `-`, `_`
/// or `.`, starting with a letter or digit.
pub fn validate_model_name(name: &str) -> TrainingResult<()> {
    let invalid = |reason: &str| Err(TrainingError::InvalidInput(format!("model name {name:?} {reason}")));

    let Some(first) = name.chars().next() else {
        return invalid("must not be empty");
    };
    if name.chars().count() > MAX_MODEL_NAME_LEN {
        return invalid(&format!("is longer than {MAX_MODEL_NAME_LEN} characters"));
    }
    if !first.is_ascii_alphanumeric() {
        return invalid("must start with a letter or digit");
    }
    if let Some(bad) = name
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, ' ' | '-' | '_' | '.')))
    {
        return invalid(&format!("contains unsupported character {bad:?}"));
    }
    Ok(())
}

/// Accepts tags such as `en`, `en-US`, `zh-Hans-CN` and `es-419`.
pub fn validate_locale(locale: &str) -> TrainingResult<()> {
    if LOCALE_PATTERN.is_match(locale) {
        Ok(())
    } else {
        Err(TrainingError::InvalidInput(format!("locale {locale:?} is not a well-formed locale tag")))
    }
}
