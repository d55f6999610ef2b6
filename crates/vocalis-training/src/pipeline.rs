//! Dataset validation and upload of the manifest plus every referenced audio file.

use crate::coordinator::{
    DEFAULT_MAX_CONCURRENCY, ParallelTransferCoordinator, TransferBatchResult, TransferOutcome,
    attempts_of,
};
use crate::dataset::Dataset;
use crate::error::{TrainingError, TrainingResult};
use crate::progress::{ProgressEvent, ProgressSink};
use crate::upload::{FileUploader, UploadTask};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use vocalis_abstraction::ObjectStore;

/// Uploads a dataset as one all-or-nothing batch.
///
/// Order of operations: the whole manifest is validated before any network
/// call, the container is created (idempotently), the manifest object is
/// uploaded, and then every distinct audio file is handed to the
/// [`ParallelTransferCoordinator`].
pub struct DatasetUploadPipeline {
    store: Arc<dyn ObjectStore>,
    uploader: Arc<dyn FileUploader>,
    coordinator: ParallelTransferCoordinator,
    progress: Arc<dyn ProgressSink>,
    max_concurrency: usize,
}

impl DatasetUploadPipeline {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        uploader: Arc<dyn FileUploader>,
        progress: Arc<dyn ProgressSink>,
    ) -> Self {
        let coordinator =
            ParallelTransferCoordinator::new(Arc::clone(&uploader), Arc::clone(&progress));
        Self { store, uploader, coordinator, progress, max_concurrency: DEFAULT_MAX_CONCURRENCY }
    }

    #[must_use]
    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency.max(1);
        self
    }

    pub fn store(&self) -> &Arc<dyn ObjectStore> {
        &self.store
    }

    /// Remote key of the manifest object for a dataset file.
    pub fn manifest_key(dataset_path: &Path) -> TrainingResult<String> {
        dataset_path
            .file_name()
            .and_then(|n| n.to_str())
            .map(str::to_string)
            .ok_or_else(|| {
                TrainingError::InvalidInput(format!(
                    "dataset path has no file name: {}",
                    dataset_path.display()
                ))
            })
    }

    pub async fn upload(&self, dataset_path: &Path) -> TrainingResult<TransferBatchResult> {
        self.upload_with_cancel(dataset_path, &CancellationToken::new()).await
    }

    pub async fn upload_with_cancel(
        &self,
        dataset_path: &Path,
        cancel: &CancellationToken,
    ) -> TrainingResult<TransferBatchResult> {
        let dataset = Dataset::load(dataset_path).await?;
        let manifest_key = Self::manifest_key(dataset_path)?;

        let summary = dataset.summarize().await;
        info!(
            dataset = %dataset_path.display(),
            records = summary.records,
            total_bytes = summary.total_bytes,
            missing_files = summary.missing_files.len(),
            "Dataset validated"
        );
        self.progress.on_event(ProgressEvent::DatasetValidated {
            records: summary.records,
            total_bytes: summary.total_bytes,
            missing_files: summary.missing_files.len(),
        });

        ensure_not_cancelled(cancel, dataset_path)?;
        let status = self.store.create_container().await?;
        debug!(container = %self.store.container(), status = ?status, "Container ready");

        ensure_not_cancelled(cancel, dataset_path)?;

        let mut result = TransferBatchResult::default();
        let manifest_task = UploadTask::new(dataset_path, manifest_key.clone());
        match self.uploader.upload(dataset_path, &manifest_key).await {
            Ok(ack) => result.record(manifest_task, TransferOutcome::Uploaded(ack)),
            Err(e) => {
                warn!(remote_key = %manifest_key, "Manifest upload failed; audio transfers not started");
                result.record(
                    manifest_task,
                    TransferOutcome::Failed { attempts: attempts_of(&e), cause: e.to_string() },
                );
                return result.into_result();
            }
        }

        let (tasks, duplicates) = audio_tasks(&dataset);
        for (key, reason) in duplicates {
            result.skipped.insert(key, reason);
        }

        let batch = self.coordinator.run(tasks, self.max_concurrency, cancel).await?;
        result.absorb(batch);

        self.progress.on_event(ProgressEvent::BatchFinished {
            succeeded: result.succeeded.len(),
            failed: result.failed.len(),
            skipped: result.skipped.len(),
        });

        result.into_result()
    }
}

/// One task per distinct audio file; repeated references are reported back.
fn audio_tasks(dataset: &Dataset) -> (Vec<UploadTask>, BTreeMap<String, String>) {
    let mut seen: HashMap<PathBuf, usize> = HashMap::new();
    let mut tasks = Vec::new();
    let mut duplicates = BTreeMap::new();

    for record in dataset.records() {
        let Some(key) = record.remote_key() else {
            continue;
        };
        let count = seen.entry(record.audio_path.clone()).or_insert(0);
        *count += 1;
        if *count == 1 {
            tasks.push(UploadTask::new(record.audio_path.clone(), key));
        } else {
            duplicates.insert(key, format!("referenced by {count} records; uploaded once"));
        }
    }

    (tasks, duplicates)
}

fn ensure_not_cancelled(cancel: &CancellationToken, dataset_path: &Path) -> TrainingResult<()> {
    if cancel.is_cancelled() {
        info!(dataset = %dataset_path.display(), "Upload cancelled before any transfer");
        return Err(TrainingError::Cancelled(format!("upload of {} cancelled", dataset_path.display())));
    }
    Ok(())
}
