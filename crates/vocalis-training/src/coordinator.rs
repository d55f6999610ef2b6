//! Bounded-parallel transfer of many files.

use crate::error::{TrainingError, TrainingResult};
use crate::progress::{ProgressEvent, ProgressSink};
use crate::upload::{FileUploader, UploadAck, UploadTask};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Default number of transfers in flight at once.
pub const DEFAULT_MAX_CONCURRENCY: usize = 4;

/// How a single task of a batch settled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferOutcome {
    Uploaded(UploadAck),
    Skipped { reason: String },
    Failed { attempts: u32, cause: String },
}

/// Aggregate of per-task outcomes for one batch.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TransferBatchResult {
    pub succeeded: BTreeSet<String>,
    pub failed: BTreeMap<String, String>,
    /// Data-quality notes that are not failures (e.g. duplicate references).
    pub skipped: BTreeMap<String, String>,
    /// Settled tasks, in completion order.
    pub tasks: Vec<UploadTask>,
    pub total_bytes: u64,
    pub duration: Duration,
}

impl TransferBatchResult {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn total_items(&self) -> usize {
        self.succeeded.len() + self.failed.len()
    }

    /// Records a settled task and its outcome.
    pub fn record(&mut self, mut task: UploadTask, outcome: TransferOutcome) {
        match outcome {
            TransferOutcome::Uploaded(ack) => {
                task.mark_verified(&ack);
                self.total_bytes += ack.bytes;
                self.failed.remove(&ack.remote_key);
                self.succeeded.insert(ack.remote_key);
            }
            TransferOutcome::Skipped { reason } => {
                self.skipped.insert(task.remote_key.clone(), reason);
            }
            TransferOutcome::Failed { attempts, cause } => {
                task.mark_failed(attempts);
                self.failed.insert(task.remote_key.clone(), cause);
            }
        }
        self.tasks.push(task);
    }

    /// Folds another batch into this one.
    pub fn absorb(&mut self, other: TransferBatchResult) {
        for key in &other.succeeded {
            self.failed.remove(key);
        }
        self.succeeded.extend(other.succeeded);
        self.failed.extend(other.failed);
        self.skipped.extend(other.skipped);
        self.tasks.extend(other.tasks);
        self.total_bytes += other.total_bytes;
        self.duration += other.duration;
    }

    /// All-or-nothing: a batch with any failure becomes `BatchUpload`.
    pub fn into_result(self) -> TrainingResult<Self> {
        if self.failed.is_empty() {
            Ok(self)
        } else {
            Err(TrainingError::BatchUpload { succeeded: self.succeeded, failed: self.failed })
        }
    }
}

/// Runs uploads with at most `max_concurrency` transfers in flight.
///
/// Every task runs to completion independently; one failure never cancels
/// siblings, and the coordinator waits for all tasks to settle before
/// reporting.
pub struct ParallelTransferCoordinator {
    uploader: Arc<dyn FileUploader>,
    progress: Arc<dyn ProgressSink>,
}

impl ParallelTransferCoordinator {
    pub fn new(uploader: Arc<dyn FileUploader>, progress: Arc<dyn ProgressSink>) -> Self {
        Self { uploader, progress }
    }

    /// Transfers all tasks and fails with `BatchUpload` if any did not succeed.
    pub async fn transfer(
        &self,
        tasks: Vec<UploadTask>,
        max_concurrency: usize,
    ) -> TrainingResult<TransferBatchResult> {
        self.run(tasks, max_concurrency, &CancellationToken::new()).await?.into_result()
    }

    /// Transfers all tasks and returns the aggregate, failures included.
    ///
    /// Cancelling `cancel` stops tasks that have not started yet; transfers
    /// already in flight are left to finish. A cancelled batch yields
    /// `Cancelled` once everything has settled.
    pub async fn run(
        &self,
        tasks: Vec<UploadTask>,
        max_concurrency: usize,
        cancel: &CancellationToken,
    ) -> TrainingResult<TransferBatchResult> {
        let start_time = Instant::now();
        let total = tasks.len();
        let concurrency = max_concurrency.max(1);

        debug!(total_items = total, concurrency, "Starting transfer batch");

        let semaphore = Arc::new(Semaphore::new(concurrency));
        let completed = Arc::new(AtomicUsize::new(0));
        let mut handles = Vec::with_capacity(total);

        for mut task in tasks {
            let key = task.remote_key.clone();
            let semaphore = Arc::clone(&semaphore);
            let uploader = Arc::clone(&self.uploader);
            let progress = Arc::clone(&self.progress);
            let completed = Arc::clone(&completed);
            let cancel = cancel.clone();

            let handle = tokio::spawn(async move {
                let permit = tokio::select! {
                    biased;
                    () = cancel.cancelled() => None,
                    permit = semaphore.acquire_owned() => Some(permit),
                };

                let outcome = match permit {
                    None => TransferOutcome::Skipped { reason: "cancelled before start".to_string() },
                    Some(Err(e)) => TransferOutcome::Failed { attempts: 0, cause: format!("semaphore error: {e}") },
                    Some(Ok(_permit)) => {
                        task.mark_in_flight();
                        match uploader.upload(&task.source_path, &task.remote_key).await {
                            Ok(ack) => TransferOutcome::Uploaded(ack),
                            Err(e) => TransferOutcome::Failed { attempts: attempts_of(&e), cause: e.to_string() },
                        }
                    }
                };

                let done = completed.fetch_add(1, Ordering::SeqCst) + 1;
                progress.on_event(ProgressEvent::TransferSettled {
                    remote_key: task.remote_key.clone(),
                    succeeded: matches!(outcome, TransferOutcome::Uploaded(_)),
                    completed: done,
                    total,
                });
                (task, outcome)
            });

            handles.push((key, handle));
        }

        let mut result = TransferBatchResult::default();
        let mut not_started = 0usize;

        for (key, handle) in handles {
            match handle.await {
                Ok((task, outcome)) => {
                    if matches!(outcome, TransferOutcome::Skipped { .. }) {
                        not_started += 1;
                    }
                    result.record(task, outcome);
                }
                Err(e) => {
                    error!(remote_key = %key, "Transfer task join error: {}", e);
                    result.failed.insert(key, format!("transfer task aborted: {e}"));
                }
            }
        }

        result.duration = start_time.elapsed();

        info!(
            total_items = total,
            succeeded = result.succeeded.len(),
            failed = result.failed.len(),
            duration_ms = result.duration.as_millis() as u64,
            "Transfer batch settled"
        );

        if cancel.is_cancelled() {
            return Err(TrainingError::Cancelled(format!(
                "upload batch cancelled; {not_started} of {total} transfer(s) not started"
            )));
        }

        Ok(result)
    }
}

pub(crate) fn attempts_of(err: &TrainingError) -> u32 {
    match err {
        TrainingError::Upload { attempts, .. } => *attempts,
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::digest_bytes;
    use crate::progress::TracingProgressSink;
    use crate::testing::CollectingSink;
    use async_trait::async_trait;
    use std::path::Path;

    /// Uploader that tracks how many uploads run at once.
    #[derive(Default)]
    struct InstrumentedUploader {
        active: AtomicUsize,
        max_active: AtomicUsize,
        calls: AtomicUsize,
        fail_keys: Vec<String>,
    }

    #[async_trait]
    impl FileUploader for InstrumentedUploader {
        async fn upload(&self, _local: &Path, remote_key: &str) -> TrainingResult<UploadAck> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_keys.iter().any(|k| k == remote_key) {
                return Err(TrainingError::Upload {
                    remote_key: remote_key.to_string(),
                    attempts: 3,
                    cause: "boom".to_string(),
                });
            }
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_active.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            self.active.fetch_sub(1, Ordering::SeqCst);
            Ok(UploadAck {
                remote_key: remote_key.to_string(),
                digest: digest_bytes(remote_key.as_bytes()),
                attempts: 1,
                bytes: 10,
            })
        }
    }

    fn tasks(n: usize) -> Vec<UploadTask> {
        (1..=n).map(|i| UploadTask::new(format!("{i}.wav"), format!("audio/{i}.wav"))).collect()
    }

    #[tokio::test]
    async fn test_concurrency_never_exceeds_limit() {
        let uploader = Arc::new(InstrumentedUploader::default());
        let coordinator = ParallelTransferCoordinator::new(
            Arc::clone(&uploader) as Arc<dyn FileUploader>,
            Arc::new(TracingProgressSink),
        );

        let result = coordinator.transfer(tasks(5), 2).await.unwrap();

        assert_eq!(result.succeeded.len(), 5);
        assert_eq!(result.total_bytes, 50);
        assert_eq!(uploader.max_active.load(Ordering::SeqCst), 2);
        assert_eq!(uploader.calls.load(Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn test_first_failure_does_not_cancel_siblings() {
        let uploader = Arc::new(InstrumentedUploader {
            fail_keys: vec!["audio/1.wav".to_string()],
            ..Default::default()
        });
        let sink = Arc::new(CollectingSink::default());
        let coordinator = ParallelTransferCoordinator::new(
            Arc::clone(&uploader) as Arc<dyn FileUploader>,
            Arc::clone(&sink) as Arc<dyn ProgressSink>,
        );

        let err = coordinator.transfer(tasks(5), 2).await.unwrap_err();

        assert_eq!(uploader.calls.load(Ordering::SeqCst), 5);
        assert_eq!(sink.events.lock().unwrap().len(), 5);
        match err {
            TrainingError::BatchUpload { succeeded, failed } => {
                assert_eq!(succeeded.len(), 4);
                assert_eq!(failed.len(), 1);
                assert!(failed["audio/1.wav"].contains("boom"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_all_failures_are_reported() {
        let uploader = Arc::new(InstrumentedUploader {
            fail_keys: vec!["audio/2.wav".to_string(), "audio/4.wav".to_string()],
            ..Default::default()
        });
        let coordinator =
            ParallelTransferCoordinator::new(uploader, Arc::new(TracingProgressSink));

        let result = coordinator.run(tasks(4), 4, &CancellationToken::new()).await.unwrap();

        assert!(!result.is_success());
        assert_eq!(
            result.failed.keys().cloned().collect::<Vec<_>>(),
            vec!["audio/2.wav".to_string(), "audio/4.wav".to_string()]
        );
        let failed_task = result.tasks.iter().find(|t| t.remote_key == "audio/2.wav").unwrap();
        assert_eq!(failed_task.attempt_count, 3);
    }

    #[tokio::test]
    async fn test_empty_batch_succeeds() {
        let coordinator = ParallelTransferCoordinator::new(
            Arc::new(InstrumentedUploader::default()),
            Arc::new(TracingProgressSink),
        );
        let result = coordinator.transfer(Vec::new(), 4).await.unwrap();
        assert_eq!(result.total_items(), 0);
    }

    #[tokio::test]
    async fn test_cancelled_batch_does_not_start_tasks() {
        let uploader = Arc::new(InstrumentedUploader::default());
        let coordinator = ParallelTransferCoordinator::new(
            Arc::clone(&uploader) as Arc<dyn FileUploader>,
            Arc::new(TracingProgressSink),
        );
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = coordinator.run(tasks(3), 2, &cancel).await.unwrap_err();

        assert!(matches!(err, TrainingError::Cancelled(_)));
        assert_eq!(uploader.calls.load(Ordering::SeqCst), 0);
    }
}
