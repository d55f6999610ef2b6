//! Single-file transfer with retry, backoff, and digest verification.

use crate::error::{TrainingError, TrainingResult};
use crate::hash::{ContentDigest, digest_bytes};
use crate::retry::{RetryPolicy, Sleeper};
use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, warn};
use vocalis_abstraction::{DIGEST_METADATA_KEY, ObjectMetadata, ObjectStore, StoreError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    Pending,
    InFlight,
    Verified,
    Failed,
}

/// One file scheduled for transfer within a batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadTask {
    pub source_path: PathBuf,
    pub remote_key: String,
    pub attempt_count: u32,
    pub computed_hash: Option<ContentDigest>,
    pub state: TaskState,
}

impl UploadTask {
    pub fn new(source_path: impl Into<PathBuf>, remote_key: impl Into<String>) -> Self {
        Self {
            source_path: source_path.into(),
            remote_key: remote_key.into(),
            attempt_count: 0,
            computed_hash: None,
            state: TaskState::Pending,
        }
    }

    pub(crate) fn mark_in_flight(&mut self) {
        self.state = TaskState::InFlight;
    }

    pub(crate) fn mark_verified(&mut self, ack: &UploadAck) {
        self.attempt_count = ack.attempts;
        self.computed_hash = Some(ack.digest.clone());
        self.state = TaskState::Verified;
    }

    pub(crate) fn mark_failed(&mut self, attempts: u32) {
        self.attempt_count = attempts;
        self.state = TaskState::Failed;
    }
}

/// Acknowledgement of a verified transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadAck {
    pub remote_key: String,
    pub digest: ContentDigest,
    pub attempts: u32,
    pub bytes: u64,
}

/// Transfers one local file to remote storage.
#[async_trait]
pub trait FileUploader: Send + Sync {
    async fn upload(&self, local_path: &Path, remote_key: &str) -> TrainingResult<UploadAck>;
}

/// Why a single attempt failed, and whether another attempt may help.
#[derive(Debug)]
struct AttemptFailure {
    retryable: bool,
    cause: String,
}

impl AttemptFailure {
    fn local(path: &Path, err: &std::io::Error) -> Self {
        let retryable = !matches!(err.kind(), ErrorKind::NotFound | ErrorKind::PermissionDenied);
        Self { retryable, cause: format!("cannot read {}: {}", path.display(), err) }
    }

    fn store(err: &StoreError) -> Self {
        Self { retryable: err.is_retryable(), cause: err.to_string() }
    }

    fn digest(cause: String) -> Self {
        Self { retryable: true, cause }
    }
}

/// Uploads a file, verifies the stored digest, and retries transient failures
/// with exponential backoff.
///
/// Each attempt reads the local file once, hashes exactly the bytes it sends,
/// writes them under the remote key with the digest attached as metadata, then
/// reads the stored metadata back. A digest
/// mismatch counts as a transient failure. Missing or unreadable local files
/// and non-retryable store errors fail immediately.
pub struct RetryingUploader {
    store: Arc<dyn ObjectStore>,
    policy: RetryPolicy,
    sleeper: Arc<dyn Sleeper>,
}

impl RetryingUploader {
    pub fn new(store: Arc<dyn ObjectStore>, policy: RetryPolicy, sleeper: Arc<dyn Sleeper>) -> Self {
        Self { store, policy, sleeper }
    }

    async fn attempt(
        &self,
        local_path: &Path,
        remote_key: &str,
    ) -> Result<(ContentDigest, u64), AttemptFailure> {
        let body = tokio::fs::read(local_path)
            .await
            .map_err(|e| AttemptFailure::local(local_path, &e))?;
        let digest = digest_bytes(&body);
        let size = body.len() as u64;

        let mut metadata = ObjectMetadata::new();
        metadata.insert(DIGEST_METADATA_KEY.to_string(), digest.0.clone());

        self.store
            .put_object(remote_key, Bytes::from(body), &metadata)
            .await
            .map_err(|e| AttemptFailure::store(&e))?;

        let stored = self
            .store
            .object_metadata(remote_key)
            .await
            .map_err(|e| AttemptFailure::store(&e))?;

        match stored.get(DIGEST_METADATA_KEY) {
            Some(remote) if remote.eq_ignore_ascii_case(digest.as_str()) => Ok((digest, size)),
            Some(remote) => Err(AttemptFailure::digest(format!(
                "digest mismatch: local {} != stored {}",
                digest, remote
            ))),
            None => Err(AttemptFailure::digest("stored object carries no digest".to_string())),
        }
    }
}

#[async_trait]
impl FileUploader for RetryingUploader {
    async fn upload(&self, local_path: &Path, remote_key: &str) -> TrainingResult<UploadAck> {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            debug!(remote_key = %remote_key, attempt, max_attempts, "Uploading");

            let failure = match self.attempt(local_path, remote_key).await {
                Ok((digest, bytes)) => {
                    debug!(remote_key = %remote_key, attempt, digest = %digest, "Upload verified");
                    return Ok(UploadAck {
                        remote_key: remote_key.to_string(),
                        digest,
                        attempts: attempt,
                        bytes,
                    });
                }
                Err(failure) => failure,
            };

            if !failure.retryable || attempt >= max_attempts {
                error!(
                    remote_key = %remote_key,
                    attempt,
                    retryable = failure.retryable,
                    "Upload failed: {}",
                    failure.cause
                );
                return Err(TrainingError::Upload {
                    remote_key: remote_key.to_string(),
                    attempts: attempt,
                    cause: failure.cause,
                });
            }

            let delay = self.policy.delay_before_retry(attempt);
            warn!(
                remote_key = %remote_key,
                attempt,
                delay_ms = delay.as_millis() as u64,
                "Upload attempt failed, retrying after backoff: {}",
                failure.cause
            );
            self.sleeper.sleep(delay).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retry::RecordingSleeper;
    use crate::testing::{MemoryStore, write_file};
    use std::time::Duration;
    use tempfile::TempDir;

    fn uploader(store: &Arc<MemoryStore>, sleeper: &Arc<RecordingSleeper>) -> RetryingUploader {
        RetryingUploader::new(
            Arc::clone(store) as Arc<dyn ObjectStore>,
            RetryPolicy::default(),
            Arc::clone(sleeper) as Arc<dyn Sleeper>,
        )
    }

    fn transient() -> Result<(), StoreError> {
        Err(StoreError::Transient("connection reset".to_string()))
    }

    #[tokio::test]
    async fn test_fails_twice_then_succeeds() {
        let temp = TempDir::new().unwrap();
        let path = write_file(temp.path(), "a.wav", b"RIFF-audio-a");
        let store = Arc::new(MemoryStore::new());
        store.script_puts(vec![transient(), transient()]);
        let sleeper = Arc::new(RecordingSleeper::new());

        let ack = uploader(&store, &sleeper).upload(&path, "audio/a.wav").await.unwrap();

        assert_eq!(store.puts(), 3);
        assert_eq!(ack.attempts, 3);
        assert_eq!(ack.digest, digest_bytes(b"RIFF-audio-a"));
        assert_eq!(ack.bytes, 12);
        assert_eq!(sleeper.calls(), vec![Duration::from_secs(1), Duration::from_secs(2)]);
        assert_eq!(store.object("audio/a.wav").unwrap().as_ref(), b"RIFF-audio-a");
    }

    #[tokio::test]
    async fn test_always_failing_store_exhausts_budget() {
        let temp = TempDir::new().unwrap();
        let path = write_file(temp.path(), "a.wav", b"data");
        let store = Arc::new(MemoryStore::new());
        store.script_puts(vec![transient(), transient(), transient(), transient()]);
        let sleeper = Arc::new(RecordingSleeper::new());

        let err = uploader(&store, &sleeper).upload(&path, "audio/a.wav").await.unwrap_err();

        assert_eq!(store.puts(), 3);
        match err {
            TrainingError::Upload { remote_key, attempts, cause } => {
                assert_eq!(remote_key, "audio/a.wav");
                assert_eq!(attempts, 3);
                assert!(cause.contains("connection reset"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(sleeper.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_terminal_store_error_is_not_retried() {
        let temp = TempDir::new().unwrap();
        let path = write_file(temp.path(), "a.wav", b"data");
        let store = Arc::new(MemoryStore::new());
        store.script_puts(vec![Err(StoreError::PermissionDenied("bad sas".to_string()))]);
        let sleeper = Arc::new(RecordingSleeper::new());

        let err = uploader(&store, &sleeper).upload(&path, "audio/a.wav").await.unwrap_err();

        assert_eq!(store.puts(), 1);
        assert!(sleeper.calls().is_empty());
        assert!(matches!(err, TrainingError::Upload { attempts: 1, .. }));
    }

    #[tokio::test]
    async fn test_missing_local_file_fails_without_touching_store() {
        let temp = TempDir::new().unwrap();
        let store = Arc::new(MemoryStore::new());
        let sleeper = Arc::new(RecordingSleeper::new());

        let err = uploader(&store, &sleeper)
            .upload(&temp.path().join("b.wav"), "audio/b.wav")
            .await
            .unwrap_err();

        assert_eq!(store.puts(), 0);
        assert!(sleeper.calls().is_empty());
        assert!(err.to_string().contains("b.wav"));
    }

    #[tokio::test]
    async fn test_digest_mismatch_is_retried() {
        let temp = TempDir::new().unwrap();
        let path = write_file(temp.path(), "a.wav", b"data");
        let store = Arc::new(MemoryStore::new());
        store.corrupt_next_reads(1);
        let sleeper = Arc::new(RecordingSleeper::new());

        let ack = uploader(&store, &sleeper).upload(&path, "audio/a.wav").await.unwrap();

        assert_eq!(store.puts(), 2);
        assert_eq!(ack.attempts, 2);
    }

    #[tokio::test]
    async fn test_digest_describes_stored_bytes() {
        let temp = TempDir::new().unwrap();
        let path = write_file(temp.path(), "a.wav", &[7u8; 200_000]);
        let store = Arc::new(MemoryStore::new());
        let sleeper = Arc::new(RecordingSleeper::new());

        let ack = uploader(&store, &sleeper).upload(&path, "audio/a.wav").await.unwrap();

        let stored = store.object("audio/a.wav").unwrap();
        assert_eq!(ack.digest, digest_bytes(&stored));
        assert_eq!(ack.bytes, stored.len() as u64);
    }

    // Every read of /proc/self/io changes its content.
    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn test_digest_matches_body_of_changing_file() {
        let store = Arc::new(MemoryStore::new());
        let sleeper = Arc::new(RecordingSleeper::new());

        let ack = uploader(&store, &sleeper).upload(Path::new("/proc/self/io"), "io").await.unwrap();

        assert_eq!(ack.attempts, 1);
        assert_eq!(ack.digest, digest_bytes(&store.object("io").unwrap()));
    }

    #[test]
    fn test_task_state_transitions() {
        let mut task = UploadTask::new("a.wav", "audio/a.wav");
        assert_eq!(task.state, TaskState::Pending);
        task.mark_in_flight();
        assert_eq!(task.state, TaskState::InFlight);
        task.mark_verified(&UploadAck {
            remote_key: "audio/a.wav".to_string(),
            digest: digest_bytes(b"x"),
            attempts: 2,
            bytes: 1,
        });
        assert_eq!(task.state, TaskState::Verified);
        assert_eq!(task.attempt_count, 2);
        assert!(task.computed_hash.is_some());
    }
}
