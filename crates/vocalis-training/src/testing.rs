//! In-memory doubles for the external collaborators, shared by unit tests.

use crate::progress::{ProgressEvent, ProgressSink};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{TimeZone, Utc};
use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};
use vocalis_abstraction::{
    ContainerStatus, DIGEST_METADATA_KEY, JobStatus, JobStatusReport, ObjectMetadata, ObjectStore,
    ServiceError, StoreError, TrainingSubmission, VoiceTrainingService,
};

#[derive(Default)]
pub struct MemoryStore {
    objects: Mutex<HashMap<String, (Bytes, ObjectMetadata)>>,
    put_script: Mutex<VecDeque<Result<(), StoreError>>>,
    corrupt_reads: AtomicU32,
    container_exists: Mutex<bool>,
    pub put_calls: AtomicU32,
    pub create_calls: AtomicU32,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues results for the next `put_object` calls; afterwards puts succeed.
    pub fn script_puts(&self, results: Vec<Result<(), StoreError>>) {
        self.put_script.lock().unwrap().extend(results);
    }

    /// The next `times` metadata reads report a digest that does not match.
    pub fn corrupt_next_reads(&self, times: u32) {
        self.corrupt_reads.store(times, Ordering::SeqCst);
    }

    pub fn with_existing_container(self) -> Self {
        *self.container_exists.lock().unwrap() = true;
        self
    }

    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<_> = self.objects.lock().unwrap().keys().cloned().collect();
        keys.sort();
        keys
    }

    pub fn object(&self, key: &str) -> Option<Bytes> {
        self.objects.lock().unwrap().get(key).map(|(b, _)| b.clone())
    }

    pub fn puts(&self) -> u32 {
        self.put_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    fn container(&self) -> &str {
        "voice-samples"
    }

    async fn create_container(&self) -> Result<ContainerStatus, StoreError> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        let mut exists = self.container_exists.lock().unwrap();
        if *exists {
            Ok(ContainerStatus::AlreadyExists)
        } else {
            *exists = true;
            Ok(ContainerStatus::Created)
        }
    }

    async fn put_object(
        &self,
        key: &str,
        body: Bytes,
        metadata: &ObjectMetadata,
    ) -> Result<(), StoreError> {
        self.put_calls.fetch_add(1, Ordering::SeqCst);
        let scripted = self.put_script.lock().unwrap().pop_front();
        if let Some(Err(e)) = scripted {
            return Err(e);
        }
        self.objects.lock().unwrap().insert(key.to_string(), (body, metadata.clone()));
        Ok(())
    }

    async fn object_metadata(&self, key: &str) -> Result<ObjectMetadata, StoreError> {
        let mut metadata = self
            .objects
            .lock()
            .unwrap()
            .get(key)
            .map(|(_, m)| m.clone())
            .ok_or_else(|| StoreError::NotFound(key.to_string()))?;
        let corrupt = self.corrupt_reads.load(Ordering::SeqCst);
        if corrupt > 0 {
            self.corrupt_reads.store(corrupt - 1, Ordering::SeqCst);
            metadata.insert(DIGEST_METADATA_KEY.to_string(), "0".repeat(64));
        }
        Ok(metadata)
    }

    fn object_url(&self, key: &str) -> String {
        format!("memory://voice-samples/{key}")
    }
}

#[derive(Default)]
pub struct ScriptedService {
    submit_result: Mutex<Option<Result<JobStatus, ServiceError>>>,
    statuses: Mutex<VecDeque<Result<JobStatus, ServiceError>>>,
    pub submissions: Mutex<Vec<TrainingSubmission>>,
    pub status_calls: AtomicU32,
}

impl ScriptedService {
    pub fn new(statuses: Vec<Result<JobStatus, ServiceError>>) -> Self {
        Self { statuses: Mutex::new(statuses.into()), ..Self::default() }
    }

    pub fn rejecting_submission(self, error: ServiceError) -> Self {
        *self.submit_result.lock().unwrap() = Some(Err(error));
        self
    }

    pub fn status_queries(&self) -> u32 {
        self.status_calls.load(Ordering::SeqCst)
    }
}

pub fn report(job_id: &str, status: JobStatus, minute: u32) -> JobStatusReport {
    JobStatusReport {
        job_id: job_id.to_string(),
        status,
        created_at: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
        updated_at: Utc.with_ymd_and_hms(2024, 5, 1, 12, minute, 0).unwrap(),
    }
}

#[async_trait]
impl VoiceTrainingService for ScriptedService {
    async fn submit_training(
        &self,
        submission: &TrainingSubmission,
    ) -> Result<JobStatusReport, ServiceError> {
        self.submissions.lock().unwrap().push(submission.clone());
        match self.submit_result.lock().unwrap().take() {
            Some(Err(e)) => Err(e),
            Some(Ok(status)) => Ok(report("job-1", status, 0)),
            None => Ok(report("job-1", JobStatus::Pending, 0)),
        }
    }

    async fn job_status(&self, job_id: &str) -> Result<JobStatusReport, ServiceError> {
        let n = self.status_calls.fetch_add(1, Ordering::SeqCst) + 1;
        let next = self
            .statuses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Ok(JobStatus::Running));
        next.map(|status| report(job_id, status, n))
    }
}

#[derive(Default)]
pub struct CollectingSink {
    pub events: Mutex<Vec<ProgressEvent>>,
}

impl ProgressSink for CollectingSink {
    fn on_event(&self, event: ProgressEvent) {
        self.events.lock().unwrap().push(event);
    }
}

pub fn write_file(dir: &Path, name: &str, content: &[u8]) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, content).unwrap();
    path
}
