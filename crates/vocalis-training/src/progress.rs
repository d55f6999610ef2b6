use serde::{Deserialize, Serialize};
use tracing::info;
use vocalis_abstraction::JobStatus;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProgressEvent {
    DatasetValidated { records: usize, total_bytes: u64, missing_files: usize },
    TransferSettled { remote_key: String, succeeded: bool, completed: usize, total: usize },
    BatchFinished { succeeded: usize, failed: usize, skipped: usize },
    JobSubmitted { job_id: String, status: JobStatus },
    JobStatusChanged { job_id: String, status: JobStatus },
}

pub trait ProgressSink: Send + Sync {
    fn on_event(&self, event: ProgressEvent);
}

/// Prints progress lines for interactive CLI use.
#[derive(Debug, Default)]
pub struct StdoutProgressSink;

impl ProgressSink for StdoutProgressSink {
    fn on_event(&self, event: ProgressEvent) {
        match event {
            ProgressEvent::DatasetValidated { records, total_bytes, missing_files } => {
                println!("[dataset] {records} records, {total_bytes} bytes of audio");
                if missing_files > 0 {
                    println!("[dataset] {missing_files} referenced audio file(s) not found");
                }
            }
            ProgressEvent::TransferSettled { remote_key, succeeded, completed, total } => {
                let mark = if succeeded { "ok" } else { "FAILED" };
                println!("[upload {completed}/{total}] {remote_key} {mark}");
            }
            ProgressEvent::BatchFinished { succeeded, failed, skipped } => {
                println!("[upload] done: {succeeded} uploaded, {failed} failed, {skipped} skipped");
            }
            ProgressEvent::JobSubmitted { job_id, status } => {
                println!("[train:{job_id}] submitted ({status})");
            }
            ProgressEvent::JobStatusChanged { job_id, status } => {
                println!("[train:{job_id}] {status}");
            }
        }
    }
}

/// Forwards progress to the tracing subscriber.
#[derive(Debug, Default)]
pub struct TracingProgressSink;

impl ProgressSink for TracingProgressSink {
    fn on_event(&self, event: ProgressEvent) {
        info!(event = ?event, "progress");
    }
}
