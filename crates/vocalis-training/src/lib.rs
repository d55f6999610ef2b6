//! Vocalis training core.
//!
//! This crate moves a voice dataset to object storage and drives a custom
//! voice training job to completion:
//! - Bounded-parallel upload with per-file retry and SHA-256 verification
//! - Dataset manifest validation
//! - Training job polling
//! - Dataset preparation and WAV normalisation helpers
//!
//! # Example
//!
//! ```rust,no_run
//! use std::path::Path;
//! use vocalis_training::VoiceModelOrchestrator;
//!
//! async fn train(orchestrator: &VoiceModelOrchestrator) -> vocalis_training::TrainingResult<()> {
//!     let model = orchestrator.create_voice("narrator", Path::new("dataset.json"), "en-US").await?;
//!     println!("{} is {}", model.name, model.status);
//!     Ok(())
//! }
//! ```

pub mod audio;
pub mod config;
pub mod coordinator;
pub mod dataset;
pub mod error;
pub mod hash;
pub mod model;
pub mod monitor;
pub mod orchestrator;
pub mod pipeline;
pub mod preparation;
pub mod progress;
pub mod retry;
pub mod upload;

#[cfg(test)]
mod testing;

pub use audio::{
    AudioChecks, AudioInfo, AudioPreprocessor, AudioRequirements, AudioValidation, WavPreprocessor,
};
pub use config::{PartialConfig, TransferSettings, VoiceConfig};
pub use coordinator::{ParallelTransferCoordinator, TransferBatchResult, TransferOutcome};
pub use dataset::{Dataset, DatasetRecord, DatasetSummary};
pub use error::{TrainingError, TrainingResult};
pub use hash::{ContentDigest, digest_bytes, digest_file};
pub use model::VoiceModel;
pub use monitor::{MonitorConfig, TrainingJobMonitor};
pub use orchestrator::{VoiceModelOrchestrator, validate_locale, validate_model_name};
pub use pipeline::DatasetUploadPipeline;
pub use preparation::DatasetPreparation;
pub use progress::{ProgressEvent, ProgressSink, StdoutProgressSink, TracingProgressSink};
pub use retry::{RetryPolicy, Sleeper, TokioSleeper};
pub use upload::{FileUploader, RetryingUploader, TaskState, UploadAck, UploadTask};
