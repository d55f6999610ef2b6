//! Capability abstraction layer for Vocalis.
//!
//! This crate defines the traits the training core consumes from its external
//! collaborators (object storage, the voice-training service, speech synthesis)
//! together with their error types. Concrete implementations live in
//! `vocalis-providers`.

mod service;
mod storage;

pub use service::{
    JobStatus, JobStatusReport, ServiceError, SpeechSynthesizer, TrainingSubmission,
    VoiceTrainingService,
};
pub use storage::{
    ContainerStatus, DIGEST_METADATA_KEY, ObjectMetadata, ObjectStore, StoreError,
};
