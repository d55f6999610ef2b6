//! Azure implementations of the storage, training and synthesis capabilities.

mod blob;
mod custom_voice;
mod synthesis;

pub use blob::AzureBlobStore;
pub use custom_voice::CustomVoiceClient;
pub use synthesis::{AzureSpeechSynthesizer, DEFAULT_VOICE, OUTPUT_FORMAT, build_ssml};
