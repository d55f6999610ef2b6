//! Concrete providers for the Vocalis capability traits.
//!
//! - `azure`: Blob Storage, Custom Voice training and text-to-speech over REST
//! - `local`: a directory-backed object store for offline use

pub mod azure;
pub mod connection;
pub mod error;
pub mod local;

pub use azure::{AzureBlobStore, AzureSpeechSynthesizer, CustomVoiceClient, DEFAULT_VOICE};
pub use connection::StorageConnection;
pub use error::ProviderError;
pub use local::LocalObjectStore;
