//! Configuration loading and component wiring.

use anyhow::Context;
use std::path::Path;
use std::sync::Arc;
use vocalis_abstraction::{ObjectStore, VoiceTrainingService};
use vocalis_providers::{AzureBlobStore, CustomVoiceClient, LocalObjectStore};
use vocalis_training::{
    DatasetUploadPipeline, PartialConfig, ProgressSink, RetryingUploader, Sleeper, TokioSleeper,
    TransferSettings, VoiceConfig,
};

/// Full configuration for commands that talk to the remote services.
///
/// Fails listing every missing credential.
pub fn load_voice_config(path: Option<&Path>) -> anyhow::Result<VoiceConfig> {
    VoiceConfig::load(path).context("failed to load configuration")
}

/// Upload settings only; no credentials are required.
pub fn load_transfer_settings(path: Option<&Path>) -> anyhow::Result<TransferSettings> {
    PartialConfig::discover(path)
        .and_then(|partial| partial.transfer_settings())
        .context("failed to load configuration")
}

pub fn local_store(root: &Path, settings: &TransferSettings) -> Arc<dyn ObjectStore> {
    Arc::new(LocalObjectStore::new(root, settings.container_name.clone()))
}

pub fn azure_store(config: &VoiceConfig) -> anyhow::Result<Arc<dyn ObjectStore>> {
    let store = AzureBlobStore::from_connection_string(
        &config.storage_connection_string,
        config.container_name.clone(),
    )
    .context("invalid storage connection string")?;
    Ok(Arc::new(store))
}

pub fn training_service(config: &VoiceConfig) -> anyhow::Result<Arc<dyn VoiceTrainingService>> {
    let client = CustomVoiceClient::new(&config.custom_voice_endpoint, config.speech_key.clone())
        .context("failed to create custom voice client")?;
    Ok(Arc::new(client))
}

pub fn upload_pipeline(
    store: Arc<dyn ObjectStore>,
    settings: &TransferSettings,
    progress: Arc<dyn ProgressSink>,
) -> DatasetUploadPipeline {
    let uploader = Arc::new(RetryingUploader::new(
        Arc::clone(&store),
        settings.retry_policy.clone(),
        Arc::new(TokioSleeper) as Arc<dyn Sleeper>,
    ));
    DatasetUploadPipeline::new(store, uploader, progress).with_max_concurrency(settings.upload_concurrency)
}
