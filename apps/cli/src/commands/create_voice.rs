//! Create-voice command implementation.

use super::cancel_on_ctrl_c;
use crate::config::{azure_store, load_voice_config, local_store, training_service, upload_pipeline};
use anyhow::Context;
use colored::Colorize;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;
use vocalis_training::{
    ProgressSink, StdoutProgressSink, TokioSleeper, TrainingError, TrainingJobMonitor,
    VoiceModelOrchestrator, validate_locale, validate_model_name,
};

/// Execute the create-voice command.
///
/// Uploads the dataset, submits training and waits for a terminal status.
/// Ctrl-C or `timeout_secs` stop waiting; the remote job keeps running.
pub async fn execute(
    config_path: Option<&Path>,
    name: &str,
    dataset: &Path,
    locale: &str,
    timeout_secs: Option<u64>,
    local_root: Option<&Path>,
) -> anyhow::Result<()> {
    validate_model_name(name)?;
    validate_locale(locale)?;

    let config = load_voice_config(config_path)?;
    let settings = config.transfer_settings();
    let store = match local_root {
        Some(root) => local_store(root, &settings),
        None => azure_store(&config)?,
    };

    let progress: Arc<dyn ProgressSink> = Arc::new(StdoutProgressSink);
    let service = training_service(&config)?;
    let monitor = TrainingJobMonitor::new(
        Arc::clone(&service),
        Arc::new(TokioSleeper),
        Arc::clone(&progress),
        config.monitor_config(),
    );
    let pipeline = upload_pipeline(store, &settings, Arc::clone(&progress));
    let mut orchestrator = VoiceModelOrchestrator::new(pipeline, service, monitor, progress);
    if let Some(description) = &config.model_description {
        orchestrator = orchestrator.with_description(description.clone());
    }

    let cancel = cancel_on_ctrl_c();
    if let Some(secs) = timeout_secs {
        let token = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(secs)).await;
            warn!(timeout_secs = secs, "Timed out waiting for training");
            token.cancel();
        });
    }

    println!("{}", format!("Creating voice {name} ({locale})...").bold().cyan());
    println!("  Dataset: {}", dataset.display().to_string().dimmed());
    println!("  Polling every {}s", config.poll_interval_secs);
    println!();

    match orchestrator.create_voice_with_cancel(name, dataset, locale, &cancel).await {
        Ok(model) => {
            println!();
            println!("{}", format!("✓ Voice {} is ready", model.name).green().bold());
            println!("  Model id: {}", model.model_id.cyan());
            println!("  Trained:  {}", model.updated_at.to_rfc3339());
            Ok(())
        }
        Err(TrainingError::TrainingFailed { model }) => {
            println!();
            println!("{}", format!("✗ Training of {} failed", model.name).red().bold());
            println!("  Model id: {}", model.model_id);
            anyhow::bail!("training job {} ended in status {}", model.model_id, model.status)
        }
        Err(e) => Err(e).with_context(|| format!("failed to create voice {name}")),
    }
}
