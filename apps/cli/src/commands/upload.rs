//! Upload command implementation.

use super::cancel_on_ctrl_c;
use crate::config::{azure_store, load_transfer_settings, load_voice_config, local_store, upload_pipeline};
use anyhow::Context;
use colored::Colorize;
use std::path::Path;
use std::sync::Arc;
use vocalis_training::{DatasetUploadPipeline, StdoutProgressSink};

/// Execute the upload command.
///
/// With `local_store` no credentials are needed.
pub async fn execute(config_path: Option<&Path>, dataset: &Path, local_root: Option<&Path>) -> anyhow::Result<()> {
    let (store, settings) = match local_root {
        Some(root) => {
            let settings = load_transfer_settings(config_path)?;
            (local_store(root, &settings), settings)
        }
        None => {
            let config = load_voice_config(config_path)?;
            (azure_store(&config)?, config.transfer_settings())
        }
    };

    println!("{}", format!("Uploading dataset {}...", dataset.display()).bold().cyan());
    println!("  Container: {}", settings.container_name.dimmed());
    println!();

    let pipeline = upload_pipeline(Arc::clone(&store), &settings, Arc::new(StdoutProgressSink));
    let result = pipeline
        .upload_with_cancel(dataset, &cancel_on_ctrl_c())
        .await
        .with_context(|| format!("failed to upload dataset {}", dataset.display()))?;

    println!();
    println!(
        "{}",
        format!(
            "✓ Uploaded {} file(s), {} bytes in {:.1}s",
            result.succeeded.len(),
            result.total_bytes,
            result.duration.as_secs_f64()
        )
        .green()
        .bold()
    );
    for (key, reason) in &result.skipped {
        println!("  {} {key}: {reason}", "skipped".yellow());
    }
    let manifest_key = DatasetUploadPipeline::manifest_key(dataset)?;
    println!("  Manifest: {}", store.object_url(&manifest_key));

    Ok(())
}
