//! Synthesize command implementation.

use crate::config::load_voice_config;
use anyhow::Context;
use colored::Colorize;
use std::path::Path;
use vocalis_abstraction::SpeechSynthesizer;
use vocalis_providers::AzureSpeechSynthesizer;

/// Execute the synthesize command and write the WAV payload to `output`.
pub async fn execute(config_path: Option<&Path>, text: &str, output: &Path, voice: &str) -> anyhow::Result<()> {
    if text.trim().is_empty() {
        anyhow::bail!("nothing to synthesize: text is empty");
    }
    let config = load_voice_config(config_path)?;
    let synthesizer = AzureSpeechSynthesizer::new(&config.speech_region, config.speech_key.clone())
        .context("failed to create speech synthesizer")?;

    println!("{}", format!("Synthesizing with {voice}...").bold().cyan());
    let audio = synthesizer
        .synthesize(text, voice)
        .await
        .with_context(|| format!("speech synthesis with {voice} failed"))?;

    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(output, &audio)
        .await
        .with_context(|| format!("failed to write {}", output.display()))?;

    println!("{}", format!("✓ Wrote {} bytes to {}", audio.len(), output.display()).green().bold());
    Ok(())
}
