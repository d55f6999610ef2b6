//! Prepare command implementation.

use anyhow::Context;
use colored::Colorize;
use std::path::Path;
use std::sync::Arc;
use vocalis_training::{DatasetPreparation, WavPreprocessor};

/// Execute the prepare command.
///
/// Writes the dataset manifest for every recording that has a transcript.
pub fn execute(audio_dir: &Path, transcript_dir: &Path, output: &Path, preprocess: bool) -> anyhow::Result<()> {
    println!("{}", "Preparing dataset...".bold().cyan());
    println!("  Audio:       {}", audio_dir.display().to_string().dimmed());
    println!("  Transcripts: {}", transcript_dir.display().to_string().dimmed());
    println!();

    let mut preparation = DatasetPreparation::new(audio_dir, transcript_dir);
    if preprocess {
        preparation = preparation.with_preprocessor(Arc::new(WavPreprocessor::default()));
    }

    let records = preparation
        .export(output)
        .with_context(|| format!("failed to prepare dataset from {}", audio_dir.display()))?;

    let total_secs: f64 = records.iter().map(|r| r.duration).sum();
    println!(
        "{}",
        format!("✓ Wrote {} record(s) to {}", records.len(), output.display()).green().bold()
    );
    println!("  Total audio: {total_secs:.1}s");

    Ok(())
}
