//! Status command implementation.

use crate::config::{load_voice_config, training_service};
use anyhow::Context;
use colored::Colorize;
use std::path::Path;
use vocalis_abstraction::JobStatus;

/// Execute the status command with a single status query.
pub async fn execute(config_path: Option<&Path>, model_id: &str, json: bool) -> anyhow::Result<()> {
    let config = load_voice_config(config_path)?;
    let service = training_service(&config)?;

    let report = service
        .job_status(model_id)
        .await
        .with_context(|| format!("failed to query voice model {model_id}"))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    let status = report.status.to_string();
    let status = match report.status {
        JobStatus::Succeeded => status.green().bold(),
        JobStatus::Failed => status.red().bold(),
        JobStatus::Running | JobStatus::Pending => status.yellow().bold(),
    };
    println!("{}", format!("Voice model {}", report.job_id).bold().cyan());
    println!("  Status:  {status}");
    println!("  Created: {}", report.created_at.to_rfc3339());
    println!("  Updated: {}", report.updated_at.to_rfc3339());

    Ok(())
}
