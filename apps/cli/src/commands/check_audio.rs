//! Check-audio command implementation.

use colored::Colorize;
use comfy_table::{Cell, Color, Table};
use serde_json::{Value, json};
use std::path::{Path, PathBuf};
use vocalis_training::{AudioPreprocessor, AudioValidation, WavPreprocessor};

/// Execute the check-audio command.
///
/// Fails when any file does not meet the requirements.
pub fn execute(files: &[PathBuf], json: bool) -> anyhow::Result<()> {
    let preprocessor = WavPreprocessor::default();
    let results: Vec<(&Path, AudioValidation)> =
        files.iter().map(|f| (f.as_path(), preprocessor.validate(f))).collect();
    let failed = results.iter().filter(|(_, v)| !v.is_ok()).count();

    if json {
        let report: Vec<Value> =
            results.iter().map(|(path, v)| json_entry(path, v)).collect::<anyhow::Result<_>>()?;
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_table(&results);
    }

    if failed > 0 {
        anyhow::bail!("{failed} of {} file(s) do not meet the audio requirements", results.len());
    }
    if !json {
        println!("{}", "✓ All files meet the requirements".green().bold());
    }
    Ok(())
}

fn json_entry(path: &Path, validation: &AudioValidation) -> anyhow::Result<Value> {
    let mut entry = json!({ "file": path, "ok": validation.is_ok() });
    if let (Some(object), Value::Object(fields)) = (entry.as_object_mut(), serde_json::to_value(validation)?) {
        object.extend(fields);
    }
    Ok(entry)
}

fn mark(passed: bool) -> Cell {
    if passed { Cell::new("ok").fg(Color::Green) } else { Cell::new("FAIL").fg(Color::Red) }
}

fn print_table(results: &[(&Path, AudioValidation)]) {
    let requirements = WavPreprocessor::default().requirements().clone();
    println!("{}", "Audio requirements".bold().cyan());
    println!(
        "  {} Hz mono, {}-{}s, under {} MiB",
        requirements.sample_rate,
        requirements.min_duration_secs,
        requirements.max_duration_secs,
        requirements.max_file_bytes / (1024 * 1024)
    );
    println!();

    let mut table = Table::new();
    table.set_header(vec!["File", "Rate", "Channels", "Duration", "Size", "Result"]);
    for (path, validation) in results {
        let name = path.display().to_string();
        match validation {
            AudioValidation::Checked { info, checks } => {
                table.add_row(vec![
                    Cell::new(name),
                    Cell::new(info.sample_rate).fg(if checks.sample_rate { Color::Reset } else { Color::Red }),
                    Cell::new(info.channels).fg(if checks.channels { Color::Reset } else { Color::Red }),
                    Cell::new(format!("{:.2}s", info.duration_secs))
                        .fg(if checks.duration { Color::Reset } else { Color::Red }),
                    Cell::new(info.file_size).fg(if checks.file_size { Color::Reset } else { Color::Red }),
                    mark(checks.all_passed()),
                ]);
            }
            AudioValidation::Unreadable { detail } => {
                table.add_row(vec![
                    Cell::new(name),
                    Cell::new("-"),
                    Cell::new("-"),
                    Cell::new("-"),
                    Cell::new("-"),
                    Cell::new(format!("unreadable: {detail}")).fg(Color::Red),
                ]);
            }
        }
    }
    println!("{table}");
}
