use crate::error::{TrainingError, TrainingResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use tracing::warn;

/// Remote prefix under which audio files are stored.
pub const AUDIO_KEY_PREFIX: &str = "audio";

/// One audio/transcript pair of the training set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetRecord {
    #[serde(rename = "audio_file")]
    pub audio_path: PathBuf,
    #[serde(alias = "transcript")]
    pub text: String,
    /// Length of the recording in seconds.
    pub duration: f64,
}

impl DatasetRecord {
    /// Remote key of this record's audio file (`audio/<file name>`).
    pub fn remote_key(&self) -> Option<String> {
        audio_remote_key(&self.audio_path)
    }
}

pub fn audio_remote_key(path: &Path) -> Option<String> {
    let name = path.file_name()?.to_str()?;
    Some(format!("{AUDIO_KEY_PREFIX}/{name}"))
}

/// A validated, read-only dataset manifest.
#[derive(Debug, Clone)]
pub struct Dataset {
    path: PathBuf,
    records: Vec<DatasetRecord>,
}

/// Aggregate facts about the audio a dataset references.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DatasetSummary {
    pub records: usize,
    pub total_bytes: u64,
    pub total_duration_secs: f64,
    /// Referenced files that do not exist on disk.
    pub missing_files: Vec<PathBuf>,
}

impl Dataset {
    /// Reads and validates a dataset manifest.
    pub async fn load(path: &Path) -> TrainingResult<Self> {
        let bytes = tokio::fs::read(path).await?;
        Self::from_slice(path, &bytes)
    }

    /// Parses and validates manifest bytes; `path` is used for reporting.
    ///
    /// Every record is checked before anything is returned so that a single
    /// error lists all problems.
    pub fn from_slice(path: &Path, bytes: &[u8]) -> TrainingResult<Self> {
        let format_error = |problems: Vec<String>| TrainingError::DatasetFormat {
            path: path.to_path_buf(),
            problems,
        };

        let value: Value = serde_json::from_slice(bytes)
            .map_err(|e| format_error(vec![format!("not valid JSON: {e}")]))?;
        let Value::Array(items) = value else {
            return Err(format_error(vec!["expected a JSON array of records".to_string()]));
        };
        if items.is_empty() {
            return Err(format_error(vec!["dataset must not be empty".to_string()]));
        }

        let mut problems = Vec::new();
        for (idx, item) in items.iter().enumerate() {
            if let Some(problem) = check_record(item) {
                problems.push(format!("record {idx}: {problem}"));
            }
        }
        if !problems.is_empty() {
            return Err(format_error(problems));
        }

        let records: Vec<DatasetRecord> = items
            .into_iter()
            .map(serde_json::from_value)
            .collect::<Result<_, _>>()
            .map_err(|e| format_error(vec![e.to_string()]))?;

        check_remote_keys(&records).map_err(format_error)?;

        Ok(Self { path: path.to_path_buf(), records })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn records(&self) -> &[DatasetRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Sums the size of every distinct referenced audio file.
    ///
    /// Files that do not exist are left out of the total and listed in
    /// `missing_files`; they are reported, not treated as errors here.
    pub async fn summarize(&self) -> DatasetSummary {
        let mut summary = DatasetSummary { records: self.records.len(), ..Default::default() };
        let mut seen = HashSet::new();

        for record in &self.records {
            summary.total_duration_secs += record.duration;
            if !seen.insert(record.audio_path.clone()) {
                continue;
            }
            match tokio::fs::metadata(&record.audio_path).await {
                Ok(md) => summary.total_bytes += md.len(),
                Err(e) => {
                    warn!(path = %record.audio_path.display(), "Referenced audio file unavailable: {}", e);
                    summary.missing_files.push(record.audio_path.clone());
                }
            }
        }

        summary
    }
}

/// Returns a description of what is wrong with one record, if anything.
fn check_record(item: &Value) -> Option<String> {
    let Value::Object(map) = item else {
        return Some("expected an object".to_string());
    };

    let mut missing = Vec::new();
    let mut invalid = Vec::new();

    match map.get("audio_file") {
        None | Some(Value::Null) => missing.push("audio_file"),
        Some(Value::String(s)) if !s.trim().is_empty() => {}
        Some(_) => invalid.push("audio_file must be a non-empty string"),
    }

    match map.get("text").or_else(|| map.get("transcript")) {
        None | Some(Value::Null) => missing.push("text"),
        Some(Value::String(s)) if !s.trim().is_empty() => {}
        Some(_) => invalid.push("text must be a non-empty string"),
    }

    match map.get("duration") {
        None | Some(Value::Null) => missing.push("duration"),
        Some(Value::Number(n)) if n.as_f64().is_some_and(|d| d.is_finite() && d > 0.0) => {}
        Some(_) => invalid.push("duration must be a positive number"),
    }

    let mut parts = Vec::new();
    if !missing.is_empty() {
        parts.push(format!("missing field(s) {}", missing.join(", ")));
    }
    parts.extend(invalid.into_iter().map(str::to_string));

    if parts.is_empty() { None } else { Some(parts.join(", ")) }
}

/// Two different files must not land on the same remote key.
fn check_remote_keys(records: &[DatasetRecord]) -> Result<(), Vec<String>> {
    let mut owners: BTreeMap<String, &Path> = BTreeMap::new();
    let mut problems = Vec::new();

    for (idx, record) in records.iter().enumerate() {
        let Some(key) = record.remote_key() else {
            problems.push(format!(
                "record {idx}: audio_file {} has no usable file name",
                record.audio_path.display()
            ));
            continue;
        };
        match owners.get(&key) {
            Some(owner) if *owner != record.audio_path.as_path() => problems.push(format!(
                "record {idx}: {} and {} would both upload to {key}",
                owner.display(),
                record.audio_path.display()
            )),
            Some(_) => {}
            None => {
                owners.insert(key, &record.audio_path);
            }
        }
    }

    if problems.is_empty() { Ok(()) } else { Err(problems) }
}
