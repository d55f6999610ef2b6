use crate::audio::{self, AudioPreprocessor, AudioValidation};
use crate::dataset::DatasetRecord;
use crate::error::{TrainingError, TrainingResult};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Builds a dataset manifest from a directory of recordings and a directory
/// of `<stem>.txt` transcripts.
pub struct DatasetPreparation {
    audio_dir: PathBuf,
    transcript_dir: PathBuf,
    preprocessor: Option<Arc<dyn AudioPreprocessor>>,
}

impl DatasetPreparation {
    pub fn new(audio_dir: impl Into<PathBuf>, transcript_dir: impl Into<PathBuf>) -> Self {
        Self { audio_dir: audio_dir.into(), transcript_dir: transcript_dir.into(), preprocessor: None }
    }

    /// Files failing validation are normalized in place before being listed.
    #[must_use]
    pub fn with_preprocessor(mut self, preprocessor: Arc<dyn AudioPreprocessor>) -> Self {
        self.preprocessor = Some(preprocessor);
        self
    }

    /// `*.wav` files directly inside the audio directory, sorted by path.
    pub fn audio_files(&self) -> TrainingResult<Vec<PathBuf>> {
        let mut files = Vec::new();
        for entry in WalkDir::new(&self.audio_dir).min_depth(1).max_depth(1) {
            let entry = entry.map_err(std::io::Error::from)?;
            let path = entry.path();
            let is_wav = path.extension().and_then(|e| e.to_str()).is_some_and(|e| e.eq_ignore_ascii_case("wav"));
            if entry.file_type().is_file() && is_wav {
                files.push(path.to_path_buf());
            }
        }
        files.sort();
        Ok(files)
    }

    /// Pairs every recording with its transcript.
    ///
    /// Recordings without a usable transcript or with unreadable audio are
    /// skipped with a warning.
    pub fn create_records(&self) -> TrainingResult<Vec<DatasetRecord>> {
        let mut records = Vec::new();

        for audio_path in self.audio_files()? {
            let Some(text) = self.transcript_for(&audio_path)? else {
                continue;
            };

            if let Some(preprocessor) = &self.preprocessor {
                if let Err(e) = preprocess(preprocessor.as_ref(), &audio_path) {
                    warn!(path = %audio_path.display(), "Skipping recording: {}", e);
                    continue;
                }
            }

            let duration = match audio::read_info(&audio_path) {
                Ok(info) if info.duration_secs > 0.0 => info.duration_secs,
                Ok(_) => {
                    warn!(path = %audio_path.display(), "Skipping empty recording");
                    continue;
                }
                Err(e) => {
                    warn!(path = %audio_path.display(), "Skipping unreadable recording: {}", e);
                    continue;
                }
            };

            records.push(DatasetRecord { audio_path, text, duration });
        }

        Ok(records)
    }

    /// Writes the manifest as pretty-printed JSON and returns its records.
    pub fn export(&self, output: &Path) -> TrainingResult<Vec<DatasetRecord>> {
        let records = self.create_records()?;
        if records.is_empty() {
            return Err(TrainingError::DatasetFormat {
                path: output.to_path_buf(),
                problems: vec![format!(
                    "no recording in {} has a matching transcript in {}",
                    self.audio_dir.display(),
                    self.transcript_dir.display()
                )],
            });
        }

        if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(output, serde_json::to_string_pretty(&records)?)?;

        info!(output = %output.display(), records = records.len(), "Dataset exported");
        Ok(records)
    }

    fn transcript_for(&self, audio_path: &Path) -> TrainingResult<Option<String>> {
        let Some(stem) = audio_path.file_stem() else {
            return Ok(None);
        };
        let mut file_name = stem.to_os_string();
        file_name.push(".txt");
        let transcript_path = self.transcript_dir.join(file_name);

        let text = match std::fs::read_to_string(&transcript_path) {
            Ok(text) => text.trim().to_string(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(audio = %audio_path.display(), "No transcript found");
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };

        if text.is_empty() {
            warn!(transcript = %transcript_path.display(), "Transcript is empty");
            return Ok(None);
        }
        Ok(Some(text))
    }
}

fn preprocess(preprocessor: &dyn AudioPreprocessor, path: &Path) -> TrainingResult<()> {
    match preprocessor.validate(path) {
        AudioValidation::Checked { checks, .. } if checks.all_passed() => Ok(()),
        AudioValidation::Checked { checks, .. } => {
            debug!(path = %path.display(), ?checks, "Normalizing recording");
            preprocessor.normalize(path, None).map(|_| ())
        }
        AudioValidation::Unreadable { detail } => Err(TrainingError::Audio(detail)),
    }
}
