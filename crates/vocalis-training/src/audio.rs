//! WAV inspection and normalisation for training recordings.

use crate::error::{TrainingError, TrainingResult};
use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Recording requirements of the voice training service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioRequirements {
    pub sample_rate: u32,
    pub min_duration_secs: f64,
    pub max_duration_secs: f64,
    /// Files must be strictly smaller than this.
    pub max_file_bytes: u64,
}

impl Default for AudioRequirements {
    fn default() -> Self {
        Self {
            sample_rate: 44_100,
            min_duration_secs: 0.5,
            max_duration_secs: 15.0,
            max_file_bytes: 100 * 1024 * 1024,
        }
    }
}

/// Header facts of a WAV file.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AudioInfo {
    pub sample_rate: u32,
    pub channels: u16,
    pub frames: u32,
    pub duration_secs: f64,
    pub file_size: u64,
}

/// Outcome of each individual requirement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[allow(clippy::struct_excessive_bools)]
pub struct AudioChecks {
    pub sample_rate: bool,
    pub duration: bool,
    pub channels: bool,
    pub file_size: bool,
}

impl AudioChecks {
    pub const fn all_passed(&self) -> bool {
        self.sample_rate && self.duration && self.channels && self.file_size
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum AudioValidation {
    Checked { info: AudioInfo, checks: AudioChecks },
    Unreadable { detail: String },
}

impl AudioValidation {
    pub const fn is_ok(&self) -> bool {
        match self {
            Self::Checked { checks, .. } => checks.all_passed(),
            Self::Unreadable { .. } => false,
        }
    }
}

pub trait AudioPreprocessor: Send + Sync {
    /// Checks a file against the requirements. Decode failures are reported
    /// in the result, never as an error.
    fn validate(&self, path: &Path) -> AudioValidation;

    /// Rewrites a file so it meets the requirements and returns the path
    /// written. Without `output` the file is replaced in place.
    fn normalize(&self, path: &Path, output: Option<&Path>) -> TrainingResult<PathBuf>;
}

#[derive(Debug, Clone, Default)]
pub struct WavPreprocessor {
    requirements: AudioRequirements,
}

impl WavPreprocessor {
    pub fn new(requirements: AudioRequirements) -> Self {
        Self { requirements }
    }

    pub fn requirements(&self) -> &AudioRequirements {
        &self.requirements
    }
}

impl AudioPreprocessor for WavPreprocessor {
    fn validate(&self, path: &Path) -> AudioValidation {
        let info = match read_info(path) {
            Ok(info) => info,
            Err(e) => return AudioValidation::Unreadable { detail: e.to_string() },
        };
        let req = &self.requirements;
        let checks = AudioChecks {
            sample_rate: info.sample_rate == req.sample_rate,
            duration: (req.min_duration_secs..=req.max_duration_secs).contains(&info.duration_secs),
            channels: info.channels == 1,
            file_size: info.file_size < req.max_file_bytes,
        };
        debug!(path = %path.display(), ?checks, "Validated audio file");
        AudioValidation::Checked { info, checks }
    }

    fn normalize(&self, path: &Path, output: Option<&Path>) -> TrainingResult<PathBuf> {
        let (spec, samples) = read_samples(path)?;
        let mono = downmix(&samples, usize::from(spec.channels));
        let mut resampled = resample(&mono, spec.sample_rate, self.requirements.sample_rate);
        peak_normalize(&mut resampled);

        let target = output.unwrap_or(path).to_path_buf();
        let tmp = target.with_extension("wav.tmp");
        write_pcm16(&tmp, self.requirements.sample_rate, &resampled)?;
        std::fs::rename(&tmp, &target)?;

        debug!(
            source = %path.display(),
            output = %target.display(),
            from_rate = spec.sample_rate,
            to_rate = self.requirements.sample_rate,
            channels = spec.channels,
            "Normalized audio file"
        );
        Ok(target)
    }
}

/// Reads the WAV header of `path`.
pub fn read_info(path: &Path) -> TrainingResult<AudioInfo> {
    let file_size = std::fs::metadata(path)?.len();
    let reader = WavReader::open(path).map_err(|e| audio_error(path, &e))?;
    let spec = reader.spec();
    let frames = reader.duration();
    Ok(AudioInfo {
        sample_rate: spec.sample_rate,
        channels: spec.channels,
        frames,
        duration_secs: f64::from(frames) / f64::from(spec.sample_rate),
        file_size,
    })
}

fn audio_error(path: &Path, e: &hound::Error) -> TrainingError {
    TrainingError::Audio(format!("{}: {e}", path.display()))
}

/// Decodes every sample as `f32` in `[-1.0, 1.0]`, interleaved.
fn read_samples(path: &Path) -> TrainingResult<(WavSpec, Vec<f32>)> {
    let mut reader = WavReader::open(path).map_err(|e| audio_error(path, &e))?;
    let spec = reader.spec();
    let samples = match spec.sample_format {
        SampleFormat::Float => reader.samples::<f32>().collect::<Result<Vec<_>, _>>(),
        SampleFormat::Int => {
            let scale = 1.0 / f64::from(1u32 << (spec.bits_per_sample.saturating_sub(1)));
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| (f64::from(v) * scale) as f32))
                .collect::<Result<Vec<_>, _>>()
        }
    }
    .map_err(|e| audio_error(path, &e))?;
    Ok((spec, samples))
}

fn downmix(samples: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return samples.to_vec();
    }
    samples
        .chunks(channels)
        .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
        .collect()
}

/// Linear interpolation onto the target rate.
fn resample(samples: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
    if from_rate == to_rate || samples.is_empty() {
        return samples.to_vec();
    }
    let ratio = f64::from(from_rate) / f64::from(to_rate);
    let out_len = (samples.len() as f64 / ratio).round() as usize;
    let last = samples.len() - 1;

    (0..out_len)
        .map(|i| {
            let pos = i as f64 * ratio;
            let idx = (pos.floor() as usize).min(last);
            let next = (idx + 1).min(last);
            let frac = (pos - idx as f64) as f32;
            samples[idx] + (samples[next] - samples[idx]) * frac
        })
        .collect()
}

/// Scales so the loudest sample reaches full scale; silence is left alone.
fn peak_normalize(samples: &mut [f32]) {
    let peak = samples.iter().fold(0.0f32, |acc, s| acc.max(s.abs()));
    if peak > 0.0 {
        for s in samples.iter_mut() {
            *s /= peak;
        }
    }
}

fn write_pcm16(path: &Path, sample_rate: u32, samples: &[f32]) -> TrainingResult<()> {
    let spec = WavSpec { channels: 1, sample_rate, bits_per_sample: 16, sample_format: SampleFormat::Int };
    let mut writer = WavWriter::create(path, spec).map_err(|e| audio_error(path, &e))?;
    for s in samples {
        let value = (s.clamp(-1.0, 1.0) * f32::from(i16::MAX)).round() as i16;
        writer.write_sample(value).map_err(|e| audio_error(path, &e))?;
    }
    writer.finalize().map_err(|e| audio_error(path, &e))
}
