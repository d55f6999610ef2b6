//! Startup configuration.
//!
//! Layers, lowest precedence first: built-in defaults, a TOML file, then
//! environment variables. The merged [`PartialConfig`] is validated once
//! into an immutable [`VoiceConfig`].

use crate::error::{TrainingError, TrainingResult};
use crate::monitor::MonitorConfig;
use crate::retry::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_CONTAINER_NAME: &str = "voice-samples";
pub const DEFAULT_CONFIG_FILE: &str = "vocalis.toml";

pub const ENV_SPEECH_KEY: &str = "AZURE_SPEECH_KEY";
pub const ENV_SPEECH_REGION: &str = "AZURE_SPEECH_REGION";
pub const ENV_STORAGE_CONNECTION_STRING: &str = "AZURE_STORAGE_CONNECTION_STRING";
pub const ENV_CONTAINER_NAME: &str = "AZURE_CONTAINER_NAME";
pub const ENV_CUSTOM_VOICE_ENDPOINT: &str = "VOCALIS_CUSTOM_VOICE_ENDPOINT";
pub const ENV_UPLOAD_CONCURRENCY: &str = "VOCALIS_UPLOAD_CONCURRENCY";
pub const ENV_POLL_INTERVAL_SECS: &str = "VOCALIS_POLL_INTERVAL_SECS";

/// Validated settings shared by every component.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoiceConfig {
    pub speech_key: String,
    pub speech_region: String,
    pub storage_connection_string: String,
    pub container_name: String,
    pub custom_voice_endpoint: String,
    pub upload_concurrency: usize,
    pub upload_max_attempts: u32,
    pub upload_base_delay_ms: u64,
    pub poll_interval_secs: u64,
    pub max_consecutive_poll_failures: u32,
    pub model_description: Option<String>,
}

impl VoiceConfig {
    /// Loads from `path` (or `./vocalis.toml` when present) and the process
    /// environment.
    pub fn load(path: Option<&Path>) -> TrainingResult<Self> {
        PartialConfig::discover(path)?.build()
    }

    pub fn transfer_settings(&self) -> TransferSettings {
        TransferSettings {
            container_name: self.container_name.clone(),
            upload_concurrency: self.upload_concurrency,
            retry_policy: self.retry_policy(),
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.upload_max_attempts,
            Duration::from_millis(self.upload_base_delay_ms),
            RetryPolicy::default().backoff_multiplier,
        )
    }

    pub fn monitor_config(&self) -> MonitorConfig {
        MonitorConfig {
            poll_interval: Duration::from_secs(self.poll_interval_secs),
            max_consecutive_failures: self.max_consecutive_poll_failures,
        }
    }
}

/// Upload settings, available without any credentials.
#[derive(Debug, Clone, PartialEq)]
pub struct TransferSettings {
    pub container_name: String,
    pub upload_concurrency: usize,
    pub retry_policy: RetryPolicy,
}

/// Configuration as read from one source; every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PartialConfig {
    #[serde(default)]
    pub speech_key: Option<String>,
    #[serde(default)]
    pub speech_region: Option<String>,
    #[serde(default)]
    pub storage_connection_string: Option<String>,
    #[serde(default)]
    pub container_name: Option<String>,
    #[serde(default)]
    pub custom_voice_endpoint: Option<String>,
    #[serde(default)]
    pub upload_concurrency: Option<usize>,
    #[serde(default)]
    pub upload_max_attempts: Option<u32>,
    #[serde(default)]
    pub upload_base_delay_ms: Option<u64>,
    #[serde(default)]
    pub poll_interval_secs: Option<u64>,
    #[serde(default)]
    pub max_consecutive_poll_failures: Option<u32>,
    #[serde(default)]
    pub model_description: Option<String>,
}

impl PartialConfig {
    /// Load configuration from a TOML file.
    pub fn load_from_file(path: &Path) -> TrainingResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            TrainingError::InvalidInput(format!("cannot read config file {}: {e}", path.display()))
        })?;
        toml::from_str(&content).map_err(|e| {
            TrainingError::InvalidInput(format!("cannot parse config file {}: {e}", path.display()))
        })
    }

    /// Reads the environment variables through `lookup`.
    ///
    /// Empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> TrainingResult<Self> {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        Ok(Self {
            speech_key: get(ENV_SPEECH_KEY),
            speech_region: get(ENV_SPEECH_REGION),
            storage_connection_string: get(ENV_STORAGE_CONNECTION_STRING),
            container_name: get(ENV_CONTAINER_NAME),
            custom_voice_endpoint: get(ENV_CUSTOM_VOICE_ENDPOINT),
            upload_concurrency: get(ENV_UPLOAD_CONCURRENCY)
                .map(|v| parse_number(ENV_UPLOAD_CONCURRENCY, &v))
                .transpose()?,
            poll_interval_secs: get(ENV_POLL_INTERVAL_SECS)
                .map(|v| parse_number(ENV_POLL_INTERVAL_SECS, &v))
                .transpose()?,
            ..Self::default()
        })
    }

    pub fn from_env() -> TrainingResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Merges the explicit file (or `./vocalis.toml` when it exists) and the
    /// environment.
    ///
    /// An explicit path that does not exist is an error.
    pub fn discover(path: Option<&Path>) -> TrainingResult<Self> {
        let mut config = Self::default();

        let file = match path {
            Some(p) => Some(p.to_path_buf()),
            None => Some(PathBuf::from(DEFAULT_CONFIG_FILE)).filter(|p| p.is_file()),
        };
        if let Some(file) = file {
            config.merge(Self::load_from_file(&file)?);
        }

        config.merge(Self::from_env()?);
        Ok(config)
    }

    /// Values set in `other` override values in `self`.
    pub fn merge(&mut self, other: Self) {
        fn take<T>(slot: &mut Option<T>, value: Option<T>) {
            if value.is_some() {
                *slot = value;
            }
        }

        take(&mut self.speech_key, other.speech_key);
        take(&mut self.speech_region, other.speech_region);
        take(&mut self.storage_connection_string, other.storage_connection_string);
        take(&mut self.container_name, other.container_name);
        take(&mut self.custom_voice_endpoint, other.custom_voice_endpoint);
        take(&mut self.upload_concurrency, other.upload_concurrency);
        take(&mut self.upload_max_attempts, other.upload_max_attempts);
        take(&mut self.upload_base_delay_ms, other.upload_base_delay_ms);
        take(&mut self.poll_interval_secs, other.poll_interval_secs);
        take(&mut self.max_consecutive_poll_failures, other.max_consecutive_poll_failures);
        take(&mut self.model_description, other.model_description);
    }

    /// Validates only what local uploads need.
    pub fn transfer_settings(&self) -> TrainingResult<TransferSettings> {
        let upload_max_attempts = positive("upload_max_attempts", self.upload_max_attempts.unwrap_or(3))?;
        Ok(TransferSettings {
            container_name: self.container_name.clone().unwrap_or_else(|| DEFAULT_CONTAINER_NAME.to_string()),
            upload_concurrency: positive("upload_concurrency", self.upload_concurrency.unwrap_or(4))?,
            retry_policy: RetryPolicy::new(
                upload_max_attempts,
                Duration::from_millis(self.upload_base_delay_ms.unwrap_or(1000)),
                RetryPolicy::default().backoff_multiplier,
            ),
        })
    }

    /// Validates and fills defaults.
    ///
    /// All missing required keys are reported together, by environment
    /// variable name.
    pub fn build(self) -> TrainingResult<VoiceConfig> {
        let mut missing = Vec::new();
        for (value, name) in [
            (&self.speech_key, ENV_SPEECH_KEY),
            (&self.speech_region, ENV_SPEECH_REGION),
            (&self.storage_connection_string, ENV_STORAGE_CONNECTION_STRING),
        ] {
            if value.as_deref().is_none_or(|v| v.trim().is_empty()) {
                missing.push(name.to_string());
            }
        }
        if !missing.is_empty() {
            return Err(TrainingError::Configuration { missing });
        }

        let transfer = self.transfer_settings()?;
        let poll_interval_secs = positive("poll_interval_secs", self.poll_interval_secs.unwrap_or(60))?;
        let max_consecutive_poll_failures =
            positive("max_consecutive_poll_failures", self.max_consecutive_poll_failures.unwrap_or(5))?;

        let speech_region = self.speech_region.unwrap_or_default();
        let custom_voice_endpoint = self
            .custom_voice_endpoint
            .unwrap_or_else(|| format!("https://{speech_region}.api.cognitive.microsoft.com"))
            .trim_end_matches('/')
            .to_string();

        Ok(VoiceConfig {
            speech_key: self.speech_key.unwrap_or_default(),
            speech_region,
            storage_connection_string: self.storage_connection_string.unwrap_or_default(),
            container_name: transfer.container_name,
            custom_voice_endpoint,
            upload_concurrency: transfer.upload_concurrency,
            upload_max_attempts: transfer.retry_policy.max_attempts,
            upload_base_delay_ms: self.upload_base_delay_ms.unwrap_or(1000),
            poll_interval_secs,
            max_consecutive_poll_failures,
            model_description: self.model_description,
        })
    }
}

fn parse_number<T: std::str::FromStr>(name: &str, value: &str) -> TrainingResult<T> {
    value
        .trim()
        .parse()
        .map_err(|_| TrainingError::InvalidInput(format!("{name} must be a non-negative integer, got {value:?}")))
}

fn positive<T: Default + PartialEq>(name: &str, value: T) -> TrainingResult<T> {
    if value == T::default() {
        Err(TrainingError::InvalidInput(format!("{name} must be greater than zero")))
    } else {
        Ok(value)
    }
}
