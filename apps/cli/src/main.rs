//! Vocalis CLI - prepare voice datasets and train custom voice models.
//!
//! The `vocalis` binary wires configuration, the Azure (or local) providers
//! and the training core together.

mod commands;
mod config;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;
use vocalis_providers::DEFAULT_VOICE;

use commands::{check_audio, create_voice, prepare, status, synthesize, upload};

/// Vocalis - custom voice dataset and training tool
#[derive(Parser, Debug)]
#[command(
    name = "vocalis",
    author,
    version,
    about = "Vocalis - custom voice dataset preparation and training",
    long_about = "Vocalis prepares audio/transcript datasets, uploads them to object storage with \
                  per-file verification, and drives custom voice training jobs to completion."
)]
struct Args {
    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info", global = true)]
    log_level: String,

    /// Configuration file (defaults to ./vocalis.toml when present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Build a dataset manifest from audio and transcript directories
    ///
    /// Pairs every `<name>.wav` with `<transcript-dir>/<name>.txt` and writes
    /// the manifest JSON.
    Prepare {
        /// Directory containing the WAV recordings
        #[arg(long)]
        audio_dir: PathBuf,

        /// Directory containing one transcript per recording
        #[arg(long)]
        transcript_dir: PathBuf,

        /// Manifest file to write
        #[arg(short, long)]
        output: PathBuf,

        /// Normalise recordings that fail the audio requirements (in place)
        #[arg(long)]
        preprocess: bool,
    },

    /// Check recordings against the training audio requirements
    CheckAudio {
        /// WAV files to check
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Output the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Upload a dataset manifest and its audio files
    Upload {
        /// Dataset manifest (JSON)
        dataset: PathBuf,

        /// Store objects in this directory instead of Azure Blob Storage
        #[arg(long)]
        local_store: Option<PathBuf>,
    },

    /// Upload a dataset, submit training and wait for the result
    CreateVoice {
        /// Display name of the voice model
        name: String,

        /// Dataset manifest (JSON)
        dataset: PathBuf,

        /// Locale of the recordings (e.g. en-US)
        #[arg(long)]
        locale: String,

        /// Stop waiting after this many seconds
        #[arg(long)]
        timeout_secs: Option<u64>,

        /// Store objects in this directory instead of Azure Blob Storage
        #[arg(long)]
        local_store: Option<PathBuf>,
    },

    /// Show the training status of a voice model
    Status {
        /// Voice model id
        model_id: String,

        /// Output the status as JSON
        #[arg(long)]
        json: bool,
    },

    /// Synthesize speech to a WAV file
    Synthesize {
        /// Text to speak
        text: String,

        /// WAV file to write
        #[arg(short, long)]
        output: PathBuf,

        /// Voice name
        #[arg(long, default_value = DEFAULT_VOICE)]
        voice: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let level = match args.log_level.as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    // Logs go to stderr so that --json output stays parseable.
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .without_time()
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config_path = args.config.as_deref();
    match args.command {
        Command::Prepare { audio_dir, transcript_dir, output, preprocess } => {
            prepare::execute(&audio_dir, &transcript_dir, &output, preprocess)
        }
        Command::CheckAudio { files, json } => check_audio::execute(&files, json),
        Command::Upload { dataset, local_store } => {
            upload::execute(config_path, &dataset, local_store.as_deref()).await
        }
        Command::CreateVoice { name, dataset, locale, timeout_secs, local_store } => {
            create_voice::execute(
                config_path,
                &name,
                &dataset,
                &locale,
                timeout_secs,
                local_store.as_deref(),
            )
            .await
        }
        Command::Status { model_id, json } => status::execute(config_path, &model_id, json).await,
        Command::Synthesize { text, output, voice } => {
            synthesize::execute(config_path, &text, &output, &voice).await
        }
    }
}
