//! Integration tests for commands that need the remote services.
//!
//! Only the failure paths that never reach the network are covered here.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

const ENV_VARS: [&str; 7] = [
    "AZURE_SPEECH_KEY",
    "AZURE_SPEECH_REGION",
    "AZURE_STORAGE_CONNECTION_STRING",
    "AZURE_CONTAINER_NAME",
    "VOCALIS_CUSTOM_VOICE_ENDPOINT",
    "VOCALIS_UPLOAD_CONCURRENCY",
    "VOCALIS_POLL_INTERVAL_SECS",
];

fn vocalis(temp: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("vocalis").unwrap();
    cmd.current_dir(temp.path());
    for name in ENV_VARS {
        cmd.env_remove(name);
    }
    cmd
}

fn lists_every_credential() -> impl Predicate<str> {
    predicate::str::contains("AZURE_SPEECH_KEY")
        .and(predicate::str::contains("AZURE_SPEECH_REGION"))
        .and(predicate::str::contains("AZURE_STORAGE_CONNECTION_STRING"))
}

#[test]
fn test_help_lists_commands() {
    let temp = TempDir::new().unwrap();
    vocalis(&temp).arg("--help").assert().success().stdout(
        predicate::str::contains("prepare")
            .and(predicate::str::contains("check-audio"))
            .and(predicate::str::contains("upload"))
            .and(predicate::str::contains("create-voice"))
            .and(predicate::str::contains("status"))
            .and(predicate::str::contains("synthesize")),
    );
}

#[test]
fn test_create_voice_without_credentials() {
    let temp = TempDir::new().unwrap();
    vocalis(&temp)
        .args(["create-voice", "Narrator", "dataset.json", "--locale", "en-US"])
        .assert()
        .failure()
        .stderr(lists_every_credential());
}

#[test]
fn test_create_voice_with_local_store_still_needs_credentials() {
    let temp = TempDir::new().unwrap();
    vocalis(&temp)
        .args(["create-voice", "Narrator", "dataset.json", "--locale", "en-US", "--local-store", "store"])
        .assert()
        .failure()
        .stderr(lists_every_credential());
    assert!(!temp.path().join("store").exists());
}

#[test]
fn test_create_voice_reports_only_missing_keys() {
    let temp = TempDir::new().unwrap();
    vocalis(&temp)
        .env("AZURE_SPEECH_KEY", "key")
        .env("AZURE_SPEECH_REGION", "westeurope")
        .args(["create-voice", "Narrator", "dataset.json", "--locale", "en-US"])
        .assert()
        .failure()
        .stderr(
            predicate::str::contains("AZURE_STORAGE_CONNECTION_STRING")
                .and(predicate::str::contains("AZURE_SPEECH_KEY").not()),
        );
}

#[test]
fn test_create_voice_rejects_bad_locale_before_config() {
    let temp = TempDir::new().unwrap();
    vocalis(&temp)
        .args(["create-voice", "Narrator", "dataset.json", "--locale", "english"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("locale").and(predicate::str::contains("AZURE_SPEECH_KEY").not()));
}

#[test]
fn test_create_voice_rejects_bad_name() {
    let temp = TempDir::new().unwrap();
    vocalis(&temp)
        .args(["create-voice", "bad/name", "dataset.json", "--locale", "en-US"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("model name"));
}

#[test]
fn test_status_without_credentials() {
    let temp = TempDir::new().unwrap();
    vocalis(&temp).args(["status", "model-42"]).assert().failure().stderr(lists_every_credential());
}

#[test]
fn test_remote_upload_without_credentials() {
    let temp = TempDir::new().unwrap();
    vocalis(&temp).args(["upload", "dataset.json"]).assert().failure().stderr(lists_every_credential());
}

#[test]
fn test_synthesize_without_credentials() {
    let temp = TempDir::new().unwrap();
    vocalis(&temp)
        .args(["synthesize", "Hello", "--output", "out.wav"])
        .assert()
        .failure()
        .stderr(lists_every_credential());
    assert!(!temp.path().join("out.wav").exists());
}

#[test]
fn test_account_key_connection_string_is_rejected() {
    let temp = TempDir::new().unwrap();
    vocalis(&temp)
        .env("AZURE_SPEECH_KEY", "key")
        .env("AZURE_SPEECH_REGION", "westeurope")
        .env(
            "AZURE_STORAGE_CONNECTION_STRING",
            "DefaultEndpointsProtocol=https;AccountName=acct;AccountKey=c2VjcmV0;EndpointSuffix=core.windows.net",
        )
        .args(["upload", "dataset.json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid storage connection string"));
}

#[test]
fn test_unknown_config_key_is_rejected() {
    let temp = TempDir::new().unwrap();
    fs::write(temp.path().join("vocalis.toml"), "speech_kee = \"typo\"\n").unwrap();

    vocalis(&temp)
        .args(["status", "model-42"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("cannot parse config file"));
}

#[test]
fn test_missing_explicit_config_file() {
    let temp = TempDir::new().unwrap();
    vocalis(&temp)
        .args(["--config", "nope.toml", "status", "model-42"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("cannot read config file"));
}
