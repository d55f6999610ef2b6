//! Integration tests for the `vocalis prepare` command.

use assert_cmd::Command;
use predicates::prelude::*;
use std::f64::consts::PI;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn write_wav(path: &Path, rate: u32, channels: u16, secs: f64) {
    let spec = hound::WavSpec { channels, sample_rate: rate, bits_per_sample: 16, sample_format: hound::SampleFormat::Int };
    let mut writer = hound::WavWriter::create(path, spec).unwrap();
    let frames = (f64::from(rate) * secs) as u32;
    for i in 0..frames {
        let sample = ((f64::from(i) * 440.0 * 2.0 * PI / f64::from(rate)).sin() * 8000.0) as i16;
        for _ in 0..channels {
            writer.write_sample(sample).unwrap();
        }
    }
    writer.finalize().unwrap();
}

fn vocalis(temp: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("vocalis").unwrap();
    cmd.current_dir(temp.path());
    cmd
}

fn setup(temp: &TempDir) {
    let audio = temp.path().join("audio");
    let transcripts = temp.path().join("transcripts");
    fs::create_dir_all(&audio).unwrap();
    fs::create_dir_all(&transcripts).unwrap();

    write_wav(&audio.join("a.wav"), 44_100, 1, 1.0);
    write_wav(&audio.join("b.wav"), 44_100, 1, 2.0);
    write_wav(&audio.join("c.wav"), 44_100, 1, 1.0);
    fs::write(transcripts.join("a.txt"), "  Hello world \n").unwrap();
    fs::write(transcripts.join("b.txt"), "Second line").unwrap();
}

#[test]
fn test_prepare_writes_manifest() {
    let temp = TempDir::new().unwrap();
    setup(&temp);

    vocalis(&temp)
        .args(["prepare", "--audio-dir", "audio", "--transcript-dir", "transcripts", "--output", "out/dataset.json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Wrote 2 record(s)"));

    let manifest: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(temp.path().join("out/dataset.json")).unwrap()).unwrap();
    let records = manifest.as_array().unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0]["text"], "Hello world");
    assert!(records[0]["audio_file"].as_str().unwrap().ends_with("a.wav"));
    assert!((records[0]["duration"].as_f64().unwrap() - 1.0).abs() < 0.01);
    assert!((records[1]["duration"].as_f64().unwrap() - 2.0).abs() < 0.01);
}

#[test]
fn test_prepare_preprocess_normalizes_audio() {
    let temp = TempDir::new().unwrap();
    setup(&temp);
    write_wav(&temp.path().join("audio/a.wav"), 22_050, 2, 1.0);

    vocalis(&temp)
        .args([
            "prepare",
            "--audio-dir",
            "audio",
            "--transcript-dir",
            "transcripts",
            "--output",
            "dataset.json",
            "--preprocess",
        ])
        .assert()
        .success();

    let spec = hound::WavReader::open(temp.path().join("audio/a.wav")).unwrap().spec();
    assert_eq!(spec.sample_rate, 44_100);
    assert_eq!(spec.channels, 1);
}

#[test]
fn test_prepare_without_transcripts_fails() {
    let temp = TempDir::new().unwrap();
    setup(&temp);
    fs::remove_file(temp.path().join("transcripts/a.txt")).unwrap();
    fs::remove_file(temp.path().join("transcripts/b.txt")).unwrap();

    vocalis(&temp)
        .args(["prepare", "--audio-dir", "audio", "--transcript-dir", "transcripts", "--output", "dataset.json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to prepare dataset"));

    assert!(!temp.path().join("dataset.json").exists());
}
