//! Integration tests for the leakcluster binary
#![allow(deprecated)] // suppress assert_cmd::Command::cargo_bin deprecation in tests

mod utils;

use predicates::prelude::*;
use std::io::Write;

fn dataset_dir() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    utils::write_dataset(
        dir.path(),
        "Power_Traces_w_labels_Realista.csv",
        &[(0, 100), (2, 40)],
        1,
    );
    dir
}

#[test]
fn test_text_report() {
    let dir = dataset_dir();
    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("leakcluster");
    cmd.arg("--data-dir")
        .arg(dir.path())
        .arg("--executions")
        .arg("2")
        .arg("--seed")
        .arg("1");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains(
            "=== Side-Channel Leakage Clustering Report ===",
        ))
        .stdout(predicate::str::contains("Proportion: 1:100"))
        .stdout(predicate::str::contains("SUT00F (0) vs E0101 (2)"))
        .stdout(predicate::str::contains("Components: 8"))
        .stdout(predicate::str::contains("OPTICS"))
        .stdout(predicate::str::contains("DBSCAN"))
        .stdout(predicate::str::contains("Mean Shift"));
}

#[test]
fn test_json_report_parses() {
    let dir = dataset_dir();
    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("leakcluster");
    cmd.arg("--data-dir")
        .arg(dir.path())
        .arg("-n")
        .arg("1")
        .arg("--seed")
        .arg("2")
        .arg("--format")
        .arg("json");

    let output = cmd.output().unwrap();
    assert!(output.status.success());

    let parsed: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(parsed["format"], "leakcluster-json-v1");
    assert_eq!(parsed["executions"], 1);
    assert_eq!(parsed["channel"], "power");
    assert!(parsed["pairs"].is_array());
    assert_eq!(parsed["pairs"][0]["target"], 2);
}

#[test]
fn test_explicit_dataset_and_config_file() {
    let dir = tempfile::tempdir().unwrap();
    let data = utils::write_dataset(dir.path(), "traces.csv", &[(0, 100), (3, 20)], 2);

    let config_path = dir.path().join("experiment.toml");
    let mut config = std::fs::File::create(&config_path).unwrap();
    writeln!(
        config,
        r#"
executions = 1
seed = 5

[[plans]]
components = 4
algorithms = ["dbscan"]
"#
    )
    .unwrap();

    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("leakcluster");
    cmd.arg("--config")
        .arg(&config_path)
        .arg("--dataset")
        .arg(&data);

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("Components: 4"))
        .stdout(predicate::str::contains("DBSCAN"))
        .stdout(predicate::str::contains("OPTICS").not());
}

#[test]
fn test_missing_dataset_fails() {
    let dir = tempfile::tempdir().unwrap();
    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("leakcluster");
    cmd.arg("--data-dir").arg(dir.path());

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("loading dataset"));
}

#[test]
fn test_malformed_dataset_fails() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bad.csv");
    std::fs::write(&path, "0.1,0.2,0\n0.3,oops,0\n").unwrap();

    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("leakcluster");
    cmd.arg("--dataset").arg(&path);

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Malformed dataset at line 2"));
}

#[test]
fn test_invalid_config_fails() {
    let dir = dataset_dir();
    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("leakcluster");
    cmd.arg("--data-dir")
        .arg(dir.path())
        .arg("--executions")
        .arg("0");

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("executions must be >= 1"));
}

#[test]
fn test_rejects_unknown_channel() {
    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("leakcluster");
    cmd.arg("--channel").arg("acoustic");
    cmd.assert().failure();
}
