//! CLI tests: spawn the marketsim binary and check exit codes and artifacts.

use std::fs;
use std::process::Command;

use marketsim::exit_codes;

#[test]
fn init_then_check_succeeds() {
    let temp = tempfile::tempdir().expect("tempdir");
    let config = temp.path().join("marketsim.toml");

    let status = Command::new(env!("CARGO_BIN_EXE_marketsim"))
        .args(["init", "--config"])
        .arg(&config)
        .status()
        .expect("marketsim init");
    assert_eq!(status.code(), Some(exit_codes::OK));
    assert!(config.exists());

    let again = Command::new(env!("CARGO_BIN_EXE_marketsim"))
        .args(["init", "--config"])
        .arg(&config)
        .status()
        .expect("marketsim init again");
    assert_eq!(again.code(), Some(exit_codes::INVALID));

    let check = Command::new(env!("CARGO_BIN_EXE_marketsim"))
        .args(["check", "--config"])
        .arg(&config)
        .status()
        .expect("marketsim check");
    assert_eq!(check.code(), Some(exit_codes::OK));
}

#[test]
fn check_rejects_invalid_config() {
    let temp = tempfile::tempdir().expect("tempdir");
    let config = temp.path().join("marketsim.toml");
    fs::write(&config, "[actors]\nservice_provider = 0\n").expect("write config");

    let output = Command::new(env!("CARGO_BIN_EXE_marketsim"))
        .args(["check", "--config"])
        .arg(&config)
        .output()
        .expect("marketsim check");
    assert_eq!(output.status.code(), Some(exit_codes::INVALID));
    assert!(String::from_utf8_lossy(&output.stderr).contains("service_provider"));
}

#[test]
fn seeded_run_writes_report_and_world() {
    let temp = tempfile::tempdir().expect("tempdir");
    let out = temp.path().join("out");

    let output = Command::new(env!("CARGO_BIN_EXE_marketsim"))
        .current_dir(temp.path())
        .args(["run", "--seed", "7", "--out"])
        .arg(&out)
        .output()
        .expect("marketsim run");
    assert_eq!(output.status.code(), Some(exit_codes::OK));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("iteration   1:"), "stdout: {stdout}");

    let report: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(out.join("report.json")).expect("report"))
            .expect("parse report");
    assert_eq!(report["status"], "completed");
    assert_eq!(report["stop"]["reason"], "goals_met");
    assert!(out.join("world.json").exists());
}
