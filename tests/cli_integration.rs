use assert_cmd::Command;
use predicates::prelude::*;

fn oculo() -> Command {
    let mut cmd = Command::cargo_bin("oculo").unwrap();
    for key in [
        "OCULO_SESSION_SECONDS",
        "OCULO_TICK_MS",
        "OCULO_DETECTOR_INTERVAL_MS",
        "OCULO_POSE_SMOOTHING",
        "OCULO_LANDMARK_SMOOTHING",
        "OCULO_PROFILE",
        "OCULO_SEED",
        "OCULO_HISTORY_LEN",
    ] {
        cmd.env_remove(key);
    }
    cmd
}

fn stdout_json(output: &std::process::Output) -> serde_json::Value {
    let stdout = String::from_utf8(output.stdout.clone()).unwrap();
    serde_json::from_str(&stdout).unwrap()
}

// =============================================================================
// GENERAL
// =============================================================================

#[test]
fn test_no_args_shows_help() {
    oculo()
        .assert()
        .failure()
        .stderr(predicate::str::contains("Usage:"));
}

#[test]
fn test_version_flag() {
    oculo()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("oculo"));
}

// =============================================================================
// PROFILES SUBCOMMAND
// =============================================================================

#[test]
fn test_profiles_table() {
    oculo()
        .arg("profiles")
        .assert()
        .success()
        .stdout(predicate::str::contains("healthy"))
        .stdout(predicate::str::contains("low"))
        .stdout(predicate::str::contains("high"));
}

#[test]
fn test_profiles_json() {
    let output = oculo().args(["profiles", "--json"]).assert().success();
    let parsed = stdout_json(output.get_output());
    let profiles = parsed.as_array().unwrap();
    assert_eq!(profiles.len(), 3);
    assert_eq!(profiles[1]["name"], "low");
    assert_eq!(profiles[1]["blinkRateMult"], 0.15);
    assert_eq!(profiles[2]["headStabilityMult"], 0.2);
}

// =============================================================================
// RUN SUBCOMMAND
// =============================================================================

#[test]
fn test_run_blink_training_low() {
    let output = oculo()
        .args([
            "run",
            "--exercise",
            "blink-training",
            "--profile",
            "low",
            "--duration",
            "60",
            "--seed",
            "7",
            "--patient",
            "Jane Doe",
            "--quiet",
        ])
        .assert()
        .success();

    let payload = stdout_json(output.get_output());
    assert_eq!(payload["patient"]["name"], "Jane Doe");
    assert_eq!(payload["analysis"]["clinicalValue"], 6.0);
    assert_eq!(payload["analysis"]["clinicalUnit"], "BPM");
    assert_eq!(payload["analysis"]["status"], "Warning");
    assert_eq!(payload["analysis"]["notes"][0], "Severe Dry Eye Risk");
    assert_eq!(payload["scoreHistory"].as_array().unwrap().len(), 1);
}

#[test]
fn test_run_writes_output_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("report.json");

    oculo()
        .args(["run", "-e", "head-stability", "-d", "5", "--compact", "--quiet"])
        .arg("--output")
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::is_empty());

    let contents = std::fs::read_to_string(&path).unwrap();
    assert_eq!(contents.lines().count(), 1);
    let payload: serde_json::Value = serde_json::from_str(&contents).unwrap();
    assert_eq!(payload["analysis"]["exerciseKind"], "HeadStability");
    assert_eq!(payload["analysis"]["clinicalValue"], 92.0);
}

#[test]
fn test_run_profile_from_env() {
    let output = oculo()
        .env("OCULO_PROFILE", "high")
        .args(["run", "-e", "follow-dot", "-d", "2", "--quiet"])
        .assert()
        .success();
    let payload = stdout_json(output.get_output());
    assert_eq!(payload["analysis"]["clinicalValue"], 71.0);
}

#[test]
fn test_run_repeat_fills_score_history() {
    let output = oculo()
        .args(["run", "-e", "follow-dot", "-d", "2", "--repeat", "3", "--seed", "5", "--quiet"])
        .assert()
        .success();
    let payload = stdout_json(output.get_output());
    assert_eq!(payload["scoreHistory"].as_array().unwrap().len(), 3);
    assert_eq!(payload["analysis"]["clinicalValue"], 94.0);
}

#[test]
fn test_run_repeat_history_is_bounded() {
    let output = oculo()
        .env("OCULO_HISTORY_LEN", "2")
        .args(["run", "-e", "blink", "-d", "1", "--repeat", "4", "--quiet"])
        .assert()
        .success();
    let payload = stdout_json(output.get_output());
    assert_eq!(payload["scoreHistory"].as_array().unwrap().len(), 2);
}

#[test]
fn test_run_rejects_zero_repeat() {
    oculo()
        .args(["run", "-e", "blink", "--repeat", "0", "--quiet"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("--repeat"));
}

#[test]
fn test_run_unknown_exercise() {
    oculo()
        .args(["run", "--exercise", "juggling"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Unknown exercise"));
}

#[test]
fn test_run_invalid_env_config() {
    oculo()
        .env("OCULO_POSE_SMOOTHING", "2.0")
        .args(["run", "-e", "blink", "-d", "1", "--quiet"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("OCULO_POSE_SMOOTHING"));
}

// =============================================================================
// ANALYZE SUBCOMMAND
// =============================================================================

#[test]
fn test_analyze_head_stability_critical() {
    let output = oculo()
        .args([
            "analyze",
            "--exercise",
            "head-stability",
            "--elapsed",
            "30",
            "--stability",
            "45",
            "--json",
        ])
        .assert()
        .success();
    let analysis = stdout_json(output.get_output());
    assert_eq!(analysis["status"], "Critical");
    assert_eq!(analysis["clinicalValue"], 45.0);
}

#[test]
fn test_analyze_follow_dot_accuracy() {
    let output = oculo()
        .args([
            "analyze", "-e", "follow-dot", "--elapsed", "45", "--score", "450", "--json",
        ])
        .assert()
        .success();
    let analysis = stdout_json(output.get_output());
    assert_eq!(analysis["clinicalValue"], 100.0);
    assert_eq!(analysis["status"], "Good");
}

#[test]
fn test_analyze_text_output() {
    oculo()
        .args(["analyze", "-e", "blink", "--elapsed", "60", "--blinks", "40"])
        .assert()
        .success()
        .stdout(predicate::str::contains("40 BPM"))
        .stdout(predicate::str::contains("Warning"));
}

#[test]
fn test_analyze_rejects_out_of_range_stability() {
    oculo()
        .args([
            "analyze",
            "-e",
            "head-stability",
            "--elapsed",
            "30",
            "--stability",
            "150",
        ])
        .assert()
        .code(1);
}
