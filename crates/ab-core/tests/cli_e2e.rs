//! CLI end-to-end tests for the ab-core binary.

use std::io::Write;
use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::{NamedTempFile, TempDir};

fn ab_core() -> Command {
    let mut cmd = Command::cargo_bin("ab-core").unwrap();
    cmd.env_remove("AB_LOG").env_remove("RUST_LOG").env_remove("AB_LOG_FORMAT");
    cmd
}

fn write_json(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

fn user_level_json(n: usize) -> String {
    let users: Vec<String> = (0..n)
        .map(|i| {
            if i % 3 == 0 {
                format!(r#"{{"converted":true,"value":{}}}"#, 10.0 + (i % 11) as f64)
            } else {
                r#"{"converted":false,"value":0}"#.to_string()
            }
        })
        .collect();
    format!(r#"{{"type":"user-level","users":[{}]}}"#, users.join(","))
}

fn path(file: &NamedTempFile) -> &str {
    file.path().to_str().unwrap()
}

#[test]
fn route_binomial_prints_beta_decision() {
    let data = write_json(r#"{"type":"binomial","successes":45,"trials":100}"#);
    let output = ab_core()
        .args(["route", "--data", path(&data)])
        .output()
        .unwrap();
    assert!(output.status.success());
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["config"]["structure"], "simple");
    assert_eq!(json["config"]["type"], "beta");
    assert_eq!(json["engine"], "beta-binomial");
    assert_eq!(json["confidence"], 1.0);
}

#[test]
fn fit_with_explicit_model_prints_posterior() {
    let data = write_json(r#"{"type":"binomial","successes":8,"trials":10}"#);
    let output = ab_core()
        .args(["fit", "--data", path(&data), "--model", "simple:beta"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert!(json.get("route").is_none());
    assert_eq!(json["result"]["posterior"]["parameters"]["alpha"], 9.0);
    assert_eq!(json["result"]["posterior"]["mean"], 0.75);
    assert_eq!(json["result"]["diagnostics"]["model_type"], "beta");
}

#[test]
fn routed_fit_includes_route_and_decomposition() {
    let data = write_json(&user_level_json(300));
    let output = ab_core()
        .args(["fit", "--data", path(&data), "--seed", "7"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["route"]["engine"], "compound");
    assert_eq!(json["result"]["posterior"]["family"], "compound");
    assert!(json["result"]["decomposition"]["conversion_rate"]["mean"].is_number());
}

#[test]
fn fit_reads_toml_options() {
    let dir = TempDir::new().unwrap();
    let options = dir.path().join("options.toml");
    std::fs::write(
        &options,
        "seed = 3\n\n[prior_params]\ndistribution = \"beta\"\nparams = [2.0, 2.0]\n",
    )
    .unwrap();
    let data = write_json(r#"{"type":"binomial","successes":8,"trials":10}"#);
    let output = ab_core()
        .args(["fit", "--data", path(&data), "--model", "simple:beta"])
        .args(["--options", options.to_str().unwrap()])
        .output()
        .unwrap();
    assert!(output.status.success());
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["result"]["posterior"]["parameters"]["alpha"], 10.0);
    assert_eq!(json["result"]["posterior"]["parameters"]["beta"], 4.0);
}

#[test]
fn compare_ranks_models() {
    let data = write_json(&user_level_json(300));
    let output = ab_core()
        .args(["compare", "--data", path(&data), "--seed", "1"])
        .args(["--models", "compound:lognormal,compound:normal"])
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stdout));
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["criterion"], "waic");
    let ranked = json["ranked"].as_array().unwrap();
    assert_eq!(ranked.len(), 2);
    assert_eq!(ranked[0]["delta"], 0.0);
    let total: f64 = ranked.iter().map(|m| m["weight"].as_f64().unwrap()).sum();
    assert!((total - 1.0).abs() < 1e-9);
}

#[test]
fn summary_format_is_one_line() {
    let data = write_json(r#"{"type":"binomial","successes":45,"trials":100}"#);
    ab_core()
        .args(["--format", "summary", "route", "--data", path(&data)])
        .assert()
        .success()
        .stdout(predicate::str::contains("simple:beta:1").and(predicate::str::contains("beta-binomial")));
}

#[test]
fn invalid_data_exits_with_data_error() {
    let data = write_json(r#"{"type":"binomial","successes":11,"trials":10}"#);
    ab_core()
        .args(["route", "--data", path(&data)])
        .assert()
        .code(11)
        .stdout(predicate::str::contains("INVALID_DATA"));
}

#[test]
fn gamma_model_exits_with_model_error() {
    let data = write_json(&user_level_json(30));
    ab_core()
        .args(["fit", "--data", path(&data), "--model", "compound:gamma"])
        .assert()
        .code(12)
        .stdout(predicate::str::contains("NOT_IMPLEMENTED"));
}

#[test]
fn missing_data_file_exits_with_io_error() {
    let missing = Path::new("/nonexistent/ab-core/data.json");
    ab_core()
        .args(["route", "--data", missing.to_str().unwrap()])
        .assert()
        .code(21);
}

#[test]
fn bad_model_spec_is_rejected_by_parser() {
    let data = write_json(r#"{"type":"binomial","successes":1,"trials":2}"#);
    ab_core()
        .args(["fit", "--data", path(&data), "--model", "nested:beta"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown structure"));
}

#[test]
fn jsonl_logs_go_to_stderr() {
    let data = write_json(r#"{"type":"binomial","successes":45,"trials":100}"#);
    ab_core()
        .args(["--log-format", "jsonl", "--log-level", "info", "route", "--data", path(&data)])
        .assert()
        .success()
        .stderr(predicate::str::contains(r#""event":"route.decided""#));
}

#[test]
fn progress_flag_streams_events() {
    let data = write_json(r#"{"type":"binomial","successes":4,"trials":10}"#);
    ab_core()
        .args(["--log-level", "off", "fit", "--data", path(&data), "--progress"])
        .assert()
        .success()
        .stderr(predicate::str::contains(r#""event":"fit_complete""#));
}

#[test]
fn progress_file_events_share_one_run_id() {
    let users: Vec<String> = (0..120)
        .map(|i| {
            let center = if i % 2 == 0 { 1.0 } else { 9.0 };
            format!(r#"{{"converted":true,"value":{}}}"#, center + (i % 7) as f64 * 0.1)
        })
        .collect();
    let data = write_json(&format!(r#"{{"type":"user-level","users":[{}]}}"#, users.join(",")));
    let dir = TempDir::new().unwrap();
    let events_path = dir.path().join("progress.jsonl");
    ab_core()
        .args(["--log-level", "off", "fit", "--data", path(&data)])
        .args(["--model", "simple:normal:2", "--seed", "3", "--progress-file"])
        .arg(&events_path)
        .assert()
        .success();

    let contents = std::fs::read_to_string(&events_path).unwrap();
    let events: Vec<serde_json::Value> = contents
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    assert!(events.iter().any(|e| e["event"] == "vbem_iteration"));
    assert!(events.iter().all(|e| e["run_id"].is_string()));
    let iteration_ids: Vec<&serde_json::Value> = events
        .iter()
        .filter(|e| e["event"] == "vbem_iteration")
        .map(|e| &e["run_id"])
        .collect();
    assert!(iteration_ids.iter().all(|id| *id == iteration_ids[0]));
}
