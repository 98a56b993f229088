#![allow(deprecated)]
use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use tempfile::TempDir;

fn autonomy(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("autonomy").unwrap();
    cmd.current_dir(dir.path()).env("AUTONOMY_ROOT", dir.path());
    cmd
}

fn init_project(dir: &TempDir) {
    autonomy(dir).arg("init").assert().success();
}

fn json_output(cmd: &mut Command) -> Value {
    let out = cmd.assert().success().get_output().stdout.clone();
    serde_json::from_slice(&out).unwrap()
}

fn write_jsonl(path: &std::path::Path, lines: &[Value]) {
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    let body: String = lines.iter().map(|l| format!("{l}\n")).collect();
    std::fs::write(path, body).unwrap();
}

// ---------------------------------------------------------------------------
// init / config
// ---------------------------------------------------------------------------

#[test]
fn init_creates_directory_tree() {
    let dir = TempDir::new().unwrap();
    autonomy(&dir)
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("created: .autonomy/config.yaml"));

    assert!(dir.path().join(".autonomy/logs").is_dir());
    assert!(dir.path().join(".autonomy/benchmarks").is_dir());
    assert!(dir.path().join(".autonomy/learnings").is_dir());
    assert!(dir.path().join(".autonomy/config.yaml").exists());
}

#[test]
fn init_is_idempotent() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    std::fs::write(
        dir.path().join(".autonomy/config.yaml"),
        "signals:\n  batch_size: 7\n",
    )
    .unwrap();
    autonomy(&dir)
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("exists:"));

    let content = std::fs::read_to_string(dir.path().join(".autonomy/config.yaml")).unwrap();
    assert!(content.contains("batch_size: 7"));
}

#[test]
fn config_show_fills_defaults() {
    let dir = TempDir::new().unwrap();
    let v = json_output(autonomy(&dir).args(["config", "show", "--json"]));
    assert_eq!(v["confidence"]["thresholds"]["auto_execute"], 95.0);
    assert_eq!(v["signals"]["batch_size"], 100);
}

#[test]
fn config_validate_reports_inverted_thresholds() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    autonomy(&dir)
        .args(["config", "validate"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Config is valid"));

    std::fs::write(
        dir.path().join(".autonomy/config.yaml"),
        "confidence:\n  thresholds:\n    auto_execute: 70\n    notify: 80\n    require_approval: 60\n",
    )
    .unwrap();
    autonomy(&dir)
        .args(["config", "validate"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("[error]"))
        .stderr(predicate::str::contains("config validation found errors"));
}

#[test]
fn malformed_config_is_an_error() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    std::fs::write(dir.path().join(".autonomy/config.yaml"), "confidence: [1, 2").unwrap();
    autonomy(&dir)
        .args(["config", "show"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to load config"));
}

// ---------------------------------------------------------------------------
// confidence
// ---------------------------------------------------------------------------

#[test]
fn decide_maps_boundaries_to_upper_tier() {
    let dir = TempDir::new().unwrap();
    autonomy(&dir)
        .args(["confidence", "decide", "95"])
        .assert()
        .success()
        .stdout(predicate::str::contains("auto-execute"));
    autonomy(&dir)
        .args(["confidence", "decide", "80"])
        .assert()
        .success()
        .stdout(predicate::str::contains("notify"));
    autonomy(&dir)
        .args(["confidence", "decide", "59.5"])
        .assert()
        .success()
        .stdout(predicate::str::contains("escalate"));
    autonomy(&dir)
        .args(["confidence", "decide", "120"])
        .assert()
        .failure();
}

#[test]
fn score_worst_case_task() {
    let dir = TempDir::new().unwrap();
    let mut cmd = autonomy(&dir);
    cmd.args([
        "confidence", "score", "--type", "migration", "--title", "Rewrite billing",
        "--priority", "critical", "--cost", "250", "--json",
    ]);
    for i in 0..11 {
        cmd.args(["--file", &format!("src/f{i}.rs")]);
    }
    let v = json_output(&mut cmd);
    assert_eq!(v["signals"][0]["source"], "review");
    assert_eq!(v["signals"][0]["value"], 5.0);
    assert_eq!(v["decision"], "escalate");
    let reasoning = v["reasoning"].as_array().unwrap();
    assert!(reasoning
        .iter()
        .any(|r| r.as_str().unwrap().contains("reduced certainty")));
}

#[test]
fn score_reads_quality_log() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    write_jsonl(
        &dir.path().join(".autonomy/logs/quality.jsonl"),
        &[serde_json::json!({
            "tests": { "coverage": 92 },
            "lint": { "errors": 0, "warnings": 1 },
            "build": { "success": true },
        })],
    );
    let v = json_output(autonomy(&dir).args([
        "confidence", "score", "--type", "feature", "--title", "Add login", "--priority", "low",
        "--json",
    ]));
    let sources: Vec<&str> = v["signals"]
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["source"].as_str().unwrap())
        .collect();
    assert_eq!(sources, vec!["review", "tests", "lint", "build"]);
}

#[test]
fn invalid_priority_rejected() {
    let dir = TempDir::new().unwrap();
    autonomy(&dir)
        .args(["confidence", "score", "--type", "x", "--title", "y", "--priority", "urgent"])
        .assert()
        .failure();
}

// ---------------------------------------------------------------------------
// signals
// ---------------------------------------------------------------------------

fn signal(id: &str, kind: &str, source: &str, payload: Value) -> Value {
    serde_json::json!({
        "id": id,
        "type": kind,
        "source": source,
        "priority": "high",
        "timestamp": "2026-03-01T12:00:00Z",
        "payload": payload,
    })
}

#[test]
fn patterns_lists_builtins() {
    let dir = TempDir::new().unwrap();
    autonomy(&dir)
        .args(["signals", "patterns"])
        .assert()
        .success()
        .stdout(predicate::str::contains("high-error-rate"))
        .stdout(predicate::str::contains("deployment-failure"))
        .stdout(predicate::str::contains("feature-flag-anomaly"));
}

#[test]
fn replay_fires_high_error_rate_once() {
    let dir = TempDir::new().unwrap();
    let file = dir.path().join("signals.jsonl");
    let lines: Vec<Value> = (0..7)
        .map(|i| signal(&format!("e{i}"), "error", "sentry", serde_json::json!({})))
        .collect();
    write_jsonl(&file, &lines);

    let v = json_output(autonomy(&dir).args(["signals", "replay", "--json"]).arg(&file));
    assert_eq!(v["ingested"], 7);
    assert_eq!(v["metrics"]["total"], 7);
    assert_eq!(v["metrics"]["byType"]["error"], 7);
    let firings = v["firings"].as_array().unwrap();
    assert_eq!(firings.len(), 1);
    assert_eq!(firings[0]["pattern_id"], "high-error-rate");
}

#[test]
fn replay_missing_file_fails() {
    let dir = TempDir::new().unwrap();
    autonomy(&dir)
        .args(["signals", "replay", "nope.jsonl"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to read"));
}

#[test]
fn watch_once_polls_local_log() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    write_jsonl(
        &dir.path().join(".autonomy/logs/signals.jsonl"),
        &[signal(
            "d1",
            "event",
            "vercel",
            serde_json::json!({ "status": "failure" }),
        )],
    );
    let v = json_output(autonomy(&dir).args(["signals", "watch", "--once", "--json"]));
    assert_eq!(v["received"], 1);
    assert_eq!(v["fired"][0]["pattern_id"], "deployment-failure");
}

// ---------------------------------------------------------------------------
// bench
// ---------------------------------------------------------------------------

fn write_suite(dir: &TempDir, threshold: u32) -> std::path::PathBuf {
    let path = dir.path().join("suite.yaml");
    std::fs::write(
        &path,
        format!(
            "id: smoke\nname: Smoke\nspecs:\n  - id: all-dims\n    name: All dimensions\n    \
             dimensions: [quality, completeness, efficiency, drift, speed]\n    threshold: {threshold}\n"
        ),
    )
    .unwrap();
    path
}

#[test]
fn bench_run_passes_and_persists() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    let suite = write_suite(&dir, 40);
    autonomy(&dir)
        .args(["bench", "run"])
        .arg(&suite)
        .assert()
        .success()
        .stdout(predicate::str::contains("1 passed"));

    let v = json_output(autonomy(&dir).args(["bench", "latest", "--json"]));
    assert_eq!(v["suiteId"], "smoke");
    assert_eq!(v["summary"]["total"], 1);
    assert_eq!(v["aggregateScore"], 83.5);
}

#[test]
fn bench_run_exits_nonzero_on_failure() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    let suite = write_suite(&dir, 99);
    autonomy(&dir)
        .args(["bench", "run"])
        .arg(&suite)
        .assert()
        .failure()
        .stderr(predicate::str::contains("did not pass"));
}

#[test]
fn bench_rejects_unknown_dimension() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("bad.yaml");
    std::fs::write(
        &path,
        "id: bad\nname: Bad\nspecs:\n  - id: x\n    name: X\n    dimensions: [latency]\n",
    )
    .unwrap();
    autonomy(&dir)
        .args(["bench", "run"])
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("latency"));
}

#[test]
fn bench_latest_without_results() {
    let dir = TempDir::new().unwrap();
    autonomy(&dir)
        .args(["bench", "latest"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No benchmark results yet"));
}

// ---------------------------------------------------------------------------
// learn
// ---------------------------------------------------------------------------

fn write_executions(dir: &TempDir) {
    let now = chrono::Utc::now();
    let lines: Vec<Value> = (0..20)
        .map(|i| {
            let (task_type, success) = match i {
                0..=9 => ("feature", true),
                10..=12 => ("docs", true),
                _ => ("refactor", false),
            };
            serde_json::json!({
                "id": format!("x{i}"),
                "taskType": task_type,
                "agentType": "coder",
                "success": success,
                "duration": 1200,
                "timestamp": (now - chrono::Duration::minutes(60 - i)).to_rfc3339(),
                "error": if success { Value::Null } else { Value::from("request timed out") },
            })
        })
        .collect();
    write_jsonl(&dir.path().join(".autonomy/logs/executions.jsonl"), &lines);
}

#[test]
fn learn_extract_persists_report() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    write_executions(&dir);

    let v = json_output(autonomy(&dir).args(["learn", "extract", "--json"]));
    assert_eq!(v["totalExecutions"], 20);
    let types: Vec<&str> = v["learnings"]
        .as_array()
        .unwrap()
        .iter()
        .map(|l| l["type"].as_str().unwrap())
        .collect();
    assert!(types.contains(&"pattern"));
    assert!(types.contains(&"failure-mode"));
    assert!(dir.path().join(".autonomy/learnings/latest.json").exists());
}

#[test]
fn learn_extract_since_future_is_empty() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    write_executions(&dir);
    let v = json_output(autonomy(&dir).args(["learn", "extract", "--since", "2999-01-01", "--json"]));
    assert_eq!(v["totalExecutions"], 0);
}

#[test]
fn learn_skills_writes_scores() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    write_executions(&dir);
    let v = json_output(autonomy(&dir).args(["learn", "skills", "--json"]));
    assert_eq!(v[0]["agentType"], "coder");
    assert_eq!(v[0]["sampleSize"], 20);
    assert!(dir.path().join(".autonomy/learnings/skill-scores.json").exists());
}

#[test]
fn learn_propose_without_scores() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    write_executions(&dir);
    autonomy(&dir)
        .args(["learn", "propose"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No configuration changes proposed"));
}
