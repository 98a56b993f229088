//! Confidence scoring for candidate autonomous tasks.
//!
//! A candidate task is scored 0–100 from a set of weighted signals and mapped
//! onto a decision tier. The review signal is always present; the remaining
//! sources are read opportunistically from the `.autonomy` logs:
//!
//! | Source      | Read from                                  |
//! |-------------|--------------------------------------------|
//! | `review`    | task metadata (priority, cost, file count) |
//! | `tests`     | latest `quality.jsonl` entry               |
//! | `lint`      | latest `quality.jsonl` entry               |
//! | `build`     | latest `quality.jsonl` entry               |
//! | `history`   | `executions.jsonl`, same task type         |
//! | `benchmark` | `benchmarks/latest.json`                   |
//!
//! Any read failure is treated as "no data" for that source.

use crate::config::{ConfidenceConfig, ConfidenceThresholds, SignalWeights};
use crate::error::Result;
use crate::execution::load_executions;
use crate::types::{clamp_score, round2, Priority};
use crate::{io, paths};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::path::{Path, PathBuf};

const REVIEW_BASE: f64 = 70.0;
const HIGH_COST: f64 = 100.0;
const MANY_FILES: usize = 10;
/// History needs at least this many prior executions of a task type.
const MIN_HISTORY: usize = 3;

// ---------------------------------------------------------------------------
// Decision
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Decision {
    Escalate,
    RequireApproval,
    Notify,
    AutoExecute,
}

impl Decision {
    pub fn as_str(self) -> &'static str {
        match self {
            Decision::AutoExecute => "auto-execute",
            Decision::Notify => "notify",
            Decision::RequireApproval => "require-approval",
            Decision::Escalate => "escalate",
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Signals
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceSource {
    Review,
    Tests,
    Lint,
    Build,
    History,
    Benchmark,
}

impl ConfidenceSource {
    pub fn weight(self, weights: &SignalWeights) -> f64 {
        match self {
            ConfidenceSource::Review => weights.review,
            ConfidenceSource::Tests => weights.tests,
            ConfidenceSource::Lint => weights.lint,
            ConfidenceSource::Build => weights.build,
            ConfidenceSource::History => weights.history,
            ConfidenceSource::Benchmark => weights.benchmark,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ConfidenceSource::Review => "review",
            ConfidenceSource::Tests => "tests",
            ConfidenceSource::Lint => "lint",
            ConfidenceSource::Build => "build",
            ConfidenceSource::History => "history",
            ConfidenceSource::Benchmark => "benchmark",
        }
    }
}

/// One piece of evidence contributing to a confidence score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfidenceSignal {
    pub source: ConfidenceSource,
    /// Value in `[0, 100]`.
    pub value: f64,
    pub weight: f64,
}

// ---------------------------------------------------------------------------
// Task / Result
// ---------------------------------------------------------------------------

/// A candidate unit of work evaluated for autonomous execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfidenceTask {
    pub id: String,
    #[serde(rename = "type")]
    pub task_type: String,
    pub title: String,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_cost: Option<f64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub files: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfidenceResult {
    pub score: f64,
    pub signals: Vec<ConfidenceSignal>,
    pub decision: Decision,
    pub reasoning: Vec<String>,
    pub calculated_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// ConfidenceEngine
// ---------------------------------------------------------------------------

pub struct ConfidenceEngine {
    root: PathBuf,
    config: ConfidenceConfig,
}

impl ConfidenceEngine {
    /// Build an engine over the project at `root`. Rejects thresholds that
    /// are not ordered `require_approval <= notify <= auto_execute`.
    pub fn new(root: impl Into<PathBuf>, config: ConfidenceConfig) -> Result<Self> {
        config.thresholds.validate()?;
        Ok(Self {
            root: root.into(),
            config,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config(&self) -> &ConfidenceConfig {
        &self.config
    }

    pub fn set_thresholds(&mut self, thresholds: ConfidenceThresholds) -> Result<()> {
        thresholds.validate()?;
        self.config.thresholds = thresholds;
        Ok(())
    }

    /// Map a score onto a decision tier. Boundary values belong to the
    /// upper tier.
    pub fn make_decision(&self, score: f64) -> Decision {
        let t = &self.config.thresholds;
        if score >= t.auto_execute {
            Decision::AutoExecute
        } else if score >= t.notify {
            Decision::Notify
        } else if score >= t.require_approval {
            Decision::RequireApproval
        } else {
            Decision::Escalate
        }
    }

    /// Unclamped review value: base 70 plus additive deltas.
    pub fn review_score(task: &ConfidenceTask) -> f64 {
        let mut score = REVIEW_BASE;
        score += match task.priority {
            Priority::Critical => -30.0,
            Priority::High => 0.0,
            Priority::Medium => -5.0,
            Priority::Low => 10.0,
        };
        if task.estimated_cost.is_some_and(|c| c > HIGH_COST) {
            score -= 20.0;
        }
        if task.files.len() > MANY_FILES {
            score -= 15.0;
        }
        score
    }

    /// Gather every available signal for `task`. Always contains the review
    /// signal, first.
    pub fn gather_signals(&self, task: &ConfidenceTask) -> Vec<ConfidenceSignal> {
        let weights = &self.config.weights;
        let signal = |source: ConfidenceSource, value: f64| ConfidenceSignal {
            source,
            value: round2(clamp_score(value)),
            weight: source.weight(weights),
        };

        let mut signals = vec![signal(ConfidenceSource::Review, Self::review_score(task))];

        if let Some(quality) = self.latest_quality() {
            if let Some(v) = tests_value(&quality) {
                signals.push(signal(ConfidenceSource::Tests, v));
            }
            if let Some(v) = lint_value(&quality) {
                signals.push(signal(ConfidenceSource::Lint, v));
            }
            if let Some(v) = build_value(&quality) {
                signals.push(signal(ConfidenceSource::Build, v));
            }
        }
        if let Some(v) = self.history_value(&task.task_type) {
            signals.push(signal(ConfidenceSource::History, v));
        }
        if let Some(v) = self.benchmark_value() {
            signals.push(signal(ConfidenceSource::Benchmark, v));
        }
        signals
    }

    pub fn calculate_confidence(&self, task: &ConfidenceTask) -> ConfidenceResult {
        let signals = self.gather_signals(task);
        self.score_signals(task, signals)
    }

    /// Score `task` with caller-supplied signals added to the gathered ones.
    pub fn calculate_with_signals(
        &self,
        task: &ConfidenceTask,
        extra: Vec<ConfidenceSignal>,
    ) -> ConfidenceResult {
        let mut signals = self.gather_signals(task);
        signals.extend(extra.into_iter().map(|mut s| {
            s.value = clamp_score(s.value);
            s
        }));
        self.score_signals(task, signals)
    }

    fn score_signals(&self, task: &ConfidenceTask, signals: Vec<ConfidenceSignal>) -> ConfidenceResult {
        let mut reasoning = Vec::new();

        let raw_review = Self::review_score(task);
        reasoning.push(format!(
            "review: base {REVIEW_BASE} adjusted to {raw_review} ({} priority, cost {}, {} files)",
            task.priority,
            task.estimated_cost
                .map(|c| c.to_string())
                .unwrap_or_else(|| "n/a".to_string()),
            task.files.len()
        ));
        if !(0.0..=100.0).contains(&raw_review) {
            reasoning.push(format!("review value {raw_review} clamped to [0, 100]"));
        }

        let total_weight: f64 = signals.iter().map(|s| s.weight).sum();
        let score = if total_weight > 0.0 {
            let weighted: f64 = signals.iter().map(|s| s.value * s.weight).sum();
            round2(clamp_score(weighted / total_weight))
        } else {
            0.0
        };

        let sources: Vec<&str> = signals.iter().map(|s| s.source.as_str()).collect();
        reasoning.push(format!(
            "score {score} from {} signal(s): {}",
            signals.len(),
            sources.join(", ")
        ));

        let mut decision = self.make_decision(score);
        if signals.len() < self.config.min_signals {
            reasoning.push(format!(
                "reduced certainty: {} of {} required signals available",
                signals.len(),
                self.config.min_signals
            ));
            if decision == Decision::AutoExecute {
                decision = Decision::Notify;
                reasoning.push("auto-execute downgraded to notify for lack of evidence".to_string());
            }
        }
        reasoning.push(format!("decision: {decision}"));

        ConfidenceResult {
            score,
            signals,
            decision,
            reasoning,
            calculated_at: Utc::now(),
        }
    }

    // -----------------------------------------------------------------------
    // Log-backed sources
    // -----------------------------------------------------------------------

    fn latest_quality(&self) -> Option<Value> {
        io::read_jsonl_tail::<Value>(&paths::quality_log(&self.root), 1)
            .ok()?
            .pop()
    }

    fn history_value(&self, task_type: &str) -> Option<f64> {
        let records = load_executions(&paths::executions_log(&self.root), None);
        let same: Vec<_> = records.iter().filter(|r| r.task_type == task_type).collect();
        if same.len() < MIN_HISTORY {
            return None;
        }
        let ok = same.iter().filter(|r| r.success).count();
        Some(ok as f64 / same.len() as f64 * 100.0)
    }

    fn benchmark_value(&self) -> Option<f64> {
        let path = paths::benchmarks_dir(&self.root).join(paths::LATEST_FILE);
        let latest: Value = io::read_json(&path).ok()??;
        latest.get("aggregateScore")?.as_f64()
    }
}

fn tests_value(q: &Value) -> Option<f64> {
    let tests = q.get("tests")?;
    if let Some(cov) = tests.get("coverage").and_then(Value::as_f64) {
        return Some(cov);
    }
    let passed = tests.get("passed").and_then(Value::as_f64)?;
    let failed = tests.get("failed").and_then(Value::as_f64).unwrap_or(0.0);
    if passed + failed <= 0.0 {
        return None;
    }
    Some(passed / (passed + failed) * 100.0)
}

fn lint_value(q: &Value) -> Option<f64> {
    let lint = q.get("lint")?;
    let errors = lint.get("errors").and_then(Value::as_f64)?;
    let warnings = lint.get("warnings").and_then(Value::as_f64).unwrap_or(0.0);
    Some(100.0 - 10.0 * errors - 2.0 * warnings)
}

fn build_value(q: &Value) -> Option<f64> {
    let ok = q.get("build")?.get("success")?.as_bool()?;
    Some(if ok { 100.0 } else { 0.0 })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution::{append_execution, ExecutionRecord};
    use crate::error::AutonomyError;
    use tempfile::TempDir;

    fn engine(dir: &TempDir) -> ConfidenceEngine {
        ConfidenceEngine::new(dir.path(), ConfidenceConfig::default()).unwrap()
    }

    fn task(priority: Priority) -> ConfidenceTask {
        ConfidenceTask {
            id: "t1".to_string(),
            task_type: "feature".to_string(),
            title: "Add login".to_string(),
            priority,
            estimated_cost: None,
            files: vec![],
        }
    }

    fn write_quality(dir: &TempDir, entry: serde_json::Value) {
        io::append_jsonl(&paths::quality_log(dir.path()), &entry).unwrap();
    }

    #[test]
    fn decision_boundaries_map_to_upper_tier() {
        let dir = TempDir::new().unwrap();
        let e = engine(&dir);
        assert_eq!(e.make_decision(95.0), Decision::AutoExecute);
        assert_eq!(e.make_decision(94.99), Decision::Notify);
        assert_eq!(e.make_decision(80.0), Decision::Notify);
        assert_eq!(e.make_decision(60.0), Decision::RequireApproval);
        assert_eq!(e.make_decision(59.9), Decision::Escalate);
        assert_eq!(e.make_decision(0.0), Decision::Escalate);
    }

    #[test]
    fn decision_is_monotonic() {
        let dir = TempDir::new().unwrap();
        let e = engine(&dir);
        let mut prev = Decision::Escalate;
        for s in 0..=100 {
            let d = e.make_decision(s as f64);
            assert!(d >= prev, "decision regressed at {s}");
            prev = d;
        }
    }

    #[test]
    fn review_deltas_stack() {
        let mut t = task(Priority::Critical);
        t.estimated_cost = Some(150.0);
        t.files = (0..12).map(|i| format!("src/f{i}.rs")).collect();
        assert_eq!(ConfidenceEngine::review_score(&t), 5.0);

        assert_eq!(ConfidenceEngine::review_score(&task(Priority::High)), 70.0);
        assert_eq!(ConfidenceEngine::review_score(&task(Priority::Medium)), 65.0);
        assert_eq!(ConfidenceEngine::review_score(&task(Priority::Low)), 80.0);
    }

    #[test]
    fn worst_case_review_signal() {
        let dir = TempDir::new().unwrap();
        let e = engine(&dir);
        let mut t = task(Priority::Critical);
        t.estimated_cost = Some(500.0);
        t.files = (0..40).map(|i| i.to_string()).collect();
        let signals = e.gather_signals(&t);
        assert_eq!(signals[0].value, 5.0);
    }

    #[test]
    fn review_only_still_produces_result() {
        let dir = TempDir::new().unwrap();
        let e = engine(&dir);
        let r = e.calculate_confidence(&task(Priority::High));
        assert_eq!(r.signals.len(), 1);
        assert_eq!(r.signals[0].source, ConfidenceSource::Review);
        assert_eq!(r.score, 70.0);
        assert_eq!(r.decision, Decision::RequireApproval);
        assert!(r.reasoning.iter().any(|l| l.contains("reduced certainty")));
    }

    #[test]
    fn below_min_signals_never_auto_executes() {
        let dir = TempDir::new().unwrap();
        let mut cfg = ConfidenceConfig::default();
        cfg.thresholds.auto_execute = 75.0;
        cfg.thresholds.notify = 70.0;
        let e = ConfidenceEngine::new(dir.path(), cfg).unwrap();
        let r = e.calculate_confidence(&task(Priority::Low));
        assert_eq!(r.score, 80.0);
        assert_eq!(r.decision, Decision::Notify);
    }

    #[test]
    fn log_backed_signals_are_gathered() {
        let dir = TempDir::new().unwrap();
        write_quality(
            &dir,
            serde_json::json!({
                "tests": { "coverage": 90 },
                "lint": { "errors": 1, "warnings": 5 },
                "build": { "success": true }
            }),
        );
        let e = engine(&dir);
        let signals = e.gather_signals(&task(Priority::High));
        let by = |s: ConfidenceSource| signals.iter().find(|x| x.source == s).map(|x| x.value);
        assert_eq!(by(ConfidenceSource::Tests), Some(90.0));
        assert_eq!(by(ConfidenceSource::Lint), Some(80.0));
        assert_eq!(by(ConfidenceSource::Build), Some(100.0));
        assert_eq!(by(ConfidenceSource::History), None);
    }

    #[test]
    fn weighted_score_combines_signals() {
        let dir = TempDir::new().unwrap();
        write_quality(&dir, serde_json::json!({ "build": { "success": true } }));
        let e = engine(&dir);
        let r = e.calculate_confidence(&task(Priority::High));
        // (70 * 0.3 + 100 * 0.15) / 0.45 = 80
        assert_eq!(r.score, 80.0);
        assert_eq!(r.decision, Decision::Notify);
        assert!(!r.reasoning.iter().any(|l| l.contains("reduced certainty")));
    }

    #[test]
    fn history_requires_minimum_samples() {
        let dir = TempDir::new().unwrap();
        let log = paths::executions_log(dir.path());
        let rec = |id: &str, success: bool| ExecutionRecord {
            id: id.to_string(),
            task_type: "feature".to_string(),
            agent_type: "builder".to_string(),
            success,
            duration: 10.0,
            confidence_score: None,
            timestamp: Utc::now(),
            error: None,
            files: None,
        };
        append_execution(&log, &rec("a", true)).unwrap();
        append_execution(&log, &rec("b", false)).unwrap();
        let e = engine(&dir);
        assert!(e.history_value("feature").is_none());

        append_execution(&log, &rec("c", true)).unwrap();
        append_execution(&log, &rec("d", true)).unwrap();
        assert_eq!(e.history_value("feature"), Some(75.0));
        assert!(e.history_value("bugfix").is_none());
    }

    #[test]
    fn benchmark_signal_reads_latest_suite() {
        let dir = TempDir::new().unwrap();
        io::write_json(
            &paths::benchmarks_dir(dir.path()).join(paths::LATEST_FILE),
            &serde_json::json!({ "suiteId": "core", "aggregateScore": 88.5 }),
        )
        .unwrap();
        let e = engine(&dir);
        assert_eq!(e.benchmark_value(), Some(88.5));
    }

    #[test]
    fn malformed_quality_log_is_ignored() {
        let dir = TempDir::new().unwrap();
        let path = paths::quality_log(dir.path());
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "{{{ not json\n").unwrap();
        let e = engine(&dir);
        assert_eq!(e.gather_signals(&task(Priority::High)).len(), 1);
    }

    #[test]
    fn extra_signals_are_clamped() {
        let dir = TempDir::new().unwrap();
        let e = engine(&dir);
        let r = e.calculate_with_signals(
            &task(Priority::High),
            vec![ConfidenceSignal {
                source: ConfidenceSource::Tests,
                value: 180.0,
                weight: 0.3,
            }],
        );
        assert_eq!(r.signals.len(), 2);
        assert_eq!(r.signals[1].value, 100.0);
        assert_eq!(r.score, 85.0);
    }

    #[test]
    fn invalid_thresholds_rejected() {
        let dir = TempDir::new().unwrap();
        let mut cfg = ConfidenceConfig::default();
        cfg.thresholds.notify = 99.0;
        assert!(matches!(
            ConfidenceEngine::new(dir.path(), cfg),
            Err(AutonomyError::InvalidThresholds(_))
        ));

        let mut e = engine(&dir);
        let bad = ConfidenceThresholds {
            auto_execute: 50.0,
            notify: 60.0,
            require_approval: 40.0,
        };
        assert!(e.set_thresholds(bad).is_err());
        assert_eq!(e.config().thresholds.auto_execute, 95.0);
    }

    #[test]
    fn decision_serializes_kebab_case() {
        let json = serde_json::to_string(&Decision::RequireApproval).unwrap();
        assert_eq!(json, "\"require-approval\"");
    }
}
